//! Gameplay configuration: ability tunables, chi pools, collision rules, combos.
//!
//! Every section defaults when absent, so an empty document yields the
//! built-in vanilla setup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ability::AbilityKind;
use crate::collision::CollisionOutcome;
use crate::element::{Action, Activation, Category, Element};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub instances: InstanceSection,
    #[serde(default)]
    pub resources: ResourceSection,
    #[serde(default)]
    pub collision: CollisionSection,
    #[serde(default)]
    pub world: WorldSection,
    #[serde(default)]
    pub sequences: SequenceSection,
    #[serde(default = "default_abilities")]
    pub abilities: Vec<AbilityConfig>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            instances: InstanceSection::default(),
            resources: ResourceSection::default(),
            collision: CollisionSection::default(),
            world: WorldSection::default(),
            sequences: SequenceSection::default(),
            abilities: default_abilities(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceSection {
    /// Concurrent live instances a single player may own.
    #[serde(default = "default_max_per_player")]
    pub max_per_player: usize,
}

fn default_max_per_player() -> usize {
    8
}

impl Default for InstanceSection {
    fn default() -> Self {
        Self {
            max_per_player: default_max_per_player(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSection {
    #[serde(default = "default_max_chi")]
    pub max: f32,
    /// Chi credited per regeneration interval when no element override applies.
    #[serde(default = "default_regen")]
    pub regen: f32,
    #[serde(default = "default_regen_interval_ms")]
    pub regen_interval_ms: u64,
    /// Per-element regeneration overrides. A user with several elements gets the highest.
    #[serde(default)]
    pub element_regen: BTreeMap<Element, f32>,
}

fn default_max_chi() -> f32 {
    100.0
}

fn default_regen() -> f32 {
    5.0
}

fn default_regen_interval_ms() -> u64 {
    1000
}

impl Default for ResourceSection {
    fn default() -> Self {
        Self {
            max: default_max_chi(),
            regen: default_regen(),
            regen_interval_ms: default_regen_interval_ms(),
            element_regen: BTreeMap::new(),
        }
    }
}

impl ResourceSection {
    /// Regeneration rate for a user owning `elements`.
    pub fn regen_for(&self, elements: &[Element]) -> f32 {
        elements
            .iter()
            .filter_map(|e| self.element_regen.get(e).copied())
            .reduce(f32::max)
            .unwrap_or(self.regen)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollisionSection {
    /// Broad-phase grid cell edge, in blocks.
    #[serde(default = "default_cell_size")]
    pub cell_size: f32,
    /// Elements from strongest to weakest. Decides `one_removed` outcomes.
    #[serde(default = "default_element_priority")]
    pub element_priority: Vec<Element>,
    #[serde(default = "default_collision_rules")]
    pub rules: Vec<CollisionRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollisionRule {
    pub first: Element,
    pub second: Element,
    pub outcome: CollisionOutcome,
}

fn default_cell_size() -> f32 {
    4.0
}

fn default_element_priority() -> Vec<Element> {
    vec![Element::Water, Element::Earth, Element::Fire, Element::Air]
}

fn default_collision_rules() -> Vec<CollisionRule> {
    use CollisionOutcome::*;
    let rule = |first, second, outcome| CollisionRule {
        first,
        second,
        outcome,
    };
    vec![
        rule(Element::Fire, Element::Fire, BothRemoved),
        rule(Element::Water, Element::Water, BothRemoved),
        rule(Element::Earth, Element::Earth, BothRemoved),
        rule(Element::Air, Element::Air, Deflect),
        rule(Element::Fire, Element::Water, OneRemoved),
        rule(Element::Earth, Element::Air, OneRemoved),
        rule(Element::Fire, Element::Air, Deflect),
        rule(Element::Water, Element::Earth, NoOp),
    ]
}

impl Default for CollisionSection {
    fn default() -> Self {
        Self {
            cell_size: default_cell_size(),
            element_priority: default_element_priority(),
            rules: default_collision_rules(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldSection {
    /// Worlds where no ability may be activated.
    #[serde(default)]
    pub disabled_worlds: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceSection {
    /// How long a recorded action stays eligible for combo matching.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    #[serde(default = "default_combos")]
    pub combos: Vec<ComboConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComboConfig {
    /// The ability activated when the combo completes.
    pub ability: String,
    /// `(bound ability, action)` pairs in order.
    pub steps: Vec<(String, Action)>,
}

fn default_window_ms() -> u64 {
    3000
}

fn default_combos() -> Vec<ComboConfig> {
    vec![ComboConfig {
        ability: "fire-wave".into(),
        steps: vec![
            ("fire-shield".into(), Action::Sneak),
            ("fire-shield".into(), Action::SneakRelease),
            ("fire-blast".into(), Action::Attack),
        ],
    }]
}

impl Default for SequenceSection {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            combos: default_combos(),
        }
    }
}

/// Tunables for one ability. Loaded into an immutable descriptor at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityConfig {
    pub id: String,
    pub element: Element,
    pub category: Category,
    pub kind: AbilityKind,
    pub activation: Activation,
    #[serde(default)]
    pub cooldown_ms: u64,
    #[serde(default)]
    pub cost: f32,
    #[serde(default)]
    pub damage: f32,
    /// Blocks per tick.
    #[serde(default)]
    pub speed: f32,
    #[serde(default)]
    pub range: f32,
    #[serde(default)]
    pub radius: f32,
    #[serde(default)]
    pub duration_ms: u64,
    /// Chi drained per tick while the instance is alive.
    #[serde(default)]
    pub upkeep: f32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl AbilityConfig {
    fn base(id: &str, element: Element, category: Category, kind: AbilityKind) -> Self {
        Self {
            id: id.into(),
            element,
            category,
            kind,
            activation: Activation::Attack,
            cooldown_ms: 0,
            cost: 0.0,
            damage: 0.0,
            speed: 0.0,
            range: 0.0,
            radius: 0.0,
            duration_ms: 0,
            upkeep: 0.0,
            enabled: true,
        }
    }

    fn blast(id: &str, element: Element, cooldown_ms: u64, cost: f32, damage: f32) -> Self {
        Self {
            cooldown_ms,
            cost,
            damage,
            speed: 1.0,
            range: 20.0,
            radius: 0.5,
            ..Self::base(id, element, Category::Attack, AbilityKind::Blast)
        }
    }

    fn shield(id: &str, element: Element, cooldown_ms: u64, duration_ms: u64) -> Self {
        Self {
            activation: Activation::Sneak,
            cooldown_ms,
            cost: 15.0,
            radius: 3.0,
            duration_ms,
            upkeep: 0.5,
            ..Self::base(id, element, Category::Defense, AbilityKind::Shield)
        }
    }
}

/// The vanilla ability set.
pub fn default_abilities() -> Vec<AbilityConfig> {
    vec![
        AbilityConfig::blast("fire-blast", Element::Fire, 5000, 20.0, 2.0),
        AbilityConfig {
            speed: 0.8,
            range: 15.0,
            radius: 1.5,
            activation: Activation::Sequence,
            ..AbilityConfig::blast("fire-wave", Element::Fire, 12000, 35.0, 4.0)
        },
        AbilityConfig::shield("fire-shield", Element::Fire, 8000, 4000),
        AbilityConfig {
            activation: Activation::Interact,
            cooldown_ms: 7000,
            cost: 25.0,
            speed: 0.8,
            duration_ms: 1500,
            ..AbilityConfig::base("fire-jet", Element::Fire, Category::Movement, AbilityKind::Jet)
        },
        AbilityConfig {
            speed: 1.5,
            range: 25.0,
            radius: 0.6,
            ..AbilityConfig::blast("air-blast", Element::Air, 1500, 10.0, 0.5)
        },
        AbilityConfig {
            radius: 3.5,
            upkeep: 0.4,
            ..AbilityConfig::shield("air-shield", Element::Air, 6000, 5000)
        },
        AbilityConfig {
            activation: Activation::Passive,
            ..AbilityConfig::base(
                "graceful-descent",
                Element::Air,
                Category::Movement,
                AbilityKind::Passive,
            )
        },
        AbilityConfig::blast("water-blast", Element::Water, 3000, 15.0, 2.5),
        AbilityConfig {
            speed: 0.9,
            range: 18.0,
            radius: 0.6,
            ..AbilityConfig::blast("earth-blast", Element::Earth, 4000, 20.0, 3.0)
        },
    ]
}
