//! Ability descriptors and the registry that owns them.
//!
//! The registry is built once at startup and is read-only afterwards; it is
//! shared behind an `Arc` so command handlers and the tick loop can read it
//! without locking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::ability::{self, AbilityFactory, AbilityKind};
use crate::config::AbilityConfig;
use crate::element::{Activation, Category, Element};
use crate::error::{ConfigError, RegistryError};

/// Immutable description of one ability, created from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AbilityDescriptor {
    /// Lower-case unique identifier, e.g. `"fire-blast"`.
    pub id: String,
    pub element: Element,
    pub category: Category,
    pub kind: AbilityKind,
    pub activation: Activation,
    pub cooldown: Duration,
    pub cost: f32,
    pub damage: f32,
    pub speed: f32,
    pub range: f32,
    pub radius: f32,
    pub duration: Duration,
    pub upkeep: f32,
}

impl AbilityDescriptor {
    /// Validate and convert a config entry.
    pub fn from_config(config: &AbilityConfig) -> Result<Self, ConfigError> {
        let id = config.id.trim().to_ascii_lowercase();
        let invalid = |reason: &str| ConfigError::InvalidAbility {
            ability: config.id.clone(),
            reason: reason.to_string(),
        };
        if id.is_empty() || id.contains(char::is_whitespace) {
            return Err(invalid("identifier must be a single non-empty word"));
        }
        let numbers = [
            ("cost", config.cost),
            ("damage", config.damage),
            ("speed", config.speed),
            ("range", config.range),
            ("radius", config.radius),
            ("upkeep", config.upkeep),
        ];
        for (name, value) in numbers {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(&format!("{name} must be a non-negative number")));
            }
        }
        match config.kind {
            AbilityKind::Blast if config.speed <= 0.0 || config.range <= 0.0 => {
                return Err(invalid("blasts need a positive speed and range"));
            }
            AbilityKind::Shield if config.radius <= 0.0 || config.duration_ms == 0 => {
                return Err(invalid("shields need a positive radius and duration"));
            }
            AbilityKind::Jet if config.duration_ms == 0 => {
                return Err(invalid("jets need a positive duration"));
            }
            AbilityKind::Passive if config.activation != Activation::Passive => {
                return Err(invalid("passive abilities must use the passive activation"));
            }
            _ => {}
        }
        if config.activation == Activation::Passive && config.kind != AbilityKind::Passive {
            return Err(invalid("only passive abilities may use the passive activation"));
        }

        Ok(Self {
            id,
            element: config.element,
            category: config.category,
            kind: config.kind,
            activation: config.activation,
            cooldown: Duration::from_millis(config.cooldown_ms),
            cost: config.cost,
            damage: config.damage,
            speed: config.speed,
            range: config.range,
            radius: config.radius,
            duration: Duration::from_millis(config.duration_ms),
            upkeep: config.upkeep,
        })
    }

    /// Whether a user can ever cast this directly or through a combo.
    pub fn is_castable(&self) -> bool {
        self.activation != Activation::Passive
    }

    /// Whether it may be bound to a hotbar slot.
    pub fn is_bindable(&self) -> bool {
        !matches!(self.activation, Activation::Passive | Activation::Sequence)
    }
}

/// All registered descriptors, plus the factories that build live instances.
pub struct AbilityRegistry {
    abilities: HashMap<String, Arc<AbilityDescriptor>>,
    /// Registration order, for stable listings.
    order: Vec<String>,
    passives: HashMap<Element, Vec<Arc<AbilityDescriptor>>>,
    factories: HashMap<AbilityKind, AbilityFactory>,
}

impl Default for AbilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AbilityRegistry {
    /// Empty registry with the built-in factories installed.
    pub fn new() -> Self {
        let mut factories: HashMap<AbilityKind, AbilityFactory> = HashMap::new();
        factories.insert(AbilityKind::Blast, ability::blast::create);
        factories.insert(AbilityKind::Shield, ability::shield::create);
        factories.insert(AbilityKind::Jet, ability::jet::create);
        Self {
            abilities: HashMap::new(),
            order: Vec::new(),
            passives: HashMap::new(),
            factories,
        }
    }

    /// Build a registry from config entries. Disabled entries are skipped.
    pub fn from_config(entries: &[AbilityConfig]) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for entry in entries {
            if !entry.enabled {
                debug!("Skipping disabled ability {}", entry.id);
                continue;
            }
            registry.register(AbilityDescriptor::from_config(entry)?)?;
        }
        info!("Registered {} abilities", registry.len());
        Ok(registry)
    }

    /// Register a descriptor. Identifiers are unique, compared case-insensitively.
    pub fn register(&mut self, descriptor: AbilityDescriptor) -> Result<(), RegistryError> {
        let key = descriptor.id.to_ascii_lowercase();
        if self.abilities.contains_key(&key) {
            return Err(RegistryError::DuplicateIdentifier(key));
        }
        let descriptor = Arc::new(AbilityDescriptor {
            id: key.clone(),
            ..descriptor
        });
        if descriptor.activation == Activation::Passive {
            self.passives
                .entry(descriptor.element)
                .or_default()
                .push(descriptor.clone());
        }
        self.order.push(key.clone());
        self.abilities.insert(key, descriptor);
        Ok(())
    }

    /// Replace or add the factory for an ability kind.
    pub fn register_factory(&mut self, kind: AbilityKind, factory: AbilityFactory) {
        self.factories.insert(kind, factory);
    }

    pub fn resolve(&self, id: &str) -> Result<Arc<AbilityDescriptor>, RegistryError> {
        self.get(id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownAbility(id.to_string()))
    }

    pub fn get(&self, id: &str) -> Option<&Arc<AbilityDescriptor>> {
        match self.abilities.get(id) {
            Some(d) => Some(d),
            None => self.abilities.get(&id.to_ascii_lowercase()),
        }
    }

    pub fn factory(&self, kind: AbilityKind) -> Option<AbilityFactory> {
        self.factories.get(&kind).copied()
    }

    /// All descriptors in registration order.
    pub fn all(&self) -> impl Iterator<Item = &Arc<AbilityDescriptor>> {
        self.order.iter().filter_map(|id| self.abilities.get(id))
    }

    pub fn by_element(&self, element: Element) -> Vec<Arc<AbilityDescriptor>> {
        self.all().filter(|d| d.element == element).cloned().collect()
    }

    pub fn by_category(&self, category: Category) -> Vec<Arc<AbilityDescriptor>> {
        self.all().filter(|d| d.category == category).cloned().collect()
    }

    pub fn passives(&self, element: Element) -> &[Arc<AbilityDescriptor>] {
        self.passives
            .get(&element)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.abilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.abilities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_abilities;

    fn registry() -> AbilityRegistry {
        AbilityRegistry::from_config(&default_abilities()).unwrap()
    }

    #[test]
    fn duplicate_identifier_rejected() {
        let mut reg = registry();
        let dup = reg.resolve("fire-blast").unwrap().as_ref().clone();
        assert_eq!(
            reg.register(dup),
            Err(RegistryError::DuplicateIdentifier("fire-blast".into()))
        );
    }

    #[test]
    fn duplicate_is_case_insensitive() {
        let mut reg = registry();
        let mut dup = reg.resolve("fire-blast").unwrap().as_ref().clone();
        dup.id = "Fire-Blast".into();
        assert!(matches!(
            reg.register(dup),
            Err(RegistryError::DuplicateIdentifier(_))
        ));
    }

    #[test]
    fn resolve_unknown() {
        let reg = registry();
        assert_eq!(
            reg.resolve("lightning").unwrap_err(),
            RegistryError::UnknownAbility("lightning".into())
        );
        assert_eq!(reg.resolve("AIR-BLAST").unwrap().id, "air-blast");
    }

    #[test]
    fn groupings() {
        let reg = registry();
        let fire = reg.by_element(Element::Fire);
        assert!(fire.iter().all(|d| d.element == Element::Fire));
        assert!(fire.iter().any(|d| d.id == "fire-jet"));
        let defense = reg.by_category(Category::Defense);
        assert!(defense.iter().any(|d| d.id == "air-shield"));
        assert_eq!(reg.passives(Element::Air).len(), 1);
        assert!(reg.passives(Element::Earth).is_empty());
    }

    #[test]
    fn disabled_entries_skipped() {
        let mut entries = default_abilities();
        entries[0].enabled = false;
        let skipped = entries[0].id.clone();
        let reg = AbilityRegistry::from_config(&entries).unwrap();
        assert!(reg.get(&skipped).is_none());
        assert_eq!(reg.len(), entries.len() - 1);
    }

    #[test]
    fn listing_keeps_registration_order() {
        let reg = registry();
        let ids: Vec<_> = reg.all().map(|d| d.id.clone()).collect();
        let expected: Vec<_> = default_abilities().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn invalid_blast_rejected() {
        let mut entries = default_abilities();
        entries[0].speed = 0.0;
        assert!(matches!(
            AbilityRegistry::from_config(&entries),
            Err(ConfigError::InvalidAbility { .. })
        ));
    }

    #[test]
    fn negative_cost_rejected() {
        let mut entries = default_abilities();
        entries[0].cost = -1.0;
        assert!(AbilityRegistry::from_config(&entries).is_err());
    }

    #[test]
    fn factories_cover_castable_kinds() {
        let reg = AbilityRegistry::new();
        assert!(reg.factory(AbilityKind::Blast).is_some());
        assert!(reg.factory(AbilityKind::Shield).is_some());
        assert!(reg.factory(AbilityKind::Jet).is_some());
        assert!(reg.factory(AbilityKind::Passive).is_none());
    }

    #[test]
    fn bindable_and_castable() {
        let reg = registry();
        assert!(reg.resolve("fire-blast").unwrap().is_bindable());
        let wave = reg.resolve("fire-wave").unwrap();
        assert!(wave.is_castable());
        assert!(!wave.is_bindable());
        let passive = reg.resolve("graceful-descent").unwrap();
        assert!(!passive.is_castable());
    }
}
