//! Collision resolution between live ability instances.
//!
//! Broad phase hashes collider bounds into a [`SpatialGrid`]; narrow phase
//! runs exact intersection only for pairs sharing a cell. Pairs are resolved
//! in ascending instance-id order, so the same input always yields the same
//! events.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::CollisionSection;
use crate::element::Element;
use crate::error::ConfigError;
use crate::instance::InstanceId;
use crate::spatial::SpatialGrid;
use crate::PlayerId;

/// A bounding volume registered by an instance for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Collider {
    Sphere { center: Vec3, radius: f32 },
    Aabb { min: Vec3, max: Vec3 },
}

impl Collider {
    /// Axis-aligned bounds as `(min, max)`.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        match *self {
            Collider::Sphere { center, radius } => (center - radius, center + radius),
            Collider::Aabb { min, max } => (min, max),
        }
    }

    pub fn intersects(&self, other: &Collider) -> bool {
        match (*self, *other) {
            (
                Collider::Sphere { center: a, radius: ra },
                Collider::Sphere { center: b, radius: rb },
            ) => a.distance_squared(b) <= (ra + rb) * (ra + rb),
            (Collider::Sphere { center, radius }, Collider::Aabb { min, max })
            | (Collider::Aabb { min, max }, Collider::Sphere { center, radius }) => {
                center.clamp(min, max).distance_squared(center) <= radius * radius
            }
            (Collider::Aabb { min: amin, max: amax }, Collider::Aabb { min: bmin, max: bmax }) => {
                amin.cmple(bmax).all() && bmin.cmple(amax).all()
            }
        }
    }
}

/// What happens when two instances touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionOutcome {
    BothRemoved,
    /// The weaker element by configured priority is removed.
    OneRemoved,
    Deflect,
    NoOp,
}

/// One instance's collider as submitted to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionBody {
    pub instance: InstanceId,
    pub owner: PlayerId,
    pub element: Element,
    pub collider: Collider,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionEvent {
    /// Lower instance id of the pair.
    pub first: InstanceId,
    pub second: InstanceId,
    pub outcome: CollisionOutcome,
    pub removed: Vec<InstanceId>,
}

pub struct CollisionEngine {
    grid: SpatialGrid,
    rules: HashMap<(Element, Element), CollisionOutcome>,
    /// Strongest first.
    priority: Vec<Element>,
    warned: HashSet<(Element, Element)>,
}

fn pair_key(a: Element, b: Element) -> (Element, Element) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl CollisionEngine {
    pub fn new(section: &CollisionSection) -> Result<Self, ConfigError> {
        if !section.cell_size.is_finite() || section.cell_size <= 0.0 {
            return Err(ConfigError::InvalidCellSize(section.cell_size));
        }
        let rules = section
            .rules
            .iter()
            .map(|r| (pair_key(r.first, r.second), r.outcome))
            .collect();
        Ok(Self {
            grid: SpatialGrid::new(section.cell_size),
            rules,
            priority: section.element_priority.clone(),
            warned: HashSet::new(),
        })
    }

    /// Outcome configured for a pair of elements. Unconfigured pairs are
    /// `NoOp`, logged once per pair.
    pub fn outcome(&mut self, a: Element, b: Element) -> CollisionOutcome {
        let key = pair_key(a, b);
        match self.rules.get(&key) {
            Some(outcome) => *outcome,
            None => {
                if self.warned.insert(key) {
                    warn!("No collision rule for {} vs {}, treating as no-op", key.0, key.1);
                }
                CollisionOutcome::NoOp
            }
        }
    }

    /// Position of `element` in the priority list; unlisted elements rank last.
    fn rank(&self, element: Element) -> usize {
        self.priority
            .iter()
            .position(|e| *e == element)
            .unwrap_or(self.priority.len())
    }

    /// Resolve every overlapping pair of instances with different owners.
    /// An instance removed by an earlier pair takes no part in later ones.
    pub fn resolve(&mut self, bodies: &[CollisionBody]) -> Vec<CollisionEvent> {
        self.grid.clear();
        for (index, body) in bodies.iter().enumerate() {
            let (min, max) = body.collider.bounds();
            self.grid.insert(index, min, max);
        }

        let mut pairs: BTreeMap<(InstanceId, InstanceId), (Element, Element)> = BTreeMap::new();
        for (i, j) in self.grid.candidate_pairs() {
            let (a, b) = (&bodies[i], &bodies[j]);
            if a.instance == b.instance || a.owner == b.owner {
                continue;
            }
            let key = if a.instance < b.instance {
                (a.instance, b.instance)
            } else {
                (b.instance, a.instance)
            };
            if pairs.contains_key(&key) || !a.collider.intersects(&b.collider) {
                continue;
            }
            let elements = if a.instance < b.instance {
                (a.element, b.element)
            } else {
                (b.element, a.element)
            };
            pairs.insert(key, elements);
        }

        let mut removed: BTreeSet<InstanceId> = BTreeSet::new();
        let mut events = Vec::new();
        for ((first, second), (first_element, second_element)) in pairs {
            if removed.contains(&first) || removed.contains(&second) {
                continue;
            }
            let outcome = self.outcome(first_element, second_element);
            let losers = match outcome {
                CollisionOutcome::BothRemoved => vec![first, second],
                CollisionOutcome::OneRemoved => {
                    // Ties go to the lower instance id.
                    if self.rank(second_element) < self.rank(first_element) {
                        vec![first]
                    } else {
                        vec![second]
                    }
                }
                CollisionOutcome::Deflect | CollisionOutcome::NoOp => Vec::new(),
            };
            removed.extend(losers.iter().copied());
            events.push(CollisionEvent {
                first,
                second,
                outcome,
                removed: losers,
            });
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollisionRule;
    use uuid::Uuid;

    fn engine() -> CollisionEngine {
        CollisionEngine::new(&CollisionSection::default()).unwrap()
    }

    fn body(id: u64, owner: PlayerId, element: Element, at: Vec3) -> CollisionBody {
        CollisionBody {
            instance: InstanceId(id),
            owner,
            element,
            collider: Collider::Sphere {
                center: at,
                radius: 0.5,
            },
        }
    }

    #[test]
    fn narrow_phase_shapes() {
        let sphere = Collider::Sphere {
            center: Vec3::ZERO,
            radius: 1.0,
        };
        let near = Collider::Aabb {
            min: Vec3::new(0.5, -1.0, -1.0),
            max: Vec3::new(2.0, 1.0, 1.0),
        };
        let far = Collider::Aabb {
            min: Vec3::splat(5.0),
            max: Vec3::splat(6.0),
        };
        assert!(sphere.intersects(&near));
        assert!(near.intersects(&sphere));
        assert!(!sphere.intersects(&far));
        assert!(!near.intersects(&far));
        assert!(near.intersects(&near));
    }

    #[test]
    fn same_element_both_removed() {
        let mut engine = engine();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let events = engine.resolve(&[
            body(1, a, Element::Fire, Vec3::ZERO),
            body(2, b, Element::Fire, Vec3::new(0.5, 0.0, 0.0)),
        ]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, CollisionOutcome::BothRemoved);
        assert_eq!(events[0].removed, vec![InstanceId(1), InstanceId(2)]);
    }

    #[test]
    fn priority_decides_one_removed() {
        let mut engine = engine();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        // Water outranks fire by default.
        let events = engine.resolve(&[
            body(1, a, Element::Water, Vec3::ZERO),
            body(2, b, Element::Fire, Vec3::ZERO),
        ]);
        assert_eq!(events[0].removed, vec![InstanceId(2)]);

        let events = engine.resolve(&[
            body(1, a, Element::Fire, Vec3::ZERO),
            body(2, b, Element::Water, Vec3::ZERO),
        ]);
        assert_eq!(events[0].removed, vec![InstanceId(1)]);
    }

    #[test]
    fn equal_priority_tie_keeps_lower_id() {
        let mut section = CollisionSection::default();
        section.rules = vec![CollisionRule {
            first: Element::Fire,
            second: Element::Fire,
            outcome: CollisionOutcome::OneRemoved,
        }];
        let mut engine = CollisionEngine::new(&section).unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let bodies = [
            body(7, a, Element::Fire, Vec3::ZERO),
            body(3, b, Element::Fire, Vec3::ZERO),
        ];
        let first = engine.resolve(&bodies);
        assert_eq!(first[0].first, InstanceId(3));
        assert_eq!(first[0].removed, vec![InstanceId(7)]);
        for _ in 0..10 {
            assert_eq!(engine.resolve(&bodies), first);
        }
    }

    #[test]
    fn same_owner_never_collides() {
        let mut engine = engine();
        let a = Uuid::new_v4();
        let events = engine.resolve(&[
            body(1, a, Element::Fire, Vec3::ZERO),
            body(2, a, Element::Fire, Vec3::ZERO),
        ]);
        assert!(events.is_empty());
    }

    #[test]
    fn removed_instance_skips_later_pairs() {
        let mut engine = engine();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let events = engine.resolve(&[
            body(1, a, Element::Fire, Vec3::ZERO),
            body(2, b, Element::Fire, Vec3::ZERO),
            body(3, c, Element::Fire, Vec3::ZERO),
        ]);
        // (1,2) removes both; (1,3) and (2,3) are skipped.
        assert_eq!(events.len(), 1);
        assert_eq!((events[0].first, events[0].second), (InstanceId(1), InstanceId(2)));
    }

    #[test]
    fn unconfigured_pair_is_noop() {
        let mut section = CollisionSection::default();
        section.rules.clear();
        let mut engine = CollisionEngine::new(&section).unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let bodies = [
            body(1, a, Element::Air, Vec3::ZERO),
            body(2, b, Element::Earth, Vec3::ZERO),
        ];
        let events = engine.resolve(&bodies);
        assert_eq!(events[0].outcome, CollisionOutcome::NoOp);
        assert!(events[0].removed.is_empty());
        engine.resolve(&bodies);
        assert_eq!(engine.warned.len(), 1);
    }

    #[test]
    fn distant_bodies_do_not_collide() {
        let mut engine = engine();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let events = engine.resolve(&[
            body(1, a, Element::Fire, Vec3::ZERO),
            body(2, b, Element::Fire, Vec3::new(1.5, 0.0, 0.0)),
        ]);
        assert!(events.is_empty());
    }

    #[test]
    fn collider_wider_than_the_grid_still_collides() {
        let mut section = CollisionSection::default();
        section.cell_size = 0.5;
        let mut engine = CollisionEngine::new(&section).unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let shield = CollisionBody {
            instance: InstanceId(1),
            owner: a,
            element: Element::Fire,
            collider: Collider::Sphere {
                center: Vec3::ZERO,
                radius: 5.0,
            },
        };
        let events = engine.resolve(&[
            shield,
            body(2, b, Element::Fire, Vec3::new(4.5, 0.0, 0.0)),
        ]);
        assert_eq!(events.len(), 1);
        assert_eq!((events[0].first, events[0].second), (InstanceId(1), InstanceId(2)));
    }

    #[test]
    fn invalid_cell_size_rejected() {
        let mut section = CollisionSection::default();
        section.cell_size = 0.0;
        assert!(matches!(
            CollisionEngine::new(&section),
            Err(ConfigError::InvalidCellSize(_))
        ));
    }
}
