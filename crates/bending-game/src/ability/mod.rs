//! The capability interface every ability kind implements, and the context
//! handed to it each tick.

pub mod blast;
pub mod jet;
pub mod shield;

use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::collision::{CollisionOutcome, Collider};
use crate::element::Element;
use crate::instance::InstanceId;
use crate::registry::AbilityDescriptor;
use crate::removal::Policies;
use crate::resource::ResourceManager;
use crate::user::UserState;
use crate::PlayerId;

/// Selects the factory used to build live instances of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbilityKind {
    Blast,
    Shield,
    Jet,
    Passive,
}

/// What an instance wants after one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    Continue,
    /// Finished normally.
    Complete,
    /// Cut short (policy hit, upkeep unpaid, owner gone).
    Remove,
}

/// A side effect the host applies after the tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Damage {
        source: PlayerId,
        target: PlayerId,
        ability: String,
        amount: f32,
    },
    /// Add `velocity` (blocks/tick) to the player's motion.
    Push { player: PlayerId, velocity: Vec3 },
}

/// A player body abilities can hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub player: PlayerId,
    /// Feet position.
    pub position: Vec3,
}

/// Everything an instance sees at spawn time.
pub struct Launch<'a> {
    pub owner: PlayerId,
    pub state: &'a UserState,
    pub now: Instant,
}

/// Per-update view of the world for one instance.
pub struct UpdateContext<'a> {
    pub owner: PlayerId,
    pub state: &'a UserState,
    pub now: Instant,
    pub tick: u64,
    pub resources: &'a mut ResourceManager,
    pub targets: &'a [Target],
    pub effects: &'a mut Vec<Effect>,
}

/// Delivered to both participants of a collision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collision {
    pub other: InstanceId,
    pub other_element: Element,
    pub outcome: CollisionOutcome,
}

pub type AbilityFactory = fn(Arc<AbilityDescriptor>, &Launch<'_>) -> Box<dyn Ability>;

/// Per-kind behavior of a live instance.
pub trait Ability: Send {
    fn descriptor(&self) -> &Arc<AbilityDescriptor>;

    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> UpdateResult;

    /// Checked by the manager before every update; any hit removes the instance.
    fn policies(&self) -> Option<&Policies> {
        None
    }

    /// Volumes registered with the collision engine this tick.
    fn colliders(&self) -> Vec<Collider> {
        Vec::new()
    }

    fn on_collision(&mut self, collision: &Collision) {
        let _ = collision;
    }

    /// Called exactly once when the instance leaves the live set.
    fn on_destroy(&mut self) {}

    fn cost(&self) -> f32 {
        self.descriptor().cost
    }

    fn cooldown(&self) -> Duration {
        self.descriptor().cooldown
    }
}

/// Eye offset above the feet position.
pub const EYE_HEIGHT: f32 = 1.62;

/// Player hitbox used for body hits.
pub const BODY_WIDTH: f32 = 0.6;
pub const BODY_HEIGHT: f32 = 1.8;

/// Whether a sphere at `center` touches a standing player body at `feet`.
pub fn hits_body(center: Vec3, radius: f32, feet: Vec3) -> bool {
    let half_w = BODY_WIDTH / 2.0 + radius;
    if (center.x - feet.x).abs() > half_w || (center.z - feet.z).abs() > half_w {
        return false;
    }
    center.y >= feet.y - radius && center.y <= feet.y + BODY_HEIGHT + radius
}
