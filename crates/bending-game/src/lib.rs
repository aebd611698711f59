//! Bending core: ability registry, instance lifecycle, cooldowns, chi pools
//! and collision resolution, all driven from a single tick thread.

pub mod ability;
pub mod collision;
pub mod config;
pub mod cooldown;
pub mod element;
pub mod error;
pub mod game;
pub mod instance;
pub mod profile;
pub mod registry;
pub mod removal;
pub mod resource;
pub mod sequence;
pub mod spatial;
pub mod user;

pub use ability::{Ability, AbilityKind, Effect, UpdateResult};
pub use collision::{CollisionEngine, CollisionEvent, CollisionOutcome, Collider};
pub use config::GameConfig;
pub use cooldown::CooldownStore;
pub use element::{Action, Activation, Category, Element};
pub use error::{ActivationError, BindError, ConfigError, ProfileError, RegistryError};
pub use game::{Game, TickReport};
pub use instance::{AbilityInstanceManager, InstanceId};
pub use profile::{CooldownSnapshot, PlayerProfile, Preset, SLOT_COUNT};
pub use registry::{AbilityDescriptor, AbilityRegistry};
pub use resource::{ResourceManager, ResourcePool};
pub use user::{SessionToken, User, UserState};

/// Stable player identity as reported by the host.
pub type PlayerId = uuid::Uuid;
