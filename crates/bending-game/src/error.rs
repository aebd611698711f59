//! Error types for registry loading, activation, and profile edits.

use std::time::Duration;

use thiserror::Error;

use crate::element::Element;
use crate::PlayerId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("ability `{0}` is already registered")]
    DuplicateIdentifier(String),

    #[error("unknown ability `{0}`")]
    UnknownAbility(String),
}

/// Why an activation was rejected. A rejected activation never mutates state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActivationError {
    #[error("unknown ability `{0}`")]
    UnknownAbility(String),

    #[error("player {0} has no active session")]
    UnknownPlayer(PlayerId),

    #[error("`{ability}` is on cooldown for another {}ms", remaining.as_millis())]
    OnCooldown { ability: String, remaining: Duration },

    #[error("not enough chi: need {required}, have {available}")]
    InsufficientResource { required: f32, available: f32 },

    #[error("too many active abilities (limit: {limit})")]
    InstanceLimitExceeded { limit: usize },

    #[error("you are not a {0}bender")]
    MissingElement(Element),

    #[error("bending is disabled in world `{0}`")]
    DisabledWorld(String),

    #[error("spectators cannot bend")]
    Spectator,

    #[error("`{0}` cannot be activated directly")]
    NotActivatable(String),
}

impl From<RegistryError> for ActivationError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownAbility(id) | RegistryError::DuplicateIdentifier(id) => {
                ActivationError::UnknownAbility(id)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("slot {0} is out of range")]
    InvalidSlot(usize),

    #[error("preset `{0}` already exists")]
    DuplicatePreset(String),

    #[error("no preset named `{0}`")]
    UnknownPreset(String),

    #[error("invalid preset name `{0}`")]
    InvalidPresetName(String),

    #[error("cannot save an empty preset")]
    EmptyPreset,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    #[error("unknown ability `{0}`")]
    UnknownAbility(String),

    #[error("player {0} has no active session")]
    UnknownPlayer(PlayerId),

    #[error("you are not a {0}bender")]
    MissingElement(Element),

    #[error("`{0}` cannot be bound to a slot")]
    NotBindable(String),

    #[error(transparent)]
    Profile(#[from] ProfileError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("ability `{ability}`: {reason}")]
    InvalidAbility { ability: String, reason: String },

    #[error("combo `{combo}` references unknown ability `{ability}`")]
    UnknownComboAbility { combo: String, ability: String },

    #[error("collision cell size must be positive, got {0}")]
    InvalidCellSize(f32),

    #[error("{0} must be positive")]
    NonPositive(&'static str),
}
