//! Elements, ability categories, and the ways an ability gets triggered.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Element {
    Air,
    Water,
    Earth,
    Fire,
}

impl Element {
    pub const ALL: [Element; 4] = [Element::Air, Element::Water, Element::Earth, Element::Fire];

    pub fn name(self) -> &'static str {
        match self {
            Element::Air => "air",
            Element::Water => "water",
            Element::Earth => "earth",
            Element::Fire => "fire",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|e| e.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Attack,
    Defense,
    Utility,
    Movement,
}

/// How a descriptor gets cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Attack,
    Interact,
    Sneak,
    SneakRelease,
    /// Always-on; never cast.
    Passive,
    /// Only reachable by completing a combo.
    Sequence,
}

/// A raw input reported by the host for the user's selected slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Attack,
    Interact,
    Sneak,
    SneakRelease,
}

impl Action {
    /// The activation a slot-bound ability must declare to fire on this action.
    pub fn activation(self) -> Activation {
        match self {
            Action::Attack => Activation::Attack,
            Action::Interact => Activation::Interact,
            Action::Sneak => Activation::Sneak,
            Action::SneakRelease => Activation::SneakRelease,
        }
    }
}
