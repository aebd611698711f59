//! Persistent per-player bending setup: elements, slot binds, presets and a
//! cooldown snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::error::ProfileError;
use crate::PlayerId;

/// Hotbar slots a player can bind abilities to.
pub const SLOT_COUNT: usize = 9;

/// Longest accepted preset name.
const MAX_PRESET_NAME: usize = 16;

pub type Binds = [Option<String>; SLOT_COUNT];

/// A named copy of a player's binds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub binds: Binds,
}

impl Preset {
    pub fn is_empty(&self) -> bool {
        self.binds.iter().all(Option::is_none)
    }
}

/// A cooldown that should survive a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownSnapshot {
    pub ability: String,
    pub remaining_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub player_id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub elements: Vec<Element>,
    #[serde(default)]
    pub slots: Binds,
    #[serde(default)]
    pub presets: BTreeMap<String, Preset>,
    #[serde(default)]
    pub cooldowns: Vec<CooldownSnapshot>,
}

impl PlayerProfile {
    /// Empty profile, substituted when nothing is stored.
    pub fn new(player_id: PlayerId, name: &str) -> Self {
        Self {
            player_id,
            name: name.to_string(),
            elements: Vec::new(),
            slots: Default::default(),
            presets: BTreeMap::new(),
            cooldowns: Vec::new(),
        }
    }

    pub fn has_element(&self, element: Element) -> bool {
        self.elements.contains(&element)
    }

    /// Returns false if the element was already owned.
    pub fn add_element(&mut self, element: Element) -> bool {
        if self.has_element(element) {
            return false;
        }
        self.elements.push(element);
        self.elements.sort();
        true
    }

    pub fn remove_element(&mut self, element: Element) -> bool {
        let before = self.elements.len();
        self.elements.retain(|e| *e != element);
        self.elements.len() != before
    }

    /// Replace all elements with a single one.
    pub fn choose_element(&mut self, element: Element) {
        self.elements = vec![element];
    }

    pub fn bound(&self, slot: usize) -> Option<&str> {
        self.slots.get(slot).and_then(|s| s.as_deref())
    }

    pub fn bind(&mut self, slot: usize, ability: &str) -> Result<(), ProfileError> {
        let entry = self
            .slots
            .get_mut(slot)
            .ok_or(ProfileError::InvalidSlot(slot))?;
        *entry = Some(ability.to_string());
        Ok(())
    }

    pub fn unbind(&mut self, slot: usize) -> Result<Option<String>, ProfileError> {
        let entry = self
            .slots
            .get_mut(slot)
            .ok_or(ProfileError::InvalidSlot(slot))?;
        Ok(entry.take())
    }

    /// Unbind every slot holding one of `abilities`.
    pub fn unbind_all(&mut self, mut predicate: impl FnMut(&str) -> bool) -> usize {
        let mut removed = 0;
        for slot in self.slots.iter_mut() {
            if slot.as_deref().is_some_and(&mut predicate) {
                *slot = None;
                removed += 1;
            }
        }
        removed
    }

    pub fn clear_binds(&mut self) {
        self.slots = Default::default();
    }

    /// Save the current binds under `name`.
    pub fn create_preset(&mut self, name: &str) -> Result<&Preset, ProfileError> {
        let key = validate_preset_name(name)?;
        if self.presets.contains_key(&key) {
            return Err(ProfileError::DuplicatePreset(key));
        }
        let preset = Preset {
            name: key.clone(),
            binds: self.slots.clone(),
        };
        if preset.is_empty() {
            return Err(ProfileError::EmptyPreset);
        }
        Ok(self.presets.entry(key).or_insert(preset))
    }

    /// Copy a preset's binds onto the hotbar.
    pub fn apply_preset(&mut self, name: &str) -> Result<(), ProfileError> {
        let key = name.to_ascii_lowercase();
        let preset = self
            .presets
            .get(&key)
            .ok_or_else(|| ProfileError::UnknownPreset(name.to_string()))?;
        self.slots = preset.binds.clone();
        Ok(())
    }

    pub fn delete_preset(&mut self, name: &str) -> Result<Preset, ProfileError> {
        self.presets
            .remove(&name.to_ascii_lowercase())
            .ok_or_else(|| ProfileError::UnknownPreset(name.to_string()))
    }
}

fn validate_preset_name(name: &str) -> Result<String, ProfileError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_PRESET_NAME
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(ProfileError::InvalidPresetName(name.to_string()));
    }
    Ok(name.to_ascii_lowercase())
}
