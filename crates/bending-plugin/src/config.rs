//! Plugin configuration: the gameplay sections plus storage and autosave.

use bending_game::GameConfig;
use bending_storage::StorageConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BendingConfig {
    #[serde(flatten)]
    pub game: GameConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Ticks between saves of every online profile. 0 disables autosave.
    #[serde(default = "default_autosave_interval_ticks")]
    pub autosave_interval_ticks: u64,
}

fn default_autosave_interval_ticks() -> u64 {
    // One minute at 20 TPS.
    1200
}

impl Default for BendingConfig {
    fn default() -> Self {
        Self {
            game: GameConfig::default(),
            storage: StorageConfig::default(),
            autosave_interval_ticks: default_autosave_interval_ticks(),
        }
    }
}
