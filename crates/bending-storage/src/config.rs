use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageEngine {
    Sqlite,
    /// Volatile; profiles are lost on restart.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_engine")]
    pub engine: StorageEngine,
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Saves for the same player inside this window collapse into one write.
    #[serde(default = "default_save_window_ms")]
    pub save_window_ms: u64,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Load attempts before giving up and leaving the fallback profile in place.
    #[serde(default = "default_max_load_attempts")]
    pub max_load_attempts: u32,
}

fn default_engine() -> StorageEngine {
    StorageEngine::Sqlite
}

fn default_url() -> String {
    "sqlite://bending.db".into()
}

fn default_max_connections() -> u32 {
    4
}

fn default_save_window_ms() -> u64 {
    500
}

fn default_retry_delay_ms() -> u64 {
    5000
}

fn default_max_load_attempts() -> u32 {
    5
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            url: default_url(),
            max_connections: default_max_connections(),
            save_window_ms: default_save_window_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            max_load_attempts: default_max_load_attempts(),
        }
    }
}

impl StorageConfig {
    pub fn save_window(&self) -> Duration {
        Duration::from_millis(self.save_window_ms.max(1))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
