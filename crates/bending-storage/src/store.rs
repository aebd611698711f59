use std::future::Future;

use bending_game::{PlayerId, PlayerProfile};
use tracing::info;

use crate::config::{StorageConfig, StorageEngine};
use crate::error::StorageError;
use crate::memory::MemoryStore;
use crate::sqlite::SqliteStore;

/// Backing storage for player profiles.
pub trait ProfileStore: Send + Sync + 'static {
    /// `Ok(None)` when the player has never been saved.
    fn load(
        &self,
        player: PlayerId,
    ) -> impl Future<Output = Result<Option<PlayerProfile>, StorageError>> + Send;

    /// Replace everything stored for the profile's player.
    fn save(&self, profile: &PlayerProfile) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// The store selected by configuration.
pub enum AnyStore {
    Sqlite(SqliteStore),
    Memory(MemoryStore),
}

impl AnyStore {
    pub async fn open(config: &StorageConfig) -> Result<Self, StorageError> {
        match config.engine {
            StorageEngine::Sqlite => {
                let store = SqliteStore::connect(&config.url, config.max_connections).await?;
                info!("Profile store: sqlite at {}", config.url);
                Ok(AnyStore::Sqlite(store))
            }
            StorageEngine::Memory => {
                info!("Profile store: in-memory (profiles are not kept across restarts)");
                Ok(AnyStore::Memory(MemoryStore::new()))
            }
        }
    }
}

impl ProfileStore for AnyStore {
    async fn load(&self, player: PlayerId) -> Result<Option<PlayerProfile>, StorageError> {
        match self {
            AnyStore::Sqlite(store) => store.load(player).await,
            AnyStore::Memory(store) => store.load(player).await,
        }
    }

    async fn save(&self, profile: &PlayerProfile) -> Result<(), StorageError> {
        match self {
            AnyStore::Sqlite(store) => store.save(profile).await,
            AnyStore::Memory(store) => store.save(profile).await,
        }
    }
}
