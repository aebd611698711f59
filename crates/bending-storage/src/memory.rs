//! In-process store. Also used by tests to simulate an unreachable backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bending_game::{PlayerId, PlayerProfile};

use crate::error::StorageError;
use crate::store::ProfileStore;

#[derive(Clone, Default)]
pub struct MemoryStore {
    profiles: Arc<Mutex<HashMap<PlayerId, PlayerProfile>>>,
    unavailable: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While unavailable every call fails with `StoreUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Successful saves so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Direct read, bypassing availability.
    pub fn get(&self, player: &PlayerId) -> Option<PlayerProfile> {
        self.profiles.lock().ok()?.get(player).cloned()
    }

    /// Direct write, bypassing availability and the write counter.
    pub fn insert(&self, profile: PlayerProfile) {
        if let Ok(mut profiles) = self.profiles.lock() {
            profiles.insert(profile.player_id, profile);
        }
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::StoreUnavailable("memory store offline".into()));
        }
        Ok(())
    }
}

impl ProfileStore for MemoryStore {
    async fn load(&self, player: PlayerId) -> Result<Option<PlayerProfile>, StorageError> {
        self.check()?;
        let profiles = self
            .profiles
            .lock()
            .map_err(|_| StorageError::StoreUnavailable("memory store poisoned".into()))?;
        Ok(profiles.get(&player).cloned())
    }

    async fn save(&self, profile: &PlayerProfile) -> Result<(), StorageError> {
        self.check()?;
        self.profiles
            .lock()
            .map_err(|_| StorageError::StoreUnavailable("memory store poisoned".into()))?
            .insert(profile.player_id, profile.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn offline_store_fails() {
        let store = MemoryStore::new();
        let profile = PlayerProfile::new(Uuid::new_v4(), "Iroh");
        store.save(&profile).await.unwrap();
        store.set_available(false);
        assert!(matches!(
            store.load(profile.player_id).await,
            Err(StorageError::StoreUnavailable(_))
        ));
        store.set_available(true);
        assert_eq!(store.load(profile.player_id).await.unwrap(), Some(profile));
        assert_eq!(store.writes(), 1);
    }
}
