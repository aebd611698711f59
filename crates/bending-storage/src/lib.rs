//! Profile persistence, decoupled from the tick thread.
//!
//! A [`ProfileStore`] does the actual I/O; [`gateway::spawn`] runs it on a
//! background tokio task and hands the tick thread a [`PersistenceHandle`]
//! plus a channel of [`PersistenceEvent`]s to drain once per tick.

pub mod config;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use config::{StorageConfig, StorageEngine};
pub use error::StorageError;
pub use gateway::{spawn, PersistenceEvent, PersistenceHandle};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::{AnyStore, ProfileStore};
