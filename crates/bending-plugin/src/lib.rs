//! The bending plugin: wires the game core, persistence, and `/bending`
//! commands onto the host's plugin API.
//!
//! The host calls every [`Plugin`](bending_plugin_api::Plugin) method from
//! its tick thread. The plugin owns the [`Game`](bending_game::Game) there
//! and only talks to storage through a [`PersistenceHandle`](bending_storage::PersistenceHandle).

pub mod config;
pub mod plugin;

pub use config::BendingConfig;
pub use plugin::{BendingPlugin, PLUGIN_NAME, TICK_TASK};
