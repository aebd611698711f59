mod config;
mod console;
mod host;
mod plugin_manager;

use std::collections::HashMap;
use std::time::Duration;

use bending_plugin::{BendingPlugin, PLUGIN_NAME};
use bending_storage::{AnyStore, MemoryStore};
use config::ServerConfig;
use host::Host;
use plugin_manager::PluginManager;
use tokio::io::AsyncBufReadExt;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "bending.toml".to_string());
    let config = match ServerConfig::load(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load {path}: {e}");
            std::process::exit(1);
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        "Bending dev server v{} starting ({} ms ticks)",
        env!("CARGO_PKG_VERSION"),
        config.server.tick_ms
    );

    let store = match AnyStore::open(&config.bending.storage).await {
        Ok(store) => store,
        Err(e) => {
            warn!("Profile store unavailable ({e}), falling back to memory");
            AnyStore::Memory(MemoryStore::new())
        }
    };
    let (persistence, loaded) = bending_storage::spawn(store, &config.bending.storage);

    let mut manager = PluginManager::new();
    manager.register(Box::new(BendingPlugin::new(persistence.clone(), loaded)));
    let mut plugin_configs = HashMap::new();
    match serde_json::to_value(&config.bending) {
        Ok(value) => {
            plugin_configs.insert(PLUGIN_NAME.to_string(), value);
        }
        Err(e) => error!("Could not hand the bending config to the plugin: {e}"),
    }
    manager.load_configs(&plugin_configs);

    let mut host = Host::new(manager, &config.server.default_world);
    host.start();
    info!("Ready. Type help for console commands.");

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);

    // Handle Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    // Console REPL: read lines from stdin
    let (console_tx, mut console_rx) = tokio::sync::mpsc::channel::<String>(32);
    tokio::spawn(async move {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    let mut tick_interval =
        tokio::time::interval(Duration::from_millis(config.server.tick_ms.max(1)));
    loop {
        tokio::select! {
            _ = tick_interval.tick() => host.tick(),
            Some(line) = console_rx.recv() => {
                if host.handle_console(&line) {
                    break;
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    info!("Saving profiles before shutdown...");
    host.stop();
    if let Err(e) = persistence.shutdown().await {
        error!("Persistence did not shut down cleanly: {e}");
    }
    info!("Server shut down after {} ticks.", host.current_tick());
}
