//! The persistence worker.
//!
//! The tick thread never awaits the store. It sends commands through a
//! [`PersistenceHandle`] and drains [`PersistenceEvent`]s with `try_recv` at
//! the start of each tick. Saves are held per player and written once per
//! save window, so a burst of edits costs a single write.

use std::collections::HashMap;
use std::time::Duration;

use bending_game::{PlayerId, PlayerProfile, SessionToken};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::store::ProfileStore;

const COMMAND_CAPACITY: usize = 1024;

/// Delivered back to the tick thread.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistenceEvent {
    ProfileLoaded {
        player: PlayerId,
        /// Session the load was requested for; stale results are discarded.
        session: SessionToken,
        profile: PlayerProfile,
        /// The store failed and `profile` is an empty stand-in.
        fallback: bool,
    },
}

enum Command {
    Load {
        player: PlayerId,
        name: String,
        session: SessionToken,
        attempt: u32,
    },
    LoadNow {
        player: PlayerId,
        response: oneshot::Sender<Result<Option<PlayerProfile>, StorageError>>,
    },
    Save(Box<PlayerProfile>),
    Flush(Option<oneshot::Sender<()>>),
    Shutdown(oneshot::Sender<()>),
}

/// Cheap to clone; every clone talks to the same worker.
#[derive(Clone)]
pub struct PersistenceHandle {
    sender: mpsc::Sender<Command>,
}

impl PersistenceHandle {
    /// Queue a load; the result arrives as [`PersistenceEvent::ProfileLoaded`].
    pub fn request_load(&self, player: PlayerId, name: &str, session: SessionToken) {
        self.send(Command::Load {
            player,
            name: name.to_string(),
            session,
            attempt: 1,
        });
    }

    /// Load and wait for the result. Sees saves that are queued but not yet written.
    pub async fn load_profile(&self, player: PlayerId) -> Result<Option<PlayerProfile>, StorageError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Command::LoadNow {
                player,
                response: tx,
            })
            .await
            .map_err(|_| StorageError::Closed)?;
        rx.await.map_err(|_| StorageError::Closed)?
    }

    /// Fire and forget. Coalesced with other saves for the same player.
    pub fn save_profile(&self, profile: PlayerProfile) {
        self.send(Command::Save(Box::new(profile)));
    }

    /// Write queued saves now instead of at the end of the window.
    pub fn flush(&self) {
        self.send(Command::Flush(None));
    }

    /// Flush and wait until the writes were attempted.
    pub async fn flush_and_wait(&self) -> Result<(), StorageError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Command::Flush(Some(tx)))
            .await
            .map_err(|_| StorageError::Closed)?;
        rx.await.map_err(|_| StorageError::Closed)
    }

    /// Flush pending saves and stop the worker.
    pub async fn shutdown(&self) -> Result<(), StorageError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Command::Shutdown(tx))
            .await
            .map_err(|_| StorageError::Closed)?;
        rx.await.map_err(|_| StorageError::Closed)
    }

    fn send(&self, command: Command) {
        match self.sender.try_send(command) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Persistence queue full, dropping request");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Persistence worker is gone, dropping request");
            }
        }
    }
}

/// Start the worker on the current tokio runtime.
pub fn spawn<S: ProfileStore>(
    store: S,
    config: &StorageConfig,
) -> (PersistenceHandle, mpsc::UnboundedReceiver<PersistenceEvent>) {
    let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let worker = Worker {
        store,
        retries: tx.downgrade(),
        events: events_tx,
        pending: HashMap::new(),
        save_window: config.save_window(),
        retry_delay: config.retry_delay(),
        max_load_attempts: config.max_load_attempts.max(1),
    };
    tokio::spawn(worker.run(rx));
    info!("Persistence worker started");
    (PersistenceHandle { sender: tx }, events_rx)
}

struct Worker<S> {
    store: S,
    /// Weak, so the worker alone does not keep its own queue open.
    retries: mpsc::WeakSender<Command>,
    events: mpsc::UnboundedSender<PersistenceEvent>,
    /// Latest unsaved profile per player.
    pending: HashMap<PlayerId, PlayerProfile>,
    save_window: Duration,
    retry_delay: Duration,
    max_load_attempts: u32,
}

impl<S: ProfileStore> Worker<S> {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        let start = tokio::time::Instant::now() + self.save_window;
        let mut window = tokio::time::interval_at(start, self.save_window);
        window.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = rx.recv() => {
                    let Some(command) = command else {
                        self.flush().await;
                        break;
                    };
                    match command {
                        Command::Load { player, name, session, attempt } => {
                            self.load(player, name, session, attempt).await;
                        }
                        Command::LoadNow { player, response } => {
                            let result = match self.pending.get(&player) {
                                Some(profile) => Ok(Some(profile.clone())),
                                None => self.store.load(player).await,
                            };
                            let _ = response.send(result);
                        }
                        Command::Save(profile) => {
                            self.pending.insert(profile.player_id, *profile);
                        }
                        Command::Flush(ack) => {
                            self.flush().await;
                            if let Some(ack) = ack {
                                let _ = ack.send(());
                            }
                        }
                        Command::Shutdown(ack) => {
                            self.flush().await;
                            let _ = ack.send(());
                            break;
                        }
                    }
                }
                _ = window.tick() => {
                    self.flush().await;
                }
            }
        }

        if !self.pending.is_empty() {
            error!("{} profiles were never saved", self.pending.len());
        }
        info!("Persistence worker stopped");
    }

    async fn load(&mut self, player: PlayerId, name: String, session: SessionToken, attempt: u32) {
        // A queued save is newer than anything in the store.
        let result = match self.pending.get(&player) {
            Some(profile) => Ok(Some(profile.clone())),
            None => self.store.load(player).await,
        };
        match result {
            Ok(profile) => {
                let profile = profile.unwrap_or_else(|| PlayerProfile::new(player, &name));
                debug!("Loaded profile for {name} (attempt {attempt})");
                self.emit(player, session, profile, false);
            }
            Err(err) => {
                warn!("Loading profile for {name} failed (attempt {attempt}): {err}");
                if attempt == 1 {
                    self.emit(player, session, PlayerProfile::new(player, &name), true);
                }
                if !err.is_transient() || attempt >= self.max_load_attempts {
                    warn!("Giving up on loading {name}; keeping the fallback profile");
                    return;
                }
                self.schedule_retry(Command::Load {
                    player,
                    name,
                    session,
                    attempt: attempt + 1,
                });
            }
        }
    }

    fn schedule_retry(&self, command: Command) {
        let retries = self.retries.clone();
        let delay = self.retry_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(sender) = retries.upgrade() {
                let _ = sender.send(command).await;
            }
        });
    }

    fn emit(&self, player: PlayerId, session: SessionToken, profile: PlayerProfile, fallback: bool) {
        let event = PersistenceEvent::ProfileLoaded {
            player,
            session,
            profile,
            fallback,
        };
        if self.events.send(event).is_err() {
            debug!("Event receiver dropped; discarding load result");
        }
    }

    /// Write every pending profile. Failed writes stay queued unless a newer
    /// save replaced them meanwhile.
    async fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.pending);
        let mut failed = 0;
        for (player, profile) in batch {
            if let Err(err) = self.store.save(&profile).await {
                warn!("Saving profile for {} failed: {err}", profile.name);
                failed += 1;
                self.pending.entry(player).or_insert(profile);
            }
        }
        if failed > 0 {
            warn!("{failed} profile saves will be retried");
        }
    }
}
