//! A headless host: simulated players, the plugin manager, and the
//! application of plugin side effects.

use std::collections::{BTreeMap, HashSet, VecDeque};

use bending_plugin_api::{DamageCause, EventResult, GameMode, HostEvent, OnlinePlayer, Vector};
use tracing::info;
use uuid::Uuid;

use crate::console::{ConsoleCommand, HELP};
use crate::plugin_manager::{HostAction, PluginManager, WorldView};

const MAX_HEALTH: f32 = 20.0;
const SPAWN: Vector = (0.0, 64.0, 0.0);

pub struct Host {
    manager: PluginManager,
    players: BTreeMap<String, OnlinePlayer>,
    sneaking: HashSet<String>,
    tick: u64,
    default_world: String,
}

/// Offline-mode identity: the same name always maps to the same id.
pub fn offline_uuid(name: &str) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("OfflinePlayer:{name}").as_bytes(),
    )
}

impl Host {
    pub fn new(manager: PluginManager, default_world: &str) -> Self {
        Self {
            manager,
            players: BTreeMap::new(),
            sneaking: HashSet::new(),
            tick: 0,
            default_world: default_world.to_string(),
        }
    }

    #[cfg(test)]
    pub fn player(&self, name: &str) -> Option<&OnlinePlayer> {
        self.players.get(name)
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    fn view(&self) -> WorldView {
        WorldView {
            players: self.players.values().cloned().collect(),
            tick: self.tick,
        }
    }

    pub fn start(&mut self) {
        let view = self.view();
        let actions = self.manager.enable_all(&view);
        self.apply(actions);
        self.dispatch(HostEvent::Started);
    }

    pub fn stop(&mut self) {
        self.dispatch(HostEvent::Stopping);
        self.manager.disable_all();
    }

    pub fn tick(&mut self) {
        self.tick += 1;
        let view = self.view();
        let actions = self.manager.tick(&view);
        self.apply(actions);
    }

    fn dispatch(&mut self, event: HostEvent) -> EventResult {
        let view = self.view();
        let (result, actions) = self.manager.dispatch(&event, &view);
        self.apply(actions);
        result
    }

    /// Apply plugin side effects. A push moves the player and is reported
    /// back to plugins as a move.
    fn apply(&mut self, actions: Vec<HostAction>) {
        let mut queue: VecDeque<HostAction> = actions.into();
        while let Some(action) = queue.pop_front() {
            match action {
                HostAction::Message { player, text } => {
                    for line in text.lines() {
                        info!("[-> {player}] {line}");
                    }
                }
                HostAction::Damage {
                    player,
                    amount,
                    attacker,
                } => {
                    let cause = match &attacker {
                        Some(attacker) => {
                            info!("{attacker} hit {player}");
                            DamageCause::Attack
                        }
                        None => DamageCause::Plugin,
                    };
                    self.damage(&player, amount, cause);
                }
                HostAction::Push { player, velocity } => {
                    let Some(online) = self.players.get_mut(&player) else {
                        continue;
                    };
                    let from = online.position;
                    let to = (from.0 + velocity.0, from.1 + velocity.1, from.2 + velocity.2);
                    online.position = to;
                    let event = HostEvent::Move {
                        player: online.clone(),
                        from,
                        to,
                    };
                    let view = self.view();
                    let (_, more) = self.manager.dispatch(&event, &view);
                    queue.extend(more);
                }
            }
        }
    }

    fn damage(&mut self, name: &str, amount: f32, cause: DamageCause) {
        let Some(player) = self.players.get(name).cloned() else {
            return;
        };
        if !player.gamemode.takes_damage() {
            return;
        }
        let event = HostEvent::Damage {
            player,
            amount,
            cause,
        };
        if self.dispatch(event) == EventResult::Cancelled {
            info!("{name}'s {cause:?} damage was cancelled");
            return;
        }
        let Some(player) = self.players.get_mut(name) else {
            return;
        };
        player.health -= amount;
        if player.health <= 0.0 {
            info!("{name} was knocked out");
            player.health = MAX_HEALTH;
            player.position = SPAWN;
        } else {
            info!("{name} took {amount} damage ({:.1} hp left)", player.health);
        }
    }

    /// Run one console line. Returns true when the server should stop.
    pub fn handle_console(&mut self, line: &str) -> bool {
        let command = match ConsoleCommand::parse(line) {
            Ok(command) => command,
            Err(e) => {
                info!("{e}");
                return false;
            }
        };
        match command {
            ConsoleCommand::Help => {
                for line in HELP {
                    info!("  {line}");
                }
                for (name, description) in self.manager.commands() {
                    info!("  cmd <name> {name} ...  {description}");
                }
            }
            ConsoleCommand::List => {
                let names: Vec<&str> = self.players.keys().map(String::as_str).collect();
                info!("{} online: {}", names.len(), names.join(", "));
            }
            ConsoleCommand::Stop => return true,
            ConsoleCommand::Join { name } => self.join(&name),
            ConsoleCommand::Quit { name } => {
                if let Some(player) = self.players.remove(&name) {
                    self.sneaking.remove(&name);
                    self.dispatch(HostEvent::Quit { player });
                    info!("{name} left");
                }
            }
            ConsoleCommand::Move { name, position } => {
                self.with_player(&name, |player| {
                    let from = player.position;
                    player.position = position;
                    let event = HostEvent::Move {
                        player: player.clone(),
                        from,
                        to: position,
                    };
                    (event, Some(from))
                });
            }
            ConsoleCommand::Look { name, direction } => {
                self.with_player(&name, |player| {
                    player.direction = normalize(direction);
                    (stand_still(player), None)
                });
            }
            ConsoleCommand::Slot { name, slot } => {
                self.with_player(&name, |player| {
                    player.selected_slot = slot;
                    let event = HostEvent::SwapSlot {
                        player: player.clone(),
                        slot,
                    };
                    (event, None)
                });
            }
            ConsoleCommand::Swing { name } => {
                self.with_player(&name, |player| {
                    (HostEvent::Swing { player: player.clone() }, None)
                });
            }
            ConsoleCommand::Use { name } => {
                self.with_player(&name, |player| {
                    (HostEvent::Interact { player: player.clone() }, None)
                });
            }
            ConsoleCommand::Sneak { name } => {
                let sneaking = !self.sneaking.contains(&name);
                if self.players.contains_key(&name) {
                    if sneaking {
                        self.sneaking.insert(name.clone());
                    } else {
                        self.sneaking.remove(&name);
                    }
                }
                self.with_player(&name, |player| {
                    let event = HostEvent::ToggleSneak {
                        player: player.clone(),
                        sneaking,
                    };
                    (event, None)
                });
            }
            ConsoleCommand::Fall { name, damage } => self.damage(&name, damage, DamageCause::Fall),
            ConsoleCommand::World { name, world } => {
                self.with_player(&name, |player| {
                    let from = std::mem::replace(&mut player.world, world);
                    let event = HostEvent::ChangeWorld {
                        player: player.clone(),
                        from,
                    };
                    (event, None)
                });
            }
            ConsoleCommand::Mode { name, mode } => {
                self.with_player(&name, |player| {
                    player.gamemode = mode;
                    (stand_still(player), None)
                });
                info!("{name} is now in {mode:?} mode");
            }
            ConsoleCommand::Command {
                name,
                command,
                args,
            } => self.run_player_command(&name, &command, &args),
        }
        false
    }

    fn join(&mut self, name: &str) {
        if self.players.contains_key(name) {
            info!("{name} is already online");
            return;
        }
        let player = OnlinePlayer {
            name: name.to_string(),
            uuid: offline_uuid(name),
            position: SPAWN,
            direction: (0.0, 0.0, 1.0),
            world: self.default_world.clone(),
            gamemode: GameMode::Survival,
            health: MAX_HEALTH,
            selected_slot: 0,
        };
        self.players.insert(name.to_string(), player.clone());
        info!("{name} joined ({})", player.uuid);
        self.dispatch(HostEvent::Join { player });
    }

    /// Edit an online player, then dispatch the event the closure builds.
    /// A cancelled event puts the player back at the returned position.
    fn with_player(
        &mut self,
        name: &str,
        edit: impl FnOnce(&mut OnlinePlayer) -> (HostEvent, Option<Vector>),
    ) {
        let Some(player) = self.players.get_mut(name) else {
            info!("{name} is not online");
            return;
        };
        let (event, revert_to) = edit(player);
        if self.dispatch(event) == EventResult::Cancelled {
            if let (Some(from), Some(player)) = (revert_to, self.players.get_mut(name)) {
                player.position = from;
            }
        }
    }

    fn run_player_command(&mut self, name: &str, command: &str, args: &[String]) {
        let Some(player) = self.players.get(name).cloned() else {
            info!("{name} is not online");
            return;
        };
        let event = HostEvent::Command {
            player,
            command: command.to_string(),
            args: args.to_vec(),
        };
        if self.dispatch(event) == EventResult::Cancelled {
            return;
        }
        let view = self.view();
        let Some((reply, actions)) = self.manager.run_command(command, args, name, &view) else {
            info!("[-> {name}] Unknown command: /{command}");
            return;
        };
        for line in reply.iter().flat_map(|r| r.lines()) {
            info!("[-> {name}] {line}");
        }
        self.apply(actions);
    }
}

/// A move event that only reports the player's new look or mode.
fn stand_still(player: &OnlinePlayer) -> HostEvent {
    HostEvent::Move {
        player: player.clone(),
        from: player.position,
        to: player.position,
    }
}

fn normalize((x, y, z): Vector) -> Vector {
    let len = (x * x + y * y + z * z).sqrt();
    if len > f32::EPSILON && len.is_finite() {
        (x / len, y / len, z / len)
    } else {
        (0.0, 0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bending_plugin::BendingPlugin;
    use bending_storage::{spawn, MemoryStore, PersistenceHandle, StorageConfig};

    fn host(store: &MemoryStore) -> (Host, PersistenceHandle) {
        let (handle, loaded) = spawn(store.clone(), &StorageConfig::default());
        let mut manager = PluginManager::new();
        manager.register(Box::new(BendingPlugin::new(handle.clone(), loaded)));
        let mut host = Host::new(manager, "world");
        host.start();
        (host, handle)
    }

    /// Let the worker answer pending loads, then install them.
    async fn settle(host: &mut Host, handle: &PersistenceHandle) {
        handle.flush_and_wait().await.unwrap();
        host.tick();
    }

    #[test]
    fn offline_uuid_is_stable() {
        assert_eq!(offline_uuid("Aang"), offline_uuid("Aang"));
        assert_ne!(offline_uuid("Aang"), offline_uuid("Katara"));
    }

    #[test]
    fn normalize_handles_zero() {
        assert_eq!(normalize((0.0, 0.0, 0.0)), (0.0, 0.0, 1.0));
        assert_eq!(normalize((0.0, 3.0, 0.0)), (0.0, 1.0, 0.0));
    }

    #[tokio::test]
    async fn bending_duel_over_the_console() {
        let store = MemoryStore::new();
        let (mut host, handle) = host(&store);
        for line in ["join Zuko", "join Aang", "move Aang 0 64 3"] {
            assert!(!host.handle_console(line));
        }
        settle(&mut host, &handle).await;

        host.handle_console("cmd Zuko bending choose fire");
        host.handle_console("cmd Zuko bending bind fire-blast 1");
        host.handle_console("swing Zuko");
        for _ in 0..10 {
            host.tick();
        }
        assert_eq!(host.player("Aang").unwrap().health, 18.0);
        assert_eq!(host.player("Zuko").unwrap().health, 20.0);
    }

    #[tokio::test]
    async fn airbender_ignores_fall_damage() {
        let store = MemoryStore::new();
        let (mut host, handle) = host(&store);
        host.handle_console("join Aang");
        host.handle_console("join Sokka");
        settle(&mut host, &handle).await;
        host.handle_console("cmd Aang b choose air");

        host.handle_console("fall Aang 6");
        host.handle_console("fall Sokka 6");
        assert_eq!(host.player("Aang").unwrap().health, 20.0);
        assert_eq!(host.player("Sokka").unwrap().health, 14.0);
    }

    #[tokio::test]
    async fn creative_players_take_no_damage() {
        let store = MemoryStore::new();
        let (mut host, _handle) = host(&store);
        host.handle_console("join Sokka");
        host.handle_console("mode Sokka creative");
        host.handle_console("fall Sokka 30");
        assert_eq!(host.player("Sokka").unwrap().health, 20.0);
    }

    #[tokio::test]
    async fn jet_moves_player() {
        let store = MemoryStore::new();
        let (mut host, handle) = host(&store);
        host.handle_console("join Zuko");
        settle(&mut host, &handle).await;
        host.handle_console("cmd Zuko bending choose fire");
        host.handle_console("cmd Zuko bending bind fire-jet 1");
        host.handle_console("use Zuko");
        host.tick();
        host.tick();
        assert!(host.player("Zuko").unwrap().position.2 > 0.0);
    }

    #[tokio::test]
    async fn quit_persists_binds() {
        let store = MemoryStore::new();
        let (mut host, handle) = host(&store);
        host.handle_console("join Katara");
        settle(&mut host, &handle).await;
        host.handle_console("cmd Katara bending choose water");
        host.handle_console("cmd Katara bending bind water-blast 2");
        host.handle_console("quit Katara");
        handle.flush_and_wait().await.unwrap();

        let saved = store.get(&offline_uuid("Katara")).unwrap();
        assert_eq!(saved.bound(1), Some("water-blast"));
        assert!(host.player("Katara").is_none());
    }

    #[tokio::test]
    async fn console_stop_and_unknown_input() {
        let store = MemoryStore::new();
        let (mut host, _handle) = host(&store);
        assert!(!host.handle_console("swing Nobody"));
        assert!(!host.handle_console("not a command"));
        assert!(!host.handle_console("help"));
        assert!(host.handle_console("stop"));
        host.stop();
    }
}
