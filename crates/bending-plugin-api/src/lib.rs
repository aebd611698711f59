//! Plugin API: the events a host dispatches, the plugin trait, and the
//! server API a plugin calls back into.
//!
//! This crate has no dependency on the bending core or on any host. A host
//! translates its own protocol events into [`HostEvent`]s and implements
//! [`ServerApi`] over its world state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `(x, y, z)` in blocks.
pub type Vector = (f32, f32, f32);

/// Identifies one scheduled task within its plugin.
pub type TaskId = u32;

// ─── Players ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Survival,
    Creative,
    Adventure,
    Spectator,
}

impl GameMode {
    /// Whether the host applies damage to players in this mode.
    pub fn takes_damage(self) -> bool {
        matches!(self, GameMode::Survival | GameMode::Adventure)
    }
}

/// What a plugin sees of an online player.
#[derive(Debug, Clone)]
pub struct OnlinePlayer {
    pub name: String,
    pub uuid: Uuid,
    /// Feet position.
    pub position: Vector,
    /// Unit look vector.
    pub direction: Vector,
    pub world: String,
    pub gamemode: GameMode,
    pub health: f32,
    /// Hotbar slot, 0..9.
    pub selected_slot: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageCause {
    /// Another player, credited as the attacker.
    Attack,
    /// Requested through [`ServerApi::damage`] without an attacker.
    Plugin,
    Fall,
    Other,
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// Events the host dispatches to every plugin, in registration order.
#[derive(Debug, Clone)]
pub enum HostEvent {
    Join {
        player: OnlinePlayer,
    },
    Quit {
        player: OnlinePlayer,
    },
    /// `player` already carries the new position and look direction.
    Move {
        player: OnlinePlayer,
        from: Vector,
        to: Vector,
    },
    ChangeWorld {
        player: OnlinePlayer,
        from: String,
    },
    SwapSlot {
        player: OnlinePlayer,
        slot: usize,
    },
    /// Left click.
    Swing {
        player: OnlinePlayer,
    },
    /// Right click.
    Interact {
        player: OnlinePlayer,
    },
    ToggleSneak {
        player: OnlinePlayer,
        sneaking: bool,
    },
    Command {
        player: OnlinePlayer,
        command: String,
        args: Vec<String>,
    },
    Damage {
        player: OnlinePlayer,
        amount: f32,
        cause: DamageCause,
    },
    Started,
    Stopping,
}

impl HostEvent {
    /// Events a plugin may veto by returning [`EventResult::Cancelled`].
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            HostEvent::Move { .. }
                | HostEvent::Swing { .. }
                | HostEvent::Interact { .. }
                | HostEvent::Command { .. }
                | HostEvent::Damage { .. }
        )
    }

    pub fn player(&self) -> Option<&OnlinePlayer> {
        match self {
            HostEvent::Join { player }
            | HostEvent::Quit { player }
            | HostEvent::Move { player, .. }
            | HostEvent::ChangeWorld { player, .. }
            | HostEvent::SwapSlot { player, .. }
            | HostEvent::Swing { player }
            | HostEvent::Interact { player }
            | HostEvent::ToggleSneak { player, .. }
            | HostEvent::Command { player, .. }
            | HostEvent::Damage { player, .. } => Some(player),
            HostEvent::Started | HostEvent::Stopping => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    Continue,
    Cancelled,
}

// ─── Plugin ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

/// Implemented by anything the host loads. Every method runs on the host's
/// tick thread.
pub trait Plugin: Send {
    fn info(&self) -> PluginInfo;

    /// Configuration to use when the host has none for this plugin.
    fn default_config(&self) -> Option<serde_json::Value> {
        None
    }

    /// Called before `on_enable`.
    fn load_config(&mut self, config: serde_json::Value) {
        let _ = config;
    }

    fn on_enable(&mut self, api: &mut dyn ServerApi);

    fn on_disable(&mut self) {}

    fn on_event(&mut self, event: &HostEvent, api: &mut dyn ServerApi) -> EventResult {
        let _ = (event, api);
        EventResult::Continue
    }

    fn on_task(&mut self, task: TaskId, api: &mut dyn ServerApi) {
        let _ = (task, api);
    }

    /// A command this plugin registered. The reply goes back to `sender`.
    fn on_command(
        &mut self,
        name: &str,
        args: &[String],
        sender: &str,
        api: &mut dyn ServerApi,
    ) -> Option<String> {
        let _ = (name, args, sender, api);
        None
    }
}

// ─── Server API ──────────────────────────────────────────────────────────────

/// When a scheduled task fires, in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Once { delay: u64 },
    Every { delay: u64, interval: u64 },
}

/// The host as seen from inside a plugin callback.
///
/// Reads reflect the world when the callback started. Everything else is
/// queued and applied by the host after the callback returns, so a plugin
/// never observes its own writes mid-callback.
pub trait ServerApi {
    fn players(&self) -> Vec<OnlinePlayer>;
    fn player(&self, name: &str) -> Option<OnlinePlayer>;
    fn tick(&self) -> u64;

    fn message(&mut self, player: &str, text: &str);
    /// `attacker` is credited for the hit when given.
    fn damage(&mut self, player: &str, amount: f32, attacker: Option<&str>);
    /// Adds to the player's velocity, in blocks per tick.
    fn push(&mut self, player: &str, velocity: Vector);

    fn schedule(&mut self, plugin: &str, task: TaskId, schedule: Schedule);
    fn cancel(&mut self, plugin: &str, task: TaskId);
    fn register_command(&mut self, name: &str, description: &str, plugin: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aang() -> OnlinePlayer {
        OnlinePlayer {
            name: "Aang".into(),
            uuid: Uuid::nil(),
            position: (0.0, 64.0, 0.0),
            direction: (0.0, 0.0, 1.0),
            world: "world".into(),
            gamemode: GameMode::Survival,
            health: 20.0,
            selected_slot: 0,
        }
    }

    /// Records every write.
    #[derive(Default)]
    struct Recorder {
        messages: Vec<(String, String)>,
        hits: Vec<(String, f32)>,
        commands: Vec<String>,
        schedules: Vec<(TaskId, Schedule)>,
    }

    impl ServerApi for Recorder {
        fn players(&self) -> Vec<OnlinePlayer> {
            vec![aang()]
        }
        fn player(&self, name: &str) -> Option<OnlinePlayer> {
            (name == "Aang").then(aang)
        }
        fn tick(&self) -> u64 {
            0
        }
        fn message(&mut self, player: &str, text: &str) {
            self.messages.push((player.into(), text.into()));
        }
        fn damage(&mut self, player: &str, amount: f32, _attacker: Option<&str>) {
            self.hits.push((player.into(), amount));
        }
        fn push(&mut self, _player: &str, _velocity: Vector) {}
        fn schedule(&mut self, _plugin: &str, task: TaskId, schedule: Schedule) {
            self.schedules.push((task, schedule));
        }
        fn cancel(&mut self, _plugin: &str, task: TaskId) {
            self.schedules.retain(|(id, _)| *id != task);
        }
        fn register_command(&mut self, name: &str, _description: &str, _plugin: &str) {
            self.commands.push(name.into());
        }
    }

    /// Hurts whoever starts sneaking and shields everyone from falls.
    struct Spikes {
        damage: f32,
        sneaks: u32,
    }

    impl Plugin for Spikes {
        fn info(&self) -> PluginInfo {
            PluginInfo {
                name: "Spikes".into(),
                version: "0.1.0".into(),
                description: "Sneaking hurts".into(),
            }
        }

        fn default_config(&self) -> Option<serde_json::Value> {
            Some(serde_json::json!({ "damage": 1.0 }))
        }

        fn load_config(&mut self, config: serde_json::Value) {
            if let Some(damage) = config["damage"].as_f64() {
                self.damage = damage as f32;
            }
        }

        fn on_enable(&mut self, api: &mut dyn ServerApi) {
            api.register_command("spikes", "Count sneaks", "Spikes");
            api.schedule("Spikes", 7, Schedule::Every { delay: 1, interval: 20 });
        }

        fn on_event(&mut self, event: &HostEvent, api: &mut dyn ServerApi) -> EventResult {
            match event {
                HostEvent::ToggleSneak {
                    player,
                    sneaking: true,
                } => {
                    self.sneaks += 1;
                    api.damage(&player.name, self.damage, None);
                }
                HostEvent::Damage {
                    cause: DamageCause::Fall,
                    ..
                } => return EventResult::Cancelled,
                _ => {}
            }
            EventResult::Continue
        }

        fn on_command(
            &mut self,
            name: &str,
            _args: &[String],
            sender: &str,
            api: &mut dyn ServerApi,
        ) -> Option<String> {
            (name == "spikes").then(|| {
                api.message(sender, "counting");
                self.sneaks.to_string()
            })
        }
    }

    fn spikes() -> Spikes {
        Spikes {
            damage: 1.0,
            sneaks: 0,
        }
    }

    #[test]
    fn enable_registers_and_schedules() {
        let mut plugin = spikes();
        let mut api = Recorder::default();
        plugin.on_enable(&mut api);
        assert_eq!(api.commands, vec!["spikes".to_string()]);
        assert_eq!(
            api.schedules,
            vec![(7, Schedule::Every { delay: 1, interval: 20 })]
        );
        api.cancel("Spikes", 7);
        assert!(api.schedules.is_empty());
    }

    #[test]
    fn sneak_press_hurts_release_does_not() {
        let mut plugin = spikes();
        let mut api = Recorder::default();
        for sneaking in [true, false, true] {
            let event = HostEvent::ToggleSneak {
                player: aang(),
                sneaking,
            };
            assert_eq!(plugin.on_event(&event, &mut api), EventResult::Continue);
        }
        assert_eq!(api.hits.len(), 2);
        assert_eq!(plugin.sneaks, 2);
    }

    #[test]
    fn fall_cancelled_attack_continues() {
        let mut plugin = spikes();
        let mut api = Recorder::default();
        let damage = |cause| HostEvent::Damage {
            player: aang(),
            amount: 4.0,
            cause,
        };
        assert_eq!(
            plugin.on_event(&damage(DamageCause::Fall), &mut api),
            EventResult::Cancelled
        );
        assert_eq!(
            plugin.on_event(&damage(DamageCause::Attack), &mut api),
            EventResult::Continue
        );
    }

    #[test]
    fn command_reply_and_message() {
        let mut plugin = spikes();
        let mut api = Recorder::default();
        assert_eq!(plugin.on_command("other", &[], "Aang", &mut api), None);
        assert_eq!(
            plugin.on_command("spikes", &[], "Aang", &mut api),
            Some("0".into())
        );
        assert_eq!(api.messages, vec![("Aang".into(), "counting".into())]);
    }

    #[test]
    fn config_override() {
        let mut plugin = spikes();
        let defaults = plugin.default_config().unwrap();
        assert_eq!(defaults["damage"], 1.0);
        plugin.load_config(serde_json::json!({ "damage": 3.5 }));
        assert_eq!(plugin.damage, 3.5);
    }

    #[test]
    fn cancellable_events() {
        assert!(HostEvent::Swing { player: aang() }.is_cancellable());
        assert!(!HostEvent::Join { player: aang() }.is_cancellable());
        assert!(!HostEvent::ToggleSneak {
            player: aang(),
            sneaking: true
        }
        .is_cancellable());
        assert!(!HostEvent::Stopping.is_cancellable());
    }

    #[test]
    fn event_player() {
        let event = HostEvent::SwapSlot {
            player: aang(),
            slot: 3,
        };
        assert_eq!(event.player().map(|p| p.name.as_str()), Some("Aang"));
        assert!(HostEvent::Started.player().is_none());
    }

    #[test]
    fn gamemode_damage_and_serde() {
        assert!(GameMode::Adventure.takes_damage());
        assert!(!GameMode::Creative.takes_damage());
        assert_eq!(serde_json::to_string(&DamageCause::Fall).unwrap(), "\"fall\"");
        let mode: GameMode = serde_json::from_str("\"spectator\"").unwrap();
        assert_eq!(mode, GameMode::Spectator);
    }
}
