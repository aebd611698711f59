//! `BendingPlugin`: host events in, gameplay effects out.

use std::time::Instant;

use bending_command::CommandRegistry;
use bending_game::{Action, Effect, Game, PlayerId, UserState};
use bending_plugin_api::{
    DamageCause, EventResult, GameMode, HostEvent, OnlinePlayer, Plugin, PluginInfo, Schedule,
    ServerApi, TaskId,
};
use bending_storage::{PersistenceEvent, PersistenceHandle};
use glam::Vec3;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::BendingConfig;

pub const PLUGIN_NAME: &str = "Bending";
/// Repeating task that drives [`Game::tick`].
pub const TICK_TASK: TaskId = 1;

pub struct BendingPlugin {
    config: BendingConfig,
    /// Built in `on_enable`; `None` while disabled or when the config is invalid.
    game: Option<Game>,
    commands: CommandRegistry,
    persistence: PersistenceHandle,
    loaded: mpsc::UnboundedReceiver<PersistenceEvent>,
    ticks: u64,
}

impl BendingPlugin {
    pub fn new(
        persistence: PersistenceHandle,
        loaded: mpsc::UnboundedReceiver<PersistenceEvent>,
    ) -> Self {
        Self::with_config(BendingConfig::default(), persistence, loaded)
    }

    pub fn with_config(
        config: BendingConfig,
        persistence: PersistenceHandle,
        loaded: mpsc::UnboundedReceiver<PersistenceEvent>,
    ) -> Self {
        Self {
            config,
            game: None,
            commands: CommandRegistry::new(),
            persistence,
            loaded,
            ticks: 0,
        }
    }

    pub fn config(&self) -> &BendingConfig {
        &self.config
    }

    pub fn game(&self) -> Option<&Game> {
        self.game.as_ref()
    }

    fn join(&mut self, player: &OnlinePlayer) {
        let Some(game) = self.game.as_mut() else {
            return;
        };
        let session = game.join(player.uuid, &player.name, user_state(player));
        game.select_slot(&player.uuid, player.selected_slot);
        self.persistence
            .request_load(player.uuid, &player.name, session);
    }

    fn quit(&mut self, player: &OnlinePlayer) {
        let Some(game) = self.game.as_mut() else {
            return;
        };
        if let Some(profile) = game.quit(&player.uuid, Instant::now()) {
            self.persistence.save_profile(profile);
        }
    }

    fn act(&mut self, player: &OnlinePlayer, action: Action) {
        let Some(game) = self.game.as_mut() else {
            return;
        };
        let now = Instant::now();
        game.update_state(&player.uuid, user_state(player));
        // Rejections are logged by the game; the player just sees nothing happen.
        if let Ok(Some(instance)) = game.on_action(&player.uuid, action, now) {
            debug!("{} cast {instance}", player.name);
        }
    }

    /// Queue a save of every online profile worth persisting.
    fn save_all(&self) {
        let Some(game) = self.game.as_ref() else {
            return;
        };
        let now = Instant::now();
        let mut queued = 0;
        for user in game.users() {
            if let Some(profile) = game.snapshot_profile(&user.id, now) {
                self.persistence.save_profile(profile);
                queued += 1;
            }
        }
        debug!("Queued {queued} profile saves");
    }

    fn drain_loaded(&mut self, api: &mut dyn ServerApi, now: Instant) {
        let Some(game) = self.game.as_mut() else {
            return;
        };
        while let Ok(event) = self.loaded.try_recv() {
            match event {
                PersistenceEvent::ProfileLoaded {
                    player,
                    session,
                    profile,
                    fallback,
                } => {
                    let applied = game.apply_profile(&player, session, profile, fallback, now);
                    if applied && fallback {
                        if let Some(user) = game.user(&player) {
                            api.message(
                                &user.name,
                                "Your bending data could not be loaded yet. Retrying in the background.",
                            );
                        }
                    }
                }
            }
        }
    }

    fn run_tick(&mut self, api: &mut dyn ServerApi) {
        let now = Instant::now();
        self.drain_loaded(api, now);
        let Some(game) = self.game.as_mut() else {
            return;
        };
        let report = game.tick(now);
        for effect in &report.effects {
            apply_effect(game, effect, api);
        }

        self.ticks += 1;
        let interval = self.config.autosave_interval_ticks;
        if interval > 0 && self.ticks % interval == 0 {
            self.save_all();
        }
    }

    fn sender_id(&self, sender: &str) -> Option<PlayerId> {
        self.game
            .as_ref()?
            .users()
            .find(|u| u.name == sender)
            .map(|u| u.id)
    }
}

fn user_state(player: &OnlinePlayer) -> UserState {
    let (x, y, z) = player.position;
    let (dx, dy, dz) = player.direction;
    UserState {
        position: Vec3::new(x, y, z),
        direction: Vec3::new(dx, dy, dz),
        world: player.world.clone(),
        spectator: player.gamemode == GameMode::Spectator,
    }
}

fn apply_effect(game: &Game, effect: &Effect, api: &mut dyn ServerApi) {
    let name = |id: &PlayerId| game.user(id).map(|u| u.name.as_str());
    match effect {
        Effect::Damage {
            source,
            target,
            ability,
            amount,
        } => {
            let Some(target_name) = name(target) else {
                return;
            };
            debug!("{ability} hit {target_name} for {amount}");
            api.damage(target_name, *amount, name(source));
        }
        Effect::Push { player, velocity } => {
            if let Some(player_name) = name(player) {
                api.push(player_name, (velocity.x, velocity.y, velocity.z));
            }
        }
    }
}

impl Plugin for BendingPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            name: PLUGIN_NAME.into(),
            version: env!("CARGO_PKG_VERSION").into(),
            description: "Elemental bending abilities".into(),
        }
    }

    fn on_enable(&mut self, api: &mut dyn ServerApi) {
        let game = match Game::new(self.config.game.clone()) {
            Ok(game) => game,
            Err(e) => {
                error!("Bending disabled, invalid configuration: {e}");
                return;
            }
        };
        info!(
            "Bending enabled with {} abilities",
            game.registry().len()
        );
        self.game = Some(game);
        api.register_command("bending", "Bending abilities and binds", PLUGIN_NAME);
        api.register_command("b", "Alias for /bending", PLUGIN_NAME);
        api.schedule(
            PLUGIN_NAME,
            TICK_TASK,
            Schedule::Every {
                delay: 1,
                interval: 1,
            },
        );

        // Players already online when the plugin is (re)loaded.
        for player in api.players() {
            self.join(&player);
        }
    }

    fn on_disable(&mut self) {
        self.save_all();
        self.persistence.flush();
        self.game = None;
        info!("Bending disabled");
    }

    fn on_event(&mut self, event: &HostEvent, _api: &mut dyn ServerApi) -> EventResult {
        match event {
            HostEvent::Join { player } => self.join(player),
            HostEvent::Quit { player } => self.quit(player),
            HostEvent::Move { player, .. } | HostEvent::ChangeWorld { player, .. } => {
                if let Some(game) = self.game.as_mut() {
                    game.update_state(&player.uuid, user_state(player));
                }
            }
            HostEvent::SwapSlot { player, slot } => {
                if let Some(game) = self.game.as_mut() {
                    game.select_slot(&player.uuid, *slot);
                }
            }
            HostEvent::Swing { player } => self.act(player, Action::Attack),
            HostEvent::Interact { player } => self.act(player, Action::Interact),
            HostEvent::ToggleSneak { player, sneaking } => {
                let action = if *sneaking {
                    Action::Sneak
                } else {
                    Action::SneakRelease
                };
                self.act(player, action);
            }
            HostEvent::Damage {
                player,
                cause: DamageCause::Fall,
                ..
            } => {
                let immune = self
                    .game
                    .as_ref()
                    .is_some_and(|g| g.owns_movement_passive(&player.uuid));
                if immune {
                    return EventResult::Cancelled;
                }
            }
            HostEvent::Stopping => {
                self.save_all();
                self.persistence.flush();
            }
            _ => {}
        }
        EventResult::Continue
    }

    fn on_task(&mut self, task: TaskId, api: &mut dyn ServerApi) {
        if task == TICK_TASK {
            self.run_tick(api);
        }
    }

    fn on_command(
        &mut self,
        command: &str,
        args: &[String],
        sender: &str,
        _api: &mut dyn ServerApi,
    ) -> Option<String> {
        if command != "bending" && command != "b" {
            return None;
        }
        let Some(sender_id) = self.sender_id(sender) else {
            return Some("Only players can use /bending.".into());
        };
        let game = self.game.as_mut()?;
        let now = Instant::now();
        let result = self.commands.execute(game, sender_id, args, now);
        if result.profile_changed {
            if let Some(profile) = game.snapshot_profile(&sender_id, now) {
                self.persistence.save_profile(profile);
            }
        }
        Some(result.messages.join("\n"))
    }

    fn default_config(&self) -> Option<serde_json::Value> {
        serde_json::to_value(BendingConfig::default()).ok()
    }

    fn load_config(&mut self, config: serde_json::Value) {
        match serde_json::from_value::<BendingConfig>(config) {
            Ok(config) => self.config = config,
            Err(e) => warn!("Invalid bending config, keeping the current one: {e}"),
        }
    }
}
