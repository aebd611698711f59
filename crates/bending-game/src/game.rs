//! The per-tick orchestrator. Owns every piece of gameplay state and is only
//! ever touched from the tick thread.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::ability::{Effect, Target};
use crate::collision::{CollisionEngine, CollisionEvent};
use crate::config::GameConfig;
use crate::cooldown::CooldownStore;
use crate::element::{Action, Category, Element};
use crate::error::{ActivationError, BindError, ConfigError};
use crate::instance::{AbilityInstanceManager, InstanceId};
use crate::profile::{CooldownSnapshot, PlayerProfile, Preset};
use crate::registry::AbilityRegistry;
use crate::resource::{ResourceManager, ResourcePool};
use crate::sequence::SequenceManager;
use crate::user::{SessionToken, User, UserState};
use crate::PlayerId;

/// Everything one tick produced, for the host to apply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub effects: Vec<Effect>,
    pub collisions: Vec<CollisionEvent>,
    pub removed: Vec<InstanceId>,
}

pub struct Game {
    config: GameConfig,
    registry: Arc<AbilityRegistry>,
    users: HashMap<PlayerId, User>,
    instances: AbilityInstanceManager,
    cooldowns: CooldownStore,
    resources: ResourceManager,
    collisions: CollisionEngine,
    sequences: SequenceManager,
    next_session: u64,
    tick: u64,
}

impl Game {
    pub fn new(config: GameConfig) -> Result<Self, ConfigError> {
        if config.instances.max_per_player == 0 {
            return Err(ConfigError::NonPositive("instances.max_per_player"));
        }
        if !config.resources.max.is_finite() || config.resources.max <= 0.0 {
            return Err(ConfigError::NonPositive("resources.max"));
        }
        if config.resources.regen_interval_ms == 0 {
            return Err(ConfigError::NonPositive("resources.regen_interval_ms"));
        }
        let registry = Arc::new(AbilityRegistry::from_config(&config.abilities)?);
        let collisions = CollisionEngine::new(&config.collision)?;
        let sequences = SequenceManager::new(&config.sequences, &registry)?;
        info!(
            "Bending core ready: {} abilities, {} combos",
            registry.len(),
            sequences.combos().len()
        );
        Ok(Self {
            instances: AbilityInstanceManager::new(config.instances.max_per_player),
            resources: ResourceManager::new(Duration::from_millis(
                config.resources.regen_interval_ms,
            )),
            cooldowns: CooldownStore::new(),
            users: HashMap::new(),
            next_session: 1,
            tick: 0,
            registry,
            collisions,
            sequences,
            config,
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<AbilityRegistry> {
        &self.registry
    }

    pub fn user(&self, player: &PlayerId) -> Option<&User> {
        self.users.get(player)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn online(&self) -> usize {
        self.users.len()
    }

    pub fn instances(&self) -> &AbilityInstanceManager {
        &self.instances
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn resource(&self, player: &PlayerId) -> Option<&ResourcePool> {
        self.resources.get(player)
    }

    // ---------------------------------------------------------------------------
    // Sessions
    // ---------------------------------------------------------------------------

    /// Start a session. The user plays on an empty fallback profile until
    /// [`Game::apply_profile`] installs the stored one.
    ///
    /// A player already online keeps their profile, cooldowns and resource
    /// pool. Only the session token and host state are replaced, and their
    /// live instances end.
    pub fn join(&mut self, player: PlayerId, name: &str, state: UserState) -> SessionToken {
        let session = SessionToken(self.next_session);
        self.next_session += 1;
        if let Some(user) = self.users.get_mut(&player) {
            debug!(
                "{name} joined twice, moving session {} to {}",
                user.session.0, session.0
            );
            user.session = session;
            user.name = name.to_string();
            user.state = state;
            self.instances.remove_player(&player);
            self.sequences.clear(&player);
            return session;
        }
        self.users
            .insert(player, User::new(player, name, session, state));
        let res = &self.config.resources;
        self.resources
            .insert(player, ResourcePool::full(res.max, res.regen_for(&[])));
        info!("{name} joined (session {})", session.0);
        session
    }

    /// Install a loaded profile. Returns false when the result is discarded:
    /// the session it was requested for is gone, or the player already edited
    /// their fallback profile.
    pub fn apply_profile(
        &mut self,
        player: &PlayerId,
        session: SessionToken,
        mut profile: PlayerProfile,
        fallback: bool,
        now: Instant,
    ) -> bool {
        let Some(user) = self.users.get_mut(player) else {
            debug!("Discarding profile for offline player {player}");
            return false;
        };
        if user.session != session {
            debug!(
                "Discarding stale profile for {} (session {} != {})",
                user.name, session.0, user.session.0
            );
            return false;
        }
        if !user.is_fallback() || user.is_modified() {
            debug!("Keeping current profile for {}", user.name);
            return false;
        }

        let registry = &self.registry;
        let dropped = profile.unbind_all(|id| registry.get(id).is_none_or(|d| !d.is_bindable()));
        if dropped > 0 {
            debug!("Unbound {dropped} unknown abilities from {}", user.name);
        }
        profile.name = user.name.clone();
        let snapshot = std::mem::take(&mut profile.cooldowns);
        self.cooldowns.restore(*player, &snapshot, now);
        self.resources
            .set_regen(player, self.config.resources.regen_for(&profile.elements));
        user.install_profile(profile, fallback);
        true
    }

    /// End a session. Returns the profile to persist, or `None` when nothing
    /// worth saving exists (an untouched fallback would overwrite real data).
    pub fn quit(&mut self, player: &PlayerId, now: Instant) -> Option<PlayerProfile> {
        let user = self.users.remove(player)?;
        let profile = Self::persistable(&user, &self.cooldowns, now);
        self.instances.remove_player(player);
        self.resources.release(player);
        self.cooldowns.clear_player(player);
        self.sequences.clear(player);
        info!("{} left", user.name);
        profile
    }

    /// Profile with a fresh cooldown snapshot, for autosave.
    pub fn snapshot_profile(&self, player: &PlayerId, now: Instant) -> Option<PlayerProfile> {
        let user = self.users.get(player)?;
        Self::persistable(user, &self.cooldowns, now)
    }

    fn persistable(user: &User, cooldowns: &CooldownStore, now: Instant) -> Option<PlayerProfile> {
        if user.is_fallback() && !user.is_modified() {
            return None;
        }
        let mut profile = user.profile().clone();
        profile.cooldowns = cooldowns.snapshot(&user.id, now);
        Some(profile)
    }

    pub fn update_state(&mut self, player: &PlayerId, state: UserState) -> bool {
        match self.users.get_mut(player) {
            Some(user) => {
                user.state = state;
                true
            }
            None => false,
        }
    }

    pub fn select_slot(&mut self, player: &PlayerId, slot: usize) -> bool {
        self.users
            .get_mut(player)
            .is_some_and(|u| u.select_slot(slot))
    }

    // ---------------------------------------------------------------------------
    // Activation
    // ---------------------------------------------------------------------------

    /// Handle a raw input. Feeds the combo history, then casts either the
    /// completed combo or the selected slot's ability if its activation matches.
    pub fn on_action(
        &mut self,
        player: &PlayerId,
        action: Action,
        now: Instant,
    ) -> Result<Option<InstanceId>, ActivationError> {
        let user = self
            .users
            .get(player)
            .ok_or(ActivationError::UnknownPlayer(*player))?;
        let Some(bound) = user.selected_ability().map(str::to_string) else {
            return Ok(None);
        };
        if let Some(combo) = self.sequences.record(*player, &bound, action, now) {
            return self.activate(player, &combo, now).map(Some);
        }
        let matches = self
            .registry
            .get(&bound)
            .is_some_and(|d| d.activation == action.activation());
        if !matches {
            return Ok(None);
        }
        self.activate(player, &bound, now).map(Some)
    }

    /// Validate every condition, then spawn. A rejection mutates nothing.
    pub fn activate(
        &mut self,
        player: &PlayerId,
        ability: &str,
        now: Instant,
    ) -> Result<InstanceId, ActivationError> {
        let result = self.try_activate(player, ability, now);
        if let Err(err) = &result {
            debug!("Activation of {ability} by {player} rejected: {err}");
        }
        result
    }

    fn try_activate(
        &mut self,
        player: &PlayerId,
        ability: &str,
        now: Instant,
    ) -> Result<InstanceId, ActivationError> {
        let user = self
            .users
            .get(player)
            .ok_or(ActivationError::UnknownPlayer(*player))?;
        let descriptor = self.registry.resolve(ability)?;
        if !descriptor.is_castable() {
            return Err(ActivationError::NotActivatable(descriptor.id.clone()));
        }
        if user.state.spectator {
            return Err(ActivationError::Spectator);
        }
        if self
            .config
            .world
            .disabled_worlds
            .iter()
            .any(|w| *w == user.state.world)
        {
            return Err(ActivationError::DisabledWorld(user.state.world.clone()));
        }
        if !user.profile().has_element(descriptor.element) {
            return Err(ActivationError::MissingElement(descriptor.element));
        }
        let factory = self
            .registry
            .factory(descriptor.kind)
            .ok_or_else(|| ActivationError::NotActivatable(descriptor.id.clone()))?;
        self.instances.activate(
            user,
            descriptor,
            factory,
            &mut self.cooldowns,
            &mut self.resources,
            now,
        )
    }

    // ---------------------------------------------------------------------------
    // Tick
    // ---------------------------------------------------------------------------

    pub fn tick(&mut self, now: Instant) -> TickReport {
        self.tick += 1;
        self.cooldowns.sweep(now);
        self.resources.regenerate(now);

        let mut targets: Vec<Target> = self
            .users
            .values()
            .filter(|u| !u.state.spectator)
            .map(|u| Target {
                player: u.id,
                position: u.state.position,
            })
            .collect();
        targets.sort_by_key(|t| t.player);

        let mut effects = Vec::new();
        self.instances
            .update_all(&self.users, &mut self.resources, &targets, &mut effects, now);

        let bodies = self.instances.bodies();
        let collisions = self.collisions.resolve(&bodies);
        self.instances.notify_collision(&collisions);

        let removed = self.instances.purge();
        TickReport {
            tick: self.tick,
            effects,
            collisions,
            removed,
        }
    }

    // ---------------------------------------------------------------------------
    // Profile edits
    // ---------------------------------------------------------------------------

    fn user_mut(&mut self, player: &PlayerId) -> Result<&mut User, BindError> {
        self.users
            .get_mut(player)
            .ok_or(BindError::UnknownPlayer(*player))
    }

    /// Bind to `slot`, or the selected slot. Returns the slot used.
    pub fn bind(
        &mut self,
        player: &PlayerId,
        ability: &str,
        slot: Option<usize>,
    ) -> Result<usize, BindError> {
        let descriptor = self
            .registry
            .resolve(ability)
            .map_err(|_| BindError::UnknownAbility(ability.to_string()))?;
        let user = self.user_mut(player)?;
        if !descriptor.is_bindable() {
            return Err(BindError::NotBindable(descriptor.id.clone()));
        }
        if !user.profile().has_element(descriptor.element) {
            return Err(BindError::MissingElement(descriptor.element));
        }
        let slot = slot.unwrap_or(user.selected_slot());
        user.profile_mut().bind(slot, &descriptor.id)?;
        Ok(slot)
    }

    pub fn unbind(&mut self, player: &PlayerId, slot: usize) -> Result<Option<String>, BindError> {
        Ok(self.user_mut(player)?.profile_mut().unbind(slot)?)
    }

    pub fn clear_binds(&mut self, player: &PlayerId) -> Result<(), BindError> {
        self.user_mut(player)?.profile_mut().clear_binds();
        Ok(())
    }

    pub fn add_element(&mut self, player: &PlayerId, element: Element) -> Result<bool, BindError> {
        let added = self.user_mut(player)?.profile_mut().add_element(element);
        self.refresh_regen(player);
        Ok(added)
    }

    /// Drop an element and unbind its abilities.
    pub fn remove_element(
        &mut self,
        player: &PlayerId,
        element: Element,
    ) -> Result<bool, BindError> {
        let registry = Arc::clone(&self.registry);
        let profile = self.user_mut(player)?.profile_mut();
        let removed = profile.remove_element(element);
        if removed {
            profile.unbind_all(|id| registry.get(id).is_some_and(|d| d.element == element));
        }
        self.refresh_regen(player);
        Ok(removed)
    }

    /// Replace all elements with one, unbinding everything else.
    pub fn choose_element(&mut self, player: &PlayerId, element: Element) -> Result<(), BindError> {
        let registry = Arc::clone(&self.registry);
        let profile = self.user_mut(player)?.profile_mut();
        profile.choose_element(element);
        profile.unbind_all(|id| registry.get(id).is_none_or(|d| d.element != element));
        self.refresh_regen(player);
        Ok(())
    }

    fn refresh_regen(&mut self, player: &PlayerId) {
        if let Some(user) = self.users.get(player) {
            let regen = self.config.resources.regen_for(&user.profile().elements);
            self.resources.set_regen(player, regen);
        }
    }

    pub fn create_preset(&mut self, player: &PlayerId, name: &str) -> Result<(), BindError> {
        self.user_mut(player)?.profile_mut().create_preset(name)?;
        Ok(())
    }

    pub fn apply_preset(&mut self, player: &PlayerId, name: &str) -> Result<(), BindError> {
        self.user_mut(player)?.profile_mut().apply_preset(name)?;
        Ok(())
    }

    pub fn delete_preset(&mut self, player: &PlayerId, name: &str) -> Result<(), BindError> {
        self.user_mut(player)?.profile_mut().delete_preset(name)?;
        Ok(())
    }

    pub fn presets(&self, player: &PlayerId) -> Vec<&Preset> {
        self.users
            .get(player)
            .map(|u| u.profile().presets.values().collect())
            .unwrap_or_default()
    }

    pub fn cooldowns(&self, player: &PlayerId, now: Instant) -> Vec<CooldownSnapshot> {
        self.cooldowns.snapshot(player, now)
    }

    /// Whether the player owns an element with a movement passive (fall
    /// damage immunity).
    pub fn owns_movement_passive(&self, player: &PlayerId) -> bool {
        self.users.get(player).is_some_and(|u| {
            u.profile().elements.iter().any(|e| {
                self.registry
                    .passives(*e)
                    .iter()
                    .any(|d| d.category == Category::Movement)
            })
        })
    }
}
