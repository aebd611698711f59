//! Loads plugins and runs their callbacks against a read-only view of the
//! world. Writes come back as [`HostAction`]s for the host to apply.

use std::collections::{BTreeMap, HashMap};

use bending_plugin_api::{
    EventResult, HostEvent, OnlinePlayer, Plugin, Schedule, ServerApi, TaskId, Vector,
};
use tracing::{debug, info, warn};

/// World state captured before a callback runs.
pub struct WorldView {
    pub players: Vec<OnlinePlayer>,
    pub tick: u64,
}

/// A side effect a plugin asked for, applied by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostAction {
    Message {
        player: String,
        text: String,
    },
    Damage {
        player: String,
        amount: f32,
        attacker: Option<String>,
    },
    Push {
        player: String,
        velocity: Vector,
    },
}

/// Requests the manager handles itself.
enum Request {
    Host(HostAction),
    Schedule {
        plugin: String,
        task: TaskId,
        schedule: Schedule,
    },
    Cancel {
        plugin: String,
        task: TaskId,
    },
    Command {
        name: String,
        description: String,
        plugin: String,
    },
}

/// [`ServerApi`] for the duration of one callback.
struct CallbackApi<'a> {
    view: &'a WorldView,
    requests: Vec<Request>,
}

impl<'a> CallbackApi<'a> {
    fn new(view: &'a WorldView) -> Self {
        Self {
            view,
            requests: Vec::new(),
        }
    }
}

impl ServerApi for CallbackApi<'_> {
    fn players(&self) -> Vec<OnlinePlayer> {
        self.view.players.clone()
    }

    fn player(&self, name: &str) -> Option<OnlinePlayer> {
        self.view.players.iter().find(|p| p.name == name).cloned()
    }

    fn tick(&self) -> u64 {
        self.view.tick
    }

    fn message(&mut self, player: &str, text: &str) {
        self.requests.push(Request::Host(HostAction::Message {
            player: player.into(),
            text: text.into(),
        }));
    }

    fn damage(&mut self, player: &str, amount: f32, attacker: Option<&str>) {
        self.requests.push(Request::Host(HostAction::Damage {
            player: player.into(),
            amount,
            attacker: attacker.map(str::to_string),
        }));
    }

    fn push(&mut self, player: &str, velocity: Vector) {
        self.requests.push(Request::Host(HostAction::Push {
            player: player.into(),
            velocity,
        }));
    }

    fn schedule(&mut self, plugin: &str, task: TaskId, schedule: Schedule) {
        self.requests.push(Request::Schedule {
            plugin: plugin.into(),
            task,
            schedule,
        });
    }

    fn cancel(&mut self, plugin: &str, task: TaskId) {
        self.requests.push(Request::Cancel {
            plugin: plugin.into(),
            task,
        });
    }

    fn register_command(&mut self, name: &str, description: &str, plugin: &str) {
        self.requests.push(Request::Command {
            name: name.to_ascii_lowercase(),
            description: description.into(),
            plugin: plugin.into(),
        });
    }
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

struct Timer {
    plugin: String,
    task: TaskId,
    /// Ticks until the next firing; 0 fires on the next advance.
    remaining: u64,
    /// `None` for one-shot timers.
    interval: Option<u64>,
}

/// Plugin timers, counted in host ticks.
#[derive(Default)]
pub struct Scheduler {
    timers: Vec<Timer>,
}

impl Scheduler {
    /// Replaces any timer with the same plugin and task id.
    pub fn schedule(&mut self, plugin: &str, task: TaskId, schedule: Schedule) {
        self.cancel(plugin, task);
        let (delay, interval) = match schedule {
            Schedule::Once { delay } => (delay, None),
            Schedule::Every { delay, interval } => (delay, Some(interval.max(1))),
        };
        self.timers.push(Timer {
            plugin: plugin.to_string(),
            task,
            remaining: delay.saturating_sub(1),
            interval,
        });
    }

    pub fn cancel(&mut self, plugin: &str, task: TaskId) {
        self.timers
            .retain(|t| !(t.plugin == plugin && t.task == task));
    }

    /// Advance one tick. Returns the timers that fire, in scheduling order.
    pub fn advance(&mut self) -> Vec<(String, TaskId)> {
        let mut fired = Vec::new();
        self.timers.retain_mut(|timer| {
            if timer.remaining > 0 {
                timer.remaining -= 1;
                return true;
            }
            fired.push((timer.plugin.clone(), timer.task));
            match timer.interval {
                Some(interval) => {
                    timer.remaining = interval - 1;
                    true
                }
                None => false,
            }
        });
        fired
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }
}

// ─── Manager ─────────────────────────────────────────────────────────────────

struct Loaded {
    name: String,
    plugin: Box<dyn Plugin>,
}

pub struct PluginManager {
    plugins: Vec<Loaded>,
    scheduler: Scheduler,
    /// Command name to (owning plugin, description).
    commands: BTreeMap<String, (String, String)>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            scheduler: Scheduler::default(),
            commands: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        let info = plugin.info();
        info!("Loaded plugin {} v{}: {}", info.name, info.version, info.description);
        self.plugins.push(Loaded {
            name: info.name,
            plugin,
        });
    }

    /// Hand each plugin the host's entry under its name, or its own default.
    pub fn load_configs(&mut self, configs: &HashMap<String, serde_json::Value>) {
        for loaded in &mut self.plugins {
            let config = match configs.get(&loaded.name) {
                Some(config) => Some(config.clone()),
                None => {
                    debug!("No config for {}, using its defaults", loaded.name);
                    loaded.plugin.default_config()
                }
            };
            if let Some(config) = config {
                loaded.plugin.load_config(config);
            }
        }
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Registered commands with their descriptions, sorted by name.
    pub fn commands(&self) -> impl Iterator<Item = (&str, &str)> {
        self.commands
            .iter()
            .map(|(name, (_, description))| (name.as_str(), description.as_str()))
    }

    pub fn enable_all(&mut self, view: &WorldView) -> Vec<HostAction> {
        let mut requests = Vec::new();
        for loaded in &mut self.plugins {
            let mut api = CallbackApi::new(view);
            loaded.plugin.on_enable(&mut api);
            requests.extend(api.requests);
        }
        self.settle(requests)
    }

    pub fn disable_all(&mut self) {
        for loaded in &mut self.plugins {
            loaded.plugin.on_disable();
        }
        self.scheduler.clear();
        self.commands.clear();
    }

    /// Deliver an event to every plugin. The first cancellation of a
    /// cancellable event stops delivery.
    pub fn dispatch(&mut self, event: &HostEvent, view: &WorldView) -> (EventResult, Vec<HostAction>) {
        let mut requests = Vec::new();
        let mut result = EventResult::Continue;
        for loaded in &mut self.plugins {
            let mut api = CallbackApi::new(view);
            let outcome = loaded.plugin.on_event(event, &mut api);
            requests.extend(api.requests);
            if outcome == EventResult::Cancelled && event.is_cancellable() {
                debug!("{} cancelled {event:?}", loaded.name);
                result = EventResult::Cancelled;
                break;
            }
        }
        (result, self.settle(requests))
    }

    /// Advance the scheduler and run every task that fires.
    pub fn tick(&mut self, view: &WorldView) -> Vec<HostAction> {
        let mut requests = Vec::new();
        for (plugin, task) in self.scheduler.advance() {
            match self.plugins.iter_mut().find(|l| l.name == plugin) {
                Some(loaded) => {
                    let mut api = CallbackApi::new(view);
                    loaded.plugin.on_task(task, &mut api);
                    requests.extend(api.requests);
                }
                None => warn!("Task {task} fired for unknown plugin {plugin}"),
            }
        }
        self.settle(requests)
    }

    /// Run a registered command. `None` when no plugin owns it.
    pub fn run_command(
        &mut self,
        name: &str,
        args: &[String],
        sender: &str,
        view: &WorldView,
    ) -> Option<(Option<String>, Vec<HostAction>)> {
        let (owner, _) = self.commands.get(name)?;
        let loaded = self.plugins.iter_mut().find(|l| &l.name == owner)?;
        let mut api = CallbackApi::new(view);
        let reply = loaded.plugin.on_command(name, args, sender, &mut api);
        let requests = api.requests;
        Some((reply, self.settle(requests)))
    }

    /// Apply scheduling and command requests; return the rest for the host.
    fn settle(&mut self, requests: Vec<Request>) -> Vec<HostAction> {
        let mut actions = Vec::new();
        for request in requests {
            match request {
                Request::Host(action) => actions.push(action),
                Request::Schedule {
                    plugin,
                    task,
                    schedule,
                } => self.scheduler.schedule(&plugin, task, schedule),
                Request::Cancel { plugin, task } => self.scheduler.cancel(&plugin, task),
                Request::Command {
                    name,
                    description,
                    plugin,
                } => {
                    if let Some((owner, _)) = self.commands.get(&name) {
                        if *owner != plugin {
                            warn!("{plugin} tried to take /{name} from {owner}");
                            continue;
                        }
                    }
                    debug!("{plugin} registered /{name}");
                    self.commands.insert(name, (plugin, description));
                }
            }
        }
        actions
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}
