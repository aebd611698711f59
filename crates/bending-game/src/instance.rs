//! The live set of ability instances.
//!
//! Instances live in a `BTreeMap` keyed by a monotonically increasing id, so
//! iteration order is insertion order with ids as the tiebreak. Instances
//! that finish during a tick are only marked; [`AbilityInstanceManager::purge`]
//! excises them once the whole pass (updates and collisions) is done.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::ability::{
    Ability, AbilityFactory, Collision, Effect, Launch, Target, UpdateContext, UpdateResult,
};
use crate::collision::{CollisionBody, CollisionEvent};
use crate::cooldown::CooldownStore;
use crate::element::Element;
use crate::error::ActivationError;
use crate::registry::AbilityDescriptor;
use crate::resource::ResourceManager;
use crate::user::User;
use crate::PlayerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct LiveInstance {
    /// Only the id; the session may end while the instance is alive.
    owner: PlayerId,
    ability: Box<dyn Ability>,
}

pub struct AbilityInstanceManager {
    live: BTreeMap<InstanceId, LiveInstance>,
    per_player: HashMap<PlayerId, usize>,
    /// Marked Complete or Remove this tick, awaiting purge.
    finished: BTreeSet<InstanceId>,
    next_id: u64,
    max_per_player: usize,
    tick: u64,
}

impl AbilityInstanceManager {
    pub fn new(max_per_player: usize) -> Self {
        Self {
            live: BTreeMap::new(),
            per_player: HashMap::new(),
            finished: BTreeSet::new(),
            next_id: 1,
            max_per_player,
            tick: 0,
        }
    }

    /// Validate and spawn one instance. Every check runs before anything is
    /// mutated, so a rejected activation leaves cooldowns, chi and the live
    /// set untouched.
    pub fn activate(
        &mut self,
        user: &User,
        descriptor: Arc<AbilityDescriptor>,
        factory: AbilityFactory,
        cooldowns: &mut CooldownStore,
        resources: &mut ResourceManager,
        now: Instant,
    ) -> Result<InstanceId, ActivationError> {
        if let Some(remaining) = cooldowns.remaining(&user.id, &descriptor.id, now) {
            return Err(ActivationError::OnCooldown {
                ability: descriptor.id.clone(),
                remaining,
            });
        }
        let available = resources.current(&user.id);
        if available < descriptor.cost {
            return Err(ActivationError::InsufficientResource {
                required: descriptor.cost,
                available,
            });
        }
        if self.count(&user.id) >= self.max_per_player {
            return Err(ActivationError::InstanceLimitExceeded {
                limit: self.max_per_player,
            });
        }
        if !resources.debit(&user.id, descriptor.cost) {
            return Err(ActivationError::InsufficientResource {
                required: descriptor.cost,
                available,
            });
        }

        cooldowns.start(user.id, &descriptor.id, descriptor.cooldown, now);
        let launch = Launch {
            owner: user.id,
            state: &user.state,
            now,
        };
        let ability = factory(descriptor, &launch);
        let id = InstanceId(self.next_id);
        self.next_id += 1;
        debug!("{} cast {} as {id}", user.name, ability.descriptor().id);
        self.live.insert(
            id,
            LiveInstance {
                owner: user.id,
                ability,
            },
        );
        *self.per_player.entry(user.id).or_default() += 1;
        Ok(id)
    }

    /// Run one update for every live instance in id order. Instances whose
    /// owner is offline or whose removal policy fires are marked without
    /// updating.
    pub fn update_all(
        &mut self,
        users: &HashMap<PlayerId, User>,
        resources: &mut ResourceManager,
        targets: &[Target],
        effects: &mut Vec<Effect>,
        now: Instant,
    ) {
        self.tick += 1;
        for (id, instance) in self.live.iter_mut() {
            if self.finished.contains(id) {
                continue;
            }
            let Some(user) = users.get(&instance.owner) else {
                self.finished.insert(*id);
                continue;
            };
            if instance
                .ability
                .policies()
                .is_some_and(|p| p.test(&user.state, now))
            {
                self.finished.insert(*id);
                continue;
            }
            let mut ctx = UpdateContext {
                owner: instance.owner,
                state: &user.state,
                now,
                tick: self.tick,
                resources: &mut *resources,
                targets,
                effects: &mut *effects,
            };
            match instance.ability.update(&mut ctx) {
                UpdateResult::Continue => {}
                UpdateResult::Complete | UpdateResult::Remove => {
                    self.finished.insert(*id);
                }
            }
        }
    }

    /// Colliders of every instance still running this tick.
    pub fn bodies(&self) -> Vec<CollisionBody> {
        self.live
            .iter()
            .filter(|(id, _)| !self.finished.contains(id))
            .flat_map(|(id, instance)| {
                let element = instance.ability.descriptor().element;
                instance
                    .ability
                    .colliders()
                    .into_iter()
                    .map(move |collider| CollisionBody {
                        instance: *id,
                        owner: instance.owner,
                        element,
                        collider,
                    })
            })
            .collect()
    }

    /// Deliver collision events to both participants and mark the losers.
    pub fn notify_collision(&mut self, events: &[CollisionEvent]) {
        for event in events {
            let elements = (self.element_of(event.first), self.element_of(event.second));
            let (Some(first_element), Some(second_element)) = elements else {
                continue;
            };
            let pairs = [
                (event.first, event.second, second_element),
                (event.second, event.first, first_element),
            ];
            for (target, other, other_element) in pairs {
                if let Some(instance) = self.live.get_mut(&target) {
                    instance.ability.on_collision(&Collision {
                        other,
                        other_element,
                        outcome: event.outcome,
                    });
                }
            }
            self.finished.extend(event.removed.iter().copied());
        }
    }

    fn element_of(&self, id: InstanceId) -> Option<Element> {
        self.live.get(&id).map(|i| i.ability.descriptor().element)
    }

    /// Mark an instance for removal at the next purge.
    pub fn remove(&mut self, id: InstanceId) -> bool {
        self.live.contains_key(&id) && self.finished.insert(id)
    }

    /// Excise every marked instance, calling `on_destroy` once per instance.
    /// Marking the same instance more than once is harmless.
    pub fn purge(&mut self) -> Vec<InstanceId> {
        let finished = std::mem::take(&mut self.finished);
        let mut removed = Vec::with_capacity(finished.len());
        for id in finished {
            if let Some(instance) = self.live.remove(&id) {
                self.destroy(id, instance);
                removed.push(id);
            }
        }
        removed
    }

    /// Remove all of a player's instances immediately.
    pub fn remove_player(&mut self, player: &PlayerId) -> Vec<InstanceId> {
        let ids: Vec<InstanceId> = self
            .live
            .iter()
            .filter(|(_, i)| i.owner == *player)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            self.finished.remove(id);
            if let Some(instance) = self.live.remove(id) {
                self.destroy(*id, instance);
            }
        }
        self.per_player.remove(player);
        ids
    }

    fn destroy(&mut self, id: InstanceId, mut instance: LiveInstance) {
        instance.ability.on_destroy();
        if let Some(count) = self.per_player.get_mut(&instance.owner) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.per_player.remove(&instance.owner);
            }
        }
        debug!("Removed {} {id}", instance.ability.descriptor().id);
    }

    pub fn count(&self, player: &PlayerId) -> usize {
        self.per_player.get(player).copied().unwrap_or(0)
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.live.contains_key(&id)
    }

    /// Ids of live instances in iteration order.
    pub fn ids(&self) -> Vec<InstanceId> {
        self.live.keys().copied().collect()
    }

    /// `(id, ability id)` pairs owned by a player.
    pub fn instances_of(&self, player: &PlayerId) -> Vec<(InstanceId, String)> {
        self.live
            .iter()
            .filter(|(_, i)| i.owner == *player)
            .map(|(id, i)| (*id, i.ability.descriptor().id.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
