//! Combo detection over each user's recent actions.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::SequenceSection;
use crate::element::Action;
use crate::error::ConfigError;
use crate::registry::AbilityRegistry;
use crate::PlayerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combo {
    pub ability: String,
    pub steps: Vec<(String, Action)>,
}

struct Step {
    ability: String,
    action: Action,
    at: Instant,
}

pub struct SequenceManager {
    combos: Vec<Combo>,
    window: Duration,
    /// Longest combo; history never grows past it.
    max_len: usize,
    history: HashMap<PlayerId, VecDeque<Step>>,
}

impl SequenceManager {
    /// Validate combos against the registry.
    pub fn new(section: &SequenceSection, registry: &AbilityRegistry) -> Result<Self, ConfigError> {
        let mut combos = Vec::with_capacity(section.combos.len());
        for combo in &section.combos {
            let unknown = |ability: &str| ConfigError::UnknownComboAbility {
                combo: combo.ability.clone(),
                ability: ability.to_string(),
            };
            let target = registry.get(&combo.ability).ok_or_else(|| unknown(&combo.ability))?;
            let mut steps = Vec::with_capacity(combo.steps.len());
            for (ability, action) in &combo.steps {
                let step = registry.get(ability).ok_or_else(|| unknown(ability))?;
                steps.push((step.id.clone(), *action));
            }
            if steps.is_empty() {
                return Err(ConfigError::InvalidAbility {
                    ability: combo.ability.clone(),
                    reason: "combo has no steps".into(),
                });
            }
            combos.push(Combo {
                ability: target.id.clone(),
                steps,
            });
        }
        let max_len = combos.iter().map(|c| c.steps.len()).max().unwrap_or(0);
        Ok(Self {
            combos,
            window: Duration::from_millis(section.window_ms),
            max_len,
            history: HashMap::new(),
        })
    }

    pub fn combos(&self) -> &[Combo] {
        &self.combos
    }

    /// Record an action taken with `ability` in the selected slot. Returns the
    /// combo ability to activate when the history completes one.
    pub fn record(
        &mut self,
        player: PlayerId,
        ability: &str,
        action: Action,
        now: Instant,
    ) -> Option<String> {
        if self.max_len == 0 {
            return None;
        }
        let history = self.history.entry(player).or_default();
        while history
            .front()
            .is_some_and(|s| now.saturating_duration_since(s.at) > self.window)
        {
            history.pop_front();
        }
        history.push_back(Step {
            ability: ability.to_string(),
            action,
            at: now,
        });
        while history.len() > self.max_len {
            history.pop_front();
        }

        let matched = self.combos.iter().find(|combo| {
            let n = combo.steps.len();
            history.len() >= n
                && history
                    .iter()
                    .skip(history.len() - n)
                    .zip(&combo.steps)
                    .all(|(step, (ability, action))| step.ability == *ability && step.action == *action)
        })?;
        debug!("Player {player} completed combo {}", matched.ability);
        history.clear();
        Some(matched.ability.clone())
    }

    pub fn clear(&mut self, player: &PlayerId) {
        self.history.remove(player);
    }
}
