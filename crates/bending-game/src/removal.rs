//! Composable removal policies checked before an instance updates.

use std::time::Instant;

use glam::Vec3;

use crate::user::UserState;

#[derive(Debug, Clone, PartialEq)]
pub enum RemovalPolicy {
    /// Remove once `now` reaches the deadline.
    Expire { deadline: Instant },
    /// Remove once the owner is farther than `range` from `origin`.
    OutOfRange { origin: Vec3, range: f32 },
    /// Remove once the owner is no longer in `world`.
    SwitchedWorld { world: String },
}

impl RemovalPolicy {
    pub fn test(&self, owner: &UserState, now: Instant) -> bool {
        match self {
            RemovalPolicy::Expire { deadline } => now >= *deadline,
            RemovalPolicy::OutOfRange { origin, range } => {
                owner.position.distance_squared(*origin) > range * range
            }
            RemovalPolicy::SwitchedWorld { world } => owner.world != *world,
        }
    }
}

/// A set of policies; any hit means removal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Policies {
    policies: Vec<RemovalPolicy>,
}

impl Policies {
    pub fn builder() -> PoliciesBuilder {
        PoliciesBuilder::default()
    }

    pub fn test(&self, owner: &UserState, now: Instant) -> bool {
        self.policies.iter().any(|p| p.test(owner, now))
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct PoliciesBuilder {
    policies: Vec<RemovalPolicy>,
}

impl PoliciesBuilder {
    pub fn add(mut self, policy: RemovalPolicy) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn build(self) -> Policies {
        Policies {
            policies: self.policies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn expire() {
        let now = Instant::now();
        let state = UserState::default();
        let policies = Policies::builder()
            .add(RemovalPolicy::Expire {
                deadline: now + Duration::from_secs(1),
            })
            .build();
        assert!(!policies.test(&state, now));
        assert!(policies.test(&state, now + Duration::from_secs(1)));
    }

    #[test]
    fn out_of_range() {
        let now = Instant::now();
        let policies = Policies::builder()
            .add(RemovalPolicy::OutOfRange {
                origin: Vec3::ZERO,
                range: 5.0,
            })
            .build();
        let mut state = UserState::default();
        state.position = Vec3::new(3.0, 0.0, 4.0);
        assert!(!policies.test(&state, now));
        state.position = Vec3::new(3.0, 0.0, 4.1);
        assert!(policies.test(&state, now));
    }

    #[test]
    fn switched_world() {
        let now = Instant::now();
        let mut state = UserState::default();
        let policies = Policies::builder()
            .add(RemovalPolicy::SwitchedWorld {
                world: state.world.clone(),
            })
            .build();
        assert!(!policies.test(&state, now));
        state.world = "nether".into();
        assert!(policies.test(&state, now));
    }

    #[test]
    fn empty_never_removes() {
        let policies = Policies::builder().build();
        assert!(policies.is_empty());
        assert!(!policies.test(&UserState::default(), Instant::now()));
    }
}
