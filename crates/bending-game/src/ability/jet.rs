//! Propels the caster along their look direction.

use std::sync::Arc;
use std::time::Instant;

use super::{Ability, Effect, Launch, UpdateContext, UpdateResult};
use crate::registry::AbilityDescriptor;
use crate::removal::{Policies, RemovalPolicy};

pub struct Jet {
    descriptor: Arc<AbilityDescriptor>,
    ends_at: Instant,
    policies: Policies,
}

pub fn create(descriptor: Arc<AbilityDescriptor>, launch: &Launch<'_>) -> Box<dyn Ability> {
    let policies = Policies::builder()
        .add(RemovalPolicy::SwitchedWorld {
            world: launch.state.world.clone(),
        })
        .build();
    Box::new(Jet {
        ends_at: launch.now + descriptor.duration,
        policies,
        descriptor,
    })
}

impl Ability for Jet {
    fn descriptor(&self) -> &Arc<AbilityDescriptor> {
        &self.descriptor
    }

    fn policies(&self) -> Option<&Policies> {
        Some(&self.policies)
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> UpdateResult {
        if ctx.now >= self.ends_at {
            return UpdateResult::Complete;
        }
        ctx.effects.push(Effect::Push {
            player: ctx.owner,
            velocity: ctx.state.look() * self.descriptor.speed,
        });
        UpdateResult::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_abilities;
    use crate::registry::AbilityRegistry;
    use crate::resource::ResourceManager;
    use crate::user::UserState;
    use glam::Vec3;
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn pushes_until_duration_ends() {
        let descriptor = AbilityRegistry::from_config(&default_abilities())
            .unwrap()
            .resolve("fire-jet")
            .unwrap();
        let owner = Uuid::new_v4();
        let start = Instant::now();
        let mut state = UserState::default();
        state.direction = Vec3::X;
        let mut jet = create(
            descriptor,
            &Launch {
                owner,
                state: &state,
                now: start,
            },
        );
        assert!(jet.colliders().is_empty());

        let mut resources = ResourceManager::new(Duration::from_secs(1));
        let mut effects = Vec::new();
        let mut update = |now| {
            let mut ctx = UpdateContext {
                owner,
                state: &state,
                now,
                tick: 0,
                resources: &mut resources,
                targets: &[],
                effects: &mut effects,
            };
            jet.update(&mut ctx)
        };
        assert_eq!(update(start), UpdateResult::Continue);
        assert_eq!(
            update(start + Duration::from_millis(1500)),
            UpdateResult::Complete
        );
        assert_eq!(
            effects,
            vec![Effect::Push {
                player: owner,
                velocity: Vec3::X * 0.8,
            }]
        );
    }
}
