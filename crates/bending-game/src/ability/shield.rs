//! A sphere around the caster that drains chi while it stands.

use std::sync::Arc;

use glam::Vec3;

use super::{Ability, Launch, UpdateContext, UpdateResult, BODY_HEIGHT};
use crate::collision::Collider;
use crate::registry::AbilityDescriptor;
use crate::removal::{Policies, RemovalPolicy};

pub struct Shield {
    descriptor: Arc<AbilityDescriptor>,
    center: Vec3,
    policies: Policies,
}

pub fn create(descriptor: Arc<AbilityDescriptor>, launch: &Launch<'_>) -> Box<dyn Ability> {
    let policies = Policies::builder()
        .add(RemovalPolicy::Expire {
            deadline: launch.now + descriptor.duration,
        })
        .add(RemovalPolicy::SwitchedWorld {
            world: launch.state.world.clone(),
        })
        .build();
    Box::new(Shield {
        center: body_center(launch.state.position),
        policies,
        descriptor,
    })
}

fn body_center(feet: Vec3) -> Vec3 {
    feet + Vec3::Y * (BODY_HEIGHT / 2.0)
}

impl Ability for Shield {
    fn descriptor(&self) -> &Arc<AbilityDescriptor> {
        &self.descriptor
    }

    fn policies(&self) -> Option<&Policies> {
        Some(&self.policies)
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> UpdateResult {
        if !ctx.resources.debit(&ctx.owner, self.descriptor.upkeep) {
            return UpdateResult::Complete;
        }
        self.center = body_center(ctx.state.position);
        UpdateResult::Continue
    }

    fn colliders(&self) -> Vec<Collider> {
        vec![Collider::Sphere {
            center: self.center,
            radius: self.descriptor.radius,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_abilities;
    use crate::registry::AbilityRegistry;
    use crate::resource::{ResourceManager, ResourcePool};
    use crate::user::UserState;
    use std::time::{Duration, Instant};
    use uuid::Uuid;

    #[test]
    fn follows_owner_and_drains_upkeep() {
        let descriptor = AbilityRegistry::from_config(&default_abilities())
            .unwrap()
            .resolve("air-shield")
            .unwrap();
        let owner = Uuid::new_v4();
        let now = Instant::now();
        let mut state = UserState::default();
        let mut shield = create(
            descriptor,
            &Launch {
                owner,
                state: &state,
                now,
            },
        );
        assert!(!shield.policies().unwrap().test(&state, now));
        assert!(shield
            .policies()
            .unwrap()
            .test(&state, now + Duration::from_secs(5)));

        let mut resources = ResourceManager::new(Duration::from_secs(1));
        resources.insert(
            owner,
            ResourcePool {
                current: 0.8,
                max: 100.0,
                regen: 0.0,
            },
        );
        state.position = Vec3::new(10.0, 0.0, 0.0);
        let mut effects = Vec::new();
        let mut results = Vec::new();
        for tick in 0..3 {
            let mut ctx = UpdateContext {
                owner,
                state: &state,
                now,
                tick,
                resources: &mut resources,
                targets: &[],
                effects: &mut effects,
            };
            results.push(shield.update(&mut ctx));
        }
        // 0.8 chi pays two ticks of 0.4 upkeep.
        assert_eq!(
            results,
            vec![
                UpdateResult::Continue,
                UpdateResult::Continue,
                UpdateResult::Complete
            ]
        );
        let Collider::Sphere { center, radius } = shield.colliders()[0] else {
            panic!("shield collider is a sphere");
        };
        assert_eq!(center.x, 10.0);
        assert_eq!(radius, 3.5);
    }
}
