//! Straight-line projectile launched from the caster's eyes.

use std::sync::Arc;

use glam::Vec3;

use super::{hits_body, Ability, Collision, Effect, Launch, UpdateContext, UpdateResult};
use crate::collision::{Collider, CollisionOutcome};
use crate::registry::AbilityDescriptor;
use crate::removal::{Policies, RemovalPolicy};

/// Smallest hit-test step along the path (blocks).
const MIN_SAMPLE: f32 = 0.25;
/// Upper bound on hit tests per tick, whatever the configured speed.
const MAX_SAMPLES: u32 = 64;

pub struct Blast {
    descriptor: Arc<AbilityDescriptor>,
    position: Vec3,
    /// Unit travel direction.
    direction: Vec3,
    travelled: f32,
    policies: Policies,
}

pub fn create(descriptor: Arc<AbilityDescriptor>, launch: &Launch<'_>) -> Box<dyn Ability> {
    let origin = launch.state.eye_position();
    let policies = Policies::builder()
        .add(RemovalPolicy::SwitchedWorld {
            world: launch.state.world.clone(),
        })
        .add(RemovalPolicy::OutOfRange {
            origin: launch.state.position,
            range: descriptor.range * 2.0,
        })
        .build();
    Box::new(Blast {
        position: origin,
        direction: launch.state.look(),
        travelled: 0.0,
        policies,
        descriptor,
    })
}

impl Blast {
    pub fn position(&self) -> Vec3 {
        self.position
    }
}

impl Ability for Blast {
    fn descriptor(&self) -> &Arc<AbilityDescriptor> {
        &self.descriptor
    }

    fn policies(&self) -> Option<&Policies> {
        Some(&self.policies)
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> UpdateResult {
        let d = &self.descriptor;
        let step = d.speed.min(d.range - self.travelled).max(0.0);
        let samples = (step / d.radius.max(MIN_SAMPLE))
            .ceil()
            .clamp(1.0, MAX_SAMPLES as f32) as u32;
        let start = self.position;

        // Walk the segment in sub-steps so fast blasts cannot tunnel through a body.
        for i in 1..=samples {
            let point = start + self.direction * (step * i as f32 / samples as f32);
            let hit = ctx
                .targets
                .iter()
                .filter(|t| t.player != ctx.owner)
                .find(|t| hits_body(point, d.radius, t.position));
            if let Some(target) = hit {
                self.position = point;
                ctx.effects.push(Effect::Damage {
                    source: ctx.owner,
                    target: target.player,
                    ability: d.id.clone(),
                    amount: d.damage,
                });
                return UpdateResult::Complete;
            }
        }

        self.position = start + self.direction * step;
        self.travelled += step;
        if self.travelled >= d.range {
            return UpdateResult::Complete;
        }
        UpdateResult::Continue
    }

    fn colliders(&self) -> Vec<Collider> {
        vec![Collider::Sphere {
            center: self.position,
            radius: self.descriptor.radius,
        }]
    }

    fn on_collision(&mut self, collision: &Collision) {
        if collision.outcome == CollisionOutcome::Deflect {
            self.direction = -self.direction;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::Target;
    use crate::config::default_abilities;
    use crate::instance::InstanceId;
    use crate::element::Element;
    use crate::registry::AbilityRegistry;
    use crate::resource::ResourceManager;
    use crate::user::UserState;
    use std::time::{Duration, Instant};
    use uuid::Uuid;

    fn descriptor(id: &str) -> Arc<AbilityDescriptor> {
        AbilityRegistry::from_config(&default_abilities())
            .unwrap()
            .resolve(id)
            .unwrap()
    }

    fn run(
        blast: &mut Box<dyn Ability>,
        owner: Uuid,
        state: &UserState,
        targets: &[Target],
        effects: &mut Vec<Effect>,
    ) -> UpdateResult {
        let mut resources = ResourceManager::new(Duration::from_secs(1));
        let mut ctx = UpdateContext {
            owner,
            state,
            now: Instant::now(),
            tick: 0,
            resources: &mut resources,
            targets,
            effects,
        };
        blast.update(&mut ctx)
    }

    #[test]
    fn travels_until_range() {
        let owner = Uuid::new_v4();
        let state = UserState::default();
        let launch = Launch {
            owner,
            state: &state,
            now: Instant::now(),
        };
        // fire-blast: speed 1, range 20
        let mut blast = create(descriptor("fire-blast"), &launch);
        let mut effects = Vec::new();
        for _ in 0..19 {
            assert_eq!(
                run(&mut blast, owner, &state, &[], &mut effects),
                UpdateResult::Continue
            );
        }
        assert_eq!(
            run(&mut blast, owner, &state, &[], &mut effects),
            UpdateResult::Complete
        );
        assert!(effects.is_empty());
    }

    #[test]
    fn extreme_speed_crosses_range_in_one_update() {
        let mut abilities = default_abilities();
        for ability in abilities.iter_mut().filter(|a| a.id == "fire-blast") {
            ability.speed = 1.0e30;
            ability.range = 1.0e30;
        }
        let descriptor = AbilityRegistry::from_config(&abilities)
            .unwrap()
            .resolve("fire-blast")
            .unwrap();
        let owner = Uuid::new_v4();
        let state = UserState::default();
        let launch = Launch {
            owner,
            state: &state,
            now: Instant::now(),
        };
        let mut blast = create(descriptor, &launch);
        let mut effects = Vec::new();
        assert_eq!(
            run(&mut blast, owner, &state, &[], &mut effects),
            UpdateResult::Complete
        );
        assert!(effects.is_empty());
    }

    #[test]
    fn hits_other_player_not_owner() {
        let owner = Uuid::new_v4();
        let victim = Uuid::new_v4();
        let state = UserState::default();
        let launch = Launch {
            owner,
            state: &state,
            now: Instant::now(),
        };
        let mut blast = create(descriptor("fire-blast"), &launch);
        let targets = [
            Target {
                player: owner,
                position: Vec3::ZERO,
            },
            Target {
                player: victim,
                position: Vec3::new(0.0, 0.0, 3.0),
            },
        ];
        let mut effects = Vec::new();
        let mut result = UpdateResult::Continue;
        for _ in 0..5 {
            result = run(&mut blast, owner, &state, &targets, &mut effects);
            if result != UpdateResult::Continue {
                break;
            }
        }
        assert_eq!(result, UpdateResult::Complete);
        assert_eq!(
            effects,
            vec![Effect::Damage {
                source: owner,
                target: victim,
                ability: "fire-blast".into(),
                amount: 2.0,
            }]
        );
    }

    #[test]
    fn fast_blast_does_not_tunnel() {
        let owner = Uuid::new_v4();
        let victim = Uuid::new_v4();
        let state = UserState::default();
        let launch = Launch {
            owner,
            state: &state,
            now: Instant::now(),
        };
        let mut desc = descriptor("air-blast").as_ref().clone();
        desc.speed = 10.0;
        desc.radius = 0.1;
        let mut blast = create(Arc::new(desc), &launch);
        let targets = [Target {
            player: victim,
            position: Vec3::new(0.0, 0.0, 5.0),
        }];
        let mut effects = Vec::new();
        assert_eq!(
            run(&mut blast, owner, &state, &targets, &mut effects),
            UpdateResult::Complete
        );
        assert_eq!(effects.len(), 1);
    }

    #[test]
    fn deflect_reverses_direction() {
        let owner = Uuid::new_v4();
        let state = UserState::default();
        let launch = Launch {
            owner,
            state: &state,
            now: Instant::now(),
        };
        let mut blast = create(descriptor("fire-blast"), &launch);
        let mut effects = Vec::new();
        run(&mut blast, owner, &state, &[], &mut effects);
        blast.on_collision(&Collision {
            other: InstanceId(9),
            other_element: Element::Air,
            outcome: CollisionOutcome::Deflect,
        });
        run(&mut blast, owner, &state, &[], &mut effects);
        let Collider::Sphere { center, .. } = blast.colliders()[0] else {
            panic!("blast collider is a sphere");
        };
        assert!(center.z.abs() < 1e-5);
    }
}
