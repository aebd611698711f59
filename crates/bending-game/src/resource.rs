//! Per-player chi pools.
//!
//! Every mutation clamps to `[0, max]`. Regeneration is applied in whole
//! intervals rather than per tick, so pools only move in fixed steps.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::PlayerId;

/// Intervals credited at most in one call after a stall.
const MAX_CATCH_UP: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourcePool {
    pub current: f32,
    pub max: f32,
    /// Credited once per regeneration interval.
    pub regen: f32,
}

impl ResourcePool {
    /// A full pool.
    pub fn full(max: f32, regen: f32) -> Self {
        let max = sanitize(max);
        Self {
            current: max,
            max,
            regen: sanitize(regen),
        }
    }

    fn clamp(&mut self) {
        self.current = self.current.clamp(0.0, self.max);
    }
}

fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

pub struct ResourceManager {
    pools: HashMap<PlayerId, ResourcePool>,
    interval: Duration,
    last_regen: Option<Instant>,
}

impl ResourceManager {
    pub fn new(interval: Duration) -> Self {
        Self {
            pools: HashMap::new(),
            interval,
            last_regen: None,
        }
    }

    pub fn insert(&mut self, player: PlayerId, pool: ResourcePool) {
        let mut pool = pool;
        pool.max = sanitize(pool.max);
        pool.current = sanitize(pool.current);
        pool.clamp();
        self.pools.insert(player, pool);
    }

    pub fn get(&self, player: &PlayerId) -> Option<&ResourcePool> {
        self.pools.get(player)
    }

    /// Current chi, or 0 for an unknown player.
    pub fn current(&self, player: &PlayerId) -> f32 {
        self.pools.get(player).map(|p| p.current).unwrap_or(0.0)
    }

    /// Take `amount` if the pool can cover it. Returns false, leaving the pool
    /// untouched, when it cannot or the amount is not a valid quantity.
    pub fn debit(&mut self, player: &PlayerId, amount: f32) -> bool {
        if !amount.is_finite() || amount < 0.0 {
            return false;
        }
        let Some(pool) = self.pools.get_mut(player) else {
            return false;
        };
        if pool.current < amount {
            return false;
        }
        pool.current -= amount;
        pool.clamp();
        true
    }

    /// Add chi, clamping at the pool's max.
    pub fn credit(&mut self, player: &PlayerId, amount: f32) {
        if !amount.is_finite() || amount <= 0.0 {
            return;
        }
        if let Some(pool) = self.pools.get_mut(player) {
            pool.current += amount;
            pool.clamp();
        }
    }

    pub fn set_regen(&mut self, player: &PlayerId, regen: f32) {
        if let Some(pool) = self.pools.get_mut(player) {
            pool.regen = sanitize(regen);
        }
    }

    /// Credit each pool once per whole interval elapsed since the last call.
    /// Returns the number of intervals applied.
    pub fn regenerate(&mut self, now: Instant) -> u32 {
        let Some(last) = self.last_regen else {
            self.last_regen = Some(now);
            return 0;
        };
        if self.interval.is_zero() {
            return 0;
        }
        let elapsed = now.saturating_duration_since(last);
        let whole = (elapsed.as_nanos() / self.interval.as_nanos()) as u32;
        if whole == 0 {
            return 0;
        }
        let steps = whole.min(MAX_CATCH_UP);
        if whole > MAX_CATCH_UP {
            debug!("Regeneration fell {whole} intervals behind, crediting {steps}");
            self.last_regen = Some(now);
        } else {
            self.last_regen = Some(last + self.interval * whole);
        }
        for pool in self.pools.values_mut() {
            pool.current += pool.regen * steps as f32;
            pool.clamp();
        }
        steps
    }

    /// Drop the player's pool. Returns what it held.
    pub fn release(&mut self, player: &PlayerId) -> Option<ResourcePool> {
        self.pools.remove(player)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use uuid::Uuid;

    fn manager() -> (ResourceManager, PlayerId) {
        let mut mgr = ResourceManager::new(Duration::from_secs(1));
        let player = Uuid::new_v4();
        mgr.insert(player, ResourcePool::full(100.0, 5.0));
        (mgr, player)
    }

    #[test]
    fn debit_insufficient_returns_false() {
        let (mut mgr, p) = manager();
        assert!(mgr.debit(&p, 60.0));
        assert!(!mgr.debit(&p, 60.0));
        assert_eq!(mgr.current(&p), 40.0);
    }

    #[test]
    fn debit_rejects_bad_amounts() {
        let (mut mgr, p) = manager();
        assert!(!mgr.debit(&p, -1.0));
        assert!(!mgr.debit(&p, f32::NAN));
        assert!(!mgr.debit(&Uuid::new_v4(), 1.0));
        assert_eq!(mgr.current(&p), 100.0);
    }

    #[test]
    fn credit_clamps_at_max() {
        let (mut mgr, p) = manager();
        mgr.debit(&p, 10.0);
        mgr.credit(&p, 50.0);
        assert_eq!(mgr.current(&p), 100.0);
    }

    #[test]
    fn regen_applies_per_interval() {
        let (mut mgr, p) = manager();
        let start = Instant::now();
        mgr.debit(&p, 50.0);
        assert_eq!(mgr.regenerate(start), 0);
        assert_eq!(mgr.regenerate(start + Duration::from_millis(900)), 0);
        assert_eq!(mgr.regenerate(start + Duration::from_millis(1100)), 1);
        assert_eq!(mgr.current(&p), 55.0);
        // The leftover 100ms carries into the next interval.
        assert_eq!(mgr.regenerate(start + Duration::from_millis(2000)), 1);
        assert_eq!(mgr.current(&p), 60.0);
    }

    #[test]
    fn regen_catch_up_is_capped() {
        let (mut mgr, p) = manager();
        let start = Instant::now();
        mgr.debit(&p, 100.0);
        mgr.regenerate(start);
        assert_eq!(mgr.regenerate(start + Duration::from_secs(60)), MAX_CATCH_UP);
        assert_eq!(mgr.current(&p), 25.0);
    }

    #[test]
    fn release_drops_pool() {
        let (mut mgr, p) = manager();
        assert!(mgr.release(&p).is_some());
        assert!(mgr.release(&p).is_none());
        assert_eq!(mgr.current(&p), 0.0);
    }

    #[test]
    fn random_operations_stay_in_bounds() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        let (mut mgr, p) = manager();
        let mut now = Instant::now();
        for _ in 0..10_000 {
            match rng.gen_range(0..4) {
                0 => {
                    mgr.debit(&p, rng.gen_range(-10.0..150.0));
                }
                1 => mgr.credit(&p, rng.gen_range(-10.0..150.0)),
                2 => mgr.set_regen(&p, rng.gen_range(-5.0..40.0)),
                _ => {
                    now += Duration::from_millis(rng.gen_range(0..4000));
                    mgr.regenerate(now);
                }
            }
            let pool = mgr.get(&p).unwrap();
            assert!(pool.current >= 0.0 && pool.current <= pool.max);
        }
    }
}
