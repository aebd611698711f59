//! Time-keyed cooldowns with a lazily swept expiry heap.
//!
//! Readiness is always decided by comparing the stored expiry with `now`, so
//! an entry the sweep has not reached yet never reports a stale cooldown.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

use crate::profile::CooldownSnapshot;
use crate::PlayerId;

type Key = (PlayerId, String);

#[derive(Default)]
pub struct CooldownStore {
    expiries: HashMap<Key, Instant>,
    /// Min-heap by expiry. Overwritten entries leave stale heap nodes behind;
    /// the sweep skips any node that no longer matches the map.
    queue: BinaryHeap<Reverse<(Instant, PlayerId, String)>>,
}

impl CooldownStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self, player: &PlayerId, ability: &str, now: Instant) -> bool {
        self.remaining(player, ability, now).is_none()
    }

    /// Time left, or `None` when ready.
    pub fn remaining(&self, player: &PlayerId, ability: &str, now: Instant) -> Option<Duration> {
        let expiry = self.expiries.get(&(*player, ability.to_string()))?;
        if now >= *expiry {
            return None;
        }
        Some(*expiry - now)
    }

    /// Start or overwrite a cooldown. A zero duration clears it.
    pub fn start(&mut self, player: PlayerId, ability: &str, duration: Duration, now: Instant) {
        let key = (player, ability.to_string());
        if duration.is_zero() {
            self.expiries.remove(&key);
            return;
        }
        let expiry = now + duration;
        self.queue.push(Reverse((expiry, player, key.1.clone())));
        self.expiries.insert(key, expiry);
    }

    /// Evict every entry that expired at or before `now`. Returns how many
    /// live entries were removed.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let mut evicted = 0;
        while let Some(Reverse((expiry, _, _))) = self.queue.peek() {
            if *expiry > now {
                break;
            }
            let Some(Reverse((expiry, player, ability))) = self.queue.pop() else {
                break;
            };
            let key = (player, ability);
            if self.expiries.get(&key) == Some(&expiry) {
                self.expiries.remove(&key);
                evicted += 1;
            }
        }
        // Overwrites can leave the heap much larger than the map.
        if self.queue.len() > 64 && self.queue.len() > self.expiries.len() * 4 {
            self.rebuild_queue();
        }
        evicted
    }

    fn rebuild_queue(&mut self) {
        self.queue = self
            .expiries
            .iter()
            .map(|((player, ability), expiry)| Reverse((*expiry, *player, ability.clone())))
            .collect();
    }

    /// Active cooldowns of one player, sorted by ability id.
    pub fn snapshot(&self, player: &PlayerId, now: Instant) -> Vec<CooldownSnapshot> {
        let mut out: Vec<_> = self
            .expiries
            .iter()
            .filter(|((p, _), expiry)| p == player && **expiry > now)
            .map(|((_, ability), expiry)| CooldownSnapshot {
                ability: ability.clone(),
                remaining_ms: (*expiry - now).as_millis() as u64,
            })
            .filter(|s| s.remaining_ms > 0)
            .collect();
        out.sort_by(|a, b| a.ability.cmp(&b.ability));
        out
    }

    /// Re-arm snapshotted cooldowns relative to `now`.
    pub fn restore(&mut self, player: PlayerId, snapshot: &[CooldownSnapshot], now: Instant) {
        for entry in snapshot {
            self.start(
                player,
                &entry.ability,
                Duration::from_millis(entry.remaining_ms),
                now,
            );
        }
    }

    pub fn clear_player(&mut self, player: &PlayerId) {
        self.expiries.retain(|(p, _), _| p != player);
    }

    /// Live entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn not_ready_until_expiry() {
        let mut store = CooldownStore::new();
        let p = Uuid::new_v4();
        let t0 = Instant::now();
        store.start(p, "fire-blast", Duration::from_secs(5), t0);
        for ms in [0, 1, 2500, 4999] {
            let now = t0 + Duration::from_millis(ms);
            assert!(!store.is_ready(&p, "fire-blast", now));
            // Repeated reads do not change the answer.
            assert!(!store.is_ready(&p, "fire-blast", now));
        }
        assert!(store.is_ready(&p, "fire-blast", t0 + Duration::from_secs(5)));
        assert!(store.is_ready(&p, "air-blast", t0));
    }

    #[test]
    fn unswept_entry_is_ready_after_expiry() {
        let mut store = CooldownStore::new();
        let p = Uuid::new_v4();
        let t0 = Instant::now();
        store.start(p, "fire-blast", Duration::from_secs(1), t0);
        let later = t0 + Duration::from_secs(2);
        assert_eq!(store.len(), 1);
        assert!(store.is_ready(&p, "fire-blast", later));
        assert_eq!(store.sweep(later), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn start_overwrites() {
        let mut store = CooldownStore::new();
        let p = Uuid::new_v4();
        let t0 = Instant::now();
        store.start(p, "fire-blast", Duration::from_secs(10), t0);
        store.start(p, "fire-blast", Duration::from_secs(1), t0);
        assert!(store.is_ready(&p, "fire-blast", t0 + Duration::from_secs(1)));

        // The stale 10s heap node must not evict the newer entry.
        store.start(p, "fire-blast", Duration::from_secs(30), t0);
        assert_eq!(store.sweep(t0 + Duration::from_secs(11)), 0);
        assert!(!store.is_ready(&p, "fire-blast", t0 + Duration::from_secs(11)));
    }

    #[test]
    fn snapshot_and_restore() {
        let mut store = CooldownStore::new();
        let p = Uuid::new_v4();
        let t0 = Instant::now();
        store.start(p, "water-blast", Duration::from_millis(3000), t0);
        store.start(p, "air-blast", Duration::from_millis(500), t0);
        store.start(Uuid::new_v4(), "air-blast", Duration::from_millis(500), t0);

        let snap = store.snapshot(&p, t0 + Duration::from_millis(1000));
        assert_eq!(
            snap,
            vec![CooldownSnapshot {
                ability: "water-blast".into(),
                remaining_ms: 2000,
            }]
        );

        let mut fresh = CooldownStore::new();
        let t1 = Instant::now();
        fresh.restore(p, &snap, t1);
        assert_eq!(
            fresh.remaining(&p, "water-blast", t1),
            Some(Duration::from_millis(2000))
        );
    }

    #[test]
    fn clear_player_only_affects_that_player() {
        let mut store = CooldownStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let t0 = Instant::now();
        store.start(a, "fire-blast", Duration::from_secs(5), t0);
        store.start(b, "fire-blast", Duration::from_secs(5), t0);
        store.clear_player(&a);
        assert!(store.is_ready(&a, "fire-blast", t0));
        assert!(!store.is_ready(&b, "fire-blast", t0));
    }

    #[test]
    fn heap_rebuilds_after_many_overwrites() {
        let mut store = CooldownStore::new();
        let p = Uuid::new_v4();
        let t0 = Instant::now();
        for i in 0..200 {
            store.start(p, "fire-blast", Duration::from_secs(100 + i), t0);
        }
        store.sweep(t0);
        assert_eq!(store.queue.len(), 1);
        assert!(!store.is_ready(&p, "fire-blast", t0 + Duration::from_secs(250)));
    }
}
