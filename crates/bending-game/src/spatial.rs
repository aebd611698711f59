//! Spatial hash grid used as the collision broad phase.

use std::collections::{BTreeSet, HashMap};

use glam::Vec3;

/// Volumes spanning more cells than this on one axis skip the grid and are
/// paired with every other entry instead.
const MAX_CELLS_PER_AXIS: i64 = 16;

type CellKey = (i32, i32, i32);

/// Buckets entries (by index) into every cube cell their bounds overlap.
pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<CellKey, Vec<usize>>,
    /// Every inserted index, in insertion order.
    entries: Vec<usize>,
    /// Entries too large to bucket.
    oversized: Vec<usize>,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            entries: Vec::new(),
            oversized: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.entries.clear();
        self.oversized.clear();
    }

    /// Insert entry `index` covering the box `min..=max`.
    pub fn insert(&mut self, index: usize, min: Vec3, max: Vec3) {
        self.entries.push(index);
        let lo = self.cell_key(min);
        let hi = self.cell_key(max);
        let span = |lo: i32, hi: i32| i64::from(hi) - i64::from(lo) + 1;
        if span(lo.0, hi.0) > MAX_CELLS_PER_AXIS
            || span(lo.1, hi.1) > MAX_CELLS_PER_AXIS
            || span(lo.2, hi.2) > MAX_CELLS_PER_AXIS
        {
            self.oversized.push(index);
            return;
        }
        for x in lo.0..=hi.0 {
            for y in lo.1..=hi.1 {
                for z in lo.2..=hi.2 {
                    self.cells.entry((x, y, z)).or_default().push(index);
                }
            }
        }
    }

    /// Every unordered pair of entries sharing at least one cell, each pair
    /// once, as `(lower, higher)` indices in ascending order.
    pub fn candidate_pairs(&self) -> BTreeSet<(usize, usize)> {
        let mut pairs = BTreeSet::new();
        for entries in self.cells.values() {
            for (i, a) in entries.iter().enumerate() {
                for b in &entries[i + 1..] {
                    if a != b {
                        pairs.insert(((*a).min(*b), (*a).max(*b)));
                    }
                }
            }
        }
        for big in &self.oversized {
            for other in &self.entries {
                if big != other {
                    pairs.insert(((*big).min(*other), (*big).max(*other)));
                }
            }
        }
        pairs
    }

    fn cell_key(&self, pos: Vec3) -> CellKey {
        let cell = |v: f32| (v / self.cell_size).floor() as i32;
        (cell(pos.x), cell(pos.y), cell(pos.z))
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}
