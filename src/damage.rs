use rayon::prelude::*;

use crate::bond::{BondList, BondStore};
use crate::error::Result;
use crate::point::{Point, PointHandle};

/// Bond counts of one point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BondStats {
    pub total: usize,
    pub alive: usize,
}

impl BondStats {
    pub fn of(list: &BondList) -> Self {
        BondStats {
            total: list.len(),
            alive: list.alive_count(),
        }
    }

    pub fn dead(&self) -> usize {
        self.total - self.alive
    }

    /// Dead fraction in `[0, 1]`; 0 for a point without bonds.
    pub fn damage_index(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.dead() as f64 / self.total as f64
        }
    }
}

/// Reduces bond alive flags into per-point damage indices.
///
/// Always recomputed from the bond lists, never accumulated.
pub struct DamageIndexAggregator;

impl DamageIndexAggregator {
    pub fn damage_index(store: &BondStore, point: PointHandle) -> Result<f64> {
        Ok(BondStats::of(store.list(point)?).damage_index())
    }

    pub fn stats(store: &BondStore, point: PointHandle) -> Result<BondStats> {
        Ok(BondStats::of(store.list(point)?))
    }

    /// Writes the damage index of every point. Omitted points stay at 0.
    pub fn update(points: &mut [Point], store: &BondStore) {
        points
            .par_iter_mut()
            .zip(store.lists().par_iter())
            .for_each(|(point, list)| {
                let damage = if point.omit() { 0.0 } else { BondStats::of(list).damage_index() };
                point.set_damage_index(damage);
            });
    }
}
