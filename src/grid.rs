use serde::{Deserialize, Serialize};

use crate::bounds::BoundingBox;
use crate::error::{PeriError, Result};

/// Integer coordinates of a grid cell.
pub type CellIndex = [usize; 3];

/// Collision-free packed form of a [`CellIndex`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellKey(pub u64);

/// What to do with a point that lies outside the domain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutOfDomainPolicy {
    /// Snap each axis index into `[0, n - 1]`. Clamping never increases the
    /// index distance between two points, so horizon neighbors stay within
    /// adjacent cells.
    #[default]
    Clamp,
    /// Report the point as outside; it gets no cell and an empty family.
    Reject,
}

/// Uniform partition of the domain into cells at least one horizon wide.
///
/// Two points closer than the horizon always share a cell or sit in
/// face/edge/corner-adjacent cells, so a 3x3x3 block search is exhaustive.
#[derive(Clone, Debug)]
pub struct SpatialGrid {
    bounds: BoundingBox,
    horizon: f64,
    num_cells: [usize; 3],
    cell_size: [f64; 3],
    inv_cell_size: [f64; 3],
    /// Bit width of each axis field in a packed key.
    key_bits: [u32; 3],
    policy: OutOfDomainPolicy,
}

impl SpatialGrid {
    /// Builds the grid for `bounds` with cells no smaller than `horizon` along any axis.
    ///
    /// The per-axis count is `max(1, floor(range / horizon))` and the cell size is
    /// `range / count`, so `count == ceil(range / cell_size)`.
    pub fn new(bounds: BoundingBox, horizon: f64, policy: OutOfDomainPolicy) -> Result<Self> {
        bounds.validate()?;
        if !horizon.is_finite() || horizon <= 0.0 {
            return Err(PeriError::InvalidHorizon(horizon));
        }

        let mut num_cells = [1usize; 3];
        let mut cell_size = [0.0; 3];
        let mut inv_cell_size = [0.0; 3];
        for axis in 0..3 {
            let range = bounds.range(axis);
            let count = (range / horizon).floor();
            if count >= usize::MAX as f64 {
                let mut cells = num_cells;
                cells[axis] = usize::MAX;
                return Err(PeriError::CellKeyOverflow {
                    cells,
                    bits: count.log2().ceil() as u32,
                });
            }
            num_cells[axis] = (count as usize).max(1);
            // rounding in range / horizon may leave the cell a hair short of the horizon
            if num_cells[axis] > 1 && range / (num_cells[axis] as f64) < horizon {
                num_cells[axis] -= 1;
            }
            cell_size[axis] = range / num_cells[axis] as f64;
            inv_cell_size[axis] = num_cells[axis] as f64 / range;
        }

        let key_bits = num_cells.map(bits_for);
        let total_bits: u32 = key_bits.iter().sum();
        if total_bits > u64::BITS {
            return Err(PeriError::CellKeyOverflow {
                cells: num_cells,
                bits: total_bits,
            });
        }

        Ok(SpatialGrid {
            bounds,
            horizon,
            num_cells,
            cell_size,
            inv_cell_size,
            key_bits,
            policy,
        })
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    pub fn horizon(&self) -> f64 {
        self.horizon
    }

    pub fn num_cells(&self) -> [usize; 3] {
        self.num_cells
    }

    pub fn total_cells(&self) -> usize {
        self.num_cells.iter().product()
    }

    pub fn cell_size(&self) -> [f64; 3] {
        self.cell_size
    }

    /// Smallest cell edge; the largest horizon the 3x3x3 search supports.
    pub fn min_cell_size(&self) -> f64 {
        self.cell_size.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn policy(&self) -> OutOfDomainPolicy {
        self.policy
    }

    /// Cell containing `position`. Points on the upper face belong to the last cell.
    pub fn cell_index_of(&self, position: &[f64; 3]) -> Result<CellIndex> {
        let inside = self.bounds.contains(position);
        if !inside && self.policy == OutOfDomainPolicy::Reject {
            return Err(PeriError::OutOfDomain {
                position: *position,
            });
        }
        if position.iter().any(|c| c.is_nan()) {
            return Err(PeriError::OutOfDomain {
                position: *position,
            });
        }

        let mut cell = [0usize; 3];
        for axis in 0..3 {
            let scaled = ((position[axis] - self.bounds.min[axis]) * self.inv_cell_size[axis]).floor();
            let last = (self.num_cells[axis] - 1) as f64;
            cell[axis] = scaled.clamp(0.0, last) as usize;
        }
        Ok(cell)
    }

    /// Packs `cell` into a key using bit fields sized to this grid's cell counts.
    pub fn pack_key(&self, cell: CellIndex) -> CellKey {
        debug_assert!((0..3).all(|a| cell[a] < self.num_cells[a]), "cell {:?} outside grid", cell);
        let shift_y = self.key_bits[0];
        let shift_z = self.key_bits[0] + self.key_bits[1];
        CellKey((cell[0] as u64) | ((cell[1] as u64) << shift_y) | ((cell[2] as u64) << shift_z))
    }

    pub fn unpack_key(&self, key: CellKey) -> CellIndex {
        let shift_y = self.key_bits[0];
        let shift_z = self.key_bits[0] + self.key_bits[1];
        [
            (key.0 & mask(self.key_bits[0])) as usize,
            ((key.0 >> shift_y) & mask(self.key_bits[1])) as usize,
            ((key.0 >> shift_z) & mask(self.key_bits[2])) as usize,
        ]
    }

    /// Calls `visitor` for every in-bounds cell of the 3x3x3 block centered at `cell`.
    ///
    /// Boundary cells have fewer than 27 neighbors.
    pub fn visit_block<F>(&self, cell: CellIndex, mut visitor: F)
    where
        F: FnMut(CellIndex),
    {
        let lo = cell.map(|c| c.saturating_sub(1));
        let hi = [
            (cell[0] + 1).min(self.num_cells[0] - 1),
            (cell[1] + 1).min(self.num_cells[1] - 1),
            (cell[2] + 1).min(self.num_cells[2] - 1),
        ];
        for k in lo[2]..=hi[2] {
            for j in lo[1]..=hi[1] {
                for i in lo[0]..=hi[0] {
                    visitor([i, j, k]);
                }
            }
        }
    }
}

/// Bits needed to hold every index in `0..count`.
fn bits_for(count: usize) -> u32 {
    if count <= 1 {
        0
    } else {
        usize::BITS - (count - 1).leading_zeros()
    }
}

fn mask(bits: u32) -> u64 {
    if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}
