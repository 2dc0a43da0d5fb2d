use log::{debug, warn};
use rustc_hash::FxHashMap;

use crate::grid::{CellIndex, CellKey, SpatialGrid};
use crate::point::{Configuration, Point, PointHandle};

/// Point-in-time snapshot mapping each occupied cell to the points inside it.
///
/// Not kept consistent with point motion: rebuild it explicitly.
#[derive(Clone, Debug)]
pub struct CellPointIndex {
    configuration: Configuration,
    buckets: FxHashMap<CellKey, Vec<PointHandle>>,
    /// Cell of each point at build time; `None` for omitted or rejected points.
    point_cells: Vec<Option<CellIndex>>,
    rejected: usize,
}

impl CellPointIndex {
    /// Buckets every non-omitted point of `points` by its cell in `configuration`.
    ///
    /// Points the grid refuses (out of domain under the reject policy) are left
    /// out and counted in [`CellPointIndex::rejected`].
    pub fn build(grid: &SpatialGrid, points: &[Point], configuration: Configuration) -> Self {
        let mut buckets: FxHashMap<CellKey, Vec<PointHandle>> = FxHashMap::default();
        let mut point_cells = vec![None; points.len()];
        let mut rejected = 0;

        for (i, point) in points.iter().enumerate() {
            if point.omit() {
                continue;
            }
            let position = point.position_in(configuration);
            match grid.cell_index_of(&position) {
                Ok(cell) => {
                    buckets.entry(grid.pack_key(cell)).or_default().push(PointHandle(i));
                    point_cells[i] = Some(cell);
                }
                Err(e) => {
                    warn!("point {} left out of the cell index: {}", point.id(), e);
                    rejected += 1;
                }
            }
        }

        debug!(
            "cell index ({:?}): {} points in {} of {} cells, {} rejected",
            configuration,
            point_cells.iter().filter(|c| c.is_some()).count(),
            buckets.len(),
            grid.total_cells(),
            rejected
        );

        CellPointIndex {
            configuration,
            buckets,
            point_cells,
            rejected,
        }
    }

    pub fn configuration(&self) -> Configuration {
        self.configuration
    }

    /// Points in the bucket for `key`, in insertion (arena) order.
    pub fn query(&self, key: CellKey) -> &[PointHandle] {
        self.buckets.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cell_of(&self, handle: PointHandle) -> Option<CellIndex> {
        self.point_cells.get(handle.index()).copied().flatten()
    }

    /// Number of points the index was built over, indexed or not.
    pub fn point_count(&self) -> usize {
        self.point_cells.len()
    }

    pub fn occupied_cells(&self) -> usize {
        self.buckets.len()
    }

    pub fn indexed_points(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
