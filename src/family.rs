use rayon::prelude::*;

use crate::cell_index::CellPointIndex;
use crate::error::{PeriError, Result};
use crate::grid::SpatialGrid;
use crate::point::{Configuration, Point, PointHandle, distance_sq};

/// Finds, for each point, every other point strictly inside its horizon.
///
/// Queries are read-only on a frozen [`CellPointIndex`], so [`FamilyComputer::families`]
/// runs them in parallel. [`FamilyComputer::build`] takes `&mut self`, which keeps
/// rebuilds and queries from overlapping.
#[derive(Clone, Debug)]
pub struct FamilyComputer {
    grid: SpatialGrid,
    index: Option<CellPointIndex>,
}

impl FamilyComputer {
    pub fn new(grid: SpatialGrid) -> Self {
        FamilyComputer { grid, index: None }
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn index(&self) -> Option<&CellPointIndex> {
        self.index.as_ref()
    }

    /// Rebuilds the cell index from scratch for `configuration`.
    ///
    /// Fails if a non-omitted point's horizon does not fit inside one grid cell,
    /// since the 3x3x3 block search would then miss neighbors.
    pub fn build(&mut self, points: &[Point], configuration: Configuration) -> Result<()> {
        let cell_size = self.grid.min_cell_size();
        for (i, point) in points.iter().enumerate() {
            if point.omit() {
                continue;
            }
            let horizon = point.horizon();
            if !horizon.is_finite() || horizon <= 0.0 {
                return Err(PeriError::InvalidHorizon(horizon));
            }
            if horizon > cell_size {
                return Err(PeriError::HorizonExceedsCell {
                    point: PointHandle(i),
                    horizon,
                    cell_size,
                });
            }
        }

        self.index = Some(CellPointIndex::build(&self.grid, points, configuration));
        Ok(())
    }

    pub fn clear(&mut self) {
        self.index = None;
    }

    /// Family of `handle` in `configuration`, in discovery order.
    pub fn family(
        &self,
        handle: PointHandle,
        points: &[Point],
        configuration: Configuration,
    ) -> Result<Vec<PointHandle>> {
        let index = self.checked_index(points, configuration)?;
        if handle.index() >= points.len() {
            return Err(PeriError::UnknownPoint(handle));
        }
        Ok(self.collect_family(index, handle, points, configuration))
    }

    /// Families of every point, indexed by handle. Omitted points get empty families.
    pub fn families(&self, points: &[Point], configuration: Configuration) -> Result<Vec<Vec<PointHandle>>> {
        let index = self.checked_index(points, configuration)?;
        Ok((0..points.len())
            .into_par_iter()
            .map(|i| self.collect_family(index, PointHandle(i), points, configuration))
            .collect())
    }

    fn checked_index(&self, points: &[Point], configuration: Configuration) -> Result<&CellPointIndex> {
        let index = self.index.as_ref().ok_or(PeriError::IndexNotBuilt)?;
        if index.configuration() != configuration {
            return Err(PeriError::ConfigurationMismatch {
                built: index.configuration(),
                requested: configuration,
            });
        }
        if index.point_count() != points.len() {
            return Err(PeriError::IndexStale {
                indexed: index.point_count(),
                current: points.len(),
            });
        }
        Ok(index)
    }

    fn collect_family(
        &self,
        index: &CellPointIndex,
        handle: PointHandle,
        points: &[Point],
        configuration: Configuration,
    ) -> Vec<PointHandle> {
        let point = &points[handle.index()];
        if point.omit() {
            return Vec::new();
        }
        let Some(cell) = index.cell_of(handle) else {
            return Vec::new();
        };

        let origin = point.position_in(configuration);
        let horizon_sq = point.horizon() * point.horizon();
        let mut family = Vec::new();

        self.grid.visit_block(cell, |neighbor_cell| {
            for &other in index.query(self.grid.pack_key(neighbor_cell)) {
                if other == handle {
                    continue;
                }
                let neighbor = &points[other.index()];
                if neighbor.omit() {
                    continue;
                }
                // Strict: a point exactly on the horizon is not a neighbor.
                if distance_sq(&origin, &neighbor.position_in(configuration)) < horizon_sq {
                    family.push(other);
                }
            }
        });

        family
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::BoundingBox;
    use crate::grid::OutOfDomainPolicy;

    fn computer(side: f64, horizon: f64) -> FamilyComputer {
        let grid = SpatialGrid::new(BoundingBox::new([0.0; 3], [side; 3]), horizon, OutOfDomainPolicy::Clamp).unwrap();
        FamilyComputer::new(grid)
    }

    #[test]
    fn test_family_before_build_fails() {
        let fc = computer(4.0, 1.0);
        let points = vec![Point::new(0, [1.0; 3], 1.0)];
        assert!(matches!(
            fc.family(PointHandle(0), &points, Configuration::Initial),
            Err(PeriError::IndexNotBuilt)
        ));
        assert!(matches!(fc.families(&points, Configuration::Initial), Err(PeriError::IndexNotBuilt)));
    }

    #[test]
    fn test_configuration_mismatch_and_stale_index() {
        let mut fc = computer(4.0, 1.0);
        let mut points = vec![Point::new(0, [1.0; 3], 1.0)];
        fc.build(&points, Configuration::Initial).unwrap();
        assert!(matches!(
            fc.family(PointHandle(0), &points, Configuration::Current),
            Err(PeriError::ConfigurationMismatch { .. })
        ));
        points.push(Point::new(1, [2.0; 3], 1.0));
        assert!(matches!(
            fc.family(PointHandle(0), &points, Configuration::Initial),
            Err(PeriError::IndexStale { indexed: 1, current: 2 })
        ));
    }

    #[test]
    fn test_exact_horizon_is_excluded() {
        let mut fc = computer(4.0, 1.0);
        let points = vec![
            Point::new(0, [1.0, 1.0, 1.0], 1.0),
            Point::new(1, [2.0, 1.0, 1.0], 1.0),
            Point::new(2, [1.0, 1.999, 1.0], 1.0),
        ];
        fc.build(&points, Configuration::Initial).unwrap();
        let family = fc.family(PointHandle(0), &points, Configuration::Initial).unwrap();
        assert_eq!(family, vec![PointHandle(2)]);
    }

    #[test]
    fn test_horizon_larger_than_cell_rejected() {
        let mut fc = computer(4.0, 1.0);
        let points = vec![Point::new(0, [1.0; 3], 1.5)];
        assert!(matches!(
            fc.build(&points, Configuration::Initial),
            Err(PeriError::HorizonExceedsCell { .. })
        ));
    }

    #[test]
    fn test_omitted_points_excluded_both_ways() {
        let mut fc = computer(4.0, 1.0);
        let mut points = vec![
            Point::new(0, [1.0, 1.0, 1.0], 1.0),
            Point::new(1, [1.5, 1.0, 1.0], 1.0),
            Point::new(2, [1.0, 1.5, 1.0], 1.0),
        ];
        points[1].set_omit(true);
        fc.build(&points, Configuration::Initial).unwrap();
        let families = fc.families(&points, Configuration::Initial).unwrap();
        assert_eq!(families[0], vec![PointHandle(2)]);
        assert!(families[1].is_empty());
        assert_eq!(families[2], vec![PointHandle(0)]);
    }

    #[test]
    fn test_current_family_follows_displacement() {
        let mut fc = computer(6.0, 1.0);
        let mut points = vec![Point::new(0, [1.0, 1.0, 1.0], 1.0), Point::new(1, [4.0, 1.0, 1.0], 1.0)];
        points[1].set_displacement([-2.5, 0.0, 0.0]);

        fc.build(&points, Configuration::Initial).unwrap();
        assert!(fc.family(PointHandle(0), &points, Configuration::Initial).unwrap().is_empty());

        fc.build(&points, Configuration::Current).unwrap();
        assert_eq!(
            fc.family(PointHandle(0), &points, Configuration::Current).unwrap(),
            vec![PointHandle(1)]
        );
    }
}
