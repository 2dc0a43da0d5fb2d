use std::collections::hash_map::Entry;

use log::{debug, info, warn};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::bond::{BondId, BondStore, RefreshSummary};
use crate::config::{FamilyMode, SimulationParams};
use crate::damage::{BondStats, DamageIndexAggregator};
use crate::error::{PeriError, Result};
use crate::evaluator::{BondEvaluator, BondVerdict};
use crate::family::FamilyComputer;
use crate::grid::SpatialGrid;
use crate::material::{Material, MaterialHandle};
use crate::point::{Configuration, Point, PointHandle};

/// A discretized body: the point arena, its materials, neighbor search and bonds.
///
/// Typical driver sequence:
/// 1. add points and materials, [`Body::assign_material`]
/// 2. [`Body::build_index`] with [`Configuration::Initial`], then [`Body::compute_initial_family`]
/// 3. every step: move points, [`Body::evaluate_bonds`], [`Body::step`]
pub struct Body {
    params: SimulationParams,
    points: Vec<Point>,
    ids: FxHashMap<u64, PointHandle>,
    materials: Vec<Material>,
    family: FamilyComputer,
    bonds: BondStore,
    /// Set once the initial family exists; later points join with empty bond lists.
    initial_family_created: bool,
}

impl Body {
    pub fn new(params: SimulationParams) -> Result<Self> {
        params.validate()?;
        let grid = SpatialGrid::new(params.domain, params.horizon, params.out_of_domain)?;
        debug!(
            "body grid: {:?} cells of size {:?} for horizon {}",
            grid.num_cells(),
            grid.cell_size(),
            params.horizon
        );
        Ok(Body {
            params,
            points: Vec::new(),
            ids: FxHashMap::default(),
            materials: Vec::new(),
            family: FamilyComputer::new(grid),
            bonds: BondStore::default(),
            initial_family_created: false,
        })
    }

    /// Creates a body from already discretized points.
    pub fn with_points(params: SimulationParams, points: Vec<Point>) -> Result<Self> {
        let mut body = Body::new(params)?;
        body.points.reserve(points.len());
        for point in points {
            body.insert(point)?;
        }
        Ok(body)
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn grid(&self) -> &SpatialGrid {
        self.family.grid()
    }

    /// Adds a point using the body-wide horizon.
    pub fn add_point(&mut self, id: u64, position: [f64; 3]) -> Result<PointHandle> {
        self.insert(Point::new(id, position, self.params.horizon))
    }

    pub fn add_point_with_horizon(&mut self, id: u64, position: [f64; 3], horizon: f64) -> Result<PointHandle> {
        self.insert(Point::new(id, position, horizon))
    }

    fn insert(&mut self, point: Point) -> Result<PointHandle> {
        let handle = PointHandle(self.points.len());
        match self.ids.entry(point.id()) {
            Entry::Occupied(_) => return Err(PeriError::DuplicatePointId(point.id())),
            Entry::Vacant(slot) => {
                slot.insert(handle);
            }
        }
        self.points.push(point);
        self.bonds.resize(self.points.len());
        if self.initial_family_created {
            self.bonds.create_initial_bonds(handle, &[], &self.points)?;
        }
        Ok(handle)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn point(&self, handle: PointHandle) -> Result<&Point> {
        self.points.get(handle.index()).ok_or(PeriError::UnknownPoint(handle))
    }

    /// Mutable access for the integrator (displacement, velocity, omit flag).
    pub fn point_mut(&mut self, handle: PointHandle) -> Result<&mut Point> {
        self.points.get_mut(handle.index()).ok_or(PeriError::UnknownPoint(handle))
    }

    pub fn handle_of(&self, id: u64) -> Result<PointHandle> {
        self.ids.get(&id).copied().ok_or(PeriError::UnknownPointId(id))
    }

    pub fn set_displacement(&mut self, handle: PointHandle, displacement: [f64; 3]) -> Result<()> {
        self.point_mut(handle)?.set_displacement(displacement);
        Ok(())
    }

    pub fn add_material(&mut self, material: Material) -> MaterialHandle {
        self.materials.push(material);
        MaterialHandle(self.materials.len() - 1)
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Gives every non-omitted point the material with `material_id`, perturbed
    /// according to the configured distribution.
    pub fn assign_material(&mut self, material_id: u32) -> Result<()> {
        let (index, material) = self
            .materials
            .iter()
            .enumerate()
            .find(|(_, m)| m.id == material_id)
            .ok_or(PeriError::UnknownMaterial(material_id))?;
        self.params
            .material_distribution
            .assign(&mut self.points, MaterialHandle(index), material)
    }

    /// Rebuilds the cell index. Must complete before any family query.
    pub fn build_index(&mut self, configuration: Configuration) -> Result<()> {
        self.family.build(&self.points, configuration)
    }

    pub fn family(&self, handle: PointHandle, configuration: Configuration) -> Result<Vec<PointHandle>> {
        self.family.family(handle, &self.points, configuration)
    }

    /// Creates the initial bonds of every non-omitted point. Call once, after
    /// [`Body::build_index`] with [`Configuration::Initial`].
    pub fn compute_initial_family(&mut self) -> Result<()> {
        if let Some(i) = self.bonds.lists().iter().position(|l| l.is_created()) {
            return Err(PeriError::BondsAlreadyCreated(PointHandle(i)));
        }
        let families = self.family.families(&self.points, Configuration::Initial)?;
        let points = &self.points;

        self.bonds
            .lists_mut()
            .par_iter_mut()
            .zip(families.par_iter())
            .enumerate()
            .filter(|(i, _)| !points[*i].omit())
            .try_for_each(|(i, (list, family))| {
                if family.is_empty() {
                    warn!("point {} has no neighbors inside its horizon", points[i].id());
                }
                list.create_initial(PointHandle(i), family, points)
            })?;

        self.initial_family_created = true;
        DamageIndexAggregator::update(&mut self.points, &self.bonds);
        info!(
            "initial family created: {} points, {} bonds",
            self.points.iter().filter(|p| !p.omit()).count(),
            self.bonds.total_bonds()
        );
        Ok(())
    }

    /// Re-derives families in the current configuration and merges them into the
    /// existing bonds. Call after [`Body::build_index`] with [`Configuration::Current`].
    pub fn compute_current_family(&mut self) -> Result<RefreshSummary> {
        // fail before any list is touched
        if let Some((i, _)) = self
            .bonds
            .lists()
            .iter()
            .enumerate()
            .find(|(i, l)| !self.points[*i].omit() && !l.is_created())
        {
            return Err(PeriError::BondsNotCreated(PointHandle(i)));
        }
        let families = self.family.families(&self.points, Configuration::Current)?;
        let points = &self.points;
        let break_on_separation = self.params.break_on_separation;

        let summaries: Vec<RefreshSummary> = self
            .bonds
            .lists_mut()
            .par_iter_mut()
            .zip(families.par_iter())
            .enumerate()
            .filter(|(i, _)| !points[*i].omit())
            .map(|(i, (list, family))| list.refresh(PointHandle(i), family, points, break_on_separation))
            .collect::<Result<Vec<_>>>()?;

        let mut total = RefreshSummary::default();
        for summary in summaries {
            total += summary;
        }

        DamageIndexAggregator::update(&mut self.points, &self.bonds);
        debug!(
            "current family refreshed: {} bonds added, {} broken by separation",
            total.added, total.separated
        );
        Ok(total)
    }

    /// Runs `evaluator` over every alive bond, kills the ones it breaks and
    /// refreshes damage indices. Returns the number of bonds broken.
    pub fn evaluate_bonds<E>(&mut self, evaluator: &E) -> usize
    where
        E: BondEvaluator + ?Sized,
    {
        let points = &self.points;
        let broken: usize = self
            .bonds
            .lists_mut()
            .par_iter_mut()
            .enumerate()
            .map(|(i, list)| {
                let owner = &points[i];
                if owner.omit() {
                    return 0;
                }
                let mut broken = 0;
                for bond in list.alive_mut() {
                    let neighbor = &points[bond.neighbor().index()];
                    if evaluator.evaluate(owner, neighbor, bond) == BondVerdict::Broken && bond.mark_dead() {
                        broken += 1;
                    }
                }
                broken
            })
            .sum();

        DamageIndexAggregator::update(&mut self.points, &self.bonds);
        if broken > 0 {
            debug!("{} bonds broken this pass", broken);
        }
        broken
    }

    /// Driver hook for step `step_index`: in state-based mode, rebuilds the
    /// current index and refreshes bonds every `rebuild_interval` steps.
    pub fn step(&mut self, step_index: usize) -> Result<Option<RefreshSummary>> {
        if self.params.family_mode != FamilyMode::StateBased || step_index % self.params.rebuild_interval != 0 {
            return Ok(None);
        }
        self.build_index(Configuration::Current)?;
        self.compute_current_family().map(Some)
    }

    /// Kills one bond on behalf of an external evaluator. Stored damage indices
    /// catch up on the next [`Body::update_damage_index`].
    pub fn mark_dead(&mut self, bond: BondId) -> Result<bool> {
        self.bonds.mark_dead(bond)
    }

    pub fn find_bond(&self, owner: PointHandle, neighbor: PointHandle) -> Option<BondId> {
        self.bonds.find(owner, neighbor)
    }

    /// Recomputes every point's stored damage index from its bonds.
    pub fn update_damage_index(&mut self) {
        DamageIndexAggregator::update(&mut self.points, &self.bonds);
    }

    pub fn damage_index(&self, handle: PointHandle) -> Result<f64> {
        DamageIndexAggregator::damage_index(&self.bonds, handle)
    }

    pub fn bond_stats(&self, handle: PointHandle) -> Result<BondStats> {
        DamageIndexAggregator::stats(&self.bonds, handle)
    }

    pub fn bonds(&self) -> &BondStore {
        &self.bonds
    }

    pub fn broken_bond_count(&self) -> usize {
        self.bonds.total_dead()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::BoundingBox;

    fn params() -> SimulationParams {
        SimulationParams {
            domain: BoundingBox::new([0.0; 3], [4.0; 3]),
            horizon: 1.1,
            ..SimulationParams::default()
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut body = Body::new(params()).unwrap();
        body.add_point(3, [1.0; 3]).unwrap();
        assert!(matches!(body.add_point(3, [2.0; 3]), Err(PeriError::DuplicatePointId(3))));
        assert_eq!(body.handle_of(3).unwrap(), PointHandle(0));
        assert!(matches!(body.handle_of(4), Err(PeriError::UnknownPointId(4))));
    }

    #[test]
    fn test_duplicate_id_keeps_original_mapping() {
        let mut body = Body::new(params()).unwrap();
        body.add_point(3, [1.0; 3]).unwrap();
        assert!(body.add_point(3, [2.0; 3]).is_err());
        body.add_point(9, [3.0; 3]).unwrap();

        assert_eq!(body.len(), 2);
        assert_eq!(body.handle_of(3).unwrap(), PointHandle(0));
        assert_eq!(body.handle_of(9).unwrap(), PointHandle(1));
        assert_eq!(body.point(body.handle_of(3).unwrap()).unwrap().id(), 3);
    }

    fn state_based_pair() -> (Body, PointHandle, PointHandle) {
        let mut body = Body::new(SimulationParams {
            family_mode: FamilyMode::StateBased,
            ..params()
        })
        .unwrap();
        let a = body.add_point(0, [1.0, 1.0, 1.0]).unwrap();
        let b = body.add_point(1, [2.0, 1.0, 1.0]).unwrap();
        (body, a, b)
    }

    #[test]
    fn test_point_added_after_setup_joins_refresh() {
        let (mut body, a, b) = state_based_pair();
        body.build_index(Configuration::Initial).unwrap();
        body.compute_initial_family().unwrap();

        let c = body.add_point(2, [1.0, 2.0, 1.0]).unwrap();
        assert!(body.bonds().list(c).unwrap().is_created());
        assert!(body.bonds().list(c).unwrap().is_empty());

        body.set_displacement(b, [1.5, 0.0, 0.0]).unwrap();
        let summary = body.step(1).unwrap().unwrap();
        assert_eq!(summary, RefreshSummary { added: 2, separated: 2 });
        assert!(body.find_bond(a, c).is_some());
        assert_eq!(body.bonds().list(c).unwrap().initial_family_size(), 0);
    }

    #[test]
    fn test_missing_bond_list_fails_before_any_refresh() {
        let (mut body, a, b) = state_based_pair();
        let c = body.add_point(2, [1.0, 2.0, 1.0]).unwrap();
        body.point_mut(c).unwrap().set_omit(true);
        body.build_index(Configuration::Initial).unwrap();
        body.compute_initial_family().unwrap();

        body.point_mut(c).unwrap().set_omit(false);
        body.set_displacement(b, [1.5, 0.0, 0.0]).unwrap();
        assert!(matches!(body.step(1), Err(PeriError::BondsNotCreated(h)) if h == c));
        assert_eq!(body.broken_bond_count(), 0);
        assert_eq!(body.bonds().list(a).unwrap().alive_count(), 1);
    }

    #[test]
    fn test_initial_family_requires_index() {
        let mut body = Body::new(params()).unwrap();
        body.add_point(0, [1.0; 3]).unwrap();
        assert!(matches!(body.compute_initial_family(), Err(PeriError::IndexNotBuilt)));
    }

    #[test]
    fn test_initial_family_only_once() {
        let mut body = Body::new(params()).unwrap();
        body.add_point(0, [1.0, 1.0, 1.0]).unwrap();
        body.add_point(1, [2.0, 1.0, 1.0]).unwrap();
        body.build_index(Configuration::Initial).unwrap();
        body.compute_initial_family().unwrap();
        assert!(matches!(
            body.compute_initial_family(),
            Err(PeriError::BondsAlreadyCreated(_))
        ));
    }

    #[test]
    fn test_bond_based_step_is_noop() {
        let mut body = Body::new(params()).unwrap();
        body.add_point(0, [1.0, 1.0, 1.0]).unwrap();
        assert_eq!(body.step(0).unwrap(), None);
    }

    #[test]
    fn test_unknown_material() {
        let mut body = Body::new(params()).unwrap();
        body.add_point(0, [1.0; 3]).unwrap();
        assert!(matches!(body.assign_material(9), Err(PeriError::UnknownMaterial(9))));
    }
}
