use log::debug;

use crate::error::{PeriError, Result};
use crate::material::MaterialHandle;
use crate::point::{Configuration, Point, PointHandle};

/// Directed interaction from the owning point to `neighbor`.
///
/// The only state transition is alive -> dead, and dead is terminal.
#[derive(Clone, Debug, PartialEq)]
pub struct Bond {
    neighbor: PointHandle,
    initial_length: f64,
    micromodulus: f64,
    critical_stretch: f64,
    materials: (MaterialHandle, MaterialHandle),
    alive: bool,
    damage: f64,
}

impl Bond {
    fn between(owner: &Point, neighbor_handle: PointHandle, neighbor: &Point, configuration: Configuration) -> Self {
        Bond {
            neighbor: neighbor_handle,
            initial_length: owner.distance_in(neighbor, configuration),
            micromodulus: 0.5 * (owner.material().micromodulus + neighbor.material().micromodulus),
            critical_stretch: owner.material().critical_stretch.min(neighbor.material().critical_stretch),
            materials: (owner.material().handle, neighbor.material().handle),
            alive: true,
            damage: 0.0,
        }
    }

    pub fn neighbor(&self) -> PointHandle {
        self.neighbor
    }

    /// Rest length the bond was created with.
    pub fn initial_length(&self) -> f64 {
        self.initial_length
    }

    pub fn micromodulus(&self) -> f64 {
        self.micromodulus
    }

    pub fn critical_stretch(&self) -> f64 {
        self.critical_stretch
    }

    /// Material handles of the owning point and the neighbor.
    pub fn materials(&self) -> (MaterialHandle, MaterialHandle) {
        self.materials
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Kills the bond. Returns `true` only on the call that made the transition.
    pub fn mark_dead(&mut self) -> bool {
        let was_alive = self.alive;
        self.alive = false;
        was_alive
    }

    pub fn damage(&self) -> f64 {
        self.damage
    }

    /// Adds an evaluator's damage contribution.
    pub fn accumulate_damage(&mut self, amount: f64) {
        self.damage += amount;
    }

    /// Raises the stored damage to `value` if it is larger.
    pub fn raise_damage(&mut self, value: f64) {
        self.damage = self.damage.max(value);
    }

    /// Engineering stretch for a given current length.
    pub fn stretch(&self, current_length: f64) -> f64 {
        if self.initial_length > 0.0 {
            (current_length - self.initial_length) / self.initial_length
        } else {
            0.0
        }
    }
}

/// Names one bond: the point that owns it and its slot in that point's list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BondId {
    pub owner: PointHandle,
    pub slot: usize,
}

/// Outcome of refreshing one point's bonds against a new family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Bonds created for neighbors seen for the first time.
    pub added: usize,
    /// Alive bonds killed because their neighbor left the horizon.
    pub separated: usize,
}

impl std::ops::AddAssign for RefreshSummary {
    fn add_assign(&mut self, other: Self) {
        self.added += other.added;
        self.separated += other.separated;
    }
}

/// Bonds owned by a single point, sorted by neighbor handle.
///
/// Bonds are never removed, so `len()` is the number of bonds ever created.
#[derive(Clone, Debug, Default)]
pub struct BondList {
    bonds: Vec<Bond>,
    created: bool,
    initial_family_size: usize,
}

impl BondList {
    /// Creates one alive bond per neighbor, measured in the reference configuration.
    pub fn create_initial(&mut self, owner: PointHandle, neighbors: &[PointHandle], points: &[Point]) -> Result<()> {
        if self.created {
            return Err(PeriError::BondsAlreadyCreated(owner));
        }
        let origin = point_at(points, owner)?;
        let mut bonds = Vec::with_capacity(neighbors.len());
        for &n in neighbors {
            let neighbor = point_at(points, n)?;
            bonds.push(Bond::between(origin, n, neighbor, Configuration::Initial));
        }
        bonds.sort_by_key(Bond::neighbor);
        bonds.dedup_by_key(|b| b.neighbor);

        self.initial_family_size = bonds.len();
        self.bonds = bonds;
        self.created = true;
        Ok(())
    }

    /// Merges a current-configuration family into the existing bonds.
    ///
    /// Existing bonds keep their alive flag, damage and rest length; a dead bond
    /// stays dead even if its neighbor is back inside the horizon. New neighbors
    /// get alive bonds whose rest length is their current distance. With
    /// `break_on_separation`, alive bonds whose neighbor is missing from
    /// `neighbors` are killed.
    pub fn refresh(
        &mut self,
        owner: PointHandle,
        neighbors: &[PointHandle],
        points: &[Point],
        break_on_separation: bool,
    ) -> Result<RefreshSummary> {
        if !self.created {
            return Err(PeriError::BondsNotCreated(owner));
        }
        let origin = point_at(points, owner)?;

        let mut current: Vec<PointHandle> = neighbors.to_vec();
        current.sort_unstable();
        current.dedup();

        let mut summary = RefreshSummary::default();

        if break_on_separation {
            for bond in self.bonds.iter_mut().filter(|b| b.alive) {
                if current.binary_search(&bond.neighbor).is_err() && bond.mark_dead() {
                    summary.separated += 1;
                }
            }
        }

        let existing = self.bonds.len();
        for &n in &current {
            if self.bonds[..existing].binary_search_by_key(&n, Bond::neighbor).is_ok() {
                continue;
            }
            let neighbor = point_at(points, n)?;
            self.bonds.push(Bond::between(origin, n, neighbor, Configuration::Current));
            summary.added += 1;
        }
        if summary.added > 0 {
            self.bonds.sort_by_key(Bond::neighbor);
        }

        Ok(summary)
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn initial_family_size(&self) -> usize {
        self.initial_family_size
    }

    pub fn len(&self) -> usize {
        self.bonds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bonds.is_empty()
    }

    pub fn alive_count(&self) -> usize {
        self.bonds.iter().filter(|b| b.alive).count()
    }

    pub fn dead_count(&self) -> usize {
        self.bonds.len() - self.alive_count()
    }

    pub fn all(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn alive(&self) -> impl Iterator<Item = &Bond> + '_ {
        self.bonds.iter().filter(|b| b.alive)
    }

    /// Mutable access to alive bonds only; dead bonds are never revisited.
    pub fn alive_mut(&mut self) -> impl Iterator<Item = &mut Bond> + '_ {
        self.bonds.iter_mut().filter(|b| b.alive)
    }

    pub fn get(&self, slot: usize) -> Option<&Bond> {
        self.bonds.get(slot)
    }

    /// Slot of the bond to `neighbor`, if one was ever created.
    pub fn slot_of(&self, neighbor: PointHandle) -> Option<usize> {
        self.bonds.binary_search_by_key(&neighbor, Bond::neighbor).ok()
    }

    pub fn mark_dead(&mut self, slot: usize) -> Option<bool> {
        self.bonds.get_mut(slot).map(Bond::mark_dead)
    }

    /// Drops every bond so initial bonds can be created again.
    pub fn clear(&mut self) {
        self.bonds.clear();
        self.created = false;
        self.initial_family_size = 0;
    }
}

/// Per-point bond lists for a whole body, indexed by point handle.
#[derive(Clone, Debug, Default)]
pub struct BondStore {
    lists: Vec<BondList>,
}

impl BondStore {
    pub fn new(num_points: usize) -> Self {
        BondStore {
            lists: vec![BondList::default(); num_points],
        }
    }

    /// Grows the store to cover `num_points` points. Existing lists are untouched.
    pub fn resize(&mut self, num_points: usize) {
        if num_points > self.lists.len() {
            self.lists.resize_with(num_points, BondList::default);
        }
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    pub fn list(&self, point: PointHandle) -> Result<&BondList> {
        self.lists.get(point.index()).ok_or(PeriError::UnknownPoint(point))
    }

    pub fn list_mut(&mut self, point: PointHandle) -> Result<&mut BondList> {
        self.lists.get_mut(point.index()).ok_or(PeriError::UnknownPoint(point))
    }

    pub fn lists(&self) -> &[BondList] {
        &self.lists
    }

    pub fn lists_mut(&mut self) -> &mut [BondList] {
        &mut self.lists
    }

    pub fn create_initial_bonds(&mut self, point: PointHandle, neighbors: &[PointHandle], points: &[Point]) -> Result<()> {
        self.list_mut(point)?.create_initial(point, neighbors, points)
    }

    pub fn refresh_bonds(
        &mut self,
        point: PointHandle,
        neighbors: &[PointHandle],
        points: &[Point],
        break_on_separation: bool,
    ) -> Result<RefreshSummary> {
        let summary = self.list_mut(point)?.refresh(point, neighbors, points, break_on_separation)?;
        if summary.added > 0 || summary.separated > 0 {
            debug!("refreshed bonds of point {}: {:?}", point, summary);
        }
        Ok(summary)
    }

    /// Kills `bond`. Idempotent: returns `Ok(false)` if it was already dead.
    pub fn mark_dead(&mut self, bond: BondId) -> Result<bool> {
        self.list_mut(bond.owner)?
            .mark_dead(bond.slot)
            .ok_or(PeriError::UnknownBond {
                owner: bond.owner,
                slot: bond.slot,
            })
    }

    pub fn find(&self, owner: PointHandle, neighbor: PointHandle) -> Option<BondId> {
        let slot = self.lists.get(owner.index())?.slot_of(neighbor)?;
        Some(BondId { owner, slot })
    }

    pub fn bond(&self, bond: BondId) -> Option<&Bond> {
        self.lists.get(bond.owner.index())?.get(bond.slot)
    }

    pub fn all_bonds(&self, point: PointHandle) -> Result<&[Bond]> {
        Ok(self.list(point)?.all())
    }

    pub fn alive_bonds(&self, point: PointHandle) -> Result<impl Iterator<Item = &Bond> + '_> {
        Ok(self.list(point)?.alive())
    }

    pub fn total_bonds(&self) -> usize {
        self.lists.iter().map(BondList::len).sum()
    }

    pub fn total_dead(&self) -> usize {
        self.lists.iter().map(BondList::dead_count).sum()
    }
}

fn point_at(points: &[Point], handle: PointHandle) -> Result<&Point> {
    points.get(handle.index()).ok_or(PeriError::UnknownPoint(handle))
}
