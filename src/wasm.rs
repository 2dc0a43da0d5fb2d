use wasm_bindgen::prelude::*;

use crate::body::Body;
use crate::bounds::BoundingBox;
use crate::config::SimulationParams;
use crate::error::PeriError;
use crate::evaluator::CriticalStretch;
use crate::material::Material;
use crate::point::{Configuration, Point, PointHandle};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen_rayon::init_thread_pool;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn init_threads(n: usize) -> js_sys::Promise {
    init_thread_pool(n)
}

fn to_js(e: PeriError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Splits a flat `[x, y, z, x, y, z, ...]` array into triples.
fn triples(values: &[f64], what: &str) -> Result<Vec<[f64; 3]>, PeriError> {
    if values.len() % 3 != 0 {
        return Err(PeriError::InvalidParameter(format!(
            "{} array length {} is not a multiple of 3",
            what,
            values.len()
        )));
    }
    Ok(values.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}

// --- Body ---

/// JavaScript handle to a peridynamic body. Point `i` of the flat arrays has id `i`.
#[wasm_bindgen(js_name = Body)]
pub struct BodyWASM {
    inner: Body,
}

#[wasm_bindgen(js_class = Body)]
impl BodyWASM {
    #[wasm_bindgen(constructor)]
    pub fn new(
        min_x: f64,
        min_y: f64,
        min_z: f64,
        max_x: f64,
        max_y: f64,
        max_z: f64,
        horizon: f64,
    ) -> Result<BodyWASM, JsValue> {
        let params = SimulationParams {
            domain: BoundingBox::new([min_x, min_y, min_z], [max_x, max_y, max_z]),
            horizon,
            ..SimulationParams::default()
        };
        Body::new(params).map(|inner| BodyWASM { inner }).map_err(to_js)
    }

    #[wasm_bindgen(js_name = fromJson)]
    pub fn from_json(json: &str) -> Result<BodyWASM, JsValue> {
        let params = SimulationParams::from_json_str(json).map_err(to_js)?;
        Body::new(params).map(|inner| BodyWASM { inner }).map_err(to_js)
    }

    /// Replaces all points from a flat `[x, y, z, x, y, z, ...]` array. Drops bonds and materials.
    pub fn set_points(&mut self, positions: &[f64]) -> Result<(), JsValue> {
        let horizon = self.inner.params().horizon;
        let points = triples(positions, "position")
            .map_err(to_js)?
            .into_iter()
            .enumerate()
            .map(|(i, p)| Point::new(i as u64, p, horizon))
            .collect();
        self.inner = Body::with_points(self.inner.params().clone(), points).map_err(to_js)?;
        Ok(())
    }

    pub fn add_material(&mut self, id: u32, density: f64, bulk_modulus: f64, critical_stretch: f64) {
        self.inner
            .add_material(Material::new(id, density, bulk_modulus, critical_stretch));
    }

    pub fn assign_material(&mut self, id: u32) -> Result<(), JsValue> {
        self.inner.assign_material(id).map_err(to_js)
    }

    pub fn set_omit(&mut self, index: usize, omit: bool) -> Result<(), JsValue> {
        self.inner.point_mut(PointHandle(index)).map_err(to_js)?.set_omit(omit);
        Ok(())
    }

    /// Sets displacements from a flat array with one triple per point.
    pub fn set_displacements(&mut self, displacements: &[f64]) -> Result<(), JsValue> {
        let offsets = triples(displacements, "displacement").map_err(to_js)?;
        if offsets.len() != self.inner.len() {
            return Err(JsValue::from_str("displacement array must hold three values per point"));
        }
        for (i, d) in offsets.into_iter().enumerate() {
            self.inner.set_displacement(PointHandle(i), d).map_err(to_js)?;
        }
        Ok(())
    }

    /// Builds the reference-configuration index and creates all initial bonds.
    pub fn compute_initial_family(&mut self) -> Result<(), JsValue> {
        self.inner.build_index(Configuration::Initial).map_err(to_js)?;
        self.inner.compute_initial_family().map_err(to_js)
    }

    /// Returns `true` if this step rebuilt the current family.
    pub fn step(&mut self, step_index: usize) -> Result<bool, JsValue> {
        self.inner
            .step(step_index)
            .map(|summary| summary.is_some())
            .map_err(to_js)
    }

    /// Breaks bonds stretched beyond their critical stretch (or `critical_stretch`, if given).
    pub fn break_bonds(&mut self, critical_stretch: Option<f64>) -> usize {
        let evaluator = CriticalStretch { critical_stretch };
        self.inner.evaluate_bonds(&evaluator)
    }

    #[wasm_bindgen(getter)]
    pub fn count_points(&self) -> usize {
        self.inner.len()
    }

    #[wasm_bindgen(getter)]
    pub fn broken_bonds(&self) -> usize {
        self.inner.broken_bond_count()
    }

    pub fn damage(&self) -> Vec<f64> {
        self.inner.points().iter().map(Point::damage_index).collect()
    }

    pub fn bond_counts(&self) -> Vec<u32> {
        self.inner.bonds().lists().iter().map(|l| l.len() as u32).collect()
    }

    pub fn alive_bond_counts(&self) -> Vec<u32> {
        self.inner.bonds().lists().iter().map(|l| l.alive_count() as u32).collect()
    }

    /// Neighbor indices of the alive bonds of point `index`.
    pub fn neighbors(&self, index: usize) -> Result<Vec<u32>, JsValue> {
        let bonds = self.inner.bonds().alive_bonds(PointHandle(index)).map_err(to_js)?;
        Ok(bonds.map(|b| b.neighbor().index() as u32).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triples_split_flat_array() {
        let values = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(triples(&values, "position").unwrap(), vec![[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]]);
        assert!(triples(&[], "position").unwrap().is_empty());
    }

    #[test]
    fn test_trailing_coordinates_rejected() {
        let values = [0.0, 1.0, 2.0, 3.0];
        assert!(matches!(
            triples(&values, "position"),
            Err(PeriError::InvalidParameter(_))
        ));
    }
}
