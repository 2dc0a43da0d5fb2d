use std::fmt;

use serde::{Deserialize, Serialize};

use crate::material::NodeMaterial;

/// Stable index of a point inside its body's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PointHandle(pub usize);

impl PointHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for PointHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which coordinates a neighbor search buckets and measures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Configuration {
    /// Reference (undeformed) position only.
    Initial,
    /// Reference position plus displacement.
    Current,
}

/// A material point (node or particle) of a discretized body.
#[derive(Clone, Debug)]
pub struct Point {
    id: u64,
    position: [f64; 3],
    displacement: [f64; 3],
    velocity: [f64; 3],
    horizon: f64,
    material: NodeMaterial,
    omit: bool,
    damage_index: f64,
}

impl Point {
    pub fn new(id: u64, position: [f64; 3], horizon: f64) -> Self {
        Point {
            id,
            position,
            displacement: [0.0; 3],
            velocity: [0.0; 3],
            horizon,
            material: NodeMaterial::default(),
            omit: false,
            damage_index: 0.0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Reference position.
    pub fn position(&self) -> [f64; 3] {
        self.position
    }

    pub fn displacement(&self) -> [f64; 3] {
        self.displacement
    }

    pub fn set_displacement(&mut self, displacement: [f64; 3]) {
        self.displacement = displacement;
    }

    pub fn velocity(&self) -> [f64; 3] {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: [f64; 3]) {
        self.velocity = velocity;
    }

    pub fn horizon(&self) -> f64 {
        self.horizon
    }

    pub fn set_horizon(&mut self, horizon: f64) {
        self.horizon = horizon;
    }

    pub fn material(&self) -> &NodeMaterial {
        &self.material
    }

    pub(crate) fn set_material(&mut self, material: NodeMaterial) {
        self.material = material;
    }

    pub fn omit(&self) -> bool {
        self.omit
    }

    pub fn set_omit(&mut self, omit: bool) {
        self.omit = omit;
    }

    /// Fraction of this point's bonds that are dead, as of the last aggregation pass.
    pub fn damage_index(&self) -> f64 {
        self.damage_index
    }

    pub(crate) fn set_damage_index(&mut self, damage_index: f64) {
        self.damage_index = damage_index;
    }

    pub fn current_position(&self) -> [f64; 3] {
        [
            self.position[0] + self.displacement[0],
            self.position[1] + self.displacement[1],
            self.position[2] + self.displacement[2],
        ]
    }

    pub fn position_in(&self, configuration: Configuration) -> [f64; 3] {
        match configuration {
            Configuration::Initial => self.position,
            Configuration::Current => self.current_position(),
        }
    }

    pub fn distance_sq_in(&self, other: &Point, configuration: Configuration) -> f64 {
        distance_sq(&self.position_in(configuration), &other.position_in(configuration))
    }

    pub fn distance_in(&self, other: &Point, configuration: Configuration) -> f64 {
        self.distance_sq_in(other, configuration).sqrt()
    }
}

pub fn distance_sq(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}
