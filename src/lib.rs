//! # peribonds
//!
//! `peribonds` is the neighbor-family and bond-lifecycle engine of a peridynamic
//! solver, usable from Rust as well as compiled to WebAssembly (WASM). It buckets
//! material points into a uniform grid sized by the horizon, finds every point
//! inside each point's horizon, turns those families into persistent bonds, and
//! tracks their irreversible breakage.
//!
//! ## Features
//!
//! - **Spatial Partitioning**: Cells at least one horizon wide, so a 3x3x3 block search finds every neighbor.
//! - **Collision-free Cell Keys**: Key bit fields are sized to the actual cell counts; oversized grids are rejected up front.
//! - **Bond- and State-based Families**: Freeze the family at t = 0, or merge current-configuration families on a fixed cadence.
//! - **Monotonic Damage**: A dead bond is never revived, and damage indices are recomputed from the bonds each time.
//! - **Parallel**: Family queries, bond refreshes and evaluator passes run on `rayon`.
//!
//! ## Main Interface
//!
//! The primary entry point is the [`Body`] struct, which owns the points, the
//! [`FamilyComputer`] and the [`BondStore`].

mod body;
mod bond;
mod bounds;
mod cell_index;
mod config;
mod damage;
mod error;
mod evaluator;
mod family;
mod grid;
mod material;
mod point;
mod wasm;

pub use body::Body;
pub use bond::{Bond, BondId, BondList, BondStore, RefreshSummary};
pub use bounds::BoundingBox;
pub use cell_index::CellPointIndex;
pub use config::{FamilyMode, SimulationParams};
pub use damage::{BondStats, DamageIndexAggregator};
pub use error::{PeriError, Result};
pub use evaluator::{BondEvaluator, BondVerdict, CriticalStretch};
pub use family::FamilyComputer;
pub use grid::{CellIndex, CellKey, OutOfDomainPolicy, SpatialGrid};
pub use material::{DistributionKind, Material, MaterialDistribution, MaterialHandle, NodeMaterial};
pub use point::{Configuration, Point, PointHandle};
pub use wasm::BodyWASM;
