//! Error types for peribonds.

use thiserror::Error;

use crate::point::{Configuration, PointHandle};

#[derive(Debug, Error)]
pub enum PeriError {
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Invalid horizon {0}: must be positive and finite")]
    InvalidHorizon(f64),

    #[error("Cell key overflow: {cells:?} cells need {bits} key bits, only 64 are available")]
    CellKeyOverflow { cells: [usize; 3], bits: u32 },

    #[error("Point at {position:?} lies outside the domain")]
    OutOfDomain { position: [f64; 3] },

    #[error("Family queried before the cell index was built")]
    IndexNotBuilt,

    #[error("Cell index was built over {indexed} points, body now holds {current}")]
    IndexStale { indexed: usize, current: usize },

    #[error("Cell index was built for the {built:?} configuration, queried for {requested:?}")]
    ConfigurationMismatch {
        built: Configuration,
        requested: Configuration,
    },

    #[error("Point {point} has horizon {horizon}, larger than the grid cell size {cell_size}")]
    HorizonExceedsCell {
        point: PointHandle,
        horizon: f64,
        cell_size: f64,
    },

    #[error("Initial bonds already created for point {0}")]
    BondsAlreadyCreated(PointHandle),

    #[error("Initial bonds not yet created for point {0}")]
    BondsNotCreated(PointHandle),

    #[error("Unknown point handle: {0}")]
    UnknownPoint(PointHandle),

    #[error("Unknown point id: {0}")]
    UnknownPointId(u64),

    #[error("Duplicate point id: {0}")]
    DuplicatePointId(u64),

    #[error("Bond slot {slot} out of range for point {owner}")]
    UnknownBond { owner: PointHandle, slot: usize },

    #[error("Unknown material: {0}")]
    UnknownMaterial(u32),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PeriError>;
