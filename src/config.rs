use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bounds::BoundingBox;
use crate::error::{PeriError, Result};
use crate::grid::OutOfDomainPolicy;
use crate::material::MaterialDistribution;

/// How a body's families evolve after setup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FamilyMode {
    /// Family frozen at t = 0; bonds only ever die.
    #[default]
    BondBased,
    /// Family periodically re-derived from the current configuration; new neighbors may gain bonds.
    StateBased,
}

/// Parameters of one simulated body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub domain: BoundingBox,
    pub horizon: f64,
    pub family_mode: FamilyMode,
    pub out_of_domain: OutOfDomainPolicy,
    /// Steps between current-family rebuilds in state-based mode.
    pub rebuild_interval: usize,
    pub break_on_separation: bool,
    pub material_distribution: MaterialDistribution,
}

impl Default for SimulationParams {
    fn default() -> Self {
        SimulationParams {
            domain: BoundingBox::new([0.0; 3], [1.0; 3]),
            horizon: 0.1,
            family_mode: FamilyMode::BondBased,
            out_of_domain: OutOfDomainPolicy::Clamp,
            rebuild_interval: 1,
            break_on_separation: true,
            material_distribution: MaterialDistribution::default(),
        }
    }
}

impl SimulationParams {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let params: SimulationParams = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.domain.validate()?;
        if !self.horizon.is_finite() || self.horizon <= 0.0 {
            return Err(PeriError::InvalidHorizon(self.horizon));
        }
        if self.rebuild_interval == 0 {
            return Err(PeriError::InvalidParameter("rebuild_interval must be at least 1".to_string()));
        }
        self.material_distribution.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::DistributionKind;

    #[test]
    fn test_partial_json_uses_defaults() {
        let params = SimulationParams::from_json_str(
            r#"{
                "domain": { "min": [0.0, 0.0, 0.0], "max": [10.0, 10.0, 10.0] },
                "horizon": 1.5,
                "family_mode": "StateBased",
                "material_distribution": { "kind": "Gaussian", "coefficient_of_variation": 0.05, "seed": 11 }
            }"#,
        )
        .unwrap();
        assert_eq!(params.horizon, 1.5);
        assert_eq!(params.family_mode, FamilyMode::StateBased);
        assert_eq!(params.out_of_domain, OutOfDomainPolicy::Clamp);
        assert_eq!(params.rebuild_interval, 1);
        assert_eq!(params.material_distribution.kind, DistributionKind::Gaussian);
        assert_eq!(params.material_distribution.seed, 11);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            SimulationParams::from_json_str(r#"{ "horizon": -1.0 }"#),
            Err(PeriError::InvalidHorizon(_))
        ));
        assert!(matches!(
            SimulationParams::from_json_str(r#"{ "rebuild_interval": 0 }"#),
            Err(PeriError::InvalidParameter(_))
        ));
        assert!(matches!(
            SimulationParams::from_json_str(r#"{ "horizon": "wide" }"#),
            Err(PeriError::JsonError(_))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let params = SimulationParams {
            out_of_domain: OutOfDomainPolicy::Reject,
            ..SimulationParams::default()
        };
        let json = params.to_json_string().unwrap();
        assert_eq!(SimulationParams::from_json_str(&json).unwrap(), params);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            SimulationParams::from_json_file("/nonexistent/peribonds.json"),
            Err(PeriError::IoError(_))
        ));
    }
}
