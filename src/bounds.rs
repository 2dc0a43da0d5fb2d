use serde::{Deserialize, Serialize};

use crate::error::{PeriError, Result};

/// Axis-aligned box enclosing the simulated body.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl BoundingBox {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    /// Checks that every corner coordinate is finite and every axis has positive extent.
    pub fn validate(&self) -> Result<()> {
        for axis in 0..3 {
            let (lo, hi) = (self.min[axis], self.max[axis]);
            if !lo.is_finite() || !hi.is_finite() {
                return Err(PeriError::InvalidDomain(format!(
                    "axis {} has non-finite bounds [{}, {}]",
                    axis, lo, hi
                )));
            }
            if hi <= lo {
                return Err(PeriError::InvalidDomain(format!(
                    "axis {} has empty extent [{}, {}]",
                    axis, lo, hi
                )));
            }
        }
        Ok(())
    }

    pub fn range(&self, axis: usize) -> f64 {
        self.max[axis] - self.min[axis]
    }

    /// Inclusive on both faces.
    pub fn contains(&self, point: &[f64; 3]) -> bool {
        (0..3).all(|axis| point[axis] >= self.min[axis] && point[axis] <= self.max[axis])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_inverted_axis() {
        let bounds = BoundingBox::new([0.0, 5.0, 0.0], [1.0, 4.0, 1.0]);
        assert!(matches!(bounds.validate(), Err(PeriError::InvalidDomain(_))));
    }

    #[test]
    fn test_contains_faces() {
        let bounds = BoundingBox::new([0.0; 3], [2.0; 3]);
        assert!(bounds.contains(&[0.0, 0.0, 0.0]));
        assert!(bounds.contains(&[2.0, 2.0, 2.0]));
        assert!(!bounds.contains(&[2.0, 2.0, 2.000001]));
        assert_eq!(bounds.range(1), 2.0);
    }
}
