use crate::bond::Bond;
use crate::point::{Configuration, Point};

/// Decision returned by a [`BondEvaluator`] for one bond in one step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BondVerdict {
    Intact,
    Broken,
}

/// Stress/damage model hook evaluated once per alive bond per step.
///
/// The evaluator may record damage on the bond; killing it is done by the
/// caller when the verdict is [`BondVerdict::Broken`]. Dead bonds are never
/// passed in.
pub trait BondEvaluator: Send + Sync {
    fn evaluate(&self, owner: &Point, neighbor: &Point, bond: &mut Bond) -> BondVerdict;
}

/// Breaks a bond once its current stretch exceeds the critical stretch.
///
/// Uses the bond's own critical stretch unless an override is set. The peak
/// normalized stretch `s / s_c` seen so far is kept as the bond's damage.
#[derive(Clone, Copy, Debug, Default)]
pub struct CriticalStretch {
    pub critical_stretch: Option<f64>,
}

impl CriticalStretch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(critical_stretch: f64) -> Self {
        CriticalStretch {
            critical_stretch: Some(critical_stretch),
        }
    }
}

impl BondEvaluator for CriticalStretch {
    fn evaluate(&self, owner: &Point, neighbor: &Point, bond: &mut Bond) -> BondVerdict {
        let critical = self.critical_stretch.unwrap_or(bond.critical_stretch());
        let stretch = bond.stretch(owner.distance_in(neighbor, Configuration::Current));

        if critical.is_finite() && critical > 0.0 {
            bond.raise_damage(stretch / critical);
        }
        if stretch > critical {
            BondVerdict::Broken
        } else {
            BondVerdict::Intact
        }
    }
}

impl<F> BondEvaluator for F
where
    F: Fn(&Point, &Point, &mut Bond) -> BondVerdict + Send + Sync,
{
    fn evaluate(&self, owner: &Point, neighbor: &Point, bond: &mut Bond) -> BondVerdict {
        self(owner, neighbor, bond)
    }
}
