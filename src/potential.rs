//! Pairwise isotropic potentials: none, Lennard-Jones, soft-sphere
//! (spec.md 4.4).

use serde::{Deserialize, Serialize};

use crate::constants::{CORE_EXCLUSION_SIGMA_RATIO, CUTOFF_SIGMA_RATIO};

/// Which pairwise potential drives the force evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PotentialKind {
    /// Hard-sphere collision-only model: no continuous potential.
    None,
    LennardJones,
    SoftSphere,
}

/// Potential parameters (sigma, epsilon) in internal units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PotentialParams {
    pub sigma: f64,
    pub epsilon: f64,
}

impl PotentialParams {
    pub fn new(sigma: f64, epsilon: f64) -> Self {
        Self { sigma, epsilon }
    }
}

/// The cutoff radius for a potential kind given its sigma. `None` has no
/// finite cutoff (there is nothing to truncate).
pub fn cutoff_radius(kind: PotentialKind, sigma: f64) -> f64 {
    match kind {
        PotentialKind::None => f64::INFINITY,
        PotentialKind::LennardJones | PotentialKind::SoftSphere => CUTOFF_SIGMA_RATIO * sigma,
    }
}

/// Result of evaluating a potential at a single pair separation: potential
/// energy contribution and the scalar radial force magnitude (positive
/// means repulsive, acting along +r from j to i).
#[derive(Debug, Clone, Copy, Default)]
pub struct PairEval {
    pub energy: f64,
    pub force_over_r: f64,
}

/// Evaluate potential energy and `F(r)/r` (so callers can scale by the
/// separation vector directly) for a pair at separation `r`, applying the
/// core-exclusion and cutoff skip rules from spec.md 4.4.
///
/// Returns `None` when the pair should be skipped entirely (too close or
/// beyond the cutoff).
pub fn evaluate_pair(kind: PotentialKind, r: f64, params: PotentialParams) -> Option<PairEval> {
    let PotentialParams { sigma, epsilon } = params;
    match kind {
        PotentialKind::None => Some(PairEval::default()),
        PotentialKind::LennardJones => {
            let rc = cutoff_radius(kind, sigma);
            if r < CORE_EXCLUSION_SIGMA_RATIO * sigma || r > rc {
                return None;
            }
            let sr6 = (sigma / r).powi(6);
            let sr12 = sr6 * sr6;
            let energy = 4.0 * epsilon * (sr12 - sr6);
            let mut force = 24.0 * epsilon * (2.0 * sr12 - sr6) / r;

            // smooth taper over [0.9 rc, rc]
            let taper_start = 0.9 * rc;
            if r > taper_start {
                let x = (r - taper_start) / (0.1 * rc);
                let factor = (1.0 - x * x).max(0.0);
                force *= factor;
            }
            Some(PairEval {
                energy,
                force_over_r: force / r,
            })
        }
        PotentialKind::SoftSphere => {
            let rc = cutoff_radius(kind, sigma);
            if r < CORE_EXCLUSION_SIGMA_RATIO * sigma || r > rc {
                return None;
            }
            let sr12 = (sigma / r).powi(12);
            let energy = epsilon * sr12;
            let force = 12.0 * epsilon * sr12 / r;
            Some(PairEval {
                energy,
                force_over_r: force / r,
            })
        }
    }
}
