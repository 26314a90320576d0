//! Run configuration: `SimConfig` and its validation (spec.md 3, 6, 7).

use serde::{Deserialize, Serialize};

use crate::boundary::BoundaryKind;
use crate::constants::{
    species_defaults, DEFAULT_NHC_LENGTH, DEFAULT_SUBSTEPS, DEFAULT_TAU_P, DEFAULT_TAU_T,
    MAX_ATOMS,
};
use crate::error::EngineError;
use crate::potential::PotentialKind;

/// Thermodynamic ensemble the run is driven in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ensemble {
    /// Constant volume, constant temperature.
    Nvt,
    /// Constant pressure, constant temperature.
    Npt,
}

/// Frozen-per-run simulation configuration (spec.md 3). Validated before
/// `Engine::build` allocates any state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub species: crate::constants::Species,
    pub atom_count: usize,
    /// Mass override, amu. `None` uses the species default.
    pub mass: Option<f64>,
    pub potential: PotentialKind,
    /// (sigma, epsilon) override, internal units. `None` uses the species
    /// default; required when `species == User`.
    pub potential_params: Option<(f64, f64)>,
    pub boundary: BoundaryKind,
    pub ensemble: Ensemble,
    /// Target temperature, K.
    pub t_target: f64,
    /// Initial (velocity-seeding) temperature, K. `None` seeds at
    /// `t_target`. Set this distinct from `t_target` to express a hot-start
    /// equilibration run (spec.md 8 scenario 3: seed at 600 K, thermostat
    /// targeting 300 K).
    #[serde(default)]
    pub t_init: Option<f64>,
    /// Initial volume, cubic angstrom.
    pub v_init: f64,
    /// Target pressure, atm. Required (and only meaningful) for NPT.
    pub p_target: Option<f64>,
    /// Reported-step size, ps.
    pub dt: f64,
    pub n_steps: usize,
    /// Reported steps between observable/time callbacks.
    pub report_interval: usize,
    /// Thermostat relaxation time, ps.
    pub tau_t: f64,
    /// Barostat relaxation time, ps.
    pub tau_p: f64,
    /// Nose-Hoover chain length (both thermostat and barostat chains).
    pub nhc_length: usize,
    /// Inner velocity-Verlet substeps per reported step.
    pub substeps: usize,
    /// Seed for the placement/velocity RNG. `None` seeds from system
    /// entropy; pinning it is what makes the cancellation/resume scenario
    /// in spec.md 8 reproducible.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SimConfig {
    /// Convenience constructor with the spec's documented defaults for the
    /// fields most callers leave untouched.
    pub fn new(
        species: crate::constants::Species,
        atom_count: usize,
        potential: PotentialKind,
        boundary: BoundaryKind,
        ensemble: Ensemble,
        t_target: f64,
        v_init: f64,
        dt: f64,
        n_steps: usize,
    ) -> Self {
        Self {
            species,
            atom_count,
            mass: None,
            potential,
            potential_params: None,
            boundary,
            ensemble,
            t_target,
            t_init: None,
            v_init,
            p_target: None,
            dt,
            n_steps,
            report_interval: 1,
            tau_t: DEFAULT_TAU_T,
            tau_p: DEFAULT_TAU_P,
            nhc_length: DEFAULT_NHC_LENGTH,
            substeps: DEFAULT_SUBSTEPS,
            seed: None,
        }
    }

    /// Resolve (sigma, epsilon, mass) from species defaults and overrides.
    pub fn resolve_species_params(&self) -> Result<(f64, f64, f64), EngineError> {
        let defaults = species_defaults(self.species);
        let (sigma, epsilon) = match (self.potential_params, defaults) {
            (Some(p), _) => p,
            (None, Some((s, e, _))) => (s, e),
            (None, None) => {
                return Err(EngineError::config_invalid(
                    "species=User requires an explicit potential_params override",
                ))
            }
        };
        let mass = match (self.mass, defaults) {
            (Some(m), _) => m,
            (None, Some((_, _, m))) => m,
            (None, None) => {
                return Err(EngineError::config_invalid(
                    "species=User requires an explicit mass override",
                ))
            }
        };
        Ok((sigma, epsilon, mass))
    }

    /// Validate every invariant from spec.md 3 and 7. Returns the first
    /// violation found.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.atom_count == 0 || self.atom_count > MAX_ATOMS {
            return Err(EngineError::config_invalid(format!(
                "atom_count must be in [1, {MAX_ATOMS}], got {}",
                self.atom_count
            )));
        }
        let (sigma, epsilon, mass) = self.resolve_species_params()?;
        if sigma <= 0.0 || epsilon <= 0.0 || mass <= 0.0 {
            return Err(EngineError::config_invalid(
                "sigma, epsilon and mass must all be positive",
            ));
        }
        if self.t_target <= 0.0 {
            return Err(EngineError::config_invalid("t_target must be positive"));
        }
        if let Some(t_init) = self.t_init {
            if t_init <= 0.0 {
                return Err(EngineError::config_invalid("t_init must be positive"));
            }
        }
        if self.v_init <= 0.0 {
            return Err(EngineError::config_invalid("v_init must be positive"));
        }
        if self.dt <= 0.0 {
            return Err(EngineError::config_invalid("dt must be positive"));
        }
        if self.report_interval == 0 {
            return Err(EngineError::config_invalid(
                "report_interval must be at least 1",
            ));
        }
        if self.substeps == 0 {
            return Err(EngineError::config_invalid("substeps must be at least 1"));
        }
        if self.nhc_length < 3 {
            return Err(EngineError::config_invalid(
                "nhc_length must be at least 3",
            ));
        }
        if self.tau_t <= 0.0 || self.tau_p <= 0.0 {
            return Err(EngineError::config_invalid(
                "tau_t and tau_p must be positive",
            ));
        }
        match self.ensemble {
            Ensemble::Npt => {
                if self.boundary != BoundaryKind::Periodic {
                    return Err(EngineError::config_invalid(
                        "NPT requires periodic boundaries",
                    ));
                }
                match self.p_target {
                    Some(p) if p > 0.0 => {}
                    _ => {
                        return Err(EngineError::config_invalid(
                            "NPT requires a positive p_target",
                        ))
                    }
                }
            }
            Ensemble::Nvt => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::Species;

    fn base_config() -> SimConfig {
        SimConfig::new(
            Species::Ar,
            10,
            PotentialKind::LennardJones,
            BoundaryKind::Reflect,
            Ensemble::Nvt,
            300.0,
            1000.0,
            0.001,
            100,
        )
    }

    #[test]
    fn valid_nvt_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn npt_requires_periodic_boundary() {
        let mut cfg = base_config();
        cfg.ensemble = Ensemble::Npt;
        cfg.p_target = Some(1.0);
        assert!(cfg.validate().is_err());
        cfg.boundary = BoundaryKind::Periodic;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn npt_requires_p_target() {
        let mut cfg = base_config();
        cfg.ensemble = Ensemble::Npt;
        cfg.boundary = BoundaryKind::Periodic;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn atom_count_out_of_range_rejected() {
        let mut cfg = base_config();
        cfg.atom_count = 0;
        assert!(cfg.validate().is_err());
        cfg.atom_count = 10_000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn user_species_requires_overrides() {
        let mut cfg = base_config();
        cfg.species = Species::User;
        assert!(cfg.validate().is_err());
        cfg.potential_params = Some((3.0, 1.0));
        cfg.mass = Some(30.0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn t_init_defaults_to_none_and_rejects_non_positive_override() {
        let mut cfg = base_config();
        assert_eq!(cfg.t_init, None);
        assert!(cfg.validate().is_ok());
        cfg.t_init = Some(600.0);
        assert!(cfg.validate().is_ok());
        cfg.t_init = Some(0.0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn serde_roundtrip_preserves_config() {
        let cfg = base_config();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: SimConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.atom_count, cfg.atom_count);
        assert_eq!(back.t_target, cfg.t_target);
    }
}
