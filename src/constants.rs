//! Internal unit system and physical constants.
//!
//! All state inside the engine is carried in *internal* units: length in
//! angstrom (Å), energy in multiples of the LJ well depth ε, temperature in
//! kelvin via the reduced Boltzmann constant below, mass in amu, time in
//! picoseconds (ps), and pressure in atmospheres (atm). Conversions to other
//! user-facing units happen only at the input/output boundary, never inside
//! the integrator or thermostat/barostat code.

/// Boltzmann constant in internal units (K^-1). The teacher's source mixed
/// a `*100 + 273.15` convention with a `*120` convention in different
/// places; this crate uses the `1/120` convention everywhere, per the
/// resolved open question in the specification.
pub const BOLTZMANN: f64 = 1.0 / 120.0;

/// Default inner-substep count per reported integration step.
pub const DEFAULT_SUBSTEPS: usize = 10;

/// Default Nosé-Hoover chain length (thermostat and barostat chains).
pub const DEFAULT_NHC_LENGTH: usize = 3;

/// Default thermostat relaxation time, ps.
pub const DEFAULT_TAU_T: f64 = 0.5;

/// Default barostat relaxation time, ps.
pub const DEFAULT_TAU_P: f64 = 1.0;

/// Maximum atom count accepted by a `SimConfig`.
pub const MAX_ATOMS: usize = 200;

/// Atom count above which the cell list is used in place of the O(N^2) path.
pub const CELL_LIST_THRESHOLD: usize = 100;

/// Cutoff radius as a multiple of sigma for Lennard-Jones and soft-sphere
/// potentials.
pub const CUTOFF_SIGMA_RATIO: f64 = 2.5;

/// Cell side length as a multiple of sigma for the cell list.
pub const CELL_SIDE_SIGMA_RATIO: f64 = 2.5;

/// Core-exclusion distance as a multiple of sigma: pairs closer than this
/// are skipped to avoid a numerical singularity.
pub const CORE_EXCLUSION_SIGMA_RATIO: f64 = 0.1;

/// Ring-buffer capacity for pressure history (see spec.md 4.9).
pub const PRESSURE_HISTORY_CAPACITY: usize = 10_000;

/// Ring-buffer capacity for the rolling observable history (spec.md 3).
pub const OBSERVABLE_HISTORY_CAPACITY: usize = 10_000;

/// Squared velocity below which the "no potential" visualisation jitter
/// kicks in (spec.md 4.4). This is a display concession, not physics.
pub const FREEZE_OUT_V2_THRESHOLD: f64 = 1e-5;

/// Damping factor applied to the velocity component on a reflecting wall
/// bounce (spec.md 4.2).
pub const REFLECT_DAMPING: f64 = 0.98;

/// Species recognised by `SimConfig`, each carrying literature-typical
/// Lennard-Jones parameters. `User` lets the caller supply its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Species {
    He,
    Ne,
    Ar,
    Kr,
    Xe,
    User,
}

/// Default (sigma [Å], epsilon [internal energy units], mass [amu]) for a
/// noble-gas species. `epsilon` is expressed directly in the engine's
/// internal energy unit (one LJ well depth for that species), consistent
/// with the internal unit system described above.
pub fn species_defaults(species: Species) -> Option<(f64, f64, f64)> {
    match species {
        Species::He => Some((2.56, 0.084, 4.0026)),
        Species::Ne => Some((2.75, 0.31, 20.1797)),
        Species::Ar => Some((3.40, 1.00, 39.948)),
        Species::Kr => Some((3.60, 1.42, 83.798)),
        Species::Xe => Some((4.10, 1.77, 131.293)),
        Species::User => None,
    }
}

/// Instantaneous temperature from kinetic energy and the system's degrees
/// of freedom: `T = (2 * KE / DoF) / k_B`.
pub fn temperature_from_ke(kinetic_energy: f64, degrees_of_freedom: f64) -> f64 {
    if degrees_of_freedom <= 0.0 {
        return 0.0;
    }
    (2.0 * kinetic_energy / degrees_of_freedom) / BOLTZMANN
}

/// Mechanical pressure from kinetic energy, virial and volume:
/// `P = (2*KE + virial) / (3V)`, combining the ideal-gas kinetic term with
/// the virial contribution.
pub fn pressure_from_virial(kinetic_energy: f64, virial: f64, volume: f64) -> f64 {
    if volume <= 0.0 {
        return 0.0;
    }
    (2.0 * kinetic_energy + virial) / (3.0 * volume)
}

/// Long-range (tail) correction to the LJ pressure for a cutoff rc, per
/// spec.md 4.10: `(16*pi*rho^2*eps*sigma^3/3) * [(2/3)(sigma/rc)^9 - (sigma/rc)^3]`.
pub fn pressure_tail_correction(sigma: f64, epsilon: f64, rc: f64, density: f64) -> f64 {
    let sr3 = (sigma / rc).powi(3);
    let sr9 = sr3.powi(3);
    (16.0 * std::f64::consts::PI * density * density * epsilon * sigma.powi(3) / 3.0)
        * ((2.0 / 3.0) * sr9 - sr3)
}

/// Long-range (tail) correction to the LJ potential energy for a cutoff rc,
/// per spec.md 4.10: `(8*pi*eps*sigma^3*rho*N/3) * [(sigma/rc)^9/3 - (sigma/rc)^3]`.
pub fn energy_tail_correction(
    sigma: f64,
    epsilon: f64,
    rc: f64,
    density: f64,
    atom_count: usize,
) -> f64 {
    let sr3 = (sigma / rc).powi(3);
    let sr9 = sr3.powi(3);
    (8.0 * std::f64::consts::PI * epsilon * sigma.powi(3) * density * atom_count as f64 / 3.0)
        * (sr9 / 3.0 - sr3)
}

/// Avogadro constant, mol^-1.
pub const AVOGADRO: f64 = 6.022_140_76e23;

/// Cubic angstrom per litre (1 L = 1e27 Å^3).
pub const ANGSTROM3_PER_LITRE: f64 = 1e27;

/// Convert a user-facing molar volume (L/mol) and atom count into the
/// engine's internal total box volume (Å^3): `V = v_molar * 1e27 * N / N_A`.
pub fn box_volume_from_molar(v_molar_l_per_mol: f64, atom_count: usize) -> f64 {
    v_molar_l_per_mol * ANGSTROM3_PER_LITRE * atom_count as f64 / AVOGADRO
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_matches_equipartition() {
        // KE = 0.5 * DoF * k_B * T  =>  T = 2 KE / (DoF k_B)
        let dof = 12.0;
        let t = 250.0;
        let ke = 0.5 * dof * BOLTZMANN * t;
        assert!((temperature_from_ke(ke, dof) - t).abs() < 1e-9);
    }

    #[test]
    fn zero_dof_is_zero_temperature() {
        assert_eq!(temperature_from_ke(10.0, 0.0), 0.0);
    }

    #[test]
    fn molar_volume_conversion_scales_with_atom_count() {
        let v1 = box_volume_from_molar(22.4, 1);
        let v2 = box_volume_from_molar(22.4, 2);
        assert!((v2 - 2.0 * v1).abs() < 1e-6);
    }

    #[test]
    fn species_defaults_present_for_noble_gases() {
        for species in [Species::He, Species::Ne, Species::Ar, Species::Kr, Species::Xe] {
            assert!(species_defaults(species).is_some());
        }
        assert!(species_defaults(Species::User).is_none());
    }
}
