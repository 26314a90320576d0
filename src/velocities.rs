//! Velocity initialisation: Maxwell-Boltzmann sampling, COM removal and
//! exact rescale to the target temperature (spec.md 4.6).

use nalgebra::Vector3;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::constants::{temperature_from_ke, BOLTZMANN};

/// Initialise velocities for `atom_count` atoms of mass `mass` at
/// temperature `t_target`: per-component Maxwell-Boltzmann sampling, then
/// centre-of-mass removal, then an exact uniform rescale so the resulting
/// instantaneous temperature equals `t_target`.
pub fn initialize_velocities<R: Rng>(
    atom_count: usize,
    mass: f64,
    t_target: f64,
    rng: &mut R,
) -> Vec<Vector3<f64>> {
    let sigma_v = (BOLTZMANN * t_target / mass).sqrt();
    let normal = Normal::new(0.0, sigma_v).expect("sigma_v is positive for t_target, mass > 0");
    let mut velocities: Vec<Vector3<f64>> = (0..atom_count)
        .map(|_| {
            Vector3::new(
                normal.sample(rng),
                normal.sample(rng),
                normal.sample(rng),
            )
        })
        .collect();

    remove_com_drift(&mut velocities);
    rescale_to_temperature(&mut velocities, mass, t_target);
    velocities
}

/// Subtract the mean velocity from every atom so the centre of mass is
/// stationary.
pub fn remove_com_drift(velocities: &mut [Vector3<f64>]) {
    if velocities.is_empty() {
        return;
    }
    let mean: Vector3<f64> =
        velocities.iter().sum::<Vector3<f64>>() / velocities.len() as f64;
    for v in velocities.iter_mut() {
        *v -= mean;
    }
}

/// Degrees of freedom after centre-of-mass removal: `3N - 3`.
pub fn degrees_of_freedom(atom_count: usize) -> f64 {
    (3 * atom_count).saturating_sub(3) as f64
}

/// Rescale every velocity uniformly so the instantaneous temperature
/// (computed with `3N-3` degrees of freedom) equals `t_target` exactly.
pub fn rescale_to_temperature(velocities: &mut [Vector3<f64>], mass: f64, t_target: f64) {
    let n = velocities.len();
    if n == 0 {
        return;
    }
    let dof = degrees_of_freedom(n);
    let kinetic_energy: f64 = velocities
        .iter()
        .map(|v| 0.5 * mass * v.norm_squared())
        .sum();
    let current_t = temperature_from_ke(kinetic_energy, dof);
    if current_t <= 0.0 {
        return;
    }
    let lambda = (t_target / current_t).sqrt();
    for v in velocities.iter_mut() {
        *v *= lambda;
    }
}
