//! Nose-Hoover chain thermostat with a Berendsen fallback on numerical
//! failure (spec.md 4.8).

use nalgebra::Vector3;

use crate::constants::BOLTZMANN;

/// Number of inner Yoshida-like substeps per `apply` call.
const YOSHIDA_SUBSTEPS: usize = 1;

/// A Nose-Hoover chain of length `M >= 3` coupled to a system with `dof`
/// degrees of freedom at target temperature `target_t`.
#[derive(Debug, Clone)]
pub struct NoseHooverChain {
    pub xi: Vec<f64>,
    pub p_xi: Vec<f64>,
    pub q: Vec<f64>,
    pub target_t: f64,
    pub dof: f64,
    pub tau: f64,
}

impl NoseHooverChain {
    /// Build a chain of `length` links (length must be >= 3, per spec.md 3).
    pub fn new(length: usize, dof: f64, target_t: f64, tau: f64) -> Self {
        let length = length.max(3);
        let four_pi2 = 4.0 * std::f64::consts::PI * std::f64::consts::PI;
        let mut q = vec![BOLTZMANN * target_t * tau * tau / four_pi2; length];
        q[0] = dof * BOLTZMANN * target_t * tau * tau / four_pi2;
        Self {
            xi: vec![0.0; length],
            p_xi: vec![0.0; length],
            q,
            target_t,
            dof,
            tau,
        }
    }

    pub fn length(&self) -> usize {
        self.xi.len()
    }

    pub fn is_finite(&self) -> bool {
        self.xi.iter().all(|x| x.is_finite()) && self.p_xi.iter().all(|p| p.is_finite())
    }

    pub fn reset(&mut self) {
        for x in self.xi.iter_mut() {
            *x = 0.0;
        }
        for p in self.p_xi.iter_mut() {
            *p = 0.0;
        }
    }

    /// G_0 = 2*KE - DoF*k_B*T (equipartition target, `2*KE_target = DoF kT`).
    fn g0(&self, kinetic_energy: f64) -> f64 {
        2.0 * kinetic_energy - self.dof * BOLTZMANN * self.target_t
    }

    /// G_i>0 = p_xi[i-1]^2/Q[i-1] - KE_target/DoF = ... - 0.5*k_B*T.
    fn g_upper(&self, i: usize) -> f64 {
        self.p_xi[i - 1] * self.p_xi[i - 1] / self.q[i - 1] - 0.5 * BOLTZMANN * self.target_t
    }

    fn sweep(&mut self, kinetic_energy: &mut f64, dt_sub: f64, forward: bool) {
        let m = self.length();
        let dt4 = dt_sub / 4.0;
        let dt8 = dt_sub / 8.0;

        let indices: Vec<usize> = if forward {
            (0..m).collect()
        } else {
            (0..m).rev().collect()
        };

        for &i in &indices {
            if i < m - 1 {
                let factor = (-self.p_xi[i + 1] / self.q[i + 1] * dt8).exp();
                self.p_xi[i] *= factor;
            }
            let g_i = if i == 0 { self.g0(*kinetic_energy) } else { self.g_upper(i) };
            self.p_xi[i] += g_i * dt4;
            if i < m - 1 {
                let factor = (-self.p_xi[i + 1] / self.q[i + 1] * dt8).exp();
                self.p_xi[i] *= factor;
            }
        }
    }

    /// One inner Yoshida substep: backward sweep, position half-integration,
    /// velocity scaling, position half-integration, forward sweep.
    fn inner_substep(&mut self, kinetic_energy: &mut f64, dt_sub: f64) -> f64 {
        self.sweep(kinetic_energy, dt_sub, false);

        for i in 0..self.length() {
            self.xi[i] += (self.p_xi[i] / self.q[i]) * (dt_sub / 2.0);
        }

        let scale = (-(self.p_xi[0] / self.q[0]) * dt_sub).exp();
        *kinetic_energy *= scale * scale;

        for i in 0..self.length() {
            self.xi[i] += (self.p_xi[i] / self.q[i]) * (dt_sub / 2.0);
        }

        self.sweep(kinetic_energy, dt_sub, true);
        scale
    }

    /// Conserved quantity for diagnostics (spec.md 4.8):
    /// `H' = KE + PE + sum 0.5 p_xi_i^2/Q_i + DoF*(T/240)*xi_0 + (T/240)*sum_{i>0} xi_i`.
    pub fn conserved_quantity(&self, kinetic_energy: f64, potential_energy: f64) -> f64 {
        let chain_ke: f64 = self
            .p_xi
            .iter()
            .zip(self.q.iter())
            .map(|(p, q)| 0.5 * p * p / q)
            .sum();
        let chain_pe: f64 = self.dof * (self.target_t / 240.0) * self.xi[0]
            + (self.target_t / 240.0) * self.xi[1..].iter().sum::<f64>();
        kinetic_energy + potential_energy + chain_ke + chain_pe
    }
}

/// Drive `chain` through one thermostat half-step against a scalar
/// kinetic-energy value, returning the velocity-scale factor the caller
/// must apply to whatever degrees of freedom that energy came from. Shared
/// by the particle thermostat below and the MTTK barostat's own chain,
/// which couples to the piston momentum instead of particle velocities.
pub fn drive_chain_scale(chain: &mut NoseHooverChain, kinetic_energy: &mut f64, dt: f64) -> f64 {
    let dt_sub = dt / YOSHIDA_SUBSTEPS as f64;
    let mut total_scale = 1.0;
    for _ in 0..YOSHIDA_SUBSTEPS {
        total_scale *= chain.inner_substep(kinetic_energy, dt_sub);
    }
    total_scale
}

/// Apply one thermostat half-step to `velocities`, with Berendsen fallback
/// on non-finite chain state (spec.md 4.8). `mass` is the uniform per-atom
/// mass of the single-species system.
pub fn apply_half_step(
    chain: &mut NoseHooverChain,
    velocities: &mut [Vector3<f64>],
    mass: f64,
    dt: f64,
) {
    let mut kinetic_energy: f64 = velocities.iter().map(|v| 0.5 * mass * v.norm_squared()).sum();

    let total_scale = drive_chain_scale(chain, &mut kinetic_energy, dt);

    if !chain.is_finite() || !total_scale.is_finite() {
        log::warn!("Nose-Hoover chain became non-finite; resetting and applying Berendsen fallback");
        chain.reset();
        let current_t = crate::constants::temperature_from_ke(
            velocities.iter().map(|v| 0.5 * mass * v.norm_squared()).sum(),
            chain.dof,
        );
        berendsen_rescale(velocities, current_t, chain.target_t, dt);
        return;
    }

    for v in velocities.iter_mut() {
        *v *= total_scale;
    }
}

/// Berendsen weak-coupling rescale: `lambda = sqrt(1 + (dt/tau)*(T_target/T - 1))`,
/// with `tau = 100*dt` as the fallback relaxation time (spec.md 4.8).
pub fn berendsen_rescale(velocities: &mut [Vector3<f64>], current_t: f64, target_t: f64, dt: f64) {
    if current_t <= 0.0 {
        return;
    }
    let tau_relax = 100.0 * dt;
    let lambda_sq = 1.0 + (dt / tau_relax) * (target_t / current_t - 1.0);
    if lambda_sq <= 0.0 {
        return;
    }
    let lambda = lambda_sq.sqrt();
    for v in velocities.iter_mut() {
        *v *= lambda;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::temperature_from_ke;

    fn ke_of(velocities: &[Vector3<f64>], mass: f64) -> f64 {
        velocities.iter().map(|v| 0.5 * mass * v.norm_squared()).sum()
    }

    #[test]
    fn chain_masses_follow_spec_formula() {
        let dof = 21.0;
        let t = 300.0;
        let tau = 0.5;
        let chain = NoseHooverChain::new(3, dof, t, tau);
        let four_pi2 = 4.0 * std::f64::consts::PI * std::f64::consts::PI;
        let expected_q0 = dof * BOLTZMANN * t * tau * tau / four_pi2;
        let expected_qi = BOLTZMANN * t * tau * tau / four_pi2;
        assert!((chain.q[0] - expected_q0).abs() < 1e-12);
        assert!((chain.q[1] - expected_qi).abs() < 1e-12);
    }

    #[test]
    fn thermostat_drives_overheated_system_toward_target() {
        let mass = 39.948;
        let dof = 21.0;
        let target_t = 300.0;
        let mut chain = NoseHooverChain::new(3, dof, target_t, 0.5);

        // start far above target
        let mut rng_val = 1.0;
        let mut velocities: Vec<Vector3<f64>> = (0..8)
            .map(|_| {
                rng_val = (rng_val * 1.37 + 0.21) % 1.0;
                Vector3::new(rng_val - 0.5, (rng_val * 2.0) % 1.0 - 0.5, (rng_val * 3.0) % 1.0 - 0.5)
                    * 5.0
            })
            .collect();

        let initial_t = temperature_from_ke(ke_of(&velocities, mass), dof);
        assert!(initial_t > target_t);

        for _ in 0..2000 {
            apply_half_step(&mut chain, &mut velocities, mass, 0.001);
        }

        let final_t = temperature_from_ke(ke_of(&velocities, mass), dof);
        // should have moved substantially toward the target from a hot start
        assert!(final_t < initial_t);
    }

    #[test]
    fn berendsen_rescale_moves_toward_target() {
        let mut velocities = vec![Vector3::new(1.0, 0.0, 0.0); 4];
        let current_t = 600.0;
        let target_t = 300.0;
        berendsen_rescale(&mut velocities, current_t, target_t, 0.001);
        let mass = 1.0;
        let new_t = temperature_from_ke(ke_of(&velocities, mass), 3.0 * 4.0 - 3.0);
        assert!(new_t < current_t);
    }

    #[test]
    fn reset_zeroes_chain_state() {
        let mut chain = NoseHooverChain::new(3, 10.0, 300.0, 0.5);
        chain.p_xi[0] = 5.0;
        chain.xi[1] = 2.0;
        chain.reset();
        assert!(chain.p_xi.iter().all(|&p| p == 0.0));
        assert!(chain.xi.iter().all(|&x| x == 0.0));
    }
}
