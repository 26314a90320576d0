//! MTTK isotropic barostat with its own Nose-Hoover chain (spec.md 4.9).

use std::collections::VecDeque;

use nalgebra::Vector3;

use crate::constants::{temperature_from_ke, BOLTZMANN, PRESSURE_HISTORY_CAPACITY};
use crate::thermostat::{drive_chain_scale, NoseHooverChain};

/// MTK correction factor `alpha = 1 + 3/DoF`, never equal to 1.
pub fn mtk_alpha(dof: f64) -> f64 {
    1.0 + 3.0 / dof
}

/// Martyna-Tobias-Tuckerman-Klein barostat coupling the box volume to the
/// instantaneous pressure via a fictitious piston variable `epsilon`
/// (linear/box-length strain, `L = L0 * exp(epsilon)`, so `V = V0 *
/// exp(3*epsilon)`), itself thermostatted by its own Nose-Hoover chain.
/// `drift` applies `exp(epsilon)` directly to particle positions, so
/// `epsilon` must stay a linear scale, not a volume one.
pub struct MttkBarostat {
    pub epsilon: f64,
    pub p_epsilon: f64,
    pub w: f64,
    pub chain: NoseHooverChain,
    pub alpha: f64,
    pub target_p: f64,
    pub pressure_history: VecDeque<f64>,
}

impl MttkBarostat {
    pub fn new(dof: f64, target_t: f64, target_p: f64, tau_p: f64, nhc_length: usize) -> Self {
        let four_pi2 = 4.0 * std::f64::consts::PI * std::f64::consts::PI;
        let w = dof * BOLTZMANN * target_t * tau_p * tau_p / four_pi2;
        // the barostat's own chain couples to a single fictitious degree of
        // freedom (the piston), so it is built with dof = 1.
        let chain = NoseHooverChain::new(nhc_length, 1.0, target_t, tau_p);
        Self {
            epsilon: 0.0,
            p_epsilon: 0.0,
            w,
            chain,
            alpha: mtk_alpha(dof),
            target_p,
            pressure_history: VecDeque::with_capacity(PRESSURE_HISTORY_CAPACITY),
        }
    }

    /// Volume ratio implied by the current piston strain, `exp(3*epsilon)`.
    /// Cubed relative to the linear scale `drift` applies to positions, so
    /// that feeding this straight into `SimulationBox::scale_volume` (which
    /// cube-roots its argument) recovers the same linear factor.
    pub fn volume_factor(&self) -> f64 {
        (3.0 * self.epsilon).exp()
    }

    fn piston_kinetic_energy(&self) -> f64 {
        0.5 * self.p_epsilon * self.p_epsilon / self.w
    }

    /// Record a pressure sample in the ring buffer, dropping the oldest
    /// sample once the capacity is reached.
    pub fn record_pressure(&mut self, pressure: f64) {
        if self.pressure_history.len() >= PRESSURE_HISTORY_CAPACITY {
            self.pressure_history.pop_front();
        }
        self.pressure_history.push_back(pressure);
    }

    /// Reset the pressure history, e.g. on re-equilibration.
    pub fn reset_pressure_history(&mut self) {
        self.pressure_history.clear();
    }

    pub fn average_pressure(&self) -> f64 {
        if self.pressure_history.is_empty() {
            return 0.0;
        }
        self.pressure_history.iter().sum::<f64>() / self.pressure_history.len() as f64
    }

    /// Step 1/6: update the barostat's own NHC chain by one half-step,
    /// scaling `p_epsilon` accordingly.
    pub fn update_chain_half_step(&mut self, dt: f64) {
        let mut ke = self.piston_kinetic_energy();
        let scale = drive_chain_scale(&mut self.chain, &mut ke, dt);
        if !self.chain.is_finite() || !scale.is_finite() {
            log::warn!("barostat NHC chain became non-finite; resetting");
            self.chain.reset();
            self.p_epsilon = 0.0;
            return;
        }
        self.p_epsilon *= scale;
    }

    /// Step 2/5: update the piston momentum from the pressure imbalance,
    /// `G_eps = 3V(P_inst - P_target)`, `p_eps <- s*(s*p_eps + G_eps*dt/2)`
    /// with `s = exp(-(p_xiB_0/Q_B_0) * dt/4)` (spec.md 4.9).
    pub fn update_piston_momentum(&mut self, pressure_inst: f64, volume: f64, dt: f64) {
        let g_eps = 3.0 * volume * (pressure_inst - self.target_p);
        let s = (-(self.chain.p_xi[0] / self.chain.q[0]) * dt / 4.0).exp();
        self.p_epsilon = s * (s * self.p_epsilon + g_eps * dt / 2.0);
    }

    /// Velocity coupling factor `v_epsilon = p_epsilon / W`.
    pub fn v_epsilon(&self) -> f64 {
        self.p_epsilon / self.w
    }

    /// Scale particle velocities for the barostat-coupled half-kick (step
    /// 3/5 of spec.md 4.9): `v <- exp(-alpha*v_eps*dt/4)*v + sinh-series
    /// term * F/m * dt/2`, with the Taylor fallback for small arguments.
    pub fn apply_velocity_half_kick(
        &self,
        velocities: &mut [Vector3<f64>],
        forces: &[Vector3<f64>],
        mass: f64,
        dt: f64,
    ) {
        let v_eps = self.v_epsilon();
        let x = self.alpha * v_eps * dt / 4.0;
        let exp_factor = (-x).exp();
        let sinh_series = sinh_x_over_x(x);

        for (v, f) in velocities.iter_mut().zip(forces.iter()) {
            *v = (*v) * exp_factor + (f / mass) * (dt / 2.0) * sinh_series * exp_factor;
        }
    }

    /// Full drift with exponential position scaling (step 4/5 of spec.md
    /// 4.9): `r <- exp(2*v_eps*dt/2)*r + exp(v_eps*dt/2)*sinh-term*v*dt`;
    /// the box's linear dimension scales by the same `exp(v_eps*dt)`, kept
    /// in lockstep via `epsilon += v_eps*dt`.
    pub fn drift(&mut self, positions: &mut [Vector3<f64>], velocities: &[Vector3<f64>], dt: f64) {
        let v_eps = self.v_epsilon();
        let pos_scale = (2.0 * v_eps * dt / 2.0).exp();
        let vel_prefactor = (v_eps * dt / 2.0).exp();
        let sinh_series = sinh_x_over_x(v_eps * dt / 2.0);

        for (r, v) in positions.iter_mut().zip(velocities.iter()) {
            *r = (*r) * pos_scale + (*v) * dt * vel_prefactor * sinh_series;
        }
        self.epsilon += v_eps * dt;
    }

    /// Instantaneous MTTK pressure: kinetic + virial + (for LJ) long-range
    /// correction, per spec.md 4.9/4.10.
    pub fn instantaneous_pressure(
        kinetic_energy: f64,
        virial: f64,
        volume: f64,
        lrc: Option<f64>,
    ) -> f64 {
        let base = (2.0 * kinetic_energy + virial) / (3.0 * volume);
        base + lrc.unwrap_or(0.0)
    }

    pub fn current_temperature(&self, kinetic_energy: f64, dof: f64) -> f64 {
        temperature_from_ke(kinetic_energy, dof)
    }
}

/// `sinh(x)/x`, with a Taylor-series fallback for `|x| < 1e-6` to avoid
/// catastrophic cancellation near zero (spec.md 4.9).
fn sinh_x_over_x(x: f64) -> f64 {
    if x.abs() < 1e-6 {
        1.0 + x * x / 6.0
    } else {
        x.sinh() / x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_is_never_exactly_one() {
        assert!((mtk_alpha(21.0) - 1.0).abs() > 1e-6);
    }

    #[test]
    fn sinh_series_matches_taylor_near_zero() {
        let a = sinh_x_over_x(1e-8);
        let b = sinh_x_over_x(-1e-8);
        assert!((a - 1.0).abs() < 1e-10);
        assert!((b - 1.0).abs() < 1e-10);
    }

    #[test]
    fn sinh_series_matches_direct_formula_away_from_zero() {
        let x = 0.5;
        let direct = x.sinh() / x;
        assert!((sinh_x_over_x(x) - direct).abs() < 1e-12);
    }

    #[test]
    fn pressure_history_respects_capacity() {
        let mut barostat = MttkBarostat::new(21.0, 300.0, 1.0, 1.0, 3);
        for i in 0..(PRESSURE_HISTORY_CAPACITY + 10) {
            barostat.record_pressure(i as f64);
        }
        assert_eq!(barostat.pressure_history.len(), PRESSURE_HISTORY_CAPACITY);
    }

    #[test]
    fn volume_factor_starts_at_one() {
        let barostat = MttkBarostat::new(21.0, 300.0, 1.0, 1.0, 3);
        assert!((barostat.volume_factor() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn piston_pushes_volume_when_pressure_exceeds_target() {
        let mut barostat = MttkBarostat::new(21.0, 300.0, 1.0, 1.0, 3);
        barostat.update_piston_momentum(5.0, 1000.0, 0.001);
        assert!(barostat.p_epsilon > 0.0);
    }

    #[test]
    fn volume_factor_fed_through_scale_volume_matches_drifts_linear_scale() {
        use crate::boundary::{BoundaryKind, SimulationBox};

        let mut barostat = MttkBarostat::new(21.0, 300.0, 1.0, 1.0, 3);
        let mut sim_box = SimulationBox::new(10.0, BoundaryKind::Periodic);
        let half_side_before = sim_box.half_side;

        let mut positions = vec![Vector3::new(1.0, 2.0, 3.0)];
        let velocities = vec![Vector3::new(0.0, 0.0, 0.0)];
        barostat.p_epsilon = 0.4 * barostat.w;
        let linear_scale = (barostat.v_epsilon() * 0.01).exp();
        barostat.drift(&mut positions, &velocities, 0.01);

        sim_box.scale_volume(barostat.volume_factor());

        assert!((sim_box.half_side / half_side_before - linear_scale).abs() < 1e-9);
    }
}
