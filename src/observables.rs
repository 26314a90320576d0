//! Instantaneous and time-averaged thermodynamic observables (spec.md 4.10).

use std::collections::VecDeque;

use nalgebra::Vector3;

use crate::constants::{
    energy_tail_correction, pressure_tail_correction, temperature_from_ke, OBSERVABLE_HISTORY_CAPACITY,
};
use crate::potential::PotentialKind;

/// A single reported-step snapshot of the system's thermodynamic state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Observables {
    pub temperature: f64,
    pub pressure: f64,
    pub volume: f64,
    pub kinetic_energy: f64,
    pub potential_energy: f64,
    pub total_energy: f64,
}

/// Clamp the display temperature into `[0, 1000]` K per spec.md 4.10,
/// without touching the underlying dynamics.
pub fn clamp_display_temperature(t: f64) -> f64 {
    if !t.is_finite() {
        return 0.0;
    }
    t.clamp(0.0, 1000.0)
}

/// Compute the instantaneous observables for one reported step.
#[allow(clippy::too_many_arguments)]
pub fn compute_observables(
    kinetic_energy: f64,
    raw_potential_energy: f64,
    virial: f64,
    volume: f64,
    degrees_of_freedom: f64,
    atom_count: usize,
    potential_kind: PotentialKind,
    sigma: f64,
    epsilon: f64,
    cutoff: f64,
) -> Observables {
    let temperature = clamp_display_temperature(temperature_from_ke(kinetic_energy, degrees_of_freedom));
    let density = atom_count as f64 / volume;

    let (pe_lrc, p_lrc) = if potential_kind == PotentialKind::LennardJones && cutoff.is_finite() {
        (
            energy_tail_correction(sigma, epsilon, cutoff, density, atom_count),
            pressure_tail_correction(sigma, epsilon, cutoff, density),
        )
    } else {
        (0.0, 0.0)
    };

    let potential_energy = raw_potential_energy + pe_lrc;
    let pressure = (2.0 * kinetic_energy + virial) / (3.0 * volume) + p_lrc;
    let total_energy = kinetic_energy + potential_energy;

    Observables {
        temperature,
        pressure,
        volume,
        kinetic_energy,
        potential_energy,
        total_energy,
    }
}

/// Total kinetic energy of a single-species system.
pub fn kinetic_energy(velocities: &[Vector3<f64>], mass: f64) -> f64 {
    velocities.iter().map(|v| 0.5 * mass * v.norm_squared()).sum()
}

/// A bounded rolling history of one scalar observable, with the
/// recency-weighted averaging rule from spec.md 4.10: below 10 samples a
/// plain arithmetic mean; at or above 10 samples, the older half of the
/// window is weighted 0.5 and the newer half 1.0.
#[derive(Debug, Clone)]
pub struct RollingHistory {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl RollingHistory {
    pub fn new() -> Self {
        Self::with_capacity(OBSERVABLE_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Plain arithmetic mean of the most recent `n` samples (or all samples
    /// if fewer than `n` have been recorded). Used where a scenario names an
    /// explicit trailing window (spec.md 8's "average over the last 50
    /// steps"/"last 1000 steps") rather than the general recency-weighted
    /// average below.
    pub fn mean_of_last(&self, n: usize) -> f64 {
        let len = self.samples.len();
        if len == 0 {
            return 0.0;
        }
        let take = n.min(len);
        self.samples.iter().rev().take(take).sum::<f64>() / take as f64
    }

    /// The recency-weighted mean described above.
    pub fn weighted_average(&self) -> f64 {
        let n = self.samples.len();
        if n == 0 {
            return 0.0;
        }
        if n < 10 {
            return self.samples.iter().sum::<f64>() / n as f64;
        }
        let half = n / 2;
        let (older, newer) = self.samples.as_slices();
        // samples may straddle the VecDeque's two internal slices; iterate
        // logically by index rather than relying on the physical split.
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for (idx, value) in older.iter().chain(newer.iter()).enumerate() {
            let weight = if idx < half { 0.5 } else { 1.0 };
            weighted_sum += weight * value;
            weight_sum += weight;
        }
        weighted_sum / weight_sum
    }
}

impl Default for RollingHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// The full set of rolling histories the engine keeps per spec.md 3.
#[derive(Debug, Clone, Default)]
pub struct ObservableHistory {
    pub temperature: RollingHistory,
    pub pressure: RollingHistory,
    pub volume: RollingHistory,
    pub kinetic_energy: RollingHistory,
    pub potential_energy: RollingHistory,
    pub total_energy: RollingHistory,
}

impl ObservableHistory {
    pub fn new() -> Self {
        Self {
            temperature: RollingHistory::new(),
            pressure: RollingHistory::new(),
            volume: RollingHistory::new(),
            kinetic_energy: RollingHistory::new(),
            potential_energy: RollingHistory::new(),
            total_energy: RollingHistory::new(),
        }
    }

    pub fn push(&mut self, obs: Observables) {
        self.temperature.push(obs.temperature);
        self.pressure.push(obs.pressure);
        self.volume.push(obs.volume);
        self.kinetic_energy.push(obs.kinetic_energy);
        self.potential_energy.push(obs.potential_energy);
        self.total_energy.push(obs.total_energy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_temperature_is_clamped() {
        assert_eq!(clamp_display_temperature(-5.0), 0.0);
        assert_eq!(clamp_display_temperature(5000.0), 1000.0);
        assert_eq!(clamp_display_temperature(f64::NAN), 0.0);
    }

    #[test]
    fn small_history_uses_arithmetic_mean() {
        let mut h = RollingHistory::new();
        for v in [1.0, 2.0, 3.0] {
            h.push(v);
        }
        assert!((h.weighted_average() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn large_history_weights_recent_half_more() {
        let mut h = RollingHistory::new();
        for _ in 0..10 {
            h.push(0.0);
        }
        for _ in 0..10 {
            h.push(10.0);
        }
        // 10 zeros (older half, weight 0.5) then 10 tens (newer half, weight 1.0)
        let expected = (0.5 * 0.0 * 10.0 + 1.0 * 10.0 * 10.0) / (0.5 * 10.0 + 1.0 * 10.0);
        assert!((h.weighted_average() - expected).abs() < 1e-9);
    }

    #[test]
    fn mean_of_last_uses_only_the_trailing_window() {
        let mut h = RollingHistory::new();
        for v in [1.0, 1.0, 1.0, 9.0, 9.0] {
            h.push(v);
        }
        assert!((h.mean_of_last(2) - 9.0).abs() < 1e-12);
        assert!((h.mean_of_last(100) - 4.2).abs() < 1e-12);
    }

    #[test]
    fn history_respects_capacity() {
        let mut h = RollingHistory::with_capacity(5);
        for v in 0..20 {
            h.push(v as f64);
        }
        assert_eq!(h.len(), 5);
        assert_eq!(h.latest(), Some(19.0));
    }

    #[test]
    fn lrc_only_applied_for_lj() {
        let obs_none = compute_observables(
            10.0,
            5.0,
            1.0,
            1000.0,
            21.0,
            8,
            PotentialKind::None,
            3.4,
            1.0,
            8.5,
        );
        let obs_lj = compute_observables(
            10.0,
            5.0,
            1.0,
            1000.0,
            21.0,
            8,
            PotentialKind::LennardJones,
            3.4,
            1.0,
            8.5,
        );
        assert_eq!(obs_none.potential_energy, 5.0);
        assert_ne!(obs_lj.potential_energy, 5.0);
    }
}
