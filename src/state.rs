//! Per-run mutable state owned exclusively by the engine driver
//! (spec.md 3): atom positions/velocities/forces and run timing.

use nalgebra::Vector3;

/// Positions, velocities and forces for every atom in the system. All four
/// sequences (`positions`, `velocities`, `forces`, `forces_prev`) share the
/// same length `N`.
#[derive(Debug, Clone)]
pub struct AtomState {
    pub positions: Vec<Vector3<f64>>,
    pub velocities: Vec<Vector3<f64>>,
    pub forces: Vec<Vector3<f64>>,
    pub forces_prev: Vec<Vector3<f64>>,
}

impl AtomState {
    pub fn new(atom_count: usize) -> Self {
        Self {
            positions: vec![Vector3::zeros(); atom_count],
            velocities: vec![Vector3::zeros(); atom_count],
            forces: vec![Vector3::zeros(); atom_count],
            forces_prev: vec![Vector3::zeros(); atom_count],
        }
    }

    pub fn atom_count(&self) -> usize {
        self.positions.len()
    }

    /// `true` iff every position, velocity and force component is finite.
    pub fn is_finite(&self) -> bool {
        let all_finite = |v: &[Vector3<f64>]| {
            v.iter()
                .all(|x| x.x.is_finite() && x.y.is_finite() && x.z.is_finite())
        };
        all_finite(&self.positions) && all_finite(&self.velocities) && all_finite(&self.forces)
    }
}

/// Wall-clock and simulated-time bookkeeping for a run (spec.md 3).
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeData {
    pub current_sim_time: f64,
    pub total_sim_time: f64,
    pub wall_run_time: f64,
    pub wall_total_time: f64,
}

impl TimeData {
    pub fn reset_for_run(&mut self, total_sim_time: f64) {
        self.current_sim_time = 0.0;
        self.total_sim_time = total_sim_time;
        self.wall_run_time = 0.0;
    }

    pub fn advance(&mut self, dt: f64, wall_dt: f64) {
        self.current_sim_time += dt;
        self.wall_run_time += wall_dt;
        self.wall_total_time += wall_dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_has_matching_lengths() {
        let s = AtomState::new(5);
        assert_eq!(s.positions.len(), 5);
        assert_eq!(s.velocities.len(), 5);
        assert_eq!(s.forces.len(), 5);
        assert_eq!(s.forces_prev.len(), 5);
        assert!(s.is_finite());
    }

    #[test]
    fn time_advances_monotonically() {
        let mut t = TimeData::default();
        t.reset_for_run(10.0);
        t.advance(0.1, 0.001);
        t.advance(0.1, 0.001);
        assert!(t.current_sim_time <= t.total_sim_time + 1e-12);
        assert!((t.current_sim_time - 0.2).abs() < 1e-12);
    }
}
