//! Simulation box and boundary handling (spec.md 4.2).

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::constants::REFLECT_DAMPING;

/// Boundary rule applied at the edges of the simulation cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryKind {
    Reflect,
    Periodic,
}

/// A cubic simulation cell of side `L = 2*half_side`, centred on the origin.
#[derive(Debug, Clone)]
pub struct SimulationBox {
    pub half_side: f64,
    pub kind: BoundaryKind,
}

impl SimulationBox {
    pub fn new(half_side: f64, kind: BoundaryKind) -> Self {
        Self { half_side, kind }
    }

    /// Cube volume `(2*H)^3`.
    pub fn volume(&self) -> f64 {
        (2.0 * self.half_side).powi(3)
    }

    /// Scale the box's half-side so its volume grows/shrinks by `factor`.
    pub fn scale_volume(&mut self, factor: f64) {
        self.half_side *= factor.cbrt();
    }

    /// Map a position into the box. Periodic boundaries wrap every axis
    /// into `[-H, H)`; reflecting boundaries are left untouched (the
    /// reflecting bounce itself is handled by `reflect`, since it also
    /// needs to flip the velocity).
    pub fn wrap(&self, r: Vector3<f64>) -> Vector3<f64> {
        match self.kind {
            BoundaryKind::Reflect => r,
            BoundaryKind::Periodic => Vector3::new(
                wrap_component(r.x, self.half_side),
                wrap_component(r.y, self.half_side),
                wrap_component(r.z, self.half_side),
            ),
        }
    }

    /// Minimum-image displacement for `r_i - r_j`. For periodic boundaries
    /// each component is shifted by a multiple of `2H` so the result lies
    /// in `[-H, H)`; for reflecting boundaries the raw difference is used.
    pub fn min_image(&self, delta: Vector3<f64>) -> Vector3<f64> {
        match self.kind {
            BoundaryKind::Reflect => delta,
            BoundaryKind::Periodic => {
                let l = 2.0 * self.half_side;
                Vector3::new(
                    delta.x - l * (delta.x / l).round(),
                    delta.y - l * (delta.y / l).round(),
                    delta.z - l * (delta.z / l).round(),
                )
            }
        }
    }

    /// Apply the reflecting-wall bounce in place: any axis with
    /// `|r_axis| > H` has its velocity flipped and damped, and its
    /// position clamped just inside the wall. A no-op under periodic
    /// boundaries (callers should use `wrap` there instead).
    pub fn reflect(&self, r: &mut Vector3<f64>, v: &mut Vector3<f64>) {
        if self.kind != BoundaryKind::Reflect {
            return;
        }
        let h = self.half_side;
        for axis in 0..3 {
            if r[axis].abs() > h {
                v[axis] *= -REFLECT_DAMPING;
                r[axis] = r[axis].signum() * 0.99 * h;
            }
        }
    }

    /// Apply whichever boundary rule is active: `wrap` under periodic,
    /// `reflect` (which also damps velocity) under reflecting walls.
    pub fn apply_boundary(&self, r: &mut Vector3<f64>, v: &mut Vector3<f64>) {
        match self.kind {
            BoundaryKind::Periodic => *r = self.wrap(*r),
            BoundaryKind::Reflect => self.reflect(r, v),
        }
    }
}

fn wrap_component(x: f64, half_side: f64) -> f64 {
    let l = 2.0 * half_side;
    // floor-based modulo into [-H, H)
    let shifted = x + half_side;
    let wrapped = shifted - l * (shifted / l).floor();
    wrapped - half_side
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periodic_wrap_is_idempotent() {
        let b = SimulationBox::new(5.0, BoundaryKind::Periodic);
        let r = Vector3::new(12.3, -7.8, 5.0);
        let once = b.wrap(r);
        let twice = b.wrap(once);
        assert!((once - twice).norm() < 1e-12);
        for axis in 0..3 {
            assert!(once[axis] >= -b.half_side && once[axis] < b.half_side);
        }
    }

    #[test]
    fn min_image_within_half_box() {
        let b = SimulationBox::new(5.0, BoundaryKind::Periodic);
        let delta = Vector3::new(9.0, -9.0, 1.0);
        let mi = b.min_image(delta);
        for axis in 0..3 {
            assert!(mi[axis] >= -b.half_side && mi[axis] < b.half_side);
        }
    }

    #[test]
    fn reflect_boundary_is_identity_for_wrap() {
        let b = SimulationBox::new(5.0, BoundaryKind::Reflect);
        let r = Vector3::new(12.3, -7.8, 5.0);
        assert_eq!(b.wrap(r), r);
    }

    #[test]
    fn reflect_flips_and_clamps_out_of_bounds_axis() {
        let b = SimulationBox::new(5.0, BoundaryKind::Reflect);
        let mut r = Vector3::new(5.5, 0.0, 0.0);
        let mut v = Vector3::new(1.0, 0.0, 0.0);
        b.reflect(&mut r, &mut v);
        assert!(r.x.abs() <= b.half_side);
        assert!(v.x < 0.0);
    }

    #[test]
    fn reflect_within_bounds_is_untouched() {
        let b = SimulationBox::new(5.0, BoundaryKind::Reflect);
        let mut r = Vector3::new(1.0, 1.0, 1.0);
        let mut v = Vector3::new(1.0, -1.0, 2.0);
        let r0 = r;
        let v0 = v;
        b.reflect(&mut r, &mut v);
        assert_eq!(r, r0);
        assert_eq!(v, v0);
    }
}
