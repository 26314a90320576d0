//! Initial atom placement: gas / liquid / solid-like strategies chosen from
//! number density, per spec.md 4.5.

use nalgebra::Vector3;
use rand::Rng;

/// Which placement strategy a density falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementStrategy {
    Gas,
    Liquid,
    Solid,
}

/// Choose a strategy from number density `rho = N / V`.
pub fn strategy_for_density(density: f64) -> PlacementStrategy {
    if density < 0.3 {
        PlacementStrategy::Gas
    } else if density < 0.7 {
        PlacementStrategy::Liquid
    } else {
        PlacementStrategy::Solid
    }
}

/// Place `atom_count` atoms in a cubic box of half-side `half_side`,
/// choosing gas/liquid/solid by density and respecting the documented
/// minimum-separation / jitter rules.
pub fn place_atoms<R: Rng>(
    atom_count: usize,
    half_side: f64,
    atom_radius: f64,
    rng: &mut R,
) -> Vec<Vector3<f64>> {
    let volume = (2.0 * half_side).powi(3);
    let density = atom_count as f64 / volume;
    match strategy_for_density(density) {
        PlacementStrategy::Gas => place_gas(atom_count, half_side, atom_radius, rng),
        PlacementStrategy::Liquid => place_liquid(atom_count, half_side, rng),
        PlacementStrategy::Solid => place_fcc_lattice(atom_count, half_side),
    }
}

fn place_gas<R: Rng>(
    atom_count: usize,
    half_side: f64,
    atom_radius: f64,
    rng: &mut R,
) -> Vec<Vector3<f64>> {
    let min_separation = 2.2 * atom_radius;
    let mut positions: Vec<Vector3<f64>> = Vec::with_capacity(atom_count);

    for _ in 0..atom_count {
        let mut placed = None;
        for _attempt in 0..100 {
            let candidate = random_position(half_side, rng);
            if positions
                .iter()
                .all(|p| (p - candidate).norm() >= min_separation)
            {
                placed = Some(candidate);
                break;
            }
        }
        let candidate = placed.unwrap_or_else(|| random_position(0.9 * half_side, rng));
        positions.push(candidate);
    }
    positions
}

fn place_liquid<R: Rng>(atom_count: usize, half_side: f64, rng: &mut R) -> Vec<Vector3<f64>> {
    let jitter_range = 0.1 * half_side;
    place_fcc_lattice(atom_count, half_side)
        .into_iter()
        .map(|p| {
            p + Vector3::new(
                rng.random_range(-jitter_range..jitter_range),
                rng.random_range(-jitter_range..jitter_range),
                rng.random_range(-jitter_range..jitter_range),
            )
        })
        .collect()
}

fn random_position<R: Rng>(half_side: f64, rng: &mut R) -> Vector3<f64> {
    Vector3::new(
        rng.random_range(-half_side..half_side),
        rng.random_range(-half_side..half_side),
        rng.random_range(-half_side..half_side),
    )
}

/// Canonical FCC basis offsets (in units of the lattice constant), relative
/// to a cell's lower corner.
const FCC_BASIS: [(f64, f64, f64); 4] = [
    (0.0, 0.0, 0.0),
    (0.5, 0.5, 0.0),
    (0.5, 0.0, 0.5),
    (0.0, 0.5, 0.5),
];

/// Build an FCC lattice sized to hold (at least) `atom_count` atoms inside
/// a cubic box of half-side `half_side`, per spec.md 4.5.
pub fn place_fcc_lattice(atom_count: usize, half_side: f64) -> Vec<Vector3<f64>> {
    let cells_per_side = ((atom_count as f64 / 4.0).cbrt().ceil() as usize).max(1);
    let lattice_constant = (2.0 * half_side) / cells_per_side as f64;

    let mut positions = Vec::with_capacity(atom_count);
    'outer: for ix in 0..cells_per_side {
        for iy in 0..cells_per_side {
            for iz in 0..cells_per_side {
                for &(bx, by, bz) in &FCC_BASIS {
                    if positions.len() >= atom_count {
                        break 'outer;
                    }
                    let x = -half_side + (ix as f64 + bx) * lattice_constant;
                    let y = -half_side + (iy as f64 + by) * lattice_constant;
                    let z = -half_side + (iz as f64 + bz) * lattice_constant;
                    positions.push(Vector3::new(x, y, z));
                }
            }
        }
    }
    positions
}
