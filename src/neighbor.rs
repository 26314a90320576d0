//! Spatial cell list for accelerated pair enumeration (spec.md 4.3).

use nalgebra::Vector3;

use crate::boundary::{BoundaryKind, SimulationBox};
use crate::constants::{CELL_LIST_THRESHOLD, CELL_SIDE_SIGMA_RATIO};

/// A pair of atom indices `(i, j)` with `i < j`, enumerated once each.
pub type Pair = (usize, usize);

/// Spatial hash partitioning the box into cubic cells of side `~cutoff`.
/// Rebuilt from scratch every force call when enabled.
pub struct CellList {
    cells_per_axis: usize,
    cell_side: f64,
    half_side: f64,
    buckets: Vec<Vec<usize>>,
}

/// Whether the cell list should be used for this atom count, per spec.md
/// 4.3: enabled iff N > threshold and there are at least 3 cells per axis.
pub fn should_use_cell_list(atom_count: usize, half_side: f64, sigma: f64) -> bool {
    if atom_count <= CELL_LIST_THRESHOLD {
        log::debug!(
            "cell list disabled: atom_count {atom_count} <= threshold {CELL_LIST_THRESHOLD}, using O(N^2) path"
        );
        return false;
    }
    let cell_side = CELL_SIDE_SIGMA_RATIO * sigma;
    let cells_per_axis = ((2.0 * half_side) / cell_side).floor().max(1.0) as usize;
    let enabled = cells_per_axis >= 3;
    if enabled {
        log::debug!("cell list enabled: {cells_per_axis} cells/axis for {atom_count} atoms");
    } else {
        log::debug!(
            "cell list disabled: only {cells_per_axis} cells/axis (need >= 3), using O(N^2) path"
        );
    }
    enabled
}

impl CellList {
    /// Build a fresh cell list over `positions`, sized from `sigma` and the
    /// box's current half-side.
    pub fn build(positions: &[Vector3<f64>], sim_box: &SimulationBox, sigma: f64) -> Self {
        let cell_side = CELL_SIDE_SIGMA_RATIO * sigma;
        let cells_per_axis = (((2.0 * sim_box.half_side) / cell_side).floor().max(1.0)) as usize;
        let actual_cell_side = (2.0 * sim_box.half_side) / cells_per_axis as f64;
        log::debug!(
            "rebuilding cell list: {} atoms into {}^3 cells (side {:.3} A)",
            positions.len(),
            cells_per_axis,
            actual_cell_side
        );

        let mut buckets = vec![Vec::new(); cells_per_axis.pow(3)];
        for (idx, pos) in positions.iter().enumerate() {
            let cell_index =
                cell_index_of(*pos, sim_box.half_side, actual_cell_side, cells_per_axis);
            buckets[cell_index].push(idx);
        }

        Self {
            cells_per_axis,
            cell_side: actual_cell_side,
            half_side: sim_box.half_side,
            buckets,
        }
    }

    fn linear_index(&self, ix: i64, iy: i64, iz: i64, boundary: BoundaryKind) -> Option<usize> {
        let n = self.cells_per_axis as i64;
        let wrap_or_reject = |v: i64| -> Option<i64> {
            if boundary == BoundaryKind::Periodic {
                Some(v.rem_euclid(n))
            } else if v >= 0 && v < n {
                Some(v)
            } else {
                None
            }
        };
        let x = wrap_or_reject(ix)?;
        let y = wrap_or_reject(iy)?;
        let z = wrap_or_reject(iz)?;
        Some((x * n * n + y * n + z) as usize)
    }

    /// All atom-index pairs `(i, j)`, `i < j`, within interaction range:
    /// pairs inside the same cell, plus one side of each of the 26
    /// neighbouring-cell relations (each unordered cell pair visited once).
    pub fn pairs(&self, boundary: BoundaryKind) -> Vec<Pair> {
        let n = self.cells_per_axis as i64;
        let mut out = Vec::new();

        for cx in 0..n {
            for cy in 0..n {
                for cz in 0..n {
                    let here = (cx * n * n + cy * n + cz) as usize;
                    let here_atoms = &self.buckets[here];

                    // pairs within the same cell: i < j
                    for a in 0..here_atoms.len() {
                        for b in (a + 1)..here_atoms.len() {
                            out.push(order_pair(here_atoms[a], here_atoms[b]));
                        }
                    }

                    // half of the 26 neighbour offsets, so each unordered
                    // cell-pair relation is visited exactly once
                    for (dx, dy, dz) in NEIGHBOUR_OFFSETS_HALF {
                        if let Some(other) =
                            self.linear_index(cx + dx, cy + dy, cz + dz, boundary)
                        {
                            if other == here {
                                continue;
                            }
                            let other_atoms = &self.buckets[other];
                            for &i in here_atoms {
                                for &j in other_atoms {
                                    out.push(order_pair(i, j));
                                }
                            }
                        }
                    }
                }
            }
        }
        out
    }

    pub fn cells_per_axis(&self) -> usize {
        self.cells_per_axis
    }

    pub fn cell_side(&self) -> f64 {
        self.cell_side
    }
}

fn order_pair(a: usize, b: usize) -> Pair {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

fn cell_index_of(
    pos: Vector3<f64>,
    half_side: f64,
    cell_side: f64,
    cells_per_axis: usize,
) -> usize {
    let n = cells_per_axis as i64;
    let axis_index = |x: f64| -> i64 {
        let shifted = x + half_side;
        let idx = (shifted / cell_side).floor() as i64;
        idx.clamp(0, n - 1)
    };
    let ix = axis_index(pos.x);
    let iy = axis_index(pos.y);
    let iz = axis_index(pos.z);
    (ix * n * n + iy * n + iz) as usize
}

/// 13 of the 26 neighbour-cell offsets (one representative of each
/// unordered pair of distinct cells, plus `(0,0,0)` handled separately as
/// the same-cell case); combined with `here`, this enumerates every
/// distinct unordered cell relation exactly once.
const NEIGHBOUR_OFFSETS_HALF: [(i64, i64, i64); 13] = [
    (1, 0, 0),
    (0, 1, 0),
    (0, 0, 1),
    (1, 1, 0),
    (1, -1, 0),
    (1, 0, 1),
    (1, 0, -1),
    (0, 1, 1),
    (0, 1, -1),
    (1, 1, 1),
    (1, 1, -1),
    (1, -1, 1),
    (1, -1, -1),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::BoundaryKind;

    #[test]
    fn threshold_disables_small_systems() {
        assert!(!should_use_cell_list(50, 20.0, 1.0));
    }

    #[test]
    fn threshold_enables_when_cells_are_large_enough() {
        assert!(should_use_cell_list(150, 50.0, 1.0));
    }

    #[test]
    fn too_few_cells_per_axis_disables_list() {
        // half_side tiny relative to sigma => fewer than 3 cells per axis
        assert!(!should_use_cell_list(150, 2.0, 1.0));
    }

    #[test]
    fn cell_list_pairs_agree_with_brute_force() {
        let sim_box = SimulationBox::new(10.0, BoundaryKind::Periodic);
        let positions: Vec<Vector3<f64>> = (0..40)
            .map(|i| {
                let t = i as f64;
                Vector3::new(
                    (t * 0.37).sin() * 9.0,
                    (t * 0.53).cos() * 9.0,
                    (t * 0.71).sin() * 9.0,
                )
            })
            .collect();
        let list = CellList::build(&positions, &sim_box, 1.0);
        let mut cell_pairs: Vec<Pair> = list.pairs(BoundaryKind::Periodic);
        cell_pairs.sort_unstable();
        cell_pairs.dedup();

        // Any pair within one cell width (== the cutoff, since cells are
        // sized ~cutoff) must show up in the cell list's pair enumeration:
        // such a pair is always either co-resident or in adjacent cells.
        let cutoff = list.cell_side();
        let mut within_cutoff: Vec<Pair> = Vec::new();
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                let delta = sim_box.min_image(positions[j] - positions[i]);
                if delta.norm() < cutoff {
                    within_cutoff.push((i, j));
                }
            }
        }
        within_cutoff.sort_unstable();

        for pair in &within_cutoff {
            assert!(cell_pairs.binary_search(pair).is_ok());
        }
    }
}
