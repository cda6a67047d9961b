// Final Decimation
// ANDs nothing away that any branch wants: unions the per-branch keep
// masks, compacts the master grids, and exports the branch-end set

use super::PhaseBranches;
use crate::sampling::MergedSlownesses;
use crate::tables::WavePieces;
use crate::DTOL;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// The compacted master grids surviving final decimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalGrids {
    /// Union keep mask over the original merged grid.
    pub keep_mask: Vec<bool>,
    /// Compacted master ray-parameter grid.
    pub ray_params: Vec<f64>,
    /// Every branch-endpoint ray parameter, sorted ascending, deduplicated.
    pub branch_end_ray_params: Vec<f64>,
}

/// Ray parameter with a total order, so branch ends can live in a tree
/// set.
#[derive(Debug, Clone, Copy, PartialEq)]
struct OrderedRayParam(f64);

impl Eq for OrderedRayParam {}

impl PartialOrd for OrderedRayParam {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedRayParam {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Applies the union mask: compacts the master ray-parameter grid and
/// both per-wave-type partial tables in parallel, and collects the
/// branch-end tree set. Branch endpoints were forced into the mask when
/// each branch was decimated, so no endpoint can be dropped here.
pub fn finalize_table(
    merged: &MergedSlownesses,
    p_pieces: &WavePieces,
    s_pieces: &WavePieces,
    mut master_keep: Vec<bool>,
    phases: &[PhaseBranches],
) -> (FinalGrids, WavePieces, WavePieces) {
    let mut ends: BTreeSet<OrderedRayParam> = BTreeSet::new();
    for phase in phases {
        for branch in &phase.branches {
            if branch.ray_params.is_empty() {
                continue;
            }
            for &end in [
                branch.ray_params[0],
                branch.ray_params[branch.ray_params.len() - 1],
            ]
            .iter()
            {
                ends.insert(OrderedRayParam(end));
                if let Some(idx) = merged.index_of(end) {
                    master_keep[idx] = true;
                }
            }
        }
    }

    // Critical slownesses anchor the grid no matter what the branches
    // kept.
    for &c in &merged.critical {
        if let Some(idx) = merged.index_of(c) {
            master_keep[idx] = true;
        }
    }

    let ray_params: Vec<f64> = merged
        .values
        .iter()
        .zip(&master_keep)
        .filter(|(_, &k)| k)
        .map(|(&v, _)| v)
        .collect();

    let p_compact = compact_pieces(p_pieces, &master_keep);
    let s_compact = compact_pieces(s_pieces, &master_keep);

    let mut branch_end_ray_params: Vec<f64> = ends.into_iter().map(|o| o.0).collect();
    branch_end_ray_params.dedup_by(|a, b| (*a - *b).abs() <= DTOL);

    (
        FinalGrids {
            keep_mask: master_keep,
            ray_params,
            branch_end_ray_params,
        },
        p_compact,
        s_compact,
    )
}

fn compact_pieces(pieces: &WavePieces, keep: &[bool]) -> WavePieces {
    let pick = |v: &[f64]| -> Vec<f64> {
        v.iter()
            .zip(keep)
            .filter(|(_, &k)| k)
            .map(|(&x, _)| x)
            .collect()
    };
    WavePieces {
        wave: pieces.wave,
        ray_params: pick(&pieces.ray_params),
        mantle_tau: pick(&pieces.mantle_tau),
        mantle_x: pick(&pieces.mantle_x),
        outer_core_tau: pick(&pieces.outer_core_tau),
        outer_core_x: pick(&pieces.outer_core_x),
        inner_core_tau: pick(&pieces.inner_core_tau),
        inner_core_x: pick(&pieces.inner_core_x),
        proxy_p: pick(&pieces.proxy_p),
        proxy_x: pick(&pieces.proxy_x),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branches::BranchData;
    use crate::WaveType;

    fn pieces(n: usize) -> WavePieces {
        WavePieces {
            wave: WaveType::P,
            ray_params: (0..n).map(|k| 1.0 - k as f64 * 0.1).collect(),
            mantle_tau: vec![1.0; n],
            mantle_x: vec![0.5; n],
            outer_core_tau: vec![0.0; n],
            outer_core_x: vec![0.0; n],
            inner_core_tau: vec![0.0; n],
            inner_core_x: vec![0.0; n],
            proxy_p: (0..n).map(|k| 1.0 - k as f64 * 0.1).collect(),
            proxy_x: vec![0.0; n],
        }
    }

    fn branch(p_first: f64, p_last: f64) -> BranchData {
        BranchData {
            phase_code: "P".to_string(),
            segment_codes: ['p', 'P', 'P'],
            mantle_traversals: 1,
            upgoing_sign: -1,
            turning_shell: None,
            turning_shell_name: None,
            is_up_going: false,
            ray_params: vec![p_first, 0.5 * (p_first + p_last), p_last],
            tau: vec![0.0; 3],
            x: vec![0.0; 3],
            basis: Vec::new(),
        }
    }

    #[test]
    fn test_branch_ends_survive_and_dedupe() {
        let merged = MergedSlownesses {
            values: (0..11).map(|k| 1.0 - k as f64 * 0.1).collect(),
            critical: vec![1.0, 0.0],
        };
        let phases = vec![
            PhaseBranches {
                code: "P".to_string(),
                branches: vec![branch(1.0, 0.5)],
            },
            PhaseBranches {
                code: "S".to_string(),
                branches: vec![branch(0.5, 0.0)],
            },
        ];
        let keep = vec![false; 11];
        let (grids, p_c, _) = finalize_table(&merged, &pieces(11), &pieces(11), keep, &phases);

        // The shared 0.5 endpoint appears exactly once.
        let ends = &grids.branch_end_ray_params;
        assert_eq!(ends.iter().filter(|&&v| (v - 0.5).abs() < 1e-12).count(), 1);
        // Sorted ascending, all four distinct endpoint values present.
        assert_eq!(ends.len(), 3);
        assert!(ends.windows(2).all(|w| w[0] < w[1]));
        // Endpoints survive into the compacted grid.
        for &e in ends {
            assert!(grids.ray_params.iter().any(|&v| (v - e).abs() < 1e-12));
        }
        // Pieces compacted in parallel with the grid.
        assert_eq!(p_c.ray_params.len(), grids.ray_params.len());
        assert_eq!(p_c.mantle_tau.len(), grids.ray_params.len());
    }

    #[test]
    fn test_union_semantics() {
        let merged = MergedSlownesses {
            values: vec![1.0, 0.9, 0.8],
            critical: vec![],
        };
        let keep = vec![false, true, false];
        let (grids, _, _) = finalize_table(&merged, &pieces(3), &pieces(3), keep, &[]);
        assert_eq!(grids.ray_params, vec![0.9]);
    }
}
