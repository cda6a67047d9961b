// Slowness Merger
// Unions the P and S slowness grids interval-by-interval between critical
// slownesses, producing the common ray-parameter grid

use super::TauSample;
use crate::DTOL;
use serde::{Deserialize, Serialize};

/// The merged ray-parameter grid, descending from the largest surface
/// slowness to zero, together with the union of critical slownesses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedSlownesses {
    /// Descending, strictly monotone.
    pub values: Vec<f64>,
    /// Union of the P and S critical slownesses, descending.
    pub critical: Vec<f64>,
}

impl MergedSlownesses {
    /// Index of the first grid value at or below the given slowness.
    pub fn index_at_or_below(&self, p: f64) -> usize {
        self.values
            .iter()
            .position(|&v| v <= p + DTOL)
            .unwrap_or(self.values.len().saturating_sub(1))
    }

    /// Index of the grid value equal to p within tolerance, if present.
    pub fn index_of(&self, p: f64) -> Option<usize> {
        self.values.iter().position(|&v| (v - p).abs() <= DTOL)
    }
}

/// Merges the two per-type samplings. For each interval between union
/// critical slownesses, the wave type that generated more samples donates
/// its entire subsequence; alternating interleavings are ill-posed for the
/// downstream depth resampling and are avoided by construction.
pub fn merge_slownesses(
    p_samples: &[TauSample],
    s_samples: &[TauSample],
    p_critical: &[f64],
    s_critical: &[f64],
) -> MergedSlownesses {
    let mut critical: Vec<f64> = p_critical.iter().chain(s_critical.iter()).copied().collect();
    critical.sort_by(|a, b| b.partial_cmp(a).unwrap());
    critical.dedup_by(|a, b| (*a - *b).abs() <= DTOL);

    let mut values: Vec<f64> = Vec::new();
    for window in critical.windows(2) {
        let (hi, lo) = (window[0], window[1]);
        push_unique(&mut values, hi);

        let p_inside = interior(p_samples, hi, lo);
        let s_inside = interior(s_samples, hi, lo);
        let winner = if p_inside.len() >= s_inside.len() {
            p_inside
        } else {
            s_inside
        };
        for v in winner {
            push_unique(&mut values, v);
        }
    }
    if let Some(&last) = critical.last() {
        push_unique(&mut values, last);
    }

    MergedSlownesses { values, critical }
}

/// Tags each per-type sample with its position on the merged grid.
pub fn assign_merged_indices(samples: &mut [TauSample], merged: &MergedSlownesses) {
    for sample in samples.iter_mut() {
        sample.merged_index = merged.index_of(sample.slowness);
    }
}

fn interior(samples: &[TauSample], hi: f64, lo: f64) -> Vec<f64> {
    samples
        .iter()
        .map(|s| s.slowness)
        .filter(|&p| p < hi - DTOL && p > lo + DTOL)
        .collect()
}

fn push_unique(values: &mut Vec<f64>, v: f64) {
    let duplicate = values
        .last()
        .map(|&last| (last - v).abs() <= DTOL)
        .unwrap_or(false);
    if !duplicate {
        values.push(v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(p: f64) -> TauSample {
        TauSample {
            radius: 6000.0,
            slowness: p,
            range: 0.0,
            z: 0.0,
            merged_index: None,
        }
    }

    #[test]
    fn test_denser_type_wins_interval() {
        // P has 3 interior samples in (0.5, 1.0), S has 1.
        let p: Vec<TauSample> = [1.0, 0.9, 0.8, 0.6, 0.5].iter().map(|&v| sample(v)).collect();
        let s: Vec<TauSample> = [1.0, 0.7, 0.5].iter().map(|&v| sample(v)).collect();
        let merged = merge_slownesses(&p, &s, &[1.0, 0.5], &[1.0, 0.5]);
        assert_eq!(merged.values, vec![1.0, 0.9, 0.8, 0.6, 0.5]);
    }

    #[test]
    fn test_critical_slownesses_always_kept() {
        let p: Vec<TauSample> = [1.0, 0.8, 0.5, 0.2, 0.0].iter().map(|&v| sample(v)).collect();
        let s: Vec<TauSample> = [1.2, 1.1, 1.0, 0.9, 0.5, 0.1, 0.0]
            .iter()
            .map(|&v| sample(v))
            .collect();
        let merged = merge_slownesses(&p, &s, &[1.0, 0.5, 0.0], &[1.2, 0.5, 0.0]);
        for c in [1.2, 1.0, 0.5, 0.0] {
            assert!(
                merged.values.iter().any(|&v| (v - c).abs() <= DTOL),
                "critical {} dropped",
                c
            );
        }
        // Strictly descending.
        for pair in merged.values.windows(2) {
            assert!(pair[0] > pair[1]);
        }
    }

    #[test]
    fn test_index_lookup() {
        let p: Vec<TauSample> = [1.0, 0.5, 0.0].iter().map(|&v| sample(v)).collect();
        let merged = merge_slownesses(&p, &[], &[1.0, 0.5, 0.0], &[]);
        assert_eq!(merged.index_of(0.5), Some(1));
        assert_eq!(merged.index_of(0.51), None);
        assert_eq!(merged.index_at_or_below(0.7), 1);
        assert_eq!(merged.index_at_or_below(2.0), 0);
    }

    #[test]
    fn test_merged_indices_assigned() {
        let mut p: Vec<TauSample> = [1.0, 0.5, 0.0].iter().map(|&v| sample(v)).collect();
        let merged = merge_slownesses(&p.clone(), &[], &[1.0, 0.5, 0.0], &[]);
        assign_merged_indices(&mut p, &merged);
        assert_eq!(p[0].merged_index, Some(0));
        assert_eq!(p[2].merged_index, Some(2));
    }
}
