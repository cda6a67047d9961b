// Decimator
// Thins branch samples to an approximately even range spacing. The slow
// mode minimises spacing variance for final branches; the fast mode
// enforces a minimum spacing for up-going stubs.

use statistical::mean;

const MAX_TOGGLE_SWEEPS: usize = 50;
const VAR_EPS: f64 = 1e-15;

/// Spacing variance of a keep pattern: the mean of the squared deviation
/// of each kept-pair range step from the target. Endpoints are always
/// part of the pattern.
pub fn do_var(x: &[f64], keep: &[bool], target: f64) -> f64 {
    let mut devs: Vec<f64> = Vec::new();
    let mut last: Option<usize> = None;
    for (i, &k) in keep.iter().enumerate() {
        if !k {
            continue;
        }
        if let Some(prev) = last {
            let step = (x[i] - x[prev]).abs();
            devs.push((step - target) * (step - target));
        }
        last = Some(i);
    }
    if devs.is_empty() {
        0.0
    } else {
        mean(&devs)
    }
}

/// Slow decimation: returns a keep mask whose spacing variance against
/// the target is locally minimal. Phase 1 greedily accepts the sample
/// nearest each target step; phase 2 toggles interior samples while any
/// toggle lowers the variance, preferring fewer kept samples on ties.
/// Endpoints always survive.
pub fn slow_decimation(x: &[f64], target: f64) -> Vec<bool> {
    let n = x.len();
    if n <= 2 {
        return vec![true; n];
    }
    let mut keep = vec![false; n];
    keep[0] = true;
    keep[n - 1] = true;

    // Phase 1: greedy accept.
    let mut last = 0usize;
    let mut i = 1usize;
    while i < n - 1 {
        let d = (x[i] - x[last]).abs();
        if d >= target {
            let d_prev = (x[i - 1] - x[last]).abs();
            let pick = if i - 1 > last && (d_prev - target).abs() < (d - target).abs() {
                i - 1
            } else {
                i
            };
            keep[pick] = true;
            last = pick;
            i = pick + 1;
        } else {
            i += 1;
        }
    }

    // Phase 2: iterative toggling until a full sweep changes nothing.
    for _ in 0..MAX_TOGGLE_SWEEPS {
        let mut changed = false;
        for i in 1..n - 1 {
            let before = do_var(x, &keep, target);
            let kept_before = keep.iter().filter(|&&k| k).count();
            keep[i] = !keep[i];
            let after = do_var(x, &keep, target);
            let kept_after = keep.iter().filter(|&&k| k).count();

            let improves = after < before - VAR_EPS;
            let tie_with_fewer = (after - before).abs() <= VAR_EPS && kept_after < kept_before;
            if improves || tie_with_fewer {
                changed = true;
            } else {
                keep[i] = !keep[i];
            }
        }
        if !changed {
            break;
        }
    }
    keep
}

/// Fast decimation for up-going branches: estimates the range at each
/// ray parameter from a three-point parabolic derivative of tau(p), then
/// scans from the deepest sample dropping everything whose range step
/// from the last kept sample is below the minimum. One pass, endpoints
/// kept.
pub fn fast_decimation(p: &[f64], tau: &[f64], x_first: f64, x_last: f64, min_dx: f64) -> Vec<bool> {
    let n = p.len();
    if n <= 2 {
        return vec![true; n];
    }
    let mut x_est = vec![0.0; n];
    x_est[0] = x_first;
    x_est[n - 1] = x_last;
    for j in 1..n - 1 {
        let h0 = p[j] - p[j - 1];
        let h1 = p[j + 1] - p[j];
        if h0.abs() < f64::MIN_POSITIVE || h1.abs() < f64::MIN_POSITIVE {
            x_est[j] = x_est[j - 1];
            continue;
        }
        // Parabolic derivative of tau at the middle knot; X = -dtau/dp.
        let s0 = (tau[j] - tau[j - 1]) / h0;
        let s1 = (tau[j + 1] - tau[j]) / h1;
        let slope = (s1 * h0 + s0 * h1) / (h0 + h1);
        x_est[j] = -slope;
    }

    let mut keep = vec![false; n];
    keep[0] = true;
    keep[n - 1] = true;
    let mut last = n - 1;
    for j in (1..n - 1).rev() {
        if (x_est[j] - x_est[last]).abs() >= min_dx {
            keep[j] = true;
            last = j;
        }
    }
    keep
}

/// Folds a branch keep mask into the union mask over the master grid; a
/// master sample survives when any branch wants it.
pub fn union_into(master: &mut [bool], branch_keep: &[bool], offset: usize) {
    for (i, &k) in branch_keep.iter().enumerate() {
        if k {
            if let Some(slot) = master.get_mut(offset + i) {
                *slot = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_grid_keeps_every_third() {
        let x: Vec<f64> = (0..100).map(|k| k as f64).collect();
        let keep = slow_decimation(&x, 3.0);
        assert!(keep[0] && keep[99]);
        let kept: Vec<usize> = keep
            .iter()
            .enumerate()
            .filter(|(_, &k)| k)
            .map(|(i, _)| i)
            .collect();
        // Every third sample: steps of exactly 3 have zero variance.
        assert_eq!(kept.len(), 34);
        for pair in kept.windows(2) {
            assert_eq!(pair[1] - pair[0], 3);
        }
        assert!(do_var(&x, &keep, 3.0) < 1e-12);
    }

    #[test]
    fn test_variance_no_worse_than_hand_patterns() {
        let x: Vec<f64> = (0..100).map(|k| k as f64).collect();
        let keep = slow_decimation(&x, 3.0);
        let var = do_var(&x, &keep, 3.0);
        let kept_count = keep.iter().filter(|&&k| k).count();

        // Hand-constructed patterns with the same kept count.
        let mut shifted = vec![false; 100];
        shifted[0] = true;
        shifted[99] = true;
        let mut i = 2;
        while shifted.iter().filter(|&&k| k).count() < kept_count && i < 99 {
            shifted[i] = true;
            i += 3;
        }
        assert!(var <= do_var(&x, &shifted, 3.0) + 1e-12);

        let mut bunched = vec![false; 100];
        bunched[0] = true;
        bunched[99] = true;
        for j in 1..kept_count - 1 {
            bunched[j] = true;
        }
        assert!(var <= do_var(&x, &bunched, 3.0) + 1e-12);
    }

    #[test]
    fn test_idempotent_under_second_pass() {
        let x: Vec<f64> = (0..100).map(|k| k as f64).collect();
        let keep = slow_decimation(&x, 3.0);
        // Compact the kept samples and decimate again: nothing changes.
        let compact: Vec<f64> = x
            .iter()
            .zip(&keep)
            .filter(|(_, &k)| k)
            .map(|(&v, _)| v)
            .collect();
        let again = slow_decimation(&compact, 3.0);
        assert!(again.iter().all(|&k| k), "second pass must keep everything");
    }

    #[test]
    fn test_endpoints_always_survive() {
        let x: Vec<f64> = (0..10).map(|k| k as f64 * 0.1).collect();
        let keep = slow_decimation(&x, 100.0);
        assert!(keep[0]);
        assert!(keep[9]);
    }

    #[test]
    fn test_fast_decimation_minimum_spacing() {
        // tau(p) linear in p gives a constant range estimate; everything
        // interior collapses onto the endpoints.
        let p: Vec<f64> = (0..20).map(|k| 1.0 - 0.01 * k as f64).collect();
        let tau: Vec<f64> = p.iter().map(|&v| 2.0 - v).collect();
        let keep = fast_decimation(&p, &tau, 1.0, 1.0, 0.5);
        assert!(keep[0] && keep[19]);
        assert!(keep[1..19].iter().all(|&k| !k));
    }

    #[test]
    fn test_fast_decimation_keeps_spread_samples() {
        // Quadratic tau: the range estimate changes linearly, so samples
        // survive at the requested spacing.
        let p: Vec<f64> = (0..50).map(|k| 1.0 - 0.01 * k as f64).collect();
        let tau: Vec<f64> = p.iter().map(|&v| (1.0 - v) * (1.0 - v) * 10.0).collect();
        let x0 = 0.0;
        let x1 = 2.0 * (1.0 - p[49]) * 10.0;
        let keep = fast_decimation(&p, &tau, x0, x1, 1.0);
        let kept = keep.iter().filter(|&&k| k).count();
        assert!(kept > 2, "expected interior survivors, kept {}", kept);
        assert!(kept < 50);
    }

    #[test]
    fn test_union_mask() {
        let mut master = vec![false; 6];
        union_into(&mut master, &[true, false, true], 2);
        assert_eq!(master, vec![false, false, true, false, true, false]);
    }
}
