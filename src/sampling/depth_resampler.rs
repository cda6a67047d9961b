// Depth Resampler
// Rebuilds a per-wave-type depth model whose slownesses are exactly the
// merged ray parameters, so cumulative integration hits turning points at
// layer boundaries

use super::{MergedSlownesses, TauSample};
use crate::config::TablesConfig;
use crate::errors::TableResult;
use crate::pegasus::PegasusSolver;
use crate::reference_model::RadialModel;
use crate::{WaveType, DTOL};

/// Builds the depth model: samples ordered surface to centre whose
/// slownesses walk the model's slowness profile along the merged grid.
/// Inside a high-slowness zone the merged index runs back up while depth
/// still increases; the one-to-one mapping per monotone stretch is
/// preserved. Discontinuities become runs of samples at one radius.
pub fn resample_depths(
    model: &impl RadialModel,
    wave: WaveType,
    merged: &MergedSlownesses,
    config: &TablesConfig,
) -> TableResult<Vec<TauSample>> {
    let samples = model.samples();
    let vals = &merged.values;
    let conv = *model.conversions();
    let solver = PegasusSolver::new(1e-13, config.max_root_finding_iterations);

    let u = |i: usize| samples[i].slowness(wave);

    // First usable merged value: at or below this type's surface slowness.
    let Some(start) = vals.iter().position(|&v| v <= u(0) + DTOL) else {
        return Ok(Vec::new());
    };

    let mut out: Vec<TauSample> = Vec::new();
    let mut emit = |p: f64, idx: usize, r: f64| {
        let z = conv.flat_z(r.max(conv.surface_radius * 1e-6));
        out.push(TauSample {
            radius: r,
            slowness: p,
            range: 0.0,
            z,
            merged_index: Some(idx),
        });
    };

    emit(vals[start], start, samples[0].radius);
    let mut current = start;

    for i in 0..samples.len() - 1 {
        let (u_hi, u_lo) = (u(i), u(i + 1));
        let (r_hi, r_lo) = (samples[i].radius, samples[i + 1].radius);
        let shell = shell_of_pair(model, i);

        if (u_hi - u_lo).abs() <= DTOL {
            continue;
        }

        if u_lo < u_hi {
            // Normal descent: merged index advances while values stay
            // above the lower endpoint.
            while current + 1 < vals.len() && vals[current + 1] >= u_lo - DTOL {
                current += 1;
                let v = vals[current];
                let r = locate_radius(model, shell, wave, v, r_lo, r_hi, u_lo, u_hi, &solver);
                emit(v, current, r);
            }
        } else {
            // Slowness rising with depth: the walk re-enters merged values
            // already used above, so the index runs backwards.
            while current > 0 && vals[current - 1] <= u_lo + DTOL {
                current -= 1;
                let v = vals[current];
                let r = locate_radius(model, shell, wave, v, r_lo, r_hi, u_lo, u_hi, &solver);
                emit(v, current, r);
            }
        }
    }

    Ok(out)
}

fn shell_of_pair(model: &impl RadialModel, i: usize) -> Option<usize> {
    model
        .shells()
        .iter()
        .position(|s| s.i_top <= i && i + 1 <= s.i_bot)
}

/// Radius at which the model slowness equals v, between the bracketing
/// sample radii. Discontinuity pairs collapse to their shared radius.
/// Pegasus runs on the shell interpolant; a failed bracket falls back to
/// the power-law profile between the two samples.
#[allow(clippy::too_many_arguments)]
fn locate_radius(
    model: &impl RadialModel,
    shell: Option<usize>,
    wave: WaveType,
    v: f64,
    r_lo: f64,
    r_hi: f64,
    u_at_lo: f64,
    u_at_hi: f64,
    solver: &PegasusSolver,
) -> f64 {
    if (r_hi - r_lo).abs() <= DTOL {
        return r_hi;
    }
    if (v - u_at_hi).abs() <= DTOL {
        return r_hi;
    }
    if (v - u_at_lo).abs() <= DTOL {
        return r_lo;
    }
    if let Some(shell) = shell {
        let root = solver.solve(r_lo.max(1e-9), r_hi, |r| {
            let u = model.slowness_in_shell(shell, wave, r);
            if u.is_nan() {
                f64::NAN
            } else {
                u - v
            }
        });
        if root.is_finite() && root >= r_lo - DTOL && root <= r_hi + DTOL {
            return root;
        }
    }
    // Power-law fallback between the two samples.
    if r_lo <= 0.0 || (u_at_hi - u_at_lo).abs() <= DTOL {
        return r_lo.max(0.0);
    }
    let exponent = (u_at_lo / u_at_hi).ln() / (r_lo / r_hi).ln();
    r_hi * (v / u_at_hi).powf(1.0 / exponent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TablesConfig;
    use crate::reference_model::ReferenceModel;
    use crate::resampled_model::ResampledModel;
    use crate::sampling::{merge_slownesses, sample_slownesses};
    use earth_model::parse_model;

    const CORED: &str = "\
toy cored model
8
1 0.0    13.0 11.0 11.0 3.5 3.5 1.0 85.0 600.0
2 1217.5 12.8 11.0 11.0 3.5 3.5 1.0 85.0 600.0
3 1217.5 12.1 10.2 10.2 0.0 0.0 1.0 0.0 600.0
4 3479.5 10.0 8.0  8.0  0.0 0.0 1.0 0.0 600.0
5 3479.5 5.5  13.7 13.7 7.2 7.2 1.0 300.0 600.0
6 5000.0 4.5  11.0 11.0 6.2 6.2 1.0 300.0 600.0
7 6000.0 3.5  9.0  9.0  5.0 5.0 1.0 300.0 600.0
8 6371.0 2.7  5.8  5.8  3.4 3.4 1.0 300.0 600.0
";

    fn pipeline() -> (ResampledModel, MergedSlownesses) {
        let config = TablesConfig::default();
        let file = parse_model(CORED).unwrap();
        let reference = ReferenceModel::build(&file, &config).unwrap();
        let model = ResampledModel::build(&reference, &config).unwrap();
        let p = sample_slownesses(&model, WaveType::P, &config).unwrap();
        let s = sample_slownesses(&model, WaveType::S, &config).unwrap();
        let merged = merge_slownesses(
            &p,
            &s,
            &model.critical_slownesses(WaveType::P),
            &model.critical_slownesses(WaveType::S),
        );
        (model, merged)
    }

    #[test]
    fn test_depth_model_slownesses_on_merged_grid() {
        let config = TablesConfig::default();
        let (model, merged) = pipeline();
        for wave in [WaveType::P, WaveType::S] {
            let depth = resample_depths(&model, wave, &merged, &config).unwrap();
            assert!(!depth.is_empty());
            for d in &depth {
                let idx = d.merged_index.expect("depth samples carry an index");
                assert!((merged.values[idx] - d.slowness).abs() <= DTOL);
            }
        }
    }

    #[test]
    fn test_depth_model_monotone_depth() {
        let config = TablesConfig::default();
        let (model, merged) = pipeline();
        let depth = resample_depths(&model, WaveType::P, &merged, &config).unwrap();
        for pair in depth.windows(2) {
            assert!(
                pair[1].radius <= pair[0].radius + 1e-9,
                "depth model must not ascend"
            );
        }
        // Reaches the centre.
        assert!(depth.last().unwrap().radius <= 1.0);
    }

    #[test]
    fn test_discontinuity_runs_share_radius() {
        let config = TablesConfig::default();
        let (model, merged) = pipeline();
        let depth = resample_depths(&model, WaveType::P, &merged, &config).unwrap();
        // At the core-mantle boundary there is a run of equal radii: the
        // mantle-bottom slowness down to the core-top slowness.
        let at_cmb: Vec<_> = depth
            .iter()
            .filter(|d| (d.radius - 3479.5).abs() < 1e-6)
            .collect();
        assert!(at_cmb.len() >= 2, "expected a run at the CMB");
        // The P slowness rises across the boundary (the core shadow), so
        // the run ascends from the mantle-bottom to the core-top value.
        let u_mantle_bottom = 3479.5 / (13.7 * 6371.0);
        let u_core_top = 3479.5 / (8.0 * 6371.0);
        let lo = at_cmb.iter().map(|d| d.slowness).fold(f64::MAX, f64::min);
        let hi = at_cmb.iter().map(|d| d.slowness).fold(f64::MIN, f64::max);
        assert!((lo - u_mantle_bottom).abs() < 1e-6);
        assert!((hi - u_core_top).abs() < 1e-6);
    }

    #[test]
    fn test_radius_slowness_consistency() {
        let config = TablesConfig::default();
        let (model, merged) = pipeline();
        let depth = resample_depths(&model, WaveType::S, &merged, &config).unwrap();
        for d in &depth {
            if d.radius <= 1.0 {
                continue;
            }
            let u = crate::sampling::slowness_at_radius(&model, WaveType::S, d.radius).unwrap();
            assert!(
                (u - d.slowness).abs() <= 1e-5,
                "slowness {} vs model {} at r {}",
                d.slowness,
                u,
                d.radius
            );
        }
    }
}
