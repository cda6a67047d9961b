// Slowness Sampler
// Builds the non-uniform slowness grid for one wave type: seeded per
// critical interval, refined around caustics, bounded in range, slowness,
// and bottoming-radius steps

use super::{integrate_path, path_dxdp, slowness_at_radius, TauSample};
use crate::config::TablesConfig;
use crate::errors::TableResult;
use crate::pegasus::PegasusSolver;
use crate::reference_model::RadialModel;
use crate::{WaveType, DTOL};
use tracing::{debug, warn};

/// Hard bounds keeping the seeding and refinement loops finite on
/// pathological models.
const MAX_SEED_SAMPLES: usize = 400;
const MAX_SEGMENT_SAMPLES: usize = 2000;

/// Samples range and slowness between every pair of consecutive critical
/// slownesses of the given wave type.
pub fn sample_slownesses(
    model: &impl RadialModel,
    wave: WaveType,
    config: &TablesConfig,
) -> TableResult<Vec<TauSample>> {
    let criticals = model.critical_slownesses(wave);
    let mut out: Vec<TauSample> = Vec::new();

    for window in criticals.windows(2) {
        let (p_hi, p_lo) = (window[0], window[1]);
        if p_hi - p_lo <= DTOL {
            continue;
        }
        let interval = sample_interval(model, wave, p_hi, p_lo, config)?;
        for sample in interval {
            let duplicate = out
                .last()
                .map(|last| (last.slowness - sample.slowness).abs() <= DTOL)
                .unwrap_or(false);
            if !duplicate {
                out.push(sample);
            }
        }
    }
    debug!(
        wave = ?wave,
        samples = out.len(),
        "slowness sampling complete"
    );
    Ok(out)
}

fn make_sample(model: &impl RadialModel, wave: WaveType, p: f64) -> TableResult<TauSample> {
    let path = integrate_path(model, wave, p)?;
    let radius = model.turning_radius(wave, p).unwrap_or(0.0);
    let conv = model.conversions();
    let z = conv.flat_z(radius.max(conv.surface_radius * 1e-6));
    Ok(TauSample {
        radius,
        slowness: p,
        range: path.x,
        z,
        merged_index: None,
    })
}

fn sample_interval(
    model: &impl RadialModel,
    wave: WaveType,
    p_hi: f64,
    p_lo: f64,
    config: &TablesConfig,
) -> TableResult<Vec<TauSample>> {
    let conv = *model.conversions();
    let span = p_hi - p_lo;

    let top = make_sample(model, wave, p_hi)?;
    let bot = make_sample(model, wave, p_lo)?;

    // Target range step from the shell the interval bottoms in.
    let p_mid = 0.5 * (p_hi + p_lo);
    let dx_shell = model
        .shell_for_turning(wave, p_mid)
        .map(|idx| model.shells()[idx].delta_x_km)
        .unwrap_or(150.0);
    let dx = conv.norm_r(dx_shell);

    let n = (((bot.range - top.range).abs() / dx).ceil() as usize)
        .clamp(1, MAX_SEED_SAMPLES);

    // Quadratic seeding: offsets grow as k^2 so the grid is densest just
    // under the top of a refracting gradient.
    let mut temp = vec![top];
    let dp_quad = span / ((n * n) as f64);
    let dp_lin = span / (n as f64);
    for k in 1..n {
        let kf = k as f64;
        let offset = (kf * kf * dp_quad).min(kf * dp_lin);
        temp.push(make_sample(model, wave, p_hi - offset)?);
    }
    temp.push(bot);

    // Hidden-caustic probe: an interval that seeded only its endpoints may
    // still hide a range extremum.
    if temp.len() == 2 {
        let probe = make_sample(model, wave, p_hi - 0.25 * span)?;
        let d1 = probe.range - temp[0].range;
        let d2 = temp[1].range - probe.range;
        if d1 * d2 < 0.0 {
            temp.insert(1, probe);
        }
    }

    let caustic_slownesses = refine_caustics(model, wave, &mut temp, config)?;

    // Anchors: interval endpoints plus caustic samples.
    let mut anchors = vec![0usize];
    for (i, s) in temp.iter().enumerate() {
        if caustic_slownesses
            .iter()
            .any(|&c| (c - s.slowness).abs() <= DTOL)
        {
            anchors.push(i);
        }
    }
    anchors.push(temp.len() - 1);
    anchors.dedup();

    let mut out: Vec<TauSample> = Vec::new();
    for pair in anchors.windows(2) {
        let segment = refine_segment(model, wave, &temp, pair[0], pair[1], dx, config)?;
        for s in segment {
            let duplicate = out
                .last()
                .map(|last| (last.slowness - s.slowness).abs() <= DTOL)
                .unwrap_or(false);
            if !duplicate {
                out.push(s);
            }
        }
    }
    Ok(out)
}

/// Locates range extrema in the seeded list and replaces the middle
/// sample of each extremum pair with the caustic itself, found by Pegasus
/// on dX/dp. Returns the caustic slownesses that were planted.
fn refine_caustics(
    model: &impl RadialModel,
    wave: WaveType,
    temp: &mut [TauSample],
    config: &TablesConfig,
) -> TableResult<Vec<f64>> {
    let mut planted = Vec::new();
    let solver = PegasusSolver::new(1e-14, config.max_root_finding_iterations);

    for i in 1..temp.len().saturating_sub(1) {
        let d1 = temp[i].range - temp[i - 1].range;
        let d2 = temp[i + 1].range - temp[i].range;
        if d1 * d2 >= 0.0 {
            continue;
        }

        // Bracket in ascending slowness. dX/dp is singular at shell tops,
        // so a NaN at the upper end backs the bracket off by the slowness
        // offset, under a hard iteration cap.
        let mut lower = temp[i + 1].slowness;
        let mut upper = temp[i - 1].slowness;
        let mut backoff = 0usize;
        while path_dxdp(model, wave, upper).is_nan() && backoff < config.max_caustic_backoff_iterations
        {
            upper -= config.slowness_offset;
            backoff += 1;
        }
        while path_dxdp(model, wave, lower).is_nan() && backoff < config.max_caustic_backoff_iterations
        {
            lower += config.slowness_offset;
            backoff += 1;
        }
        if backoff >= config.max_caustic_backoff_iterations {
            warn!(wave = ?wave, "caustic back-off exhausted, keeping seeded sample");
            continue;
        }

        let root = solver.solve(lower, upper, |p| path_dxdp(model, wave, p));
        if root.is_nan() || root <= lower || root >= upper {
            warn!(
                wave = ?wave,
                lower, upper, "caustic bracket failed, keeping seeded sample"
            );
            continue;
        }
        temp[i] = make_sample(model, wave, root)?;
        planted.push(root);
    }
    Ok(planted)
}

/// Walks one anchor-to-anchor segment, accepting samples so that the
/// range, slowness, and bottoming-radius steps all stay bounded.
fn refine_segment(
    model: &impl RadialModel,
    wave: WaveType,
    temp: &[TauSample],
    a: usize,
    b: usize,
    dx_shell: f64,
    config: &TablesConfig,
) -> TableResult<Vec<TauSample>> {
    let start = temp[a];
    let end = temp[b];
    let mut out = vec![start];
    if b <= a + 1
        && (end.range - start.range).abs() <= dx_shell
        && start.slowness - end.slowness <= config.max_slowness_increment
    {
        out.push(end);
        return Ok(out);
    }

    let xtol = config.distance_tolerance;
    let solver = PegasusSolver::new(xtol * 0.1, config.max_root_finding_iterations);

    loop {
        let prev = *out.last().expect("segment always seeded");
        let remaining = end.range - prev.range;
        if remaining.abs() <= xtol || out.len() >= MAX_SEGMENT_SAMPLES {
            break;
        }
        if prev.slowness - end.slowness <= DTOL {
            break;
        }

        // Recompute the step so the segment divides evenly.
        let steps = ((remaining.abs() / dx_shell).ceil()).max(1.0);
        let x_target = prev.range + remaining / steps;

        let mut p_new = solve_for_range(model, wave, temp, a, b, &prev, x_target, &solver);

        // Slowness-step bound, then a uniform fallback step.
        if !p_new.is_finite()
            || p_new >= prev.slowness
            || (prev.slowness - p_new) > config.max_slowness_increment
        {
            let span = prev.slowness - end.slowness;
            let m = ((span / config.max_slowness_increment).ceil()).max(1.0);
            p_new = prev.slowness - span / m;
        }

        let mut sample = make_sample(model, wave, p_new)?;

        // Bottoming-radius bound: convert a radius target back to a
        // slowness through the power-law profile and retry once.
        if (prev.radius - sample.radius).abs() > config.max_radius_increment_km {
            let direction = if sample.radius < prev.radius { -1.0 } else { 1.0 };
            let r_target = prev.radius + direction * config.max_radius_increment_km;
            if let Some(p_radius) = slowness_at_radius(model, wave, r_target) {
                if p_radius < prev.slowness && p_radius > end.slowness {
                    sample = make_sample(model, wave, p_radius)?;
                }
            }
        }

        if prev.slowness - sample.slowness <= DTOL {
            break;
        }
        out.push(sample);
    }

    // Uniform slowness infill when the closing step would be too wide.
    let last_p = out.last().expect("non-empty").slowness;
    let gap = last_p - end.slowness;
    if gap > config.max_slowness_increment {
        let m = (gap / config.max_slowness_increment).ceil() as usize;
        for k in 1..m {
            let pk = last_p - gap * (k as f64) / (m as f64);
            out.push(make_sample(model, wave, pk)?);
        }
    }
    if (out.last().expect("non-empty").slowness - end.slowness).abs() > DTOL {
        out.push(end);
    }
    Ok(out)
}

/// Solves integrate_path(p).x = x_target, bracketed by the pair of seeded
/// samples that straddle the target. NaN when no bracket exists.
fn solve_for_range(
    model: &impl RadialModel,
    wave: WaveType,
    temp: &[TauSample],
    a: usize,
    b: usize,
    prev: &TauSample,
    x_target: f64,
    solver: &PegasusSolver,
) -> f64 {
    let mut bracket: Option<(f64, f64)> = None;
    for i in a..b {
        let (s0, s1) = (&temp[i], &temp[i + 1]);
        let straddles = (s0.range - x_target) * (s1.range - x_target) <= 0.0;
        if straddles && s1.slowness < prev.slowness {
            bracket = Some((s1.slowness, s0.slowness.min(prev.slowness)));
            break;
        }
    }
    let Some((lo, hi)) = bracket else {
        return f64::NAN;
    };
    if hi - lo <= DTOL {
        return f64::NAN;
    }
    solver.solve(lo, hi, |p| match integrate_path(model, wave, p) {
        Ok(path) => path.x - x_target,
        Err(_) => f64::NAN,
    })
}
