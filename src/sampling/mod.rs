// Slowness Sampling
// Per-wave-type slowness grids, their merge onto a common ray-parameter
// grid, and the depth model rebuilt on the merged slownesses

pub mod depth_resampler;
pub mod merger;
pub mod slowness_sampler;

pub use depth_resampler::resample_depths;
pub use merger::{assign_merged_indices, merge_slownesses, MergedSlownesses};
pub use slowness_sampler::sample_slownesses;

use crate::errors::TableResult;
use crate::layer_integrals::{integrate_derivative, integrate_layer};
use crate::reference_model::RadialModel;
use crate::{WaveType, DTOL};
use serde::{Deserialize, Serialize};

/// One sample of the per-wave-type slowness model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TauSample {
    /// Bottoming radius (km).
    pub radius: f64,
    /// Non-dimensional slowness.
    pub slowness: f64,
    /// Surface-to-surface range (radians).
    pub range: f64,
    /// Flattened depth of the bottoming point.
    pub z: f64,
    /// Position on the merged ray-parameter grid, once merged.
    pub merged_index: Option<usize>,
}

/// Down-and-up path integrals for a ray bottoming in the model.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathIntegrals {
    pub tau: f64,
    pub x: f64,
}

/// Integrates tau and X from the surface to the bottoming depth and back
/// for ray parameter p.
pub fn integrate_path(
    model: &impl RadialModel,
    wave: WaveType,
    p: f64,
) -> TableResult<PathIntegrals> {
    let samples = model.samples();
    let mut tau = 0.0;
    let mut x = 0.0;
    for pair in samples.windows(2) {
        let (top, bot) = (&pair[0], &pair[1]);
        let u_top = top.slowness(wave);
        let u_bot = bot.slowness(wave);
        if p > u_top + DTOL {
            break;
        }
        let li = integrate_layer(p, u_top, u_bot, top.z, bot.z)?;
        tau += li.tau;
        x += li.x;
        if u_top > u_bot && p > u_bot + DTOL {
            break;
        }
    }
    Ok(PathIntegrals {
        tau: 2.0 * tau,
        x: 2.0 * x,
    })
}

/// Total dX/dp of the bottoming ray. NaN propagates from layers where the
/// derivative is singular; the caustic finder backs off when it sees one.
pub fn path_dxdp(model: &impl RadialModel, wave: WaveType, p: f64) -> f64 {
    let samples = model.samples();
    let mut total = 0.0;
    for pair in samples.windows(2) {
        let (top, bot) = (&pair[0], &pair[1]);
        let u_top = top.slowness(wave);
        let u_bot = bot.slowness(wave);
        if p > u_top + DTOL {
            break;
        }
        let d = integrate_derivative(p, u_top, u_bot, top.z, bot.z);
        if d.is_nan() {
            return f64::NAN;
        }
        total += d;
        if u_top > u_bot && p > u_bot + DTOL {
            break;
        }
    }
    2.0 * total
}

/// Flattened slowness at an arbitrary radius by power-law interpolation
/// between the bracketing model samples.
pub fn slowness_at_radius(model: &impl RadialModel, wave: WaveType, r: f64) -> Option<f64> {
    let samples = model.samples();
    for pair in samples.windows(2) {
        let (hi, lo) = (&pair[0], &pair[1]);
        if r > hi.radius + DTOL || r < lo.radius - DTOL {
            continue;
        }
        let u_hi = hi.slowness(wave);
        let u_lo = lo.slowness(wave);
        if (hi.radius - lo.radius).abs() <= DTOL {
            return Some(u_lo);
        }
        if lo.radius <= 0.0 || (u_hi - u_lo).abs() <= DTOL {
            return Some(u_hi);
        }
        let exponent = (u_lo / u_hi).ln() / (lo.radius / hi.radius).ln();
        return Some(u_hi * (r / hi.radius).powf(exponent));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TablesConfig;
    use crate::reference_model::ReferenceModel;
    use earth_model::parse_model;
    use std::f64::consts::PI;

    const UNIFORM: &str = "\
uniform sphere
3
1 0.0    13.0 6.0 6.0 3.5 3.5 1.0 300.0 600.0
2 3000.0 13.0 6.0 6.0 3.5 3.5 1.0 300.0 600.0
3 6371.0 2.7  6.0 6.0 3.5 3.5 1.0 300.0 600.0
";

    fn uniform_model() -> ReferenceModel {
        let file = parse_model(UNIFORM).unwrap();
        ReferenceModel::build(&file, &TablesConfig::default()).unwrap()
    }

    #[test]
    fn test_centre_ray_range_is_pi() {
        // Straight down and back up through the centre sweeps pi radians:
        // the one-way integral carries pi/2, doubled by the return leg.
        let model = uniform_model();
        let path = integrate_path(&model, WaveType::P, 0.0).unwrap();
        assert!((path.x - PI).abs() < 1e-12);
        assert!(path.tau > 0.0);
    }

    #[test]
    fn test_near_surface_ray_short_range() {
        let model = uniform_model();
        let p_surface = model.samples()[0].p_p;
        let shallow = integrate_path(&model, WaveType::P, p_surface * 0.999).unwrap();
        let deep = integrate_path(&model, WaveType::P, p_surface * 0.5).unwrap();
        assert!(shallow.x < deep.x);
        assert!(shallow.tau < deep.tau);
    }

    #[test]
    fn test_dxdp_matches_finite_difference() {
        let model = uniform_model();
        let p_surface = model.samples()[0].p_p;
        let p = p_surface * 0.6;
        let h = p_surface * 1e-7;
        let x_plus = integrate_path(&model, WaveType::P, p + h).unwrap().x;
        let x_minus = integrate_path(&model, WaveType::P, p - h).unwrap().x;
        let fd = (x_plus - x_minus) / (2.0 * h);
        let d = path_dxdp(&model, WaveType::P, p);
        assert!(
            (fd - d).abs() < 1e-4 * d.abs().max(1.0),
            "fd {} vs closed {}",
            fd,
            d
        );
    }

    #[test]
    fn test_slowness_at_radius_consistent() {
        let model = uniform_model();
        // In a constant-velocity sphere the flattened slowness is r/(v*R0).
        let u = slowness_at_radius(&model, WaveType::P, 5000.0).unwrap();
        assert!((u - 5000.0 / (6.0 * 6371.0)).abs() < 1e-12);
    }
}
