// Resampled Model
// Rebuilds the reference model on a denser radial grid, preserving every
// discontinuity and both endpoints of every shell

use crate::config::TablesConfig;
use crate::errors::TableResult;
use crate::model_conversions::ModelConversions;
use crate::reference_model::{
    CriticalSlowness, ModelSample, ModelShell, RadialModel, ReferenceModel,
};
use crate::WaveType;
use earth_model::IngestedSample;

/// The reference model re-sampled to at least one sample every
/// `resample_radius_km`. Velocities at inserted radii come from the
/// reference shell interpolants; the critical slownesses are recomputed
/// from the denser sampling.
#[derive(Debug, Clone)]
pub struct ResampledModel {
    inner: ReferenceModel,
}

impl ResampledModel {
    pub fn build(reference: &ReferenceModel, config: &TablesConfig) -> TableResult<Self> {
        let mut ascending: Vec<IngestedSample> = Vec::new();

        // Deepest shell first so the rebuilt list ascends in radius. The
        // equal-radius pairs of the discontinuities re-emerge as adjacent
        // shell endpoints with the two one-sided velocities.
        for (idx, shell) in reference.shells().iter().enumerate().rev() {
            if shell.is_discontinuity {
                continue;
            }
            let fluid = reference.samples()[shell.i_top].fluid;
            let thickness = shell.r_top - shell.r_bot;
            let n = ((thickness / config.resample_radius_km).ceil() as usize).max(1);
            for k in 0..=n {
                let r = if k == n {
                    shell.r_top
                } else {
                    shell.r_bot + thickness * (k as f64) / (n as f64)
                };
                let vp = pick_velocity(reference, idx, WaveType::P, r, shell);
                let vs = pick_velocity(reference, idx, WaveType::S, r, shell);
                ascending.push(IngestedSample {
                    radius: r,
                    vp,
                    vs,
                    fluid,
                });
            }
        }

        let inner = ReferenceModel::from_ingested(
            &reference.name,
            ascending,
            &reference.reference_radii,
            config,
        )?;
        Ok(Self { inner })
    }

    pub fn as_reference(&self) -> &ReferenceModel {
        &self.inner
    }
}

/// Interpolated velocity with an endpoint fallback: the shell interpolant
/// is exact at the endpoints, but a NaN from boundary rounding falls back
/// to the nearest reference sample.
fn pick_velocity(
    reference: &ReferenceModel,
    shell_idx: usize,
    wave: WaveType,
    r: f64,
    shell: &ModelShell,
) -> f64 {
    let v = reference.velocity_in_shell(shell_idx, wave, r);
    if v.is_finite() && v > 0.0 {
        return v;
    }
    let samples = reference.samples();
    if (r - shell.r_top).abs() <= (r - shell.r_bot).abs() {
        samples[shell.i_top].velocity(wave)
    } else {
        samples[shell.i_bot].velocity(wave)
    }
}

impl RadialModel for ResampledModel {
    fn conversions(&self) -> &ModelConversions {
        self.inner.conversions()
    }
    fn samples(&self) -> &[ModelSample] {
        self.inner.samples()
    }
    fn shells(&self) -> &[ModelShell] {
        self.inner.shells()
    }
    fn critical(&self) -> &[CriticalSlowness] {
        self.inner.critical()
    }
    fn velocity_in_shell(&self, shell: usize, wave: WaveType, r: f64) -> f64 {
        self.inner.velocity_in_shell(shell, wave, r)
    }
}
