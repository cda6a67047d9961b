// Branch Builder
// Synthesizes composite travel-time branches from the per-shell partial
// integrals, walking the turning shells of each parsed phase code

use super::grammar::{PhaseFamily, PhaseSpec};
use super::naming::{rewrite_s_caustic_suffix, synthesize_doubled_name, synthesize_name};
use super::spline::basis_coefficients;
use super::BranchData;
use crate::config::TablesConfig;
use crate::decimator::{fast_decimation, slow_decimation, union_into};
use crate::reference_model::{RadialModel, ShellName};
use crate::resampled_model::ResampledModel;
use crate::sampling::MergedSlownesses;
use crate::tables::{CoreShell, CumulativeIntegrals, WavePieces};
use crate::WaveType;
use tracing::debug;

/// Everything the builder needs, shared across phases.
pub struct BuilderContext<'a> {
    pub model: &'a ResampledModel,
    pub merged: &'a MergedSlownesses,
    pub p_pieces: &'a WavePieces,
    pub s_pieces: &'a WavePieces,
    pub config: &'a TablesConfig,
}

impl<'a> BuilderContext<'a> {
    fn pieces(&self, wave: WaveType) -> &'a WavePieces {
        match wave {
            WaveType::P => self.p_pieces,
            WaveType::S => self.s_pieces,
        }
    }

    fn surface_slowness(&self, wave: WaveType) -> f64 {
        self.model.samples()[0].slowness(wave)
    }

    /// Slowness of the sample on the mantle side of the CMB.
    fn mantle_bottom(&self, wave: WaveType) -> Option<f64> {
        let shell = self
            .model
            .shells()
            .iter()
            .find(|s| s.name == Some(ShellName::CoreMantleBoundary))?;
        Some(self.model.samples()[shell.i_top].slowness(wave))
    }

    /// Slowness of the sample just below the CMB (top of the outer core).
    fn core_top(&self, wave: WaveType) -> Option<f64> {
        let shell = self
            .model
            .shells()
            .iter()
            .find(|s| s.name == Some(ShellName::CoreMantleBoundary))?;
        Some(self.model.samples()[shell.i_bot].slowness(wave))
    }

    /// Slowness of the sample just above the ICB (bottom of the outer core).
    fn outer_core_bottom(&self, wave: WaveType) -> Option<f64> {
        let shell = self
            .model
            .shells()
            .iter()
            .find(|s| s.name == Some(ShellName::InnerCoreBoundary))?;
        Some(self.model.samples()[shell.i_top].slowness(wave))
    }
}

/// Builds every sub-branch of one phase and folds its keep mask into the
/// master union mask. An empty result means the model cannot carry the
/// phase (e.g. core phases in a coreless model).
pub fn build_phase_branches(
    ctx: &BuilderContext,
    spec: &PhaseSpec,
    master_keep: &mut [bool],
) -> Vec<BranchData> {
    let Some(p_max) = max_ray_param(ctx, spec) else {
        return Vec::new();
    };
    let p_min = min_ray_param(ctx, spec);

    let j_start = ctx.merged.index_at_or_below(p_max);
    let j_end = ctx.merged.index_at_or_below(p_min.max(0.0));

    let mut branches = Vec::new();
    match spec.family {
        PhaseFamily::CoreReflected | PhaseFamily::InnerCoreReflected => {
            if let Some(branch) = build_sub_branch(ctx, spec, j_start, j_end, None, master_keep) {
                branches.push(branch);
            }
        }
        _ => {
            let mut j_lo = j_start;
            for (idx, shell) in ctx.model.shells().iter().enumerate() {
                if shell.is_discontinuity || !family_walks_shell(spec.family, shell.name) {
                    continue;
                }
                // Rays enter the shell only below its top slowness; the
                // band between the chained start and the shell top is
                // blocked by the slowness drop above it.
                let u_top = ctx.model.samples()[shell.i_top].slowness(spec.down_wave);
                let j_sub_lo = j_lo.max(ctx.merged.index_at_or_below(u_top));
                let u_bot = ctx.model.samples()[shell.i_bot].slowness(spec.down_wave);
                let mut j_hi = ctx.merged.index_at_or_below(u_bot);
                if j_hi > j_end {
                    j_hi = j_end;
                }
                if j_hi <= j_sub_lo {
                    j_lo = j_lo.max(j_hi);
                    continue;
                }
                if let Some(branch) =
                    build_sub_branch(ctx, spec, j_sub_lo, j_hi, Some(idx), master_keep)
                {
                    branches.push(branch);
                }
                j_lo = j_hi;
                if j_lo >= j_end {
                    break;
                }
            }
        }
    }

    debug!(
        phase = spec.code.as_str(),
        branches = branches.len(),
        "phase synthesis complete"
    );
    branches
}

fn family_walks_shell(family: PhaseFamily, name: Option<ShellName>) -> bool {
    let core = matches!(name, Some(ShellName::OuterCore) | Some(ShellName::InnerCore));
    match family {
        PhaseFamily::Refracted => true,
        PhaseFamily::SurfaceConverted => !core,
        PhaseFamily::CorePenetrating | PhaseFamily::CoreUnderside => core,
        PhaseFamily::CoreReflected | PhaseFamily::InnerCoreReflected => false,
    }
}

/// Largest ray parameter the phase can carry: every leg must propagate
/// through the shells it passes, and turning phases must be able to turn
/// in their end shell. None when the model lacks a required boundary.
fn max_ray_param(ctx: &BuilderContext, spec: &PhaseSpec) -> Option<f64> {
    let legs = [spec.down_wave, spec.return_wave];
    match spec.family {
        PhaseFamily::Refracted | PhaseFamily::SurfaceConverted => {
            let wave = if spec.p_bearing() {
                WaveType::P
            } else {
                WaveType::S
            };
            Some(ctx.surface_slowness(wave))
        }
        PhaseFamily::CoreReflected => legs
            .iter()
            .map(|&w| ctx.mantle_bottom(w))
            .collect::<Option<Vec<_>>>()?
            .into_iter()
            .reduce(f64::min),
        PhaseFamily::InnerCoreReflected => {
            let mut bound = f64::MAX;
            for w in legs {
                bound = bound.min(ctx.mantle_bottom(w)?);
            }
            Some(bound.min(ctx.outer_core_bottom(WaveType::P)?))
        }
        PhaseFamily::CorePenetrating | PhaseFamily::CoreUnderside => {
            let mut bound = f64::MAX;
            for w in legs {
                bound = bound.min(ctx.mantle_bottom(w)?);
            }
            Some(bound.min(ctx.core_top(WaveType::P)?))
        }
    }
}

/// Smallest ray parameter: zero except for surface conversions, which end
/// where the S leg reaches the mantle bottom.
fn min_ray_param(ctx: &BuilderContext, spec: &PhaseSpec) -> f64 {
    match spec.family {
        PhaseFamily::SurfaceConverted => ctx.mantle_bottom(WaveType::S).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Assembles, decimates, and names one sub-branch over merged indices
/// [j_lo, j_hi].
fn build_sub_branch(
    ctx: &BuilderContext,
    spec: &PhaseSpec,
    j_lo: usize,
    j_hi: usize,
    turning_shell: Option<usize>,
    master_keep: &mut [bool],
) -> Option<BranchData> {
    if j_hi <= j_lo || j_hi >= ctx.merged.values.len() {
        return None;
    }

    let down = ctx.pieces(spec.down_wave);
    let ret = ctx.pieces(spec.return_wave);
    let (m, o, i) = (
        spec.counts.0 as f64,
        spec.counts.1 as f64,
        spec.counts.2 as f64,
    );

    let mut p = Vec::with_capacity(j_hi - j_lo + 1);
    let mut tau = Vec::with_capacity(p.capacity());
    let mut x = Vec::with_capacity(p.capacity());
    for j in j_lo..=j_hi {
        p.push(ctx.merged.values[j]);
        let mut t = 0.0;
        let mut xx = 0.0;
        for (count, shell) in [
            (m, CoreShell::Mantle),
            (o, CoreShell::OuterCore),
            (i, CoreShell::InnerCore),
        ] {
            if count == 0.0 {
                continue;
            }
            t += count * (down.shell_tau(shell, j) + ret.shell_tau(shell, j));
            xx += count * (down.shell_x(shell, j) + ret.shell_x(shell, j));
        }
        tau.push(t);
        x.push(xx);
    }

    // Decimation target scaled by traversal multiplicity; reflections
    // through the outer core smooth enough to take half again as much.
    let conv = ctx.model.conversions();
    let factor = match spec.family {
        PhaseFamily::InnerCoreReflected | PhaseFamily::CoreUnderside => 1.5,
        _ => (0.75 * spec.max_count() as f64).max(1.0),
    };
    let dx_down = shell_spacing(ctx, spec, turning_shell, spec.down_wave, &p);
    let dx_ret = shell_spacing(ctx, spec, turning_shell, spec.return_wave, &p);
    let x_target = factor * conv.norm_r(dx_down.max(dx_ret));

    let mut keep = slow_decimation(&x, x_target);

    // Caustic flanks are forced to survive so triplications stay in the
    // spline interpolant.
    for k in 1..x.len().saturating_sub(1) {
        let d1 = x[k] - x[k - 1];
        let d2 = x[k + 1] - x[k];
        if d1 * d2 < 0.0 {
            keep[k - 1] = true;
            keep[k] = true;
            keep[k + 1] = true;
        }
    }

    union_into(master_keep, &keep, j_lo);

    let ray_params: Vec<f64> = compact(&p, &keep);
    let tau_kept: Vec<f64> = compact(&tau, &keep);
    let x_kept: Vec<f64> = compact(&x, &keep);
    if ray_params.len() < 2 {
        return None;
    }
    let basis = basis_coefficients(&ray_params, &tau_kept);

    let (shell_interval, shell_label) = match turning_shell {
        Some(idx) => {
            let shell = &ctx.model.shells()[idx];
            (
                Some((shell.r_bot, shell.r_top)),
                shell.name.map(|n| n.label().to_string()),
            )
        }
        None => (None, None),
    };

    let p_mid = 0.5 * (ray_params[0] + ray_params[ray_params.len() - 1]);
    Some(BranchData {
        phase_code: branch_name(ctx, spec, turning_shell, p_mid),
        segment_codes: spec.segment_codes,
        mantle_traversals: spec.counts.0,
        upgoing_sign: spec.upgoing_sign,
        turning_shell: shell_interval,
        turning_shell_name: shell_label,
        is_up_going: false,
        ray_params,
        tau: tau_kept,
        x: x_kept,
        basis,
    })
}

fn shell_spacing(
    ctx: &BuilderContext,
    spec: &PhaseSpec,
    turning_shell: Option<usize>,
    wave: WaveType,
    p: &[f64],
) -> f64 {
    if let Some(idx) = turning_shell {
        // The returning leg may turn in a different shell when converted.
        let p_mid = 0.5 * (p[0] + p[p.len() - 1]);
        let shell = ctx.model.shell_for_turning(wave, p_mid).unwrap_or(idx);
        return ctx.model.shells()[shell].delta_x_km;
    }
    // Reflections: spacing of the deepest shell above the reflector.
    let reflector = match spec.family {
        PhaseFamily::InnerCoreReflected => ShellName::InnerCoreBoundary,
        _ => ShellName::CoreMantleBoundary,
    };
    let mut spacing = 150.0;
    for shell in ctx.model.shells() {
        if shell.name == Some(reflector) {
            break;
        }
        if !shell.is_discontinuity {
            spacing = shell.delta_x_km;
        }
    }
    spacing
}

fn branch_name(
    ctx: &BuilderContext,
    spec: &PhaseSpec,
    turning_shell: Option<usize>,
    p_mid: f64,
) -> String {
    let Some(idx) = turning_shell else {
        // Reflected phases keep their literal code.
        return rewrite_s_caustic_suffix(&spec.code);
    };
    let shell = &ctx.model.shells()[idx];

    // Underside reflections keep the doubled-K code; only the branch
    // suffix comes from the turning shell.
    if spec.family == PhaseFamily::CoreUnderside {
        let suffix = match shell.name {
            Some(ShellName::OuterCore) => "ab",
            Some(ShellName::InnerCore) => "df",
            _ => "",
        };
        return rewrite_s_caustic_suffix(&format!("{}{}", spec.code, suffix));
    }

    let down_code = shell.code(spec.down_wave);
    let core_suffix = if shell.name == Some(ShellName::OuterCore) {
        Some("ab")
    } else {
        None
    };

    if !spec.is_converted() && spec.counts.0 == 2 {
        return synthesize_doubled_name(down_code, spec.up_prefix);
    }

    let return_code = if spec.is_converted() {
        // The returning leg turns in its own shell at this slowness.
        match ctx.model.shell_for_turning(spec.return_wave, p_mid) {
            Some(r_idx) => ctx.model.shells()[r_idx].code(spec.return_wave),
            None => shell.code(spec.return_wave),
        }
    } else {
        shell.code(spec.return_wave)
    };
    synthesize_name(
        down_code,
        return_code,
        spec.is_converted(),
        spec.up_prefix,
        core_suffix,
    )
}

/// Builds the up-going stub for one wave type: the proxy ray-parameter
/// grid limited to the shallow fraction, fast-decimated against the
/// up-going spacing target.
pub fn build_upgoing_stub(
    ctx: &BuilderContext,
    wave: WaveType,
    cum: &CumulativeIntegrals,
    master_keep: &mut [bool],
) -> BranchData {
    let pieces = ctx.pieces(wave);
    let conv = ctx.model.conversions();
    let limit = ctx.config.ray_param_limit_ratio * ctx.surface_slowness(wave);
    let j0 = ctx.merged.index_at_or_below(limit);

    let p_grid: Vec<f64> = pieces.proxy_p[j0..].to_vec();
    let x_grid: Vec<f64> = pieces.proxy_x[j0..]
        .iter()
        .map(|&v| v - pieces.proxy_x[j0])
        .collect();
    let tau_grid: Vec<f64> = cum.rows[cum.upper_mantle].tau[j0..].to_vec();

    let min_dx = conv.norm_r(ctx.config.target_upgoing_spacing_km);
    let keep = if p_grid.len() >= 2 {
        fast_decimation(
            &p_grid,
            &tau_grid,
            x_grid[0],
            x_grid[x_grid.len() - 1],
            min_dx,
        )
    } else {
        vec![true; p_grid.len()]
    };
    union_into(master_keep, &keep, j0);

    let ray_params = compact(&p_grid, &keep);
    let tau = compact(&tau_grid, &keep);
    let x = compact(&x_grid, &keep);
    let basis = basis_coefficients(&ray_params, &tau);

    let letter = match wave {
        WaveType::P => 'p',
        WaveType::S => 's',
    };
    BranchData {
        phase_code: letter.to_string(),
        segment_codes: [letter, letter.to_ascii_uppercase(), letter.to_ascii_uppercase()],
        mantle_traversals: 0,
        upgoing_sign: 1,
        turning_shell: None,
        turning_shell_name: None,
        is_up_going: true,
        ray_params,
        tau,
        x,
        basis,
    }
}

fn compact(values: &[f64], keep: &[bool]) -> Vec<f64> {
    values
        .iter()
        .zip(keep)
        .filter(|(_, &k)| k)
        .map(|(&v, _)| v)
        .collect()
}
