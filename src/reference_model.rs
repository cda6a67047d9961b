// Reference Model
// Loaded model samples organized into shells, with per-shell velocity
// interpolants, critical slownesses, and low-velocity-zone bookkeeping

use crate::config::TablesConfig;
use crate::errors::{TableError, TableResult};
use crate::model_conversions::ModelConversions;
use crate::{WaveType, DTOL};
use earth_model::{EarthModelFile, IngestedSample, ReferenceRadii};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Canonical shell names, surface to centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShellName {
    InnerCore,
    InnerCoreBoundary,
    OuterCore,
    CoreMantleBoundary,
    LowerMantle,
    UpperMantle,
    MohoDiscontinuity,
    LowerCrust,
    ConradDiscontinuity,
    UpperCrust,
    Surface,
}

impl ShellName {
    pub fn is_discontinuity(&self) -> bool {
        matches!(
            self,
            ShellName::InnerCoreBoundary
                | ShellName::CoreMantleBoundary
                | ShellName::MohoDiscontinuity
                | ShellName::ConradDiscontinuity
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            ShellName::InnerCore => "inner core",
            ShellName::InnerCoreBoundary => "inner core boundary",
            ShellName::OuterCore => "outer core",
            ShellName::CoreMantleBoundary => "core mantle boundary",
            ShellName::LowerMantle => "lower mantle",
            ShellName::UpperMantle => "upper mantle",
            ShellName::MohoDiscontinuity => "Moho discontinuity",
            ShellName::LowerCrust => "lower crust",
            ShellName::ConradDiscontinuity => "Conrad discontinuity",
            ShellName::UpperCrust => "upper crust",
            ShellName::Surface => "surface",
        }
    }

    /// Temporary phase codes used to synthesize sub-branch names for rays
    /// turning in this shell.
    pub fn temp_codes(&self) -> (&'static str, &'static str) {
        match self {
            ShellName::UpperCrust | ShellName::Surface => ("Pg", "Sg"),
            ShellName::LowerCrust | ShellName::ConradDiscontinuity => ("Pb", "Sb"),
            ShellName::UpperMantle | ShellName::MohoDiscontinuity => ("Pn", "Sn"),
            ShellName::LowerMantle | ShellName::CoreMantleBoundary => ("P", "S"),
            ShellName::OuterCore | ShellName::InnerCoreBoundary => ("PKP", "SKS"),
            ShellName::InnerCore => ("PKIKP", "SKIKS"),
        }
    }
}

/// One model sample in flattened coordinates, ordered surface to centre.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelSample {
    /// Radius (km).
    pub radius: f64,
    /// Isotropic velocities (km/s); vs carries the fluid mask.
    pub vp: f64,
    pub vs: f64,
    /// Non-dimensional flattened depth.
    pub z: f64,
    /// Flattened slownesses.
    pub p_p: f64,
    pub p_s: f64,
    pub fluid: bool,
}

impl ModelSample {
    pub fn slowness(&self, wave: WaveType) -> f64 {
        match wave {
            WaveType::P => self.p_p,
            WaveType::S => self.p_s,
        }
    }

    pub fn velocity(&self, wave: WaveType) -> f64 {
        match wave {
            WaveType::P => self.vp,
            WaveType::S => self.vs,
        }
    }
}

/// A radial interval of the model bounded by discontinuities (or the
/// surface/centre). Discontinuity shells are zero thickness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelShell {
    pub r_top: f64,
    pub r_bot: f64,
    /// Sample indices, top < bot in the surface-to-centre ordering.
    pub i_top: usize,
    pub i_bot: usize,
    pub is_discontinuity: bool,
    /// Per wave type: does slowness increase with depth anywhere inside?
    pub has_low_velocity_zone: [bool; 2],
    pub name: Option<ShellName>,
    /// Temporary phase codes for sub-branch naming (P, S).
    pub code_p: String,
    pub code_s: String,
    /// Target range-sampling step for rays turning here (km).
    pub delta_x_km: f64,
}

impl ModelShell {
    pub fn code(&self, wave: WaveType) -> &str {
        match wave {
            WaveType::P => &self.code_p,
            WaveType::S => &self.code_s,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CriticalLocation {
    Shell,
    Boundary,
}

/// A slowness at which branch structure can change: a shell boundary value
/// or a local slowness extremum inside a shell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticalSlowness {
    pub wave: WaveType,
    pub shell_index_p: Option<usize>,
    pub shell_index_s: Option<usize>,
    pub location: CriticalLocation,
    pub slowness: f64,
}

/// Per-shell, per-wave velocity interpolant. Cubic splines need more than
/// two points to be well posed; smaller shells interpolate linearly.
#[derive(Debug, Clone)]
enum Interpolant {
    Linear { r: Vec<f64>, v: Vec<f64> },
    Cubic(CubicSpline),
}

impl Interpolant {
    fn evaluate(&self, r: f64) -> f64 {
        match self {
            Interpolant::Linear { r: rs, v } => {
                if rs.len() < 2 || r < rs[0] - DTOL || r > rs[rs.len() - 1] + DTOL {
                    return f64::NAN;
                }
                let mut i = 0;
                while i + 2 < rs.len() && r > rs[i + 1] {
                    i += 1;
                }
                let t = if (rs[i + 1] - rs[i]).abs() <= DTOL {
                    0.0
                } else {
                    (r - rs[i]) / (rs[i + 1] - rs[i])
                };
                v[i] + t * (v[i + 1] - v[i])
            }
            Interpolant::Cubic(s) => s.evaluate(r),
        }
    }
}

/// Natural cubic spline through strictly increasing abscissae.
#[derive(Debug, Clone)]
struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Second derivatives at the knots.
    m: Vec<f64>,
}

impl CubicSpline {
    fn fit(x: Vec<f64>, y: Vec<f64>) -> Self {
        let n = x.len();
        let mut m = vec![0.0; n];
        if n > 2 {
            // Tridiagonal system for interior second derivatives.
            let dim = n - 2;
            let mut a = DMatrix::<f64>::zeros(dim, dim);
            let mut rhs = DVector::<f64>::zeros(dim);
            for i in 1..n - 1 {
                let h0 = x[i] - x[i - 1];
                let h1 = x[i + 1] - x[i];
                let row = i - 1;
                if row > 0 {
                    a[(row, row - 1)] = h0 / 6.0;
                }
                a[(row, row)] = (h0 + h1) / 3.0;
                if row + 1 < dim {
                    a[(row, row + 1)] = h1 / 6.0;
                }
                rhs[row] = (y[i + 1] - y[i]) / h1 - (y[i] - y[i - 1]) / h0;
            }
            if let Some(sol) = a.lu().solve(&rhs) {
                for i in 0..dim {
                    m[i + 1] = sol[i];
                }
            }
        }
        Self { x, y, m }
    }

    fn evaluate(&self, r: f64) -> f64 {
        let n = self.x.len();
        if n < 2 || r < self.x[0] - DTOL || r > self.x[n - 1] + DTOL {
            return f64::NAN;
        }
        let mut i = 0;
        while i + 2 < n && r > self.x[i + 1] {
            i += 1;
        }
        let h = self.x[i + 1] - self.x[i];
        if h.abs() <= DTOL {
            return self.y[i];
        }
        let a = (self.x[i + 1] - r) / h;
        let b = (r - self.x[i]) / h;
        a * self.y[i]
            + b * self.y[i + 1]
            + ((a * a * a - a) * self.m[i] + (b * b * b - b) * self.m[i + 1]) * h * h / 6.0
    }
}

/// Shared read interface of the reference and resampled models.
pub trait RadialModel {
    fn conversions(&self) -> &ModelConversions;
    fn samples(&self) -> &[ModelSample];
    fn shells(&self) -> &[ModelShell];
    fn critical(&self) -> &[CriticalSlowness];

    /// Velocity inside the given shell; NaN outside it.
    fn velocity_in_shell(&self, shell: usize, wave: WaveType, r: f64) -> f64;

    /// Flattened slowness inside the given shell; NaN outside it.
    fn slowness_in_shell(&self, shell: usize, wave: WaveType, r: f64) -> f64 {
        let v = self.velocity_in_shell(shell, wave, r);
        if v.is_nan() || v <= 0.0 {
            return f64::NAN;
        }
        self.conversions().flat_p(v, r)
    }

    /// Sorted critical slownesses for one wave type, descending from the
    /// surface value, deduplicated.
    fn critical_slownesses(&self, wave: WaveType) -> Vec<f64> {
        let mut values: Vec<f64> = self
            .critical()
            .iter()
            .filter(|c| c.wave == wave)
            .map(|c| c.slowness)
            .collect();
        values.sort_by(|a, b| b.partial_cmp(a).unwrap());
        values.dedup_by(|a, b| (*a - *b).abs() <= DTOL);
        values
    }

    /// Uppermost shell in which a ray of the given slowness can turn.
    fn shell_for_turning(&self, wave: WaveType, p: f64) -> Option<usize> {
        let samples = self.samples();
        for (idx, shell) in self.shells().iter().enumerate() {
            if shell.is_discontinuity {
                continue;
            }
            let top = samples[shell.i_top].slowness(wave);
            let bot = samples[shell.i_bot].slowness(wave);
            if p <= top + DTOL && p >= bot - DTOL {
                return Some(idx);
            }
        }
        None
    }

    /// Bottoming radius for a ray of the given slowness, by power-law
    /// interpolation between the bracketing samples.
    fn turning_radius(&self, wave: WaveType, p: f64) -> Option<f64> {
        let samples = self.samples();
        for pair in samples.windows(2) {
            let (hi, lo) = (&pair[0], &pair[1]);
            let u_hi = hi.slowness(wave);
            let u_lo = lo.slowness(wave);
            if !(u_hi >= p - DTOL && u_lo <= p + DTOL) {
                continue;
            }
            if (u_hi - p).abs() <= DTOL {
                return Some(hi.radius);
            }
            if (u_lo - p).abs() <= DTOL || lo.radius <= 0.0 {
                return Some(lo.radius.max(0.0));
            }
            if (u_hi - u_lo).abs() <= DTOL || (hi.radius - lo.radius).abs() <= DTOL {
                return Some(lo.radius);
            }
            let exponent = (u_lo / u_hi).ln() / (lo.radius / hi.radius).ln();
            return Some(hi.radius * (p / u_hi).powf(1.0 / exponent));
        }
        None
    }
}

/// The immutable reference model: ingested samples, shells, interpolants,
/// and the critical slownesses of both wave types.
#[derive(Debug, Clone)]
pub struct ReferenceModel {
    pub name: String,
    pub reference_radii: ReferenceRadii,
    conversions: ModelConversions,
    samples: Vec<ModelSample>,
    shells: Vec<ModelShell>,
    critical: Vec<CriticalSlowness>,
    interpolants: Vec<[Interpolant; 2]>,
    /// Deepest allowed earthquake depth in flattened coordinates.
    pub max_source_depth_z: f64,
}

impl ReferenceModel {
    pub fn build(file: &EarthModelFile, config: &TablesConfig) -> TableResult<Self> {
        let ingested = file.ingest();
        Self::from_ingested(&file.name, ingested, &file.reference_radii, config)
    }

    /// Builds the model from ingested samples in ascending-radius order.
    pub fn from_ingested(
        name: &str,
        mut ascending: Vec<IngestedSample>,
        radii: &ReferenceRadii,
        config: &TablesConfig,
    ) -> TableResult<Self> {
        if ascending.len() < 2 {
            return Err(TableError::InvalidInput(
                "model needs at least two samples".to_string(),
            ));
        }

        bridge_velocities(&mut ascending, config.velocity_tolerance);

        let surface = ascending[ascending.len() - 1];
        let conversions = ModelConversions::new(surface.radius, surface.vs)?;

        // Surface-to-centre ordering for all downstream walking.
        let mut samples: Vec<ModelSample> = ascending
            .iter()
            .rev()
            .map(|s| {
                // The flattening transform diverges at the centre; the
                // centre sample only ever participates through its zero
                // slowness, so its depth is clamped.
                let r_for_z = s.radius.max(surface.radius * 1e-6);
                ModelSample {
                    radius: s.radius,
                    vp: s.vp,
                    vs: s.vs,
                    z: conversions.flat_z(r_for_z),
                    p_p: conversions.flat_p(s.vp, s.radius),
                    p_s: conversions.flat_p(s.vs, s.radius),
                    fluid: s.fluid,
                }
            })
            .collect();
        // Exact zero slowness at the centre.
        if let Some(last) = samples.last_mut() {
            if last.radius <= 0.0 {
                last.p_p = 0.0;
                last.p_s = 0.0;
            }
        }

        let mut shells = build_shells(&samples);
        refine_boundaries(&mut shells, &samples, radii, config);
        let critical = collect_critical(&samples, &shells);
        let interpolants = build_interpolants(&samples, &shells);

        let max_source_depth_z =
            conversions.flat_z((surface.radius - config.max_earthquake_depth_km).max(1.0));

        Ok(Self {
            name: name.to_string(),
            reference_radii: radii.clone(),
            conversions,
            samples,
            shells,
            critical,
            interpolants,
            max_source_depth_z,
        })
    }

    /// The shell index containing the given sample index.
    pub fn shell_of_sample(&self, i: usize) -> Option<usize> {
        self.shells
            .iter()
            .position(|s| i >= s.i_top && i <= s.i_bot)
    }

    /// Named discontinuity radius, if that boundary exists in this model.
    pub fn named_radius(&self, name: ShellName) -> Option<f64> {
        self.shells
            .iter()
            .find(|s| s.name == Some(name))
            .map(|s| s.r_top)
    }
}

impl RadialModel for ReferenceModel {
    fn conversions(&self) -> &ModelConversions {
        &self.conversions
    }
    fn samples(&self) -> &[ModelSample] {
        &self.samples
    }
    fn shells(&self) -> &[ModelShell] {
        &self.shells
    }
    fn critical(&self) -> &[CriticalSlowness] {
        &self.critical
    }
    fn velocity_in_shell(&self, shell: usize, wave: WaveType, r: f64) -> f64 {
        let Some(interp) = self.interpolants.get(shell) else {
            return f64::NAN;
        };
        interp[wave as usize].evaluate(r)
    }
}

/// Bridges spurious tiny discontinuities: when the jump across an
/// equal-radius pair is within tolerance, both samples take the mean so
/// the velocity is exactly continuous. P and S are bridged independently.
fn bridge_velocities(ascending: &mut [IngestedSample], tolerance: f64) {
    for i in 1..ascending.len() {
        if (ascending[i].radius - ascending[i - 1].radius).abs() > DTOL {
            continue;
        }
        let (below, above) = (ascending[i - 1], ascending[i]);
        if (above.vp - below.vp).abs() <= tolerance * above.vp {
            let mean = 0.5 * (above.vp + below.vp);
            ascending[i - 1].vp = mean;
            ascending[i].vp = mean;
        }
        if (above.vs - below.vs).abs() <= tolerance * above.vs {
            let mean = 0.5 * (above.vs + below.vs);
            ascending[i - 1].vs = mean;
            ascending[i].vs = mean;
        }
    }
}

/// Splits the surface-to-centre sample list into shells at equal-radius
/// pairs, inserting a zero-thickness shell for each discontinuity.
fn build_shells(samples: &[ModelSample]) -> Vec<ModelShell> {
    let mut shells = Vec::new();
    let mut start = 0;
    for i in 0..samples.len() - 1 {
        if (samples[i].radius - samples[i + 1].radius).abs() <= DTOL {
            shells.push(plain_shell(samples, start, i, false));
            shells.push(plain_shell(samples, i, i + 1, true));
            start = i + 1;
        }
    }
    shells.push(plain_shell(samples, start, samples.len() - 1, false));

    // A slowness rise across a discontinuity shadows the shell below it:
    // rays grazing the boundary cannot refract into the higher slowness.
    for d in 0..shells.len() {
        if !shells[d].is_discontinuity || d + 1 >= shells.len() {
            continue;
        }
        let (i_top, i_bot) = (shells[d].i_top, shells[d].i_bot);
        for (w, wave) in [WaveType::P, WaveType::S].into_iter().enumerate() {
            if samples[i_bot].slowness(wave) > samples[i_top].slowness(wave) + DTOL {
                shells[d + 1].has_low_velocity_zone[w] = true;
            }
        }
    }
    shells
}

fn plain_shell(samples: &[ModelSample], i_top: usize, i_bot: usize, disc: bool) -> ModelShell {
    let mut lvz = [false, false];
    if !disc {
        for (w, flag) in lvz.iter_mut().enumerate() {
            let wave = if w == 0 { WaveType::P } else { WaveType::S };
            for k in i_top..i_bot {
                if samples[k + 1].slowness(wave) > samples[k].slowness(wave) + DTOL {
                    *flag = true;
                    break;
                }
            }
        }
    }
    ModelShell {
        r_top: samples[i_top].radius,
        r_bot: samples[i_bot].radius,
        i_top,
        i_bot,
        is_discontinuity: disc,
        has_low_velocity_zone: lvz,
        name: None,
        code_p: "P".to_string(),
        code_s: "S".to_string(),
        delta_x_km: 150.0,
    }
}

/// Names the shells: core boundaries are located from the fluid flags,
/// crust and mantle boundaries are snapped from the declared reference
/// radii to the nearest discontinuity. Unnamed non-discontinuity shells
/// above the core default to the upper mantle.
fn refine_boundaries(
    shells: &mut [ModelShell],
    samples: &[ModelSample],
    radii: &ReferenceRadii,
    config: &TablesConfig,
) {
    // Fluid interval in the surface-to-centre ordering.
    let first_fluid = samples.iter().position(|s| s.fluid);
    let last_fluid = samples.iter().rposition(|s| s.fluid);

    if let (Some(first), Some(last)) = (first_fluid, last_fluid) {
        for shell in shells.iter_mut() {
            if shell.is_discontinuity {
                if shell.i_bot == first {
                    shell.name = Some(ShellName::CoreMantleBoundary);
                } else if shell.i_top == last {
                    shell.name = Some(ShellName::InnerCoreBoundary);
                }
            } else if shell.i_top >= first && shell.i_bot <= last {
                shell.name = Some(ShellName::OuterCore);
            } else if shell.i_top > last {
                shell.name = Some(ShellName::InnerCore);
            }
        }
    }

    // Snap each declared radius to the nearest unnamed discontinuity.
    let targets = [
        (radii.conrad, ShellName::ConradDiscontinuity),
        (radii.moho, ShellName::MohoDiscontinuity),
        (radii.upper_mantle, ShellName::UpperMantle),
    ];
    for (target, name) in targets {
        let Some(target) = target else { continue };
        let mut best: Option<(usize, f64)> = None;
        for (idx, shell) in shells.iter().enumerate() {
            if !shell.is_discontinuity || shell.name.is_some() {
                continue;
            }
            let d = (shell.r_top - target).abs();
            if best.map(|(_, bd)| d < bd).unwrap_or(true) {
                best = Some((idx, d));
            }
        }
        if let Some((idx, _)) = best {
            // The upper-mantle target names the shell below its
            // discontinuity rather than the boundary itself.
            if name == ShellName::UpperMantle {
                if idx + 1 < shells.len() {
                    shells[idx + 1].name.get_or_insert(ShellName::UpperMantle);
                }
            } else {
                shells[idx].name = Some(name);
            }
        }
    }

    // Positional fill for the remaining silicate shells.
    let conrad = shells
        .iter()
        .position(|s| s.name == Some(ShellName::ConradDiscontinuity));
    let moho = shells
        .iter()
        .position(|s| s.name == Some(ShellName::MohoDiscontinuity));
    let cmb = shells
        .iter()
        .position(|s| s.name == Some(ShellName::CoreMantleBoundary));
    let um = shells
        .iter()
        .position(|s| s.name == Some(ShellName::UpperMantle));

    for idx in 0..shells.len() {
        if shells[idx].name.is_some() || shells[idx].is_discontinuity {
            continue;
        }
        let name = if conrad.map(|c| idx < c).unwrap_or(false) {
            ShellName::UpperCrust
        } else if moho.map(|m| idx < m).unwrap_or(false) {
            if conrad.is_some() {
                ShellName::LowerCrust
            } else {
                ShellName::UpperCrust
            }
        } else if um.map(|u| idx <= u).unwrap_or(false) {
            ShellName::UpperMantle
        } else if cmb.map(|c| idx < c).unwrap_or(true) {
            // A model with a core but no declared upper-mantle boundary
            // treats the whole silicate column as lower mantle.
            if um.is_some() || cmb.is_some() {
                ShellName::LowerMantle
            } else {
                ShellName::UpperMantle
            }
        } else {
            ShellName::LowerMantle
        };
        shells[idx].name = Some(name);
    }

    for shell in shells.iter_mut() {
        if let Some(name) = shell.name {
            let (p, s) = name.temp_codes();
            shell.code_p = p.to_string();
            shell.code_s = s.to_string();
            shell.delta_x_km = config.shell_spacing_km(name);
        }
    }
}

/// Collects critical slownesses: both boundary values of every shell for
/// both wave types, plus local slowness extrema inside shells. Sorted
/// ascending; boundary entries win ties.
fn collect_critical(samples: &[ModelSample], shells: &[ModelShell]) -> Vec<CriticalSlowness> {
    let mut out: Vec<CriticalSlowness> = Vec::new();
    for wave in [WaveType::P, WaveType::S] {
        for (idx, shell) in shells.iter().enumerate() {
            for i in [shell.i_top, shell.i_bot] {
                push_critical(
                    &mut out,
                    wave,
                    idx,
                    CriticalLocation::Boundary,
                    samples[i].slowness(wave),
                );
            }
            if shell.is_discontinuity {
                continue;
            }
            // Interior extrema: sign change of the slowness difference.
            for i in shell.i_top + 1..shell.i_bot {
                let d_prev = samples[i].slowness(wave) - samples[i - 1].slowness(wave);
                let d_next = samples[i + 1].slowness(wave) - samples[i].slowness(wave);
                if d_prev * d_next < 0.0 {
                    push_critical(
                        &mut out,
                        wave,
                        idx,
                        CriticalLocation::Shell,
                        samples[i].slowness(wave),
                    );
                }
            }
        }
    }

    out.sort_by(|a, b| {
        a.slowness
            .partial_cmp(&b.slowness)
            .unwrap()
            .then_with(|| location_rank(a.location).cmp(&location_rank(b.location)))
    });
    // Per wave type, equal slownesses collapse to one entry; the sort
    // order guarantees the surviving entry is the boundary one.
    let mut deduped: Vec<CriticalSlowness> = Vec::with_capacity(out.len());
    for c in out.into_iter().rev() {
        let duplicate = deduped
            .iter()
            .any(|k| k.wave == c.wave && (k.slowness - c.slowness).abs() <= DTOL);
        if !duplicate {
            deduped.push(c);
        }
    }
    deduped.reverse();
    deduped
}

fn location_rank(loc: CriticalLocation) -> u8 {
    match loc {
        CriticalLocation::Shell => 0,
        CriticalLocation::Boundary => 1,
    }
}

fn push_critical(
    out: &mut Vec<CriticalSlowness>,
    wave: WaveType,
    shell: usize,
    location: CriticalLocation,
    slowness: f64,
) {
    let (shell_index_p, shell_index_s) = match wave {
        WaveType::P => (Some(shell), None),
        WaveType::S => (None, Some(shell)),
    };
    out.push(CriticalSlowness {
        wave,
        shell_index_p,
        shell_index_s,
        location,
        slowness,
    });
}

fn build_interpolants(samples: &[ModelSample], shells: &[ModelShell]) -> Vec<[Interpolant; 2]> {
    shells
        .iter()
        .map(|shell| {
            [WaveType::P, WaveType::S].map(|wave| {
                // Ascending radii for the interpolant abscissae.
                let mut r = Vec::new();
                let mut v = Vec::new();
                for i in (shell.i_top..=shell.i_bot).rev() {
                    if r.last()
                        .map(|&last: &f64| (samples[i].radius - last).abs() <= DTOL)
                        .unwrap_or(false)
                    {
                        continue;
                    }
                    r.push(samples[i].radius);
                    v.push(samples[i].velocity(wave));
                }
                if r.len() > 2 {
                    Interpolant::Cubic(CubicSpline::fit(r, v))
                } else {
                    Interpolant::Linear { r, v }
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use earth_model::parse_model;

    fn toy_config() -> TablesConfig {
        TablesConfig::default()
    }

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

    fn cored_model() -> ReferenceModel {
        let file = parse_model(CORED).unwrap();
        ReferenceModel::build(&file, &toy_config()).unwrap()
    }

    #[test]
    fn test_shell_structure() {
        let model = cored_model();
        // 3 plain shells + 2 discontinuities.
        assert_eq!(model.shells().len(), 5);
        let discs: Vec<_> = model
            .shells()
            .iter()
            .filter(|s| s.is_discontinuity)
            .collect();
        assert_eq!(discs.len(), 2);
        assert_eq!(
            model.named_radius(ShellName::CoreMantleBoundary),
            Some(3479.5)
        );
        assert_eq!(
            model.named_radius(ShellName::InnerCoreBoundary),
            Some(1217.5)
        );
    }

    #[test]
    fn test_fluid_core_named_and_masked() {
        let model = cored_model();
        let oc = model
            .shells()
            .iter()
            .find(|s| s.name == Some(ShellName::OuterCore))
            .expect("outer core shell");
        let sample = &model.samples()[oc.i_top];
        assert!(sample.fluid);
        // Fluid mask: S slowness equals P slowness in the outer core.
        assert!((sample.p_p - sample.p_s).abs() < 1e-15);
    }

    #[test]
    fn test_samples_ordered_surface_down() {
        let model = cored_model();
        let samples = model.samples();
        assert_eq!(samples[0].radius, 6371.0);
        for pair in samples.windows(2) {
            assert!(pair[0].radius >= pair[1].radius);
            assert!(pair[0].z <= pair[1].z + DTOL || pair[1].radius <= 0.0);
        }
        // Centre sample carries exactly zero slowness.
        assert_eq!(samples.last().unwrap().p_p, 0.0);
    }

    #[test]
    fn test_critical_slownesses_cover_boundaries() {
        let model = cored_model();
        // Property: for each shell boundary, the boundary slowness on each
        // side is critical.
        for wave in [WaveType::P, WaveType::S] {
            let crit = model.critical_slownesses(wave);
            for shell in model.shells() {
                for i in [shell.i_top, shell.i_bot] {
                    let p = model.samples()[i].slowness(wave);
                    assert!(
                        crit.iter().any(|&c| (c - p).abs() <= 1e-9),
                        "missing critical slowness {} for {:?}",
                        p,
                        wave
                    );
                }
            }
            // Sorted descending, strictly monotone after dedup.
            for pair in crit.windows(2) {
                assert!(pair[0] > pair[1]);
            }
        }
    }

    #[test]
    fn test_turning_radius_brackets() {
        let model = cored_model();
        let samples = model.samples();
        // A slowness between the surface and the next sample down turns
        // between their radii.
        let p = 0.5 * (samples[0].p_p + samples[1].p_p);
        let r = model.turning_radius(WaveType::P, p).unwrap();
        assert!(r < samples[0].radius && r > samples[1].radius);
        // The surface slowness turns at the surface.
        let r = model.turning_radius(WaveType::P, samples[0].p_p).unwrap();
        assert_eq!(r, 6371.0);
    }

    #[test]
    fn test_velocity_interpolation_inside_and_outside() {
        let model = cored_model();
        let mantle = model
            .shells()
            .iter()
            .position(|s| !s.is_discontinuity && s.r_top == 6371.0)
            .unwrap();
        let v = model.velocity_in_shell(mantle, WaveType::P, 6100.0);
        assert!(v.is_finite());
        assert!(v > 5.8 && v < 13.7);
        // Outside the shell the interpolant yields NaN.
        let v = model.velocity_in_shell(mantle, WaveType::P, 2000.0);
        assert!(v.is_nan());
    }

    #[test]
    fn test_bridge_velocity_collapses_tiny_jump() {
        let text = "\
bridged model
4
1 0.0    13.0 8.0      8.0      4.0     4.0     1.0 300.0 600.0
2 3000.0 11.0 7.000001 7.000001 3.90000 3.90000 1.0 300.0 600.0
3 3000.0 5.0  7.0      7.0      3.9     3.9     1.0 300.0 600.0
4 6371.0 2.7  6.0      6.0      3.5     3.5     1.0 300.0 600.0
";
        let file = parse_model(text).unwrap();
        let model = ReferenceModel::build(&file, &toy_config()).unwrap();
        // The two sides of the tiny jump now agree exactly.
        let samples = model.samples();
        let at_disc: Vec<_> = samples.iter().filter(|s| s.radius == 3000.0).collect();
        assert_eq!(at_disc.len(), 2);
        assert_eq!(at_disc[0].vp, at_disc[1].vp);
        assert_eq!(at_disc[0].vs, at_disc[1].vs);
    }

    #[test]
    fn test_lvz_flagging() {
        // Velocity drop with depth between 6171 and 6271 km radius.
        let text = "\
lvz model
5
1 0.0    13.0 8.0 8.0 4.5 4.5 1.0 300.0 600.0
2 6171.0 3.3  8.0 8.0 4.5 4.5 1.0 300.0 600.0
3 6271.0 3.3  7.6 7.6 4.2 4.2 1.0 300.0 600.0
4 6344.0 2.9  8.0 8.0 4.4 4.4 1.0 300.0 600.0
5 6371.0 2.7  8.1 8.1 4.5 4.5 1.0 300.0 600.0
";
        let file = parse_model(text).unwrap();
        let model = ReferenceModel::build(&file, &toy_config()).unwrap();
        let shell = &model.shells()[0];
        assert!(shell.has_low_velocity_zone[0]);
        assert!(shell.has_low_velocity_zone[1]);
    }
}
