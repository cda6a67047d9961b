// Cumulative Integrator
// Per-wave-type cumulative tau and X integrals from the surface to every
// depth sample, for every merged ray parameter

use crate::config::TablesConfig;
use crate::errors::TableResult;
use crate::layer_integrals::integrate_layer;
use crate::reference_model::{RadialModel, ShellName};
use crate::sampling::{MergedSlownesses, TauSample};
use crate::{WaveType, DTOL};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowTag {
    UpperMantle,
    CoreMantleBoundary,
    InnerCoreBoundary,
    Center,
}

/// One row of cumulative integrals: surface down to this depth sample.
/// Entries hold the doubled (down plus up) integral truncated at the
/// ray's own turning depth, so a row is additive for both through-going
/// and turning rays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CumulativeRow {
    pub radius: f64,
    pub z: f64,
    /// Slowness of the depth sample this row stops at.
    pub slowness: f64,
    pub tau: Vec<f64>,
    pub x: Vec<f64>,
    pub tag: Option<RowTag>,
    pub low_velocity_zone: bool,
}

/// The full cumulative table for one wave type, with the four named
/// snapshot rows resolved to indices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CumulativeIntegrals {
    pub wave: WaveType,
    pub rows: Vec<CumulativeRow>,
    pub upper_mantle: usize,
    pub cmb: usize,
    pub icb: usize,
    pub center: usize,
}

impl CumulativeIntegrals {
    pub fn row(&self, tag: RowTag) -> &CumulativeRow {
        let idx = match tag {
            RowTag::UpperMantle => self.upper_mantle,
            RowTag::CoreMantleBoundary => self.cmb,
            RowTag::InnerCoreBoundary => self.icb,
            RowTag::Center => self.center,
        };
        &self.rows[idx]
    }
}

/// Integrates every depth layer of the depth model, accumulating row by
/// row. For S the upper-mantle snapshot honours the conversion limit: the
/// first depth at which the S slowness falls below the P slowness at the
/// deepest earthquake depth, so P-to-S conversions bottoming deeper than
/// any P stay representable.
pub fn integrate_cumulative(
    model: &impl RadialModel,
    wave: WaveType,
    depth: &[TauSample],
    merged: &MergedSlownesses,
    config: &TablesConfig,
    s_conversion_limit: Option<f64>,
) -> TableResult<CumulativeIntegrals> {
    let n = merged.values.len();
    let mut rows: Vec<CumulativeRow> = Vec::with_capacity(depth.len());

    if depth.is_empty() {
        return Ok(CumulativeIntegrals {
            wave,
            rows,
            upper_mantle: 0,
            cmb: 0,
            icb: 0,
            center: 0,
        });
    }

    rows.push(CumulativeRow {
        radius: depth[0].radius,
        z: depth[0].z,
        slowness: depth[0].slowness,
        tau: vec![0.0; n],
        x: vec![0.0; n],
        tag: None,
        low_velocity_zone: false,
    });

    // Once a ray has bottomed, deeper layers must not contribute even
    // where the slowness profile rises back above the ray parameter.
    let mut turned = vec![false; n];

    for k in 1..depth.len() {
        let above = &depth[k - 1];
        let below = &depth[k];
        let mut tau = rows[k - 1].tau.clone();
        let mut x = rows[k - 1].x.clone();

        if (below.z - above.z).abs() > DTOL {
            for (j, &p) in merged.values.iter().enumerate() {
                if turned[j] {
                    continue;
                }
                if p > above.slowness + DTOL {
                    turned[j] = true;
                    continue;
                }
                let li = integrate_layer(p, above.slowness, below.slowness, above.z, below.z)?;
                tau[j] += 2.0 * li.tau;
                x[j] += 2.0 * li.x;
                if above.slowness >= below.slowness && p >= below.slowness - DTOL {
                    turned[j] = true;
                }
            }
        }

        let lvz =
            (below.z - above.z).abs() <= DTOL && below.slowness > above.slowness + DTOL;
        rows.push(CumulativeRow {
            radius: below.radius,
            z: below.z,
            slowness: below.slowness,
            tau,
            x,
            tag: None,
            low_velocity_zone: lvz,
        });
    }

    let center = rows.len() - 1;
    let cmb = boundary_row(model, &rows, ShellName::CoreMantleBoundary).unwrap_or(center);
    let icb = boundary_row(model, &rows, ShellName::InnerCoreBoundary).unwrap_or(center);

    let conv = model.conversions();
    let z_max = conv.flat_z((conv.surface_radius - config.max_earthquake_depth_km).max(1.0));
    let upper_mantle = match s_conversion_limit {
        Some(p_limit) => rows
            .iter()
            .position(|r| r.slowness < p_limit)
            .unwrap_or(center),
        None => rows
            .iter()
            .position(|r| r.z >= z_max - DTOL)
            .unwrap_or(center),
    }
    .min(center);

    let mut out = CumulativeIntegrals {
        wave,
        rows,
        upper_mantle,
        cmb,
        icb,
        center,
    };
    out.rows[center].tag = Some(RowTag::Center);
    out.rows[cmb].tag.get_or_insert(RowTag::CoreMantleBoundary);
    out.rows[icb].tag.get_or_insert(RowTag::InnerCoreBoundary);
    out.rows[upper_mantle].tag.get_or_insert(RowTag::UpperMantle);
    Ok(out)
}

/// First row at the named boundary radius.
fn boundary_row(
    model: &impl RadialModel,
    rows: &[CumulativeRow],
    name: ShellName,
) -> Option<usize> {
    let r = model
        .shells()
        .iter()
        .find(|s| s.name == Some(name))
        .map(|s| s.r_top)?;
    rows.iter().position(|row| (row.radius - r).abs() <= 1e-6)
}
