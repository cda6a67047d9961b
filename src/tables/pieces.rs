// Shell Piecing
// Converts cumulative integrals into additive per-shell partials and the
// proxy range profile used for up-going decimation

use super::cumulative::CumulativeIntegrals;
use crate::sampling::MergedSlownesses;
use crate::WaveType;
use serde::{Deserialize, Serialize};

/// Per-wave-type partial integrals. Values are single-leg (half
/// traversal), so a composite phase sums count * (downgoing half +
/// returning half) per shell; conversions pick the halves from different
/// wave types. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WavePieces {
    pub wave: WaveType,
    /// The merged ray-parameter grid, descending.
    pub ray_params: Vec<f64>,
    pub mantle_tau: Vec<f64>,
    pub mantle_x: Vec<f64>,
    pub outer_core_tau: Vec<f64>,
    pub outer_core_x: Vec<f64>,
    pub inner_core_tau: Vec<f64>,
    pub inner_core_x: Vec<f64>,
    /// Proxy grid for up-going branches: ray parameters with the running
    /// sum of the worst-case range step across depth rows.
    pub proxy_p: Vec<f64>,
    pub proxy_x: Vec<f64>,
}

impl WavePieces {
    /// Half-traversal tau of one major shell at ray-parameter index j.
    pub fn shell_tau(&self, shell: CoreShell, j: usize) -> f64 {
        match shell {
            CoreShell::Mantle => self.mantle_tau[j],
            CoreShell::OuterCore => self.outer_core_tau[j],
            CoreShell::InnerCore => self.inner_core_tau[j],
        }
    }

    pub fn shell_x(&self, shell: CoreShell, j: usize) -> f64 {
        match shell {
            CoreShell::Mantle => self.mantle_x[j],
            CoreShell::OuterCore => self.outer_core_x[j],
            CoreShell::InnerCore => self.inner_core_x[j],
        }
    }
}

/// The three major shells a composite phase traverses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoreShell {
    Mantle,
    OuterCore,
    InnerCore,
}

/// Derives the partials from the named cumulative snapshots:
/// mantle = CMB row, outer core = ICB - CMB, inner core = CENTER - ICB,
/// all halved to single-leg values.
pub fn build_pieces(cum: &CumulativeIntegrals, merged: &MergedSlownesses) -> WavePieces {
    let n = merged.values.len();
    let cmb = &cum.rows[cum.cmb];
    let icb = &cum.rows[cum.icb];
    let center = &cum.rows[cum.center];

    let mut pieces = WavePieces {
        wave: cum.wave,
        ray_params: merged.values.clone(),
        mantle_tau: vec![0.0; n],
        mantle_x: vec![0.0; n],
        outer_core_tau: vec![0.0; n],
        outer_core_x: vec![0.0; n],
        inner_core_tau: vec![0.0; n],
        inner_core_x: vec![0.0; n],
        proxy_p: merged.values.clone(),
        proxy_x: vec![0.0; n],
    };

    for j in 0..n {
        pieces.mantle_tau[j] = 0.5 * cmb.tau[j];
        pieces.mantle_x[j] = 0.5 * cmb.x[j];
        pieces.outer_core_tau[j] = 0.5 * (icb.tau[j] - cmb.tau[j]).max(0.0);
        pieces.outer_core_x[j] = 0.5 * (icb.x[j] - cmb.x[j]).max(0.0);
        pieces.inner_core_tau[j] = 0.5 * (center.tau[j] - icb.tau[j]).max(0.0);
        pieces.inner_core_x[j] = 0.5 * (center.x[j] - icb.x[j]).max(0.0);
    }

    // Proxy range: worst-case |dX| between adjacent ray parameters over
    // every depth row, accumulated from the surface end of the grid.
    for j in 1..n {
        let mut worst = 0.0f64;
        for row in &cum.rows {
            let d = (row.x[j] - row.x[j - 1]).abs();
            if d > worst {
                worst = d;
            }
        }
        pieces.proxy_x[j] = pieces.proxy_x[j - 1] + worst;
    }

    pieces
}
