// Layer Integrator
// Closed-form tau and range integrals for one model layer under the
// flat-Earth transform, plus the dX/dp routine used by the caustic finder

use crate::errors::{TableError, TableResult};
use crate::{DMIN, DTOL};
use std::f64::consts::FRAC_PI_2;
use tracing::warn;

/// Contributions of one layer to the delay time and range of a ray.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayerIntegrals {
    pub tau: f64,
    pub x: f64,
}

/// Slowness within a layer follows the exponential profile
/// u(z) = b + (p_top - b) * exp(z - z_top), fixed by the two endpoint
/// slownesses. `b` is the translation parameter of that profile.
fn translation(p_top: f64, p_bot: f64, z_top: f64, z_bot: f64) -> f64 {
    p_top - (p_bot - p_top) / (z_bot - z_top).exp_m1()
}

/// How the ray with parameter p traverses the layer.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Traversal {
    /// Ray does not enter the layer (or grazes a top it turns at).
    None,
    /// Ray passes through to the layer base; endpoint slowness p_bot.
    Through,
    /// Ray bottoms inside the layer (or exactly at its base).
    Turning,
}

fn classify(p: f64, p_top: f64, p_bot: f64) -> Traversal {
    if p > p_top + DTOL {
        return Traversal::None;
    }
    if (p - p_top).abs() <= DTOL {
        // Grazing the top: in a normal layer the ray turns there and the
        // layer contributes nothing; under an inverted (high-slowness)
        // layer it continues down with a singular top endpoint.
        return if p_bot > p_top {
            Traversal::Through
        } else {
            Traversal::None
        };
    }
    if p > p_bot + DTOL {
        Traversal::Turning
    } else {
        Traversal::Through
    }
}

/// Integrates tau and X across one layer for ray parameter p. Layers are
/// given in depth order: z_top < z_bot, slownesses p_top at z_top and p_bot
/// at z_bot. The seven cases of the closed form are dispatched in order;
/// every log and arcsin argument is clamped before use.
pub fn integrate_layer(
    p: f64,
    p_top: f64,
    p_bot: f64,
    z_top: f64,
    z_bot: f64,
) -> TableResult<LayerIntegrals> {
    // Case 1: zero-thickness layer.
    if (z_top - z_bot).abs() <= DTOL {
        return Ok(LayerIntegrals::default());
    }

    let dz = z_bot - z_top;

    // Case 2: constant-slowness layer.
    if (p_top - p_bot).abs() <= DTOL {
        if (p - p_top).abs() <= DTOL || p > p_top {
            return Ok(LayerIntegrals::default());
        }
        let s = (p_top * p_top - p * p).abs().sqrt();
        return finish(
            LayerIntegrals {
                tau: dz * s,
                x: p * dz / s.max(DMIN),
            },
            p,
            p_top,
            p_bot,
            z_top,
            z_bot,
        );
    }

    // Case 3: straight-through ray reaching the centre. The whole pi/2 of
    // range is absorbed into this last layer.
    if p <= DTOL && p_bot <= DTOL {
        return finish(
            LayerIntegrals {
                tau: p_top,
                x: FRAC_PI_2,
            },
            p,
            p_top,
            p_bot,
            z_top,
            z_bot,
        );
    }

    let b = translation(p_top, p_bot, z_top, z_bot);

    // Case 4: straight-through ray above the centre.
    if p <= DTOL {
        return finish(
            LayerIntegrals {
                tau: b * dz + (p_bot - p_top),
                x: 0.0,
            },
            p,
            p_top,
            p_bot,
            z_top,
            z_bot,
        );
    }

    // Cases 5-7: evaluate the antiderivative at both slowness endpoints.
    let traversal = classify(p, p_top, p_bot);
    if traversal == Traversal::None {
        return Ok(LayerIntegrals::default());
    }
    let u_end = match traversal {
        Traversal::Turning => p,
        _ => p_bot,
    };

    let b2p2 = b * b - p * p;
    // Sign of (u - b), constant across the layer.
    let sigma = if p_top - b >= 0.0 { 1.0 } else { -1.0 };

    let (f_top, j_top) = antiderivative(p_top, p, b, b2p2, sigma);
    let (f_end, j_end) = antiderivative(u_end, p, b, b2p2, sigma);

    finish(
        LayerIntegrals {
            tau: f_end - f_top,
            x: p * (j_end - j_top),
        },
        p,
        p_top,
        p_bot,
        z_top,
        z_bot,
    )
}

/// Antiderivative pieces at slowness endpoint u: the tau antiderivative
/// F(u) = s + b*ln(u + s) + (b^2 - p^2)*J(u) and the range kernel
/// J(u) = integral of du / ((u - b) * sqrt(u^2 - p^2)), with the log or
/// arcsin branch selected by the sign of b^2 - p^2. The u = p endpoint of
/// a bottoming ray takes the specialized limit values.
fn antiderivative(u: f64, p: f64, b: f64, b2p2: f64, sigma: f64) -> (f64, f64) {
    let s = (u * u - p * p).max(0.0).sqrt();
    let at_turn = (u - p).abs() <= DTOL;

    let j = if b2p2.abs().sqrt() <= DMIN {
        // Degenerate b = +-p limit of the kernel.
        if b >= 0.0 {
            let denom = (u - p).max(DMIN);
            -((u + p) / denom).sqrt() / p
        } else {
            ((u - p).max(0.0) / (u + p)).sqrt() / p
        }
    } else if b2p2 > 0.0 {
        let w = b2p2.sqrt();
        if at_turn {
            p.max(DMIN).ln() / w
        } else {
            let ratio = (p * p - b * u + w * s) / (u - b);
            ratio.max(DMIN).ln() / w
        }
    } else {
        let q = (-b2p2).sqrt();
        if at_turn {
            -sigma * FRAC_PI_2 / q
        } else {
            let arg = ((p * p - b * u) / (p * (u - b))).clamp(-1.0, 1.0);
            -sigma * arg.asin() / q
        }
    };

    let log_term = if at_turn {
        b * p.max(DMIN).ln()
    } else {
        b * (u + s).max(DMIN).ln()
    };

    (s + log_term + b2p2 * j, j)
}

/// Shared validation of a computed layer contribution. A tau below the
/// bracketing tolerance signals an upstream bug and is fatal; a mildly
/// negative X is tolerated with a log.
fn finish(
    result: LayerIntegrals,
    p: f64,
    p_top: f64,
    p_bot: f64,
    z_top: f64,
    z_bot: f64,
) -> TableResult<LayerIntegrals> {
    if result.tau < -crate::TAUINTTOL {
        return Err(TableError::NegativeTauIntegral {
            tau: result.tau,
            p,
            p_top,
            p_bot,
            z_top,
            z_bot,
        });
    }
    if result.x < -DMIN {
        warn!(
            x = result.x,
            p, p_top, p_bot, "negative layer range tolerated"
        );
    }
    Ok(result)
}

/// dX/dp contribution of one layer for ray parameter p. Degenerate layers
/// short-circuit to zero. Grazing the top of a normal layer yields NaN:
/// the derivative is singular there and the caustic finder backs off by a
/// slowness offset when it sees it.
pub fn integrate_derivative(p: f64, p_top: f64, p_bot: f64, z_top: f64, z_bot: f64) -> f64 {
    if (z_top - z_bot).abs() <= DTOL || p <= DTOL {
        return 0.0;
    }
    let dz = z_bot - z_top;

    if (p_top - p_bot).abs() <= DTOL {
        if p > p_top - DTOL {
            return 0.0;
        }
        let s = (p_top * p_top - p * p).sqrt().max(DMIN);
        return dz * p_top * p_top / (s * s * s);
    }

    if p > p_top + DTOL {
        return 0.0;
    }
    if (p - p_top).abs() <= DTOL && p_top > p_bot {
        return f64::NAN;
    }

    let b = translation(p_top, p_bot, z_top, z_bot);
    let b2p2 = b * b - p * p;
    if b2p2.abs().sqrt() <= DMIN {
        return 0.0;
    }
    let sigma = if p_top - b >= 0.0 { 1.0 } else { -1.0 };
    let s_top = (p_top * p_top - p * p).max(0.0).sqrt().max(DMIN);

    if p > p_bot + DTOL {
        // Turning inside the layer: the moving lower boundary is folded
        // into the closed form.
        if b2p2 > 0.0 {
            let w = b2p2.sqrt();
            let n_top = p * p - b * p_top + w * s_top;
            let d_top = p_top - b;
            let ratio = (n_top / d_top).max(DMIN);
            let g = p.max(DMIN).ln() - ratio.ln();
            b * b * g / (w * w * w)
                + 1.0 / w
                + p * p * (s_top - w) * (s_top - w) / (w * w * s_top * n_top)
        } else {
            let q = (-b2p2).sqrt();
            let w1 = ((p * p - b * p_top) / (p * (p_top - b))).clamp(-1.0, 1.0);
            sigma * b * b * (FRAC_PI_2 - w1.asin()) / (q * q * q)
                + (p * p + b * p_top) / (q * q * s_top)
        }
    } else {
        // Pass-through: fixed endpoints at p_top and p_bot.
        let s_bot = (p_bot * p_bot - p * p).max(0.0).sqrt().max(DMIN);
        let j_top = range_kernel(p_top, p, b, b2p2, sigma);
        let j_bot = range_kernel(p_bot, p, b, b2p2, sigma);
        let t_top = (p * p + b * p_top) / s_top;
        let t_bot = (p * p + b * p_bot) / s_bot;
        (b * b * (j_bot - j_top) + t_bot - t_top) / b2p2
    }
}

fn range_kernel(u: f64, p: f64, b: f64, b2p2: f64, sigma: f64) -> f64 {
    let s = (u * u - p * p).max(0.0).sqrt();
    if b2p2 > 0.0 {
        let w = b2p2.sqrt();
        let ratio = (p * p - b * u + w * s) / (u - b);
        ratio.max(DMIN).ln() / w
    } else {
        let q = (-b2p2).sqrt();
        let arg = ((p * p - b * u) / (p * (u - b))).clamp(-1.0, 1.0);
        -sigma * arg.asin() / q
    }
}
