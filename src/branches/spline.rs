// Spline Basis
// Five basis coefficients per knot expressing tau(p) as a cubic spline
// with continuous value and slope and endpoint-matched curvature

use nalgebra::{DMatrix, DVector};

/// Computes the 5-row basis on the branch's ray-parameter grid. Rows per
/// knot k: [tau, slope, quadratic coefficient, cubic coefficient, second
/// derivative]. The knots may run in either monotone direction; branches
/// hand them over in decreasing p.
pub fn basis_coefficients(p: &[f64], tau: &[f64]) -> Vec<[f64; 5]> {
    let n = p.len();
    match n {
        0 => return Vec::new(),
        1 => return vec![[tau[0], 0.0, 0.0, 0.0, 0.0]],
        2 => {
            let h = p[1] - p[0];
            let s = if h.abs() < f64::MIN_POSITIVE {
                0.0
            } else {
                (tau[1] - tau[0]) / h
            };
            return vec![[tau[0], s, 0.0, 0.0, 0.0], [tau[1], s, 0.0, 0.0, 0.0]];
        }
        _ => {}
    }

    let m = second_derivatives(p, tau);

    let mut rows = Vec::with_capacity(n);
    for k in 0..n {
        let (slope, cubic) = if k < n - 1 {
            let h = p[k + 1] - p[k];
            let slope = (tau[k + 1] - tau[k]) / h - h * (2.0 * m[k] + m[k + 1]) / 6.0;
            let cubic = (m[k + 1] - m[k]) / (6.0 * h);
            (slope, cubic)
        } else {
            let h = p[k] - p[k - 1];
            let slope = (tau[k] - tau[k - 1]) / h + h * (2.0 * m[k] + m[k - 1]) / 6.0;
            (slope, 0.0)
        };
        rows.push([tau[k], slope, m[k] / 2.0, cubic, m[k]]);
    }
    rows
}

/// Spline second derivatives with the endpoint curvature matched to
/// one-sided three-point estimates rather than the natural zero.
fn second_derivatives(p: &[f64], tau: &[f64]) -> Vec<f64> {
    let n = p.len();
    let m0 = three_point_curvature(p[0], p[1], p[2], tau[0], tau[1], tau[2]);
    let mn = three_point_curvature(
        p[n - 3],
        p[n - 2],
        p[n - 1],
        tau[n - 3],
        tau[n - 2],
        tau[n - 1],
    );

    if n == 3 {
        return vec![m0, 0.5 * (m0 + mn), mn];
    }

    // Tridiagonal system for the interior second derivatives, with the
    // prescribed endpoint values moved to the right-hand side.
    let dim = n - 2;
    let mut a = DMatrix::<f64>::zeros(dim, dim);
    let mut rhs = DVector::<f64>::zeros(dim);
    for i in 1..n - 1 {
        let h0 = p[i] - p[i - 1];
        let h1 = p[i + 1] - p[i];
        let row = i - 1;
        let r = (tau[i + 1] - tau[i]) / h1 - (tau[i] - tau[i - 1]) / h0;
        rhs[row] = r;
        a[(row, row)] = (h0 + h1) / 3.0;
        if row > 0 {
            a[(row, row - 1)] = h0 / 6.0;
        } else {
            rhs[row] -= h0 / 6.0 * m0;
        }
        if row + 1 < dim {
            a[(row, row + 1)] = h1 / 6.0;
        } else {
            rhs[row] -= h1 / 6.0 * mn;
        }
    }

    let mut m = vec![0.0; n];
    m[0] = m0;
    m[n - 1] = mn;
    if let Some(sol) = a.lu().solve(&rhs) {
        for i in 0..dim {
            m[i + 1] = sol[i];
        }
    }
    m
}

fn three_point_curvature(x0: f64, x1: f64, x2: f64, y0: f64, y1: f64, y2: f64) -> f64 {
    let h0 = x1 - x0;
    let h1 = x2 - x1;
    if h0.abs() < f64::MIN_POSITIVE || h1.abs() < f64::MIN_POSITIVE {
        return 0.0;
    }
    2.0 * ((y2 - y1) / h1 - (y1 - y0) / h0) / (h0 + h1)
}

/// Evaluates the spline expressed by the basis rows at ray parameter pq.
/// Used by tests and by table consumers interpolating tau.
pub fn evaluate(p: &[f64], rows: &[[f64; 5]], pq: f64) -> f64 {
    let n = p.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return rows[0][0];
    }
    // Locate the segment; knots may ascend or descend.
    let descending = p[0] > p[n - 1];
    let mut k = 0;
    while k + 2 < n {
        let inside = if descending {
            pq >= p[k + 1]
        } else {
            pq <= p[k + 1]
        };
        if inside {
            break;
        }
        k += 1;
    }
    let t = pq - p[k];
    let [y, s, q, c, _] = rows[k];
    y + t * (s + t * (q + t * c))
}
