// Pegasus Root Finder
// Reentrant regula-falsi variant shared by the sampler and depth resampler

/// Pegasus solver: a modified regula falsi that rescales the retained
/// endpoint to avoid the one-sided stalling of the plain method. No state
/// survives between calls. A bad initial bracket yields NaN; callers for
/// which the bracket exists by invariant treat NaN as fatal.
#[derive(Debug, Clone, Copy)]
pub struct PegasusSolver {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl PegasusSolver {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }

    /// Finds x in [a, b] with f(x) = 0. Requires f(a) and f(b) to straddle
    /// zero; returns NaN otherwise.
    pub fn solve<F: FnMut(f64) -> f64>(&self, a: f64, b: f64, mut f: F) -> f64 {
        let mut x0 = a;
        let mut x1 = b;
        let mut f0 = f(x0);
        let mut f1 = f(x1);

        if f0 == 0.0 {
            return x0;
        }
        if f1 == 0.0 {
            return x1;
        }
        if !f0.is_finite() || !f1.is_finite() || f0 * f1 > 0.0 {
            return f64::NAN;
        }

        let mut best = x1;
        for _ in 0..self.max_iterations {
            let denom = f1 - f0;
            if denom.abs() < f64::MIN_POSITIVE {
                break;
            }
            let x2 = x1 - f1 * (x1 - x0) / denom;
            let f2 = f(x2);
            best = x2;

            if f2.abs() <= self.tolerance || (x1 - x0).abs() <= self.tolerance * x2.abs().max(1.0) {
                return x2;
            }

            if f1 * f2 < 0.0 {
                x0 = x1;
                f0 = f1;
            } else {
                // Pegasus rescaling of the retained endpoint.
                f0 = f0 * f1 / (f1 + f2);
            }
            x1 = x2;
            f1 = f2;
        }
        best
    }
}
