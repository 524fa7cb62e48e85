//! Univariate root-finding strategies.
//!
//! Every strategy returns a tagged [`RootOutcome`] instead of raising, so
//! callers can chain strategies explicitly: try the bracketed method first,
//! fall through to the derivative-free one, and map the final failure into
//! their own error taxonomy.

use serde::{Deserialize, Serialize};

/// Tolerance and iteration cap for a root-finding run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Absolute accuracy on the abscissa at which iteration stops.
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 100,
        }
    }
}

/// Outcome of a single root-finding strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RootOutcome {
    Converged { root: f64, iterations: u32 },
    /// The bracket endpoints evaluate to the same sign; no root is enclosed.
    NoSignChange { f_lower: f64, f_upper: f64 },
    NoConvergence { iterations: u32, last_residual: f64 },
}

impl RootOutcome {
    pub fn root(&self) -> Option<f64> {
        match self {
            RootOutcome::Converged { root, .. } => Some(*root),
            _ => None,
        }
    }
}

/// Brent's method over `[lower, upper]`.
///
/// Combines bisection, secant, and inverse quadratic interpolation. Requires
/// a sign change across the bracket; reports `NoSignChange` otherwise.
pub fn brent<F>(f: F, lower: f64, upper: f64, config: &SolverConfig) -> RootOutcome
where
    F: Fn(f64) -> f64,
{
    let mut a = lower;
    let mut b = upper;
    let mut fa = f(a);
    let mut fb = f(b);

    if fa == 0.0 {
        return RootOutcome::Converged {
            root: a,
            iterations: 0,
        };
    }
    if fb == 0.0 {
        return RootOutcome::Converged {
            root: b,
            iterations: 0,
        };
    }
    if fa * fb > 0.0 || fa.is_nan() || fb.is_nan() {
        return RootOutcome::NoSignChange {
            f_lower: fa,
            f_upper: fb,
        };
    }

    let mut c = b;
    let mut fc = fb;
    let mut d = b - a;
    let mut e = d;

    for iteration in 0..config.max_iterations {
        if fb * fc > 0.0 {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        let tol = 2.0 * f64::EPSILON * b.abs() + 0.5 * config.tolerance;
        let xm = 0.5 * (c - b);
        if xm.abs() <= tol || fb == 0.0 {
            return RootOutcome::Converged {
                root: b,
                iterations: iteration,
            };
        }

        if e.abs() >= tol && fa.abs() > fb.abs() {
            // Interpolation step: secant when a == c, inverse quadratic otherwise
            let s = fb / fa;
            let (mut p, mut q) = if a == c {
                (2.0 * xm * s, 1.0 - s)
            } else {
                let q = fa / fc;
                let r = fb / fc;
                (
                    s * (2.0 * xm * q * (q - r) - (b - a) * (r - 1.0)),
                    (q - 1.0) * (r - 1.0) * (s - 1.0),
                )
            };
            if p > 0.0 {
                q = -q;
            } else {
                p = -p;
            }
            if 2.0 * p < (3.0 * xm * q - (tol * q).abs()) && 2.0 * p < (e * q).abs() {
                e = d;
                d = p / q;
            } else {
                d = xm;
                e = d;
            }
        } else {
            d = xm;
            e = d;
        }

        a = b;
        fa = fb;
        b += if d.abs() > tol {
            d
        } else if xm > 0.0 {
            tol
        } else {
            -tol
        };
        fb = f(b);
    }

    RootOutcome::NoConvergence {
        iterations: config.max_iterations,
        last_residual: fb,
    }
}

/// Derivative-free secant iteration from a seed guess.
///
/// Used as the fallback when no bracket with a sign change can be
/// established. Convergence is declared when the residual or the step falls
/// below the configured tolerance; callers should still validate the
/// residual at the returned root before trusting it.
pub fn secant<F>(f: F, guess: f64, config: &SolverConfig) -> RootOutcome
where
    F: Fn(f64) -> f64,
{
    let mut x0 = guess;
    let mut x1 = if guess == 0.0 { 1e-4 } else { guess * 1.05 };
    let mut f0 = f(x0);
    let mut f1 = f(x1);

    for iteration in 0..config.max_iterations {
        if f1.abs() < config.tolerance {
            return RootOutcome::Converged {
                root: x1,
                iterations: iteration,
            };
        }
        let denominator = f1 - f0;
        if denominator == 0.0 || !denominator.is_finite() {
            return RootOutcome::NoConvergence {
                iterations: iteration,
                last_residual: f1,
            };
        }
        let x2 = x1 - f1 * (x1 - x0) / denominator;
        if !x2.is_finite() {
            return RootOutcome::NoConvergence {
                iterations: iteration,
                last_residual: f1,
            };
        }
        if (x2 - x1).abs() < config.tolerance {
            return RootOutcome::Converged {
                root: x2,
                iterations: iteration,
            };
        }
        x0 = x1;
        f0 = f1;
        x1 = x2;
        f1 = f(x1);
    }

    RootOutcome::NoConvergence {
        iterations: config.max_iterations,
        last_residual: f1,
    }
}
