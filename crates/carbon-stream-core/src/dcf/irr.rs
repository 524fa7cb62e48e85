//! Internal rate of return via bracketed root-finding with a derivative-free
//! fallback.
//!
//! The solver never raises: a cash-flow profile with no real IRR (empty, or
//! without a sign change) yields `f64::NAN`, and callers check the sentinel
//! before using the value arithmetically.

use serde::{Deserialize, Serialize};

use crate::solver::{self, RootOutcome, SolverConfig};

/// Bracket, tolerance, and fallback parameters for the IRR solver.
///
/// Held as a plain value object; `Default` supplies the standard constants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IrrConfig {
    /// Lower bracket bound; rates cannot go below -100%.
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// Upper bound used when NPV is still positive at `upper_bound`.
    pub extended_upper_bound: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    /// Seed rate for the derivative-free fallback.
    pub fallback_guess: f64,
    /// The fallback result is accepted only if |NPV| ends up below this.
    pub fallback_npv_tolerance: f64,
}

impl Default for IrrConfig {
    fn default() -> Self {
        Self {
            lower_bound: -0.99,
            upper_bound: 10.0,
            extended_upper_bound: 100.0,
            tolerance: 1e-6,
            max_iterations: 100,
            fallback_guess: 0.10,
            fallback_npv_tolerance: 1e-3,
        }
    }
}

/// Net present value of a cash-flow series at the given rate, with the first
/// entry at t = 0 (undiscounted).
pub fn npv(rate: f64, cash_flows: &[f64]) -> f64 {
    cash_flows
        .iter()
        .enumerate()
        .map(|(t, cf)| cf / (1.0 + rate).powi(t as i32))
        .sum()
}

/// Solve for the rate r with NPV(r) = 0.
///
/// Returns NaN when no real IRR exists or neither strategy converges. When a
/// series has multiple sign changes, several mathematically valid IRRs can
/// exist; this returns whichever root the bracketing method locates first.
pub fn solve(cash_flows: &[f64], config: &IrrConfig) -> f64 {
    if cash_flows.is_empty() {
        return f64::NAN;
    }
    let has_positive = cash_flows.iter().any(|&cf| cf > 0.0);
    let has_negative = cash_flows.iter().any(|&cf| cf < 0.0);
    if !has_positive || !has_negative {
        return f64::NAN;
    }

    let objective = |rate: f64| npv(rate, cash_flows);

    let mut upper = config.upper_bound;
    if objective(upper) > 0.0 {
        upper = config.extended_upper_bound;
    }

    let solver_config = SolverConfig {
        tolerance: config.tolerance,
        max_iterations: config.max_iterations,
    };

    if let RootOutcome::Converged { root, .. } =
        solver::brent(objective, config.lower_bound, upper, &solver_config)
    {
        return root;
    }

    if let RootOutcome::Converged { root, .. } =
        solver::secant(objective, config.fallback_guess, &solver_config)
    {
        if npv(root, cash_flows).abs() < config.fallback_npv_tolerance {
            return root;
        }
    }

    f64::NAN
}
