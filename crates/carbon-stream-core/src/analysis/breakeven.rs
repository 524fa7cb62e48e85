//! Breakeven solving: drive NPV to a target by moving one input variable.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::dcf::engine::{self, DcfConfig};
use crate::error::CarbonStreamError;
use crate::solver::{self, RootOutcome, SolverConfig};
use crate::types::{with_metadata, ComputationOutput, ProjectSeries};
use crate::CarbonStreamResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which input variable the breakeven solve moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakevenVariable {
    /// Multiplier on the price column, searched over [0.1, 5.0].
    PriceMultiplier,
    /// Multiplier on the gross volume column, searched over [0.1, 5.0].
    VolumeMultiplier,
    /// Streaming percentage, searched over [0.01, 1.0].
    StreamingPercentage,
}

/// Input for a breakeven solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakevenInput {
    /// NPV the solve drives toward; zero is the true breakeven.
    #[serde(default)]
    pub target_npv: f64,
    /// Streaming percentage held fixed while a multiplier variable moves.
    /// Ignored when the variable is the streaming percentage itself.
    pub streaming_percentage: f64,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_tolerance() -> f64 {
    1e-9
}

fn default_max_iterations() -> u32 {
    100
}

impl BreakevenInput {
    pub fn at_zero_npv(streaming_percentage: f64) -> Self {
        Self {
            target_npv: 0.0,
            streaming_percentage,
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
        }
    }
}

/// Result of a breakeven solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakevenResult {
    pub variable: BreakevenVariable,
    /// Solved multiplier or streaming percentage.
    pub value: f64,
    /// NPV achieved at the solved value.
    pub npv: f64,
    pub target_npv: f64,
}

const MULTIPLIER_BRACKET: (f64, f64) = (0.1, 5.0);
const STREAMING_BRACKET: (f64, f64) = (0.01, 1.0);

/// Residual below which a fallback root is accepted, in currency units.
const FALLBACK_NPV_TOLERANCE: f64 = 1e-3;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Root-find the variable value at which NPV equals the target.
///
/// Tries the bracketed method over the variable's standard bracket, then the
/// derivative-free fallback seeded at the bracket midpoint; the fallback
/// result is accepted only when its NPV residual is small.
pub fn solve_breakeven(
    series: &ProjectSeries,
    variable: BreakevenVariable,
    input: &BreakevenInput,
    config: &DcfConfig,
) -> CarbonStreamResult<ComputationOutput<BreakevenResult>> {
    let start = Instant::now();
    let warnings: Vec<String> = Vec::new();

    if !input.target_npv.is_finite() {
        return Err(CarbonStreamError::InvalidInput {
            field: "target_npv".into(),
            reason: "Target NPV must be finite".into(),
        });
    }
    validate_anchor(series, variable)?;

    let npv_error = |value: f64| -> f64 {
        let outcome = match variable {
            BreakevenVariable::PriceMultiplier => {
                engine::evaluate(&series.scaled(1.0, value), input.streaming_percentage, config)
            }
            BreakevenVariable::VolumeMultiplier => {
                engine::evaluate(&series.scaled(value, 1.0), input.streaming_percentage, config)
            }
            BreakevenVariable::StreamingPercentage => engine::evaluate(series, value, config),
        };
        match outcome {
            Ok(result) => result.npv - input.target_npv,
            Err(_) => f64::NAN,
        }
    };

    let (lower, upper) = match variable {
        BreakevenVariable::PriceMultiplier | BreakevenVariable::VolumeMultiplier => {
            MULTIPLIER_BRACKET
        }
        BreakevenVariable::StreamingPercentage => STREAMING_BRACKET,
    };

    let solver_config = SolverConfig {
        tolerance: input.tolerance,
        max_iterations: input.max_iterations,
    };

    let bracketed = solver::brent(npv_error, lower, upper, &solver_config);
    let value = match bracketed {
        RootOutcome::Converged { root, .. } => root,
        _ => {
            // Bracket failed; fall through to the derivative-free strategy.
            // Its root is only accepted inside the search bracket and with a
            // small NPV residual.
            let seed = 0.5 * (lower + upper);
            match solver::secant(npv_error, seed, &solver_config) {
                RootOutcome::Converged { root, .. }
                    if (lower..=upper).contains(&root)
                        && npv_error(root).abs() < FALLBACK_NPV_TOLERANCE =>
                {
                    root
                }
                RootOutcome::Converged { root, iterations } => {
                    return Err(CarbonStreamError::ConvergenceFailure {
                        function: breakeven_function_name(variable).into(),
                        iterations,
                        last_residual: npv_error(root),
                    });
                }
                RootOutcome::NoSignChange { f_lower, f_upper } => {
                    return Err(CarbonStreamError::ConvergenceFailure {
                        function: breakeven_function_name(variable).into(),
                        iterations: 0,
                        last_residual: f_lower.abs().min(f_upper.abs()),
                    });
                }
                RootOutcome::NoConvergence {
                    iterations,
                    last_residual,
                } => {
                    return Err(CarbonStreamError::ConvergenceFailure {
                        function: breakeven_function_name(variable).into(),
                        iterations,
                        last_residual,
                    });
                }
            }
        }
    };

    let npv = npv_error(value) + input.target_npv;
    let result = BreakevenResult {
        variable,
        value,
        npv,
        target_npv: input.target_npv,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "NPV Breakeven Solve",
        &serde_json::json!({
            "variable": variable,
            "target_npv": input.target_npv,
            "streaming_percentage": input.streaming_percentage,
            "bracket": [lower, upper],
            "wacc": config.wacc,
        }),
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// A multiplier variable needs a non-degenerate base column to scale.
fn validate_anchor(series: &ProjectSeries, variable: BreakevenVariable) -> CarbonStreamResult<()> {
    let (column, name): (&[f64], &str) = match variable {
        BreakevenVariable::PriceMultiplier => (series.price(), "price"),
        BreakevenVariable::VolumeMultiplier => (series.gross_volume(), "gross_volume"),
        BreakevenVariable::StreamingPercentage => return Ok(()),
    };
    if column.iter().all(|&v| v == 0.0) {
        return Err(CarbonStreamError::InsufficientData(format!(
            "The {name} column is entirely zero; no base value anchors the multiplier"
        )));
    }
    Ok(())
}

fn breakeven_function_name(variable: BreakevenVariable) -> &'static str {
    match variable {
        BreakevenVariable::PriceMultiplier => "breakeven_price_multiplier",
        BreakevenVariable::VolumeMultiplier => "breakeven_volume_multiplier",
        BreakevenVariable::StreamingPercentage => "breakeven_streaming_percentage",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
