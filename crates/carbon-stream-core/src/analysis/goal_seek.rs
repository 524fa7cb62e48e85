//! Solve for the streaming percentage that achieves a target IRR.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::analysis::irr_error;
use crate::dcf::engine::{self, DcfConfig, DcfResult};
use crate::error::CarbonStreamError;
use crate::solver::{self, RootOutcome, SolverConfig};
use crate::types::{with_metadata, ComputationOutput, ProjectSeries};
use crate::CarbonStreamResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for the target-IRR streaming search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalSeekInput {
    /// Target internal rate of return (decimal).
    pub target_irr: f64,
    /// Accuracy on the streaming percentage.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_tolerance() -> f64 {
    1e-4
}

fn default_max_iterations() -> u32 {
    100
}

impl GoalSeekInput {
    pub fn for_target(target_irr: f64) -> Self {
        Self {
            target_irr,
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
        }
    }
}

/// Result of a successful goal seek.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalSeekResult {
    pub streaming_percentage: f64,
    /// IRR actually achieved at the solved streaming percentage.
    pub actual_irr: f64,
    pub dcf: DcfResult,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Find the streaming percentage in [0, 1] whose IRR matches the target.
///
/// The IRR error at both bounds is checked before any root-finding; a target
/// outside the attainable range fails fast with an `Infeasible` error naming
/// the violated bound. At exactly 0% streaming the cash flows are pure
/// drawdown and the IRR is undefined, so the lower bound is probed one
/// solver tolerance inside the bracket.
pub fn find_target_irr_stream(
    series: &ProjectSeries,
    input: &GoalSeekInput,
    config: &DcfConfig,
) -> CarbonStreamResult<ComputationOutput<GoalSeekResult>> {
    let start = Instant::now();
    let warnings: Vec<String> = Vec::new();

    if !input.target_irr.is_finite() {
        return Err(CarbonStreamError::InvalidInput {
            field: "target_irr".into(),
            reason: "Target IRR must be finite".into(),
        });
    }
    if input.tolerance <= 0.0 || input.tolerance >= 1.0 {
        return Err(CarbonStreamError::InvalidInput {
            field: "tolerance".into(),
            reason: format!("Must be within (0, 1), got {}", input.tolerance),
        });
    }

    let error_at = |streaming: f64| -> f64 {
        irr_error(
            &engine::evaluate(series, streaming, config),
            input.target_irr,
        )
    };

    let probe = input.tolerance;
    let error_low = error_at(probe);
    let error_high = error_at(1.0);

    if error_low > 0.0 && error_high > 0.0 {
        return Err(CarbonStreamError::Infeasible {
            target: format!("IRR {:.4}", input.target_irr),
            bound: "0% streaming".into(),
            reason: "the IRR already exceeds the target with no streaming share".into(),
        });
    }
    if error_low < 0.0 && error_high < 0.0 {
        return Err(CarbonStreamError::Infeasible {
            target: format!("IRR {:.4}", input.target_irr),
            bound: "100% streaming".into(),
            reason: "the IRR stays below the target even with the full streaming share".into(),
        });
    }

    let objective = |streaming: f64| -> f64 {
        if streaming <= probe {
            error_low
        } else if streaming >= 1.0 {
            error_high
        } else {
            error_at(streaming)
        }
    };

    let solver_config = SolverConfig {
        tolerance: input.tolerance,
        max_iterations: input.max_iterations,
    };
    let streaming_percentage = match solver::brent(objective, probe, 1.0, &solver_config) {
        RootOutcome::Converged { root, .. } => root.clamp(0.0, 1.0),
        RootOutcome::NoSignChange { f_lower, f_upper } => {
            return Err(CarbonStreamError::ConvergenceFailure {
                function: "find_target_irr_stream".into(),
                iterations: 0,
                last_residual: f_lower.abs().min(f_upper.abs()),
            });
        }
        RootOutcome::NoConvergence {
            iterations,
            last_residual,
        } => {
            return Err(CarbonStreamError::ConvergenceFailure {
                function: "find_target_irr_stream".into(),
                iterations,
                last_residual,
            });
        }
    };

    let dcf = engine::evaluate(series, streaming_percentage, config)?;
    let result = GoalSeekResult {
        streaming_percentage,
        actual_irr: dcf.irr,
        dcf,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Target-IRR Streaming Percentage Search",
        &serde_json::json!({
            "target_irr": input.target_irr,
            "tolerance": input.tolerance,
            "max_iterations": input.max_iterations,
            "wacc": config.wacc,
            "investment_total": config.investment_total,
        }),
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
