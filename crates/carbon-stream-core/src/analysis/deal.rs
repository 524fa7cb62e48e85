//! Deal valuation: three inverse problems over the same engine.
//!
//! Solve for the maximum purchase price hitting a target IRR, compute the
//! IRR at a fixed price, or solve for the streaming percentage at a fixed
//! price. Each operation is a pure function of the series and parameters.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::analysis::goal_seek::{self, GoalSeekInput, GoalSeekResult};
use crate::analysis::irr_error;
use crate::dcf::engine::{self, DcfConfig, DcfResult};
use crate::dcf::payback;
use crate::error::CarbonStreamError;
use crate::solver::{self, RootOutcome, SolverConfig};
use crate::types::{with_metadata, ComputationOutput, ProjectSeries};
use crate::CarbonStreamResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for the maximum-purchase-price solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSolveInput {
    pub streaming_percentage: f64,
    pub target_irr: f64,
    /// Search bracket in currency units; deal sizes vary enormously, so the
    /// default spans $1,000 to $1,000,000,000.
    #[serde(default = "default_price_floor")]
    pub price_floor: f64,
    #[serde(default = "default_price_ceiling")]
    pub price_ceiling: f64,
    /// Accuracy on the purchase price.
    #[serde(default = "default_price_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_price_floor() -> f64 {
    1_000.0
}

fn default_price_ceiling() -> f64 {
    1_000_000_000.0
}

fn default_price_tolerance() -> f64 {
    0.01
}

fn default_max_iterations() -> u32 {
    100
}

impl PriceSolveInput {
    pub fn new(streaming_percentage: f64, target_irr: f64) -> Self {
        Self {
            streaming_percentage,
            target_irr,
            price_floor: default_price_floor(),
            price_ceiling: default_price_ceiling(),
            tolerance: default_price_tolerance(),
            max_iterations: default_max_iterations(),
        }
    }
}

/// Result of the maximum-purchase-price solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSolveResult {
    /// Purchase price at which the deal returns exactly the target IRR.
    pub purchase_price: f64,
    pub actual_irr: f64,
    pub npv: f64,
    pub dcf: DcfResult,
}

/// Result of the direct IRR-at-price computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceIrrResult {
    pub purchase_price: f64,
    /// NaN when the cash-flow signs admit no real IRR.
    pub irr: f64,
    pub npv: f64,
    pub payback_years: Option<f64>,
    pub discounted_payback_years: Option<f64>,
    pub dcf: DcfResult,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Solve for the purchase price at which the deal IRR equals the target.
///
/// The IRR is decreasing in price, so feasibility is checked at both bracket
/// ends first: a target still exceeded at the ceiling (or still missed at
/// the floor) fails fast with the violated bound.
pub fn solve_purchase_price(
    series: &ProjectSeries,
    input: &PriceSolveInput,
    config: &DcfConfig,
) -> CarbonStreamResult<ComputationOutput<PriceSolveResult>> {
    let start = Instant::now();
    let warnings: Vec<String> = Vec::new();

    if !input.target_irr.is_finite() {
        return Err(CarbonStreamError::InvalidInput {
            field: "target_irr".into(),
            reason: "Target IRR must be finite".into(),
        });
    }
    if input.price_floor <= 0.0 || input.price_ceiling <= input.price_floor {
        return Err(CarbonStreamError::InvalidInput {
            field: "price_floor/price_ceiling".into(),
            reason: format!(
                "Bracket must satisfy 0 < floor < ceiling, got [{}, {}]",
                input.price_floor, input.price_ceiling
            ),
        });
    }

    let error_at = |price: f64| -> f64 {
        let trial = DcfConfig {
            investment_total: price,
            ..config.clone()
        };
        irr_error(
            &engine::evaluate(series, input.streaming_percentage, &trial),
            input.target_irr,
        )
    };

    let error_floor = error_at(input.price_floor);
    let error_ceiling = error_at(input.price_ceiling);

    if error_floor < 0.0 && error_ceiling < 0.0 {
        return Err(CarbonStreamError::Infeasible {
            target: format!("IRR {:.4}", input.target_irr),
            bound: format!("${} price floor", input.price_floor),
            reason: "the IRR stays below the target even at the minimum purchase price".into(),
        });
    }
    if error_floor > 0.0 && error_ceiling > 0.0 {
        return Err(CarbonStreamError::Infeasible {
            target: format!("IRR {:.4}", input.target_irr),
            bound: format!("${} price ceiling", input.price_ceiling),
            reason: "the IRR still exceeds the target at the maximum purchase price".into(),
        });
    }

    let solver_config = SolverConfig {
        tolerance: input.tolerance,
        max_iterations: input.max_iterations,
    };
    let purchase_price = match solver::brent(
        error_at,
        input.price_floor,
        input.price_ceiling,
        &solver_config,
    ) {
        RootOutcome::Converged { root, .. } => root,
        RootOutcome::NoSignChange { f_lower, f_upper } => {
            return Err(CarbonStreamError::ConvergenceFailure {
                function: "solve_purchase_price".into(),
                iterations: 0,
                last_residual: f_lower.abs().min(f_upper.abs()),
            });
        }
        RootOutcome::NoConvergence {
            iterations,
            last_residual,
        } => {
            return Err(CarbonStreamError::ConvergenceFailure {
                function: "solve_purchase_price".into(),
                iterations,
                last_residual,
            });
        }
    };

    let solved_config = DcfConfig {
        investment_total: purchase_price,
        ..config.clone()
    };
    let dcf = engine::evaluate(series, input.streaming_percentage, &solved_config)?;
    let result = PriceSolveResult {
        purchase_price,
        actual_irr: dcf.irr,
        npv: dcf.npv,
        dcf,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Maximum Purchase Price for Target IRR",
        &serde_json::json!({
            "streaming_percentage": input.streaming_percentage,
            "target_irr": input.target_irr,
            "price_bracket": [input.price_floor, input.price_ceiling],
            "wacc": config.wacc,
        }),
        warnings,
        elapsed,
        result,
    ))
}

/// Compute IRR and NPV at a fixed purchase price; no root-finding involved.
pub fn project_irr_at_price(
    series: &ProjectSeries,
    streaming_percentage: f64,
    purchase_price: f64,
    config: &DcfConfig,
) -> CarbonStreamResult<ComputationOutput<PriceIrrResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_price(purchase_price)?;

    let priced_config = DcfConfig {
        investment_total: purchase_price,
        ..config.clone()
    };
    let dcf = engine::evaluate(series, streaming_percentage, &priced_config)?;

    if dcf.irr.is_nan() {
        warnings.push(
            "No real IRR exists at this purchase price; the irr field is NaN".to_string(),
        );
    }

    let result = PriceIrrResult {
        purchase_price,
        irr: dcf.irr,
        npv: dcf.npv,
        payback_years: payback::payback_period(&dcf.net_cash_flows),
        discounted_payback_years: payback::discounted_payback_period(
            &dcf.net_cash_flows,
            config.wacc,
        ),
        dcf,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Project IRR at Fixed Purchase Price",
        &serde_json::json!({
            "streaming_percentage": streaming_percentage,
            "purchase_price": purchase_price,
            "wacc": config.wacc,
        }),
        warnings,
        elapsed,
        result,
    ))
}

/// Solve for the streaming percentage that hits the target IRR at a fixed
/// purchase price. Delegates to the goal seeker with the price installed as
/// the investment total.
pub fn solve_streaming_for_price(
    series: &ProjectSeries,
    purchase_price: f64,
    target_irr: f64,
    config: &DcfConfig,
) -> CarbonStreamResult<ComputationOutput<GoalSeekResult>> {
    validate_price(purchase_price)?;

    let priced_config = DcfConfig {
        investment_total: purchase_price,
        ..config.clone()
    };
    goal_seek::find_target_irr_stream(series, &GoalSeekInput::for_target(target_irr), &priced_config)
}

fn validate_price(purchase_price: f64) -> CarbonStreamResult<()> {
    if purchase_price <= 0.0 || !purchase_price.is_finite() {
        return Err(CarbonStreamError::InvalidInput {
            field: "purchase_price".into(),
            reason: format!("Must be positive and finite, got {purchase_price}"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dcf::irr::IrrConfig;

    fn flat_series() -> ProjectSeries {
        ProjectSeries::new(
            vec![100_000.0; 20],
            vec![50.0; 20],
            vec![0.0; 20],
        )
        .unwrap()
    }

    fn standard_config() -> DcfConfig {
        DcfConfig {
            wacc: 0.08,
            investment_total: 20_000_000.0,
            investment_tenor_years: 5,
            irr: IrrConfig::default(),
        }
    }

    #[test]
    fn test_price_solve_hits_target() {
        let series = flat_series();
        let config = standard_config();
        let out =
            solve_purchase_price(&series, &PriceSolveInput::new(0.48, 0.12), &config).unwrap();
        let result = &out.result;

        assert!(result.purchase_price > 1_000.0);
        assert!(result.purchase_price < 1_000_000_000.0);
        assert!(
            (result.actual_irr - 0.12).abs() < 1e-4,
            "actual={}",
            result.actual_irr
        );
    }

    #[test]
    fn test_higher_target_means_lower_price() {
        let series = flat_series();
        let config = standard_config();
        let modest =
            solve_purchase_price(&series, &PriceSolveInput::new(0.48, 0.08), &config).unwrap();
        let aggressive =
            solve_purchase_price(&series, &PriceSolveInput::new(0.48, 0.20), &config).unwrap();
        assert!(aggressive.result.purchase_price < modest.result.purchase_price);
    }

    #[test]
    fn test_price_solve_zero_prices_infeasible() {
        let series = ProjectSeries::new(
            vec![100_000.0; 10],
            vec![0.0; 10],
            vec![0.0; 10],
        )
        .unwrap();
        let err = solve_purchase_price(
            &series,
            &PriceSolveInput::new(0.48, 0.10),
            &standard_config(),
        )
        .unwrap_err();
        match err {
            CarbonStreamError::Infeasible { bound, .. } => {
                assert!(bound.contains("floor"), "bound={bound}");
            }
            other => panic!("expected Infeasible, got {other:?}"),
        }
    }

    #[test]
    fn test_irr_at_price_matches_engine() {
        let series = flat_series();
        let config = standard_config();
        let out = project_irr_at_price(&series, 0.48, 20_000_000.0, &config).unwrap();
        let direct = engine::evaluate(&series, 0.48, &config).unwrap();
        assert_eq!(out.result.irr.to_bits(), direct.irr.to_bits());
        assert_eq!(out.result.npv.to_bits(), direct.npv.to_bits());
        assert!(out.result.payback_years.is_some());
        assert!(
            out.result.discounted_payback_years.unwrap() > out.result.payback_years.unwrap()
        );
    }

    #[test]
    fn test_irr_at_price_rejects_non_positive_price() {
        let series = flat_series();
        let config = standard_config();
        assert!(project_irr_at_price(&series, 0.48, 0.0, &config).is_err());
        assert!(project_irr_at_price(&series, 0.48, -5.0, &config).is_err());
    }

    #[test]
    fn test_streaming_for_price_round_trip() {
        let series = flat_series();
        let config = standard_config();
        let out = solve_streaming_for_price(&series, 15_000_000.0, 0.15, &config).unwrap();
        let result = &out.result;

        assert!((0.0..=1.0).contains(&result.streaming_percentage));
        assert!(
            (result.actual_irr - 0.15).abs() < 1e-3,
            "actual={}",
            result.actual_irr
        );
    }

    #[test]
    fn test_streaming_for_price_consistent_with_price_solve() {
        // Solving price for a fixed streaming, then streaming for that
        // price, should return close to the original streaming percentage.
        let series = flat_series();
        let config = standard_config();
        let price_out =
            solve_purchase_price(&series, &PriceSolveInput::new(0.48, 0.12), &config).unwrap();
        let stream_out = solve_streaming_for_price(
            &series,
            price_out.result.purchase_price,
            0.12,
            &config,
        )
        .unwrap();
        assert!(
            (stream_out.result.streaming_percentage - 0.48).abs() < 1e-2,
            "streaming={}",
            stream_out.result.streaming_percentage
        );
    }
}
