//! Inverse problems built on the DCF engine: goal seeking, deal valuation,
//! sensitivity sweeps, and breakeven solving.

pub mod breakeven;
pub mod deal;
pub mod goal_seek;
pub mod sensitivity;

pub use breakeven::{solve_breakeven, BreakevenInput, BreakevenResult, BreakevenVariable};
pub use deal::{
    project_irr_at_price, solve_purchase_price, solve_streaming_for_price, PriceIrrResult,
    PriceSolveInput, PriceSolveResult,
};
pub use goal_seek::{find_target_irr_stream, GoalSeekInput, GoalSeekResult};
pub use sensitivity::{irr_grid, SensitivityInput, SensitivityOutput};

use crate::dcf::engine::DcfResult;
use crate::CarbonStreamResult;

/// Stand-in error magnitude for trial points where the IRR is undefined.
pub(crate) const NAN_PENALTY: f64 = 1e6;

/// Signed IRR error of an engine run against a target.
///
/// An undefined IRR maps to a large signed penalty: positive when the net
/// cash flows are all inflows (the return is unbounded above), negative
/// otherwise (no return is attainable). This keeps bound feasibility checks
/// and bracketing searches pointed in the economically right direction.
pub(crate) fn irr_error(outcome: &CarbonStreamResult<DcfResult>, target_irr: f64) -> f64 {
    match outcome {
        Ok(result) => {
            if result.irr.is_nan() {
                let has_positive = result.net_cash_flows.iter().any(|&cf| cf > 0.0);
                let has_negative = result.net_cash_flows.iter().any(|&cf| cf < 0.0);
                if has_positive && !has_negative {
                    NAN_PENALTY
                } else {
                    -NAN_PENALTY
                }
            } else {
                result.irr - target_irr
            }
        }
        Err(_) => -NAN_PENALTY,
    }
}
