use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::dcf::irr::{self, IrrConfig};
use crate::error::CarbonStreamError;
use crate::types::{with_metadata, ComputationOutput, ProjectSeries};
use crate::CarbonStreamResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Deal-level parameters for a streaming DCF run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcfConfig {
    /// Annual discount rate (decimal, e.g. 0.08 for 8%).
    pub wacc: f64,
    /// Total upfront investment, drawn down evenly over the tenor.
    pub investment_total: f64,
    /// Deployment tenor in years.
    pub investment_tenor_years: u32,
    /// IRR solver parameters.
    #[serde(default)]
    pub irr: IrrConfig,
}

/// One year of the derived cash-flow schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub year: u32,
    pub gross_volume: f64,
    pub price: f64,
    /// Volume attributable to the investor: gross volume x streaming%.
    pub share_of_credits: f64,
    pub revenue: f64,
    /// Negative drawdown while the investment deploys, zero afterwards.
    pub investment_cash_flow: f64,
    pub net_cash_flow: f64,
    /// 1 / (1 + wacc)^(year - 1); year 1 is undiscounted.
    pub discount_factor: f64,
    pub present_value: f64,
    pub cumulative_cash_flow: f64,
    pub cumulative_present_value: f64,
}

/// Immutable result bundle of one DCF Engine invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcfResult {
    pub schedule: Vec<ScheduleRow>,
    /// Sum of present values.
    pub npv: f64,
    /// Root of NPV(rate) = 0; NaN when the cash-flow signs admit no real IRR.
    pub irr: f64,
    pub net_cash_flows: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run the streaming DCF over the full series.
pub fn run_dcf(
    series: &ProjectSeries,
    streaming_percentage: f64,
    config: &DcfConfig,
) -> CarbonStreamResult<ComputationOutput<DcfResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let result = evaluate(series, streaming_percentage, config)?;

    if result.irr.is_nan() {
        warnings.push(
            "No real IRR exists for this cash-flow profile; the irr field is NaN".to_string(),
        );
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Annual Carbon Streaming DCF",
        &serde_json::json!({
            "streaming_percentage": streaming_percentage,
            "wacc": config.wacc,
            "investment_total": config.investment_total,
            "investment_tenor_years": config.investment_tenor_years,
            "years": series.years(),
        }),
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Bare engine run without the output envelope. The analysis and simulation
/// layers call this in their inner loops.
pub(crate) fn evaluate(
    series: &ProjectSeries,
    streaming_percentage: f64,
    config: &DcfConfig,
) -> CarbonStreamResult<DcfResult> {
    validate(streaming_percentage, config)?;

    let years = series.years();
    let annual_drawdown = config.investment_total / config.investment_tenor_years as f64;

    let mut schedule = Vec::with_capacity(years);
    let mut net_cash_flows = Vec::with_capacity(years);
    let mut cumulative_cash_flow = 0.0;
    let mut cumulative_present_value = 0.0;

    for t in 0..years {
        let year = (t + 1) as u32;
        let gross_volume = series.gross_volume()[t];
        let price = series.price()[t];

        let share_of_credits = gross_volume * streaming_percentage;
        let revenue = share_of_credits * price;
        let investment_cash_flow = if year <= config.investment_tenor_years {
            -annual_drawdown
        } else {
            0.0
        };
        let net_cash_flow = revenue + investment_cash_flow;
        let discount_factor = 1.0 / (1.0 + config.wacc).powi(t as i32);
        let present_value = net_cash_flow * discount_factor;

        cumulative_cash_flow += net_cash_flow;
        cumulative_present_value += present_value;
        net_cash_flows.push(net_cash_flow);

        schedule.push(ScheduleRow {
            year,
            gross_volume,
            price,
            share_of_credits,
            revenue,
            investment_cash_flow,
            net_cash_flow,
            discount_factor,
            present_value,
            cumulative_cash_flow,
            cumulative_present_value,
        });
    }

    let npv = cumulative_present_value;
    if !npv.is_finite() {
        return Err(CarbonStreamError::InvalidInput {
            field: "series".into(),
            reason: "NPV is not finite; the input data is malformed".into(),
        });
    }

    let irr = irr::solve(&net_cash_flows, &config.irr);

    Ok(DcfResult {
        schedule,
        npv,
        irr,
        net_cash_flows,
    })
}

fn validate(streaming_percentage: f64, config: &DcfConfig) -> CarbonStreamResult<()> {
    if !(0.0..=1.0).contains(&streaming_percentage) || streaming_percentage.is_nan() {
        return Err(CarbonStreamError::InvalidInput {
            field: "streaming_percentage".into(),
            reason: format!("Must be within [0, 1], got {streaming_percentage}"),
        });
    }
    if config.wacc <= -1.0 || !config.wacc.is_finite() {
        return Err(CarbonStreamError::InvalidInput {
            field: "wacc".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }
    if config.investment_tenor_years == 0 {
        return Err(CarbonStreamError::InvalidInput {
            field: "investment_tenor_years".into(),
            reason: "Deployment tenor must be at least one year".into(),
        });
    }
    if config.investment_total < 0.0 || !config.investment_total.is_finite() {
        return Err(CarbonStreamError::InvalidInput {
            field: "investment_total".into(),
            reason: "Investment amount must be non-negative and finite".into(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
