//! Payback period from a net cash-flow series.

/// Fractional year at which cumulative cash flow first turns positive.
///
/// Interpolates within the transition year: the prior cumulative deficit
/// divided by that year's cash flow gives the fraction of the year needed to
/// recover. Returns `None` when cumulative cash flow never turns positive
/// within the series.
pub fn payback_period(net_cash_flows: &[f64]) -> Option<f64> {
    fractional_payback(net_cash_flows)
}

/// Discounted variant: cash flows are discounted at `rate` (year 1
/// undiscounted, matching the engine's convention) before the cumulative
/// crossing is located.
pub fn discounted_payback_period(net_cash_flows: &[f64], rate: f64) -> Option<f64> {
    let discounted: Vec<f64> = net_cash_flows
        .iter()
        .enumerate()
        .map(|(t, cf)| cf / (1.0 + rate).powi(t as i32))
        .collect();
    fractional_payback(&discounted)
}

fn fractional_payback(cash_flows: &[f64]) -> Option<f64> {
    let mut cumulative = 0.0;
    for (t, &cf) in cash_flows.iter().enumerate() {
        let prior = cumulative;
        cumulative += cf;
        if cumulative > 0.0 {
            let year = (t + 1) as f64;
            if t == 0 || cf == 0.0 {
                return Some(year);
            }
            return Some(year - 1.0 + (-prior) / cf);
        }
    }
    None
}
