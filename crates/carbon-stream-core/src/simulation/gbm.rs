//! Geometric Brownian Motion price paths and parameter estimation.
//!
//! Paths use the Euler–Maruyama discretization with annual steps:
//! `S(t+1) = S(t) * exp((mu - sigma^2/2) + sigma * Z)`, Z ~ N(0, 1).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::Normal;

use crate::error::CarbonStreamError;
use crate::CarbonStreamResult;

// ---------------------------------------------------------------------------
// Path generation
// ---------------------------------------------------------------------------

/// Generate a GBM path of `horizon_years` annual prices.
///
/// Element 0 is the initial price; each later element applies one
/// Euler–Maruyama step. A supplied seed makes the single path reproducible;
/// without one, each call draws independently.
pub fn generate_path(
    initial_price: f64,
    drift: f64,
    volatility: f64,
    horizon_years: usize,
    seed: Option<u64>,
) -> CarbonStreamResult<Vec<f64>> {
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    generate_path_with_rng(&mut rng, initial_price, drift, volatility, horizon_years)
}

/// GBM path drawn from a caller-managed RNG.
///
/// The Monte Carlo layer threads one top-level generator through every
/// trial, so trials stay independent while the whole run remains
/// reproducible from a single seed.
pub fn generate_path_with_rng(
    rng: &mut StdRng,
    initial_price: f64,
    drift: f64,
    volatility: f64,
    horizon_years: usize,
) -> CarbonStreamResult<Vec<f64>> {
    validate_parameters(initial_price, drift, volatility)?;
    if horizon_years == 0 {
        return Err(CarbonStreamError::InvalidInput {
            field: "horizon_years".into(),
            reason: "Horizon must be at least one year".into(),
        });
    }

    let standard_normal = standard_normal()?;
    let mut path = Vec::with_capacity(horizon_years);
    let mut price = initial_price;
    path.push(price);
    for _ in 1..horizon_years {
        let z: f64 = rng.sample(standard_normal);
        price *= ((drift - 0.5 * volatility * volatility) + volatility * z).exp();
        path.push(price);
    }
    Ok(path)
}

/// GBM path anchored to an existing base price series.
///
/// The first positive value in the base series seeds the path; the output
/// has exactly the base series' length.
pub fn anchored_path(
    base_prices: &[f64],
    drift: f64,
    volatility: f64,
    seed: Option<u64>,
) -> CarbonStreamResult<Vec<f64>> {
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    anchored_path_with_rng(&mut rng, base_prices, drift, volatility)
}

/// Anchored GBM path drawn from a caller-managed RNG.
pub fn anchored_path_with_rng(
    rng: &mut StdRng,
    base_prices: &[f64],
    drift: f64,
    volatility: f64,
) -> CarbonStreamResult<Vec<f64>> {
    let anchor = base_prices.iter().copied().find(|&p| p > 0.0).ok_or_else(|| {
        CarbonStreamError::InsufficientData(
            "Base price series has no positive value to anchor the path".into(),
        )
    })?;
    generate_path_with_rng(rng, anchor, drift, volatility, base_prices.len())
}

// ---------------------------------------------------------------------------
// Parameter estimation
// ---------------------------------------------------------------------------

/// Implied volatility from a historical series: the sample standard
/// deviation of period-over-period returns, annualized by the square root
/// of the data frequency.
pub fn implied_volatility(prices: &[f64], periods_per_year: u32) -> CarbonStreamResult<f64> {
    if periods_per_year == 0 {
        return Err(CarbonStreamError::InvalidInput {
            field: "periods_per_year".into(),
            reason: "Data frequency must be at least one period per year".into(),
        });
    }

    let returns: Vec<f64> = prices
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();
    if returns.len() < 2 {
        return Err(CarbonStreamError::InsufficientData(
            "Implied volatility needs at least two period-over-period returns".into(),
        ));
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Ok(variance.sqrt() * (periods_per_year as f64).sqrt())
}

/// Implied drift from a historical series: the compound annual growth rate
/// between the first and last values.
pub fn implied_drift(prices: &[f64], periods_per_year: u32) -> CarbonStreamResult<f64> {
    if periods_per_year == 0 {
        return Err(CarbonStreamError::InvalidInput {
            field: "periods_per_year".into(),
            reason: "Data frequency must be at least one period per year".into(),
        });
    }
    if prices.len() < 2 {
        return Err(CarbonStreamError::InsufficientData(
            "Implied drift needs at least two prices".into(),
        ));
    }

    let first = prices[0];
    let last = prices[prices.len() - 1];
    if first <= 0.0 || last <= 0.0 {
        return Err(CarbonStreamError::InvalidInput {
            field: "prices".into(),
            reason: "First and last prices must be positive for a growth rate".into(),
        });
    }

    let years = (prices.len() - 1) as f64 / periods_per_year as f64;
    Ok((last / first).powf(1.0 / years) - 1.0)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

pub(crate) fn standard_normal() -> CarbonStreamResult<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| CarbonStreamError::InvalidInput {
        field: "distribution".into(),
        reason: format!("Invalid Normal parameters: {e}"),
    })
}

fn validate_parameters(initial_price: f64, drift: f64, volatility: f64) -> CarbonStreamResult<()> {
    if initial_price <= 0.0 || !initial_price.is_finite() {
        return Err(CarbonStreamError::InvalidInput {
            field: "initial_price".into(),
            reason: format!("Must be positive and finite, got {initial_price}"),
        });
    }
    if !drift.is_finite() {
        return Err(CarbonStreamError::InvalidInput {
            field: "drift".into(),
            reason: "Drift must be finite".into(),
        });
    }
    if volatility < 0.0 || !volatility.is_finite() {
        return Err(CarbonStreamError::InvalidInput {
            field: "volatility".into(),
            reason: format!("Must be non-negative and finite, got {volatility}"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
