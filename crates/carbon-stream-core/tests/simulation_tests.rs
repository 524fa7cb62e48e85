#![cfg(feature = "simulation")]

use rand::rngs::StdRng;
use rand::SeedableRng;

use carbon_stream_core::dcf::{DcfConfig, IrrConfig};
use carbon_stream_core::simulation::gbm;
use carbon_stream_core::simulation::{
    run_simulation, PriceModel, SimulationInput, VolumeNoise,
};
use carbon_stream_core::types::ProjectSeries;

const SEED: u64 = 42;

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

// ===========================================================================
// GBM statistical behavior
// ===========================================================================

#[test]
fn test_gbm_terminal_price_matches_expectation() {
    // A 20-year path anchored at $50 takes 19 annual steps, so the terminal
    // expectation is 50 * exp(0.03 * 19) ~ 88.4. With sigma = 0.15 the
    // terminal standard deviation is ~65, giving a standard error of ~2 over
    // 1000 paths; a +/-8 band is ~4 standard errors.
    let mut rng = StdRng::seed_from_u64(SEED);
    let paths = 1000;
    let mut terminal_sum = 0.0;
    for _ in 0..paths {
        let path = gbm::generate_path_with_rng(&mut rng, 50.0, 0.03, 0.15, 20).unwrap();
        terminal_sum += path[19];
    }
    let terminal_mean = terminal_sum / paths as f64;
    let expected = 50.0 * (0.03_f64 * 19.0).exp();
    assert!(
        (terminal_mean - expected).abs() < 8.0,
        "mean={terminal_mean} expected={expected}"
    );
}

#[test]
fn test_gbm_volatility_limit_collapses_to_drifted_curve() {
    let path = gbm::generate_path(50.0, 0.0, 0.0, 20, Some(SEED)).unwrap();
    for price in &path {
        assert!((price - 50.0).abs() < 1e-12);
    }
}

// ===========================================================================
// Monte Carlo over the canonical deal
// ===========================================================================

fn gbm_input(trials: u32, volatility: f64) -> SimulationInput {
    SimulationInput {
        trials,
        seed: Some(SEED),
        streaming_percentage: 0.48,
        price_model: PriceModel::Gbm {
            drift: 0.03,
            volatility,
        },
        volume_noise: VolumeNoise {
            mean: 1.0,
            std_dev: 0.0,
        },
    }
}

#[test]
fn test_seeded_simulation_is_reproducible() {
    let series = flat_series();
    let config = standard_config();
    let input = gbm_input(1000, 0.15);
    let a = run_simulation(&series, &input, &config).unwrap();
    let b = run_simulation(&series, &input, &config).unwrap();

    assert_eq!(a.result.irrs.len(), 1000);
    for (x, y) in a.result.irrs.iter().zip(b.result.irrs.iter()) {
        assert_eq!(x.to_bits(), y.to_bits());
    }
    for (x, y) in a.result.npvs.iter().zip(b.result.npvs.iter()) {
        assert_eq!(x.to_bits(), y.to_bits());
    }
}

#[test]
fn test_volatile_prices_widen_irr_outcomes() {
    let series = flat_series();
    let config = standard_config();

    let quiet = run_simulation(&series, &gbm_input(1000, 0.0), &config).unwrap();
    let noisy = run_simulation(&series, &gbm_input(1000, 0.15), &config).unwrap();

    assert!(
        noisy.result.irr_summary.std_dev > quiet.result.irr_summary.std_dev,
        "noisy={} quiet={}",
        noisy.result.irr_summary.std_dev,
        quiet.result.irr_summary.std_dev
    );
    // The drifted GBM keeps the deal profitable in the typical trial.
    assert!(noisy.result.irr_summary.valid_trials > 900);
}

#[test]
fn test_extreme_noise_never_aborts_the_batch() {
    // Growth-rate deviations this large push paths negative and produce
    // trials with no real IRR; the batch must still complete with one slot
    // per trial and summaries over the finite entries only.
    let series = flat_series();
    let config = standard_config();
    let input = SimulationInput {
        trials: 500,
        seed: Some(SEED),
        streaming_percentage: 0.48,
        price_model: PriceModel::GrowthRateDeviation {
            bias: -0.10,
            std_dev: 0.40,
        },
        volume_noise: VolumeNoise::default(),
    };
    let out = run_simulation(&series, &input, &config).unwrap();

    assert_eq!(out.result.irrs.len(), 500);
    assert_eq!(out.result.npvs.len(), 500);
    let finite = out.result.irrs.iter().filter(|v| v.is_finite()).count();
    assert_eq!(finite as u32, out.result.irr_summary.valid_trials);
    // The price paths stay finite, so every trial's NPV is real.
    assert_eq!(out.result.npv_summary.valid_trials, 500);
}
