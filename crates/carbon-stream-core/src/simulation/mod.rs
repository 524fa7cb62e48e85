//! Stochastic layer: GBM price paths and the Monte Carlo trial loop.

pub mod gbm;
pub mod monte_carlo;

pub use monte_carlo::{
    run_simulation, PriceModel, SimulationInput, SimulationResult, SummaryStatistics, VolumeNoise,
};
