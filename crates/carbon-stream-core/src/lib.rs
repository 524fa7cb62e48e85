//! Numerical engine for carbon credit streaming investments: the DCF and
//! IRR calculation chain, root-finding layers for goal seeking, deal
//! valuation, and breakeven analysis, and a stochastic simulation layer.
//!
//! The crate is a pure library: every operation takes its inputs as
//! arguments and returns a fresh result, with no I/O and no state held
//! across calls beyond configuration value objects.

pub mod dcf;
pub mod error;
pub mod solver;
pub mod types;

#[cfg(feature = "analysis")]
pub mod analysis;

#[cfg(feature = "simulation")]
pub mod simulation;

pub use error::CarbonStreamError;
pub use types::*;

/// Standard result type for all carbon-stream operations
pub type CarbonStreamResult<T> = Result<T, CarbonStreamError>;
