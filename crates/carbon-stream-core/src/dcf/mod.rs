//! The deterministic valuation chain: cash-flow schedule, NPV, IRR, payback.

pub mod engine;
pub mod irr;
pub mod payback;

pub use engine::{run_dcf, DcfConfig, DcfResult, ScheduleRow};
pub use irr::IrrConfig;
