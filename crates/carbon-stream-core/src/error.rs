use thiserror::Error;

#[derive(Debug, Error)]
pub enum CarbonStreamError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Infeasible target {target}: at the {bound} bound {reason}")]
    Infeasible {
        target: String,
        bound: String,
        reason: String,
    },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (residual: {last_residual})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_residual: f64,
    },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),
}
