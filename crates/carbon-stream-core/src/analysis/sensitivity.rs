//! 2-way IRR sensitivity over volume and price multipliers.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::dcf::engine::{self, DcfConfig};
use crate::error::CarbonStreamError;
use crate::types::{with_metadata, ComputationOutput, ProjectSeries};
use crate::CarbonStreamResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for the 2-way sensitivity sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityInput {
    /// Multipliers applied to the gross volume column (grid rows).
    pub volume_multipliers: Vec<f64>,
    /// Multipliers applied to the price column (grid columns).
    pub price_multipliers: Vec<f64>,
    pub streaming_percentage: f64,
}

/// Output of the 2-way sensitivity sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityOutput {
    pub volume_multipliers: Vec<f64>,
    pub price_multipliers: Vec<f64>,
    /// `irr_matrix[i][j]` = IRR at volume multiplier `i`, price multiplier
    /// `j`; NaN where the scenario admits no real IRR or fails outright.
    pub irr_matrix: Vec<Vec<f64>>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Brute-force IRR grid over every (volume, price) multiplier pair.
///
/// Each cell scales a private copy of the base series and reruns the engine;
/// a failing cell records NaN and a warning without aborting the sweep.
pub fn irr_grid(
    series: &ProjectSeries,
    input: &SensitivityInput,
    config: &DcfConfig,
) -> CarbonStreamResult<ComputationOutput<SensitivityOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.volume_multipliers.is_empty() || input.price_multipliers.is_empty() {
        return Err(CarbonStreamError::InsufficientData(
            "Sensitivity sweep requires at least one multiplier on each axis".into(),
        ));
    }
    if !(0.0..=1.0).contains(&input.streaming_percentage) {
        return Err(CarbonStreamError::InvalidInput {
            field: "streaming_percentage".into(),
            reason: format!("Must be within [0, 1], got {}", input.streaming_percentage),
        });
    }

    let mut irr_matrix = Vec::with_capacity(input.volume_multipliers.len());
    for &volume_multiplier in &input.volume_multipliers {
        let mut row = Vec::with_capacity(input.price_multipliers.len());
        for &price_multiplier in &input.price_multipliers {
            let scenario = series.scaled(volume_multiplier, price_multiplier);
            match engine::evaluate(&scenario, input.streaming_percentage, config) {
                Ok(result) => row.push(result.irr),
                Err(e) => {
                    warnings.push(format!(
                        "Evaluation failed at ({volume_multiplier}, {price_multiplier}): {e}"
                    ));
                    row.push(f64::NAN);
                }
            }
        }
        irr_matrix.push(row);
    }

    let output = SensitivityOutput {
        volume_multipliers: input.volume_multipliers.clone(),
        price_multipliers: input.price_multipliers.clone(),
        irr_matrix,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "2-Way IRR Sensitivity (volume x price)",
        &serde_json::json!({
            "volume_multipliers": input.volume_multipliers,
            "price_multipliers": input.price_multipliers,
            "streaming_percentage": input.streaming_percentage,
            "wacc": config.wacc,
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
