use serde::{Deserialize, Serialize};

use crate::error::CarbonStreamError;
use crate::CarbonStreamResult;

/// Annual project data for a carbon credit stream, indexed by year 1..=n.
///
/// The index is implicit and dense: position `t` holds year `t + 1`. Columns
/// are cleaned on construction (non-finite values become 0.0) so downstream
/// financial arithmetic never sees NaN in its inputs. The series is read-only
/// to every calculation; scenario and trial code clones it and replaces whole
/// columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSeries {
    gross_volume: Vec<f64>,
    price: Vec<f64>,
    implementation_cost: Vec<f64>,
}

impl ProjectSeries {
    pub fn new(
        gross_volume: Vec<f64>,
        price: Vec<f64>,
        implementation_cost: Vec<f64>,
    ) -> CarbonStreamResult<Self> {
        if gross_volume.is_empty() {
            return Err(CarbonStreamError::InsufficientData(
                "Project series must contain at least one year".into(),
            ));
        }
        if gross_volume.len() != price.len() || price.len() != implementation_cost.len() {
            return Err(CarbonStreamError::InvalidInput {
                field: "series".into(),
                reason: format!(
                    "Column lengths differ: volume={}, price={}, cost={}",
                    gross_volume.len(),
                    price.len(),
                    implementation_cost.len()
                ),
            });
        }

        Ok(Self {
            gross_volume: clean_column(gross_volume),
            price: clean_column(price),
            implementation_cost: clean_column(implementation_cost),
        })
    }

    /// Number of years in the series.
    pub fn years(&self) -> usize {
        self.gross_volume.len()
    }

    pub fn gross_volume(&self) -> &[f64] {
        &self.gross_volume
    }

    pub fn price(&self) -> &[f64] {
        &self.price
    }

    pub fn implementation_cost(&self) -> &[f64] {
        &self.implementation_cost
    }

    /// Copy of this series with the price column replaced.
    pub fn with_price(&self, price: Vec<f64>) -> CarbonStreamResult<Self> {
        if price.len() != self.years() {
            return Err(CarbonStreamError::InvalidInput {
                field: "price".into(),
                reason: format!(
                    "Replacement column has {} entries, series has {} years",
                    price.len(),
                    self.years()
                ),
            });
        }
        Ok(Self {
            gross_volume: self.gross_volume.clone(),
            price: clean_column(price),
            implementation_cost: self.implementation_cost.clone(),
        })
    }

    /// Copy of this series with the gross volume column replaced.
    pub fn with_volume(&self, gross_volume: Vec<f64>) -> CarbonStreamResult<Self> {
        if gross_volume.len() != self.years() {
            return Err(CarbonStreamError::InvalidInput {
                field: "gross_volume".into(),
                reason: format!(
                    "Replacement column has {} entries, series has {} years",
                    gross_volume.len(),
                    self.years()
                ),
            });
        }
        Ok(Self {
            gross_volume: clean_column(gross_volume),
            price: self.price.clone(),
            implementation_cost: self.implementation_cost.clone(),
        })
    }

    /// Copy of this series with volume and price scaled multiplicatively.
    pub fn scaled(&self, volume_multiplier: f64, price_multiplier: f64) -> Self {
        Self {
            gross_volume: self
                .gross_volume
                .iter()
                .map(|v| v * volume_multiplier)
                .collect(),
            price: self.price.iter().map(|p| p * price_multiplier).collect(),
            implementation_cost: self.implementation_cost.clone(),
        }
    }
}

fn clean_column(column: Vec<f64>) -> Vec<f64> {
    column
        .into_iter()
        .map(|v| if v.is_finite() { v } else { 0.0 })
        .collect()
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "ieee754_f64".to_string(),
        },
    }
}
