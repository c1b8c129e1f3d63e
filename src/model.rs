//! Core data types for the EEI analysis service.
//!
//! This module defines the shared domain model imported by all other modules.
//! It contains no logic beyond small accessors, no I/O, and only the external
//! dependencies needed to serialize records.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

/// Feature names in the order used by the sensitivity and attribution stages.
pub const FEATURE_NAMES: [&str; 3] = ["Salinity", "Biodiversity", "Energy_Flow"];

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A single raw observation for one location and year.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub year: i32,
    pub location: String,
    pub salinity: Option<f64>, // g/L, None when not measured
    pub biodiversity: f64,     // Shannon index proxy
    pub energy_flow: f64,      // MJ/m²
}

impl Observation {
    /// Salinity with missing values substituted by 0, as used by every
    /// downstream stage.
    pub fn salinity_or_zero(&self) -> f64 {
        self.salinity.unwrap_or(0.0)
    }
}

/// An observation with its three measures rescaled to the [0, 10] range.
///
/// Produced by `analysis::normalize::normalize_observations`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedObservation {
    pub observation: Observation,
    pub salinity_norm: f64,
    pub biodiversity_norm: f64,
    pub energy_flow_norm: f64,
}

impl NormalizedObservation {
    /// The normalized features in `FEATURE_NAMES` order.
    pub fn features(&self) -> [f64; 3] {
        [self.salinity_norm, self.biodiversity_norm, self.energy_flow_norm]
    }
}

/// One fully derived row of the results table.
///
/// Field order matches the column order of the written table. `salinity`
/// holds 0 for rows whose salinity was not measured. The CUSUM columns are
/// `None` for rows where no rolling mean exists yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EeiRecord {
    pub year: i32,
    pub location: String,
    pub salinity: f64,
    pub biodiversity: f64,
    pub energy_flow: f64,
    pub salinity_norm: f64,
    pub biodiversity_norm: f64,
    pub energy_flow_norm: f64,
    pub shannon_entropy: f64,
    pub eei: f64,
    pub cusum_pos: Option<f64>,
    pub cusum_neg: Option<f64>,
}

impl EeiRecord {
    /// The normalized features in `FEATURE_NAMES` order.
    pub fn features(&self) -> [f64; 3] {
        [self.salinity_norm, self.biodiversity_norm, self.energy_flow_norm]
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise anywhere in the pipeline. Every variant is fatal
/// to the run.
#[derive(Debug, PartialEq)]
pub enum EeiError {
    /// The observation table is malformed (non-positive or non-finite values,
    /// empty labels, no rows).
    InvalidData(String),
    /// The configuration file could not be parsed or holds unusable values.
    Config(String),
    /// A statistical method received fewer samples than it can work with.
    InsufficientSamples {
        method: &'static str,
        required: usize,
        actual: usize,
    },
    /// An analysis stage could not produce a result (zero variance, ragged
    /// input, degenerate range).
    Analysis(String),
    /// Filesystem failure while writing outputs.
    Io(String),
    /// The results table could not be written or read.
    Table(String),
    /// A chart could not be rendered.
    Chart(String),
}

impl std::fmt::Display for EeiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EeiError::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
            EeiError::Config(msg) => write!(f, "Config error: {}", msg),
            EeiError::InsufficientSamples {
                method,
                required,
                actual,
            } => write!(
                f,
                "Insufficient samples for {}: need at least {}, got {}",
                method, required, actual
            ),
            EeiError::Analysis(msg) => write!(f, "Analysis error: {}", msg),
            EeiError::Io(msg) => write!(f, "IO error: {}", msg),
            EeiError::Table(msg) => write!(f, "Table error: {}", msg),
            EeiError::Chart(msg) => write!(f, "Chart error: {}", msg),
        }
    }
}

impl std::error::Error for EeiError {}

impl From<std::io::Error> for EeiError {
    fn from(err: std::io::Error) -> Self {
        EeiError::Io(err.to_string())
    }
}

impl From<csv::Error> for EeiError {
    fn from(err: csv::Error) -> Self {
        EeiError::Table(err.to_string())
    }
}

impl From<toml::de::Error> for EeiError {
    fn from(err: toml::de::Error) -> Self {
        EeiError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for EeiError {
    fn from(err: serde_json::Error) -> Self {
        EeiError::Io(format!("summary serialization failed: {}", err))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(salinity: Option<f64>) -> Observation {
        Observation {
            year: 2020,
            location: "Pantanal".to_string(),
            salinity,
            biodiversity: 1.5,
            energy_flow: 900.0,
        }
    }

    #[test]
    fn test_missing_salinity_reads_as_zero() {
        assert_eq!(observation(None).salinity_or_zero(), 0.0);
        assert_eq!(observation(Some(120.0)).salinity_or_zero(), 120.0);
    }

    #[test]
    fn test_error_display_names_the_method() {
        let err = EeiError::InsufficientSamples {
            method: "Shapiro-Wilk",
            required: 3,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient samples for Shapiro-Wilk: need at least 3, got 2"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing dir");
        let err: EeiError = io.into();
        assert!(matches!(err, EeiError::Io(ref msg) if msg.contains("missing dir")));
    }
}
