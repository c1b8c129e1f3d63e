//! Pipeline configuration.
//!
//! Every constant of the analysis lives here with its default, so a run
//! without a configuration file reproduces the reference results exactly.
//! An optional TOML file (default `./eei.toml`, overridable through the
//! `EEI_CONFIG` environment variable or a `.env` file) may override any
//! subset of keys:
//!
//! ```toml
//! [normalization]
//! salinity_max = 310.0
//!
//! [sensitivity]
//! base_samples = 10000
//! seed = 42
//!
//! [report]
//! output_dir = "out"
//! ```
//!
//! Unknown keys are rejected so that a typo cannot silently fall back to a
//! default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;
use crate::model::EeiError;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "./eei.toml";

/// Environment variable naming an alternative configuration file.
pub const CONFIG_PATH_VAR: &str = "EEI_CONFIG";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub normalization: NormalizationConfig,
    pub weights: WeightConfig,
    pub entropy: EntropyConfig,
    pub sensitivity: SensitivityConfig,
    pub attribution: AttributionConfig,
    pub cusum: CusumConfig,
    pub report: ReportConfig,
    pub logging: LoggingConfig,
}

/// Fixed per-column maxima mapped to 10 by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizationConfig {
    pub salinity_max: f64,
    pub biodiversity_max: f64,
    pub energy_flow_max: f64,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            salinity_max: 310.0,
            biodiversity_max: 2.5,
            energy_flow_max: 1200.0,
        }
    }
}

/// Weights of the normalized terms in the index formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeightConfig {
    pub salinity: f64,
    pub biodiversity: f64,
    pub energy_flow: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            salinity: 0.5,
            biodiversity: 0.3,
            energy_flow: 0.2,
        }
    }
}

/// How the per-row entropy term is derived from the biodiversity column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntropyMode {
    /// Each row is its own one-element distribution, so `p = 1` and the
    /// term collapses to `-ln(1 + ε)`.
    #[default]
    RowScalar,
    /// Each row contributes `-p ln(p + ε)` with `p` its share of the column
    /// total; the rows sum to the column's Shannon entropy.
    ColumnShare,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntropyConfig {
    pub mode: EntropyMode,
    /// Added inside the logarithm to avoid `ln(0)`.
    pub epsilon: f64,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            mode: EntropyMode::RowScalar,
            epsilon: 1e-10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensitivityConfig {
    /// Base sample count N; the Saltelli scheme evaluates N·(2D+2) points
    /// with second-order terms, N·(D+2) without.
    pub base_samples: usize,
    pub seed: u64,
    /// Entropy term held constant while the three weighted terms vary.
    pub fixed_entropy: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub second_order: bool,
    pub bootstrap_resamples: usize,
    pub confidence_level: f64,
    /// Apply a seeded random digital shift to the Sobol sequence.
    pub scramble: bool,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            base_samples: 10_000,
            seed: 42,
            fixed_entropy: 1.0,
            lower_bound: 0.0,
            upper_bound: 10.0,
            second_order: true,
            bootstrap_resamples: 100,
            confidence_level: 0.95,
            scramble: false,
        }
    }
}

/// Gradient boosting hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttributionConfig {
    pub rounds: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub lambda: f64,
    pub gamma: f64,
    pub min_child_weight: f64,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            rounds: 100,
            max_depth: 6,
            learning_rate: 0.3,
            lambda: 1.0,
            gamma: 0.0,
            min_child_weight: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CusumConfig {
    pub threshold: f64,
    /// Trailing rolling-mean window, in rows.
    pub window: usize,
}

impl Default for CusumConfig {
    fn default() -> Self {
        Self {
            threshold: 5.0,
            window: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    pub table_file: String,
    pub trend_chart_file: String,
    pub scatter_chart_file: String,
    pub summary_file: String,
    /// Location plotted in the trend chart.
    pub trend_location: String,
    /// Half width of the shaded band around the trend line, in EEI units.
    pub band_half_width: f64,
    /// 10 x 6 inches at 300 DPI.
    pub width_px: u32,
    pub height_px: u32,
    pub render_charts: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            table_file: "eei_results.csv".to_string(),
            trend_chart_file: "Figure5_EEI_Trend.png".to_string(),
            scatter_chart_file: "Figure6_Scatter.png".to_string(),
            summary_file: "eei_summary.json".to_string(),
            trend_location: "Urmia".to_string(),
            band_half_width: 0.2,
            width_px: 3000,
            height_px: 1800,
            render_charts: true,
        }
    }
}

impl ReportConfig {
    pub fn table_path(&self) -> PathBuf {
        self.output_dir.join(&self.table_file)
    }

    pub fn trend_chart_path(&self) -> PathBuf {
        self.output_dir.join(&self.trend_chart_file)
    }

    pub fn scatter_chart_path(&self) -> PathBuf {
        self.output_dir.join(&self.scatter_chart_file)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join(&self.summary_file)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
            timestamps: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parses a configuration document and validates it.
pub fn parse_config(text: &str) -> Result<PipelineConfig, EeiError> {
    let config: PipelineConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

/// Loads and validates the configuration file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, EeiError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        EeiError::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    parse_config(&text)
}

/// Loads `path` if it exists, otherwise returns the defaults.
///
/// Returns the configuration and whether a file was actually read.
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<(PipelineConfig, bool), EeiError> {
    let path = path.as_ref();
    if path.exists() {
        Ok((load_config(path)?, true))
    } else {
        Ok((PipelineConfig::default(), false))
    }
}

/// Resolves the configuration path from `EEI_CONFIG`, loading `.env` first.
pub fn config_path_from_env() -> PathBuf {
    dotenv::dotenv().ok();
    std::env::var(CONFIG_PATH_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl PipelineConfig {
    /// Rejects values no stage can run with.
    pub fn validate(&self) -> Result<(), EeiError> {
        let n = &self.normalization;
        for (name, max) in [
            ("normalization.salinity_max", n.salinity_max),
            ("normalization.biodiversity_max", n.biodiversity_max),
            ("normalization.energy_flow_max", n.energy_flow_max),
        ] {
            require(max.is_finite() && max > 0.0, name, "must be finite and positive")?;
        }

        let w = &self.weights;
        for (name, weight) in [
            ("weights.salinity", w.salinity),
            ("weights.biodiversity", w.biodiversity),
            ("weights.energy_flow", w.energy_flow),
        ] {
            require(weight.is_finite(), name, "must be finite")?;
        }

        require(
            self.entropy.epsilon.is_finite() && self.entropy.epsilon >= 0.0,
            "entropy.epsilon",
            "must be finite and non-negative",
        )?;

        let s = &self.sensitivity;
        require(s.base_samples > 0, "sensitivity.base_samples", "must be positive")?;
        require(
            s.lower_bound.is_finite() && s.upper_bound.is_finite() && s.lower_bound < s.upper_bound,
            "sensitivity bounds",
            "lower_bound must be below upper_bound",
        )?;
        require(
            s.confidence_level > 0.0 && s.confidence_level < 1.0,
            "sensitivity.confidence_level",
            "must lie in (0, 1)",
        )?;
        require(s.fixed_entropy.is_finite(), "sensitivity.fixed_entropy", "must be finite")?;

        let a = &self.attribution;
        require(a.rounds > 0, "attribution.rounds", "must be positive")?;
        require(a.max_depth > 0, "attribution.max_depth", "must be positive")?;
        require(
            a.learning_rate > 0.0 && a.learning_rate <= 1.0,
            "attribution.learning_rate",
            "must lie in (0, 1]",
        )?;
        require(a.lambda >= 0.0, "attribution.lambda", "must be non-negative")?;
        require(a.gamma >= 0.0, "attribution.gamma", "must be non-negative")?;
        require(
            a.min_child_weight >= 0.0,
            "attribution.min_child_weight",
            "must be non-negative",
        )?;

        require(self.cusum.window > 0, "cusum.window", "must be at least 1")?;
        require(
            self.cusum.threshold.is_finite(),
            "cusum.threshold",
            "must be finite",
        )?;

        let r = &self.report;
        require(
            r.width_px > 0 && r.height_px > 0,
            "report image size",
            "width_px and height_px must be positive",
        )?;
        require(
            r.band_half_width.is_finite() && r.band_half_width >= 0.0,
            "report.band_half_width",
            "must be finite and non-negative",
        )?;
        for (name, file) in [
            ("report.table_file", &r.table_file),
            ("report.trend_chart_file", &r.trend_chart_file),
            ("report.scatter_chart_file", &r.scatter_chart_file),
            ("report.summary_file", &r.summary_file),
        ] {
            require(!file.trim().is_empty(), name, "must not be empty")?;
        }

        Ok(())
    }
}

fn require(ok: bool, key: &str, message: &str) -> Result<(), EeiError> {
    if ok {
        Ok(())
    } else {
        Err(EeiError::Config(format!("{} {}", key, message)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_constants() {
        let config = PipelineConfig::default();
        assert_eq!(config.normalization.salinity_max, 310.0);
        assert_eq!(config.normalization.biodiversity_max, 2.5);
        assert_eq!(config.normalization.energy_flow_max, 1200.0);
        assert_eq!(config.weights.salinity, 0.5);
        assert_eq!(config.weights.biodiversity, 0.3);
        assert_eq!(config.weights.energy_flow, 0.2);
        assert_eq!(config.entropy.mode, EntropyMode::RowScalar);
        assert_eq!(config.sensitivity.base_samples, 10_000);
        assert_eq!(config.sensitivity.fixed_entropy, 1.0);
        assert_eq!(config.cusum.threshold, 5.0);
        assert_eq!(config.cusum.window, 10);
        assert_eq!(config.report.trend_location, "Urmia");
        assert_eq!((config.report.width_px, config.report.height_px), (3000, 1800));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = parse_config("").expect("empty config should parse");
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let config = parse_config(
            r#"
            [normalization]
            salinity_max = 400.0

            [entropy]
            mode = "column_share"

            [report]
            output_dir = "out"
            render_charts = false
            "#,
        )
        .expect("partial config should parse");

        assert_eq!(config.normalization.salinity_max, 400.0);
        assert_eq!(config.normalization.biodiversity_max, 2.5);
        assert_eq!(config.entropy.mode, EntropyMode::ColumnShare);
        assert_eq!(config.report.table_path(), PathBuf::from("out/eei_results.csv"));
        assert!(!config.report.render_charts);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result = parse_config("[cusum]\nwindw = 3\n");
        assert!(matches!(result, Err(EeiError::Config(_))), "got {:?}", result);
    }

    #[test]
    fn test_zero_maximum_is_rejected() {
        let err = parse_config("[normalization]\nenergy_flow_max = 0.0\n").unwrap_err();
        assert!(err.to_string().contains("energy_flow_max"), "got {}", err);
    }

    #[test]
    fn test_zero_window_is_rejected() {
        assert!(parse_config("[cusum]\nwindow = 0\n").is_err());
    }

    #[test]
    fn test_inverted_bounds_are_rejected() {
        let err = parse_config("[sensitivity]\nlower_bound = 10.0\nupper_bound = 0.0\n").unwrap_err();
        assert!(err.to_string().contains("bounds"), "got {}", err);
    }

    #[test]
    fn test_log_level_parses_lowercase() {
        let config = parse_config("[logging]\nlevel = \"debug\"\ntimestamps = true\n").unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.logging.timestamps);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let (config, found) =
            load_config_or_default("/nonexistent/eei.toml").expect("missing file is not an error");
        assert!(!found);
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_load_config_reports_unreadable_path() {
        let err = load_config("/nonexistent/eei.toml").unwrap_err();
        assert!(matches!(err, EeiError::Config(_)));
    }
}
