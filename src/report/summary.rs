//! Console report and machine-readable run summary.

use chrono::Utc;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::alert::cusum::ShiftAlert;
use crate::analysis::attribution::Attribution;
use crate::analysis::normality::ShapiroWilk;
use crate::analysis::sensitivity::SobolIndices;
use crate::config::PipelineConfig;
use crate::model::EeiError;

// ============================================================================
// Run summary
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary<'a> {
    pub generated_at: String,
    pub rows: usize,
    pub config: &'a PipelineConfig,
    pub sensitivity: &'a SobolIndices,
    pub attribution: &'a Attribution,
    pub normality: &'a ShapiroWilk,
    pub shift_alerts: &'a [ShiftAlert],
}

impl<'a> RunSummary<'a> {
    pub fn new(
        rows: usize,
        config: &'a PipelineConfig,
        sensitivity: &'a SobolIndices,
        attribution: &'a Attribution,
        normality: &'a ShapiroWilk,
        shift_alerts: &'a [ShiftAlert],
    ) -> Self {
        Self {
            generated_at: Utc::now().to_rfc3339(),
            rows,
            config,
            sensitivity,
            attribution,
            normality,
            shift_alerts,
        }
    }
}

/// Writes `summary` as pretty-printed JSON.
pub fn write_summary<P: AsRef<Path>>(path: P, summary: &RunSummary<'_>) -> Result<(), EeiError> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, summary)?;
    writer.flush()?;
    Ok(())
}

// ============================================================================
// Console lines
// ============================================================================

pub fn sensitivity_line(indices: &SobolIndices) -> String {
    let parts: Vec<String> = indices
        .names
        .iter()
        .zip(&indices.first_order)
        .map(|(name, s1)| format!("{}={:.3}", name, s1))
        .collect();
    format!("Sobol Indices (First-order): {}", parts.join(", "))
}

pub fn attribution_line(attribution: &Attribution) -> String {
    let rows: Vec<String> = attribution
        .values
        .iter()
        .map(|row| {
            let cells: Vec<String> = row.iter().map(|v| format!("{:.4}", v)).collect();
            format!("[{}]", cells.join(", "))
        })
        .collect();
    format!("SHAP Values: [{}]", rows.join(", "))
}

pub fn normality_line(result: &ShapiroWilk) -> String {
    format!(
        "Shapiro-Wilk Test: Statistic={:.3}, p-value={:.3}",
        result.statistic, result.p_value
    )
}

/// Prints the three report lines to stdout.
pub fn print_report(indices: &SobolIndices, attribution: &Attribution, normality: &ShapiroWilk) {
    println!("{}", sensitivity_line(indices));
    println!("{}", attribution_line(attribution));
    println!("{}", normality_line(normality));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::cusum::ShiftDirection;

    fn indices() -> SobolIndices {
        SobolIndices {
            names: vec![
                "Salinity".to_string(),
                "Biodiversity".to_string(),
                "Energy_Flow".to_string(),
            ],
            first_order: vec![0.6579, 0.2368, 0.1053],
            first_order_conf: vec![0.01, 0.01, 0.01],
            total_order: vec![0.6579, 0.2368, 0.1053],
            total_order_conf: vec![0.01, 0.01, 0.01],
            second_order: Vec::new(),
            evaluations: 80_000,
        }
    }

    fn attribution() -> Attribution {
        Attribution {
            feature_names: vec!["Salinity".to_string(), "Biodiversity".to_string()],
            values: vec![vec![1.25, -0.5], vec![-1.25, 0.5]],
            baseline: 6.0,
            predictions: vec![6.75, 5.25],
        }
    }

    #[test]
    fn test_console_lines() {
        assert_eq!(
            sensitivity_line(&indices()),
            "Sobol Indices (First-order): Salinity=0.658, Biodiversity=0.237, Energy_Flow=0.105"
        );
        assert_eq!(
            attribution_line(&attribution()),
            "SHAP Values: [[1.2500, -0.5000], [-1.2500, 0.5000]]"
        );
        let sw = ShapiroWilk {
            statistic: 0.98765,
            p_value: 0.91234,
            n: 5,
        };
        assert_eq!(normality_line(&sw), "Shapiro-Wilk Test: Statistic=0.988, p-value=0.912");
    }

    #[test]
    fn test_summary_json_has_every_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eei_summary.json");
        let config = PipelineConfig::default();
        let (indices, attribution) = (indices(), attribution());
        let sw = ShapiroWilk {
            statistic: 0.9,
            p_value: 0.4,
            n: 5,
        };
        let alerts = vec![ShiftAlert {
            direction: ShiftDirection::Upward,
            row: 3,
            year: 2020,
            location: "Pantanal".to_string(),
            magnitude: 1.5,
            message: "upward shift".to_string(),
        }];
        let summary = RunSummary::new(5, &config, &indices, &attribution, &sw, &alerts);
        write_summary(&path, &summary).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["rows"], 5);
        assert_eq!(json["sensitivity"]["evaluations"], 80_000);
        assert_eq!(json["normality"]["n"], 5);
        assert_eq!(json["shift_alerts"][0]["direction"], "upward");
        assert_eq!(json["config"]["cusum"]["window"], 10);
        assert!(chrono::DateTime::parse_from_rfc3339(json["generated_at"].as_str().unwrap()).is_ok());
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_full_device_write_is_an_io_error() {
        let config = PipelineConfig::default();
        let (indices, attribution) = (indices(), attribution());
        let sw = ShapiroWilk {
            statistic: 0.9,
            p_value: 0.4,
            n: 5,
        };
        let summary = RunSummary::new(5, &config, &indices, &attribution, &sw, &[]);
        let result = write_summary("/dev/full", &summary);
        assert!(matches!(result, Err(EeiError::Io(_))), "{:?}", result);
    }
}
