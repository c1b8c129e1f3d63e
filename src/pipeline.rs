//! Stage composition for one EEI run.
//!
//! Each stage takes the previous stage's rows and returns new ones; nothing
//! is mutated in place. `analyze` runs every computation, `run` additionally
//! writes the table, charts and summary. Any stage failure ends the run.

use std::path::PathBuf;

use crate::alert::cusum::{self, ShiftAlert};
use crate::analysis::attribution::{self, Attribution};
use crate::analysis::entropy::row_entropies;
use crate::analysis::index::index_records;
use crate::analysis::normality::{self, ShapiroWilk};
use crate::analysis::normalize::{normalize_observations, NORMALIZED_SCALE};
use crate::analysis::sensitivity::{self, SobolIndices};
use crate::config::PipelineConfig;
use crate::dataset;
use crate::logging::{self, Stage};
use crate::model::{EeiError, EeiRecord, Observation};
use crate::report::{charts, summary, table};

/// Output of the row-wise stages.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedTable {
    pub observations: Vec<Observation>,
    /// One record per observation; CUSUM columns not yet filled.
    pub records: Vec<EeiRecord>,
}

/// Everything a run computes.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub records: Vec<EeiRecord>,
    pub sensitivity: SobolIndices,
    pub attribution: Attribution,
    pub normality: ShapiroWilk,
    pub shift_alerts: Vec<ShiftAlert>,
    /// Files written by `run`; empty after `analyze`.
    pub outputs: Vec<PathBuf>,
}

/// Logs a failed stage before handing the result back.
fn stage<T>(at: Stage, operation: &str, result: Result<T, EeiError>) -> Result<T, EeiError> {
    if let Err(ref e) = result {
        logging::log_stage_failure(at, operation, e);
    }
    result
}

/// Dataset → normalization → entropy → index.
pub fn index_stage(config: &PipelineConfig) -> Result<IndexedTable, EeiError> {
    let observations = stage(Stage::Dataset, "load observations", dataset::load_observations())?;
    logging::debug(
        Stage::Dataset,
        None,
        &format!("{} observations loaded", observations.len()),
    );
    let trend_location = &config.report.trend_location;
    let trend_rows = dataset::observations_at(&observations, trend_location).len();
    if trend_rows < 2 {
        logging::warn(
            Stage::Dataset,
            Some(trend_location),
            &format!("{} row(s) for the trend chart", trend_rows),
        );
    }

    let normalized = normalize_observations(&observations, &config.normalization);
    logging::debug(
        Stage::Normalize,
        None,
        &format!("{} rows rescaled to [0, {}]", normalized.len(), NORMALIZED_SCALE),
    );
    for row in &normalized {
        let peak = row
            .salinity_norm
            .max(row.biodiversity_norm)
            .max(row.energy_flow_norm);
        if peak > NORMALIZED_SCALE {
            logging::warn(
                Stage::Normalize,
                Some(&row.observation.location),
                &format!("{}: value above configured maximum ({:.3})", row.observation.year, peak),
            );
        }
    }

    let biodiversity: Vec<f64> = observations.iter().map(|o| o.biodiversity).collect();
    let entropies = row_entropies(&biodiversity, &config.entropy);
    if entropies.iter().any(|h| !h.is_finite()) {
        logging::warn(Stage::Entropy, None, "entropy term is not finite for some rows");
    }

    let records = index_records(&normalized, &entropies, &config.weights);
    for record in &records {
        logging::debug(
            Stage::Index,
            Some(&record.location),
            &format!("{}: EEI = {:.4}", record.year, record.eei),
        );
    }

    Ok(IndexedTable {
        observations,
        records,
    })
}

/// Runs every analysis without writing any files.
pub fn analyze(config: &PipelineConfig) -> Result<PipelineOutcome, EeiError> {
    let table = index_stage(config)?;

    let sensitivity = stage(
        Stage::Sensitivity,
        "Sobol analysis",
        sensitivity::analyze_eei_formula(&config.sensitivity, &config.weights),
    )?;
    logging::info(
        Stage::Sensitivity,
        None,
        &format!(
            "{} model evaluations, first-order sum {:.3}",
            sensitivity.evaluations,
            sensitivity.first_order_sum()
        ),
    );

    let attribution = stage(
        Stage::Attribution,
        "tree attribution",
        attribution::attribute_records(&table.records, &config.attribution),
    )?;

    let records = cusum::apply_cusum(&table.records, &config.cusum);
    let shift_alerts = cusum::detect_shifts(&records);
    for alert in &shift_alerts {
        logging::warn(Stage::ChangePoint, Some(&alert.location), &alert.message);
    }

    let eei: Vec<f64> = records.iter().map(|r| r.eei).collect();
    let normality = stage(Stage::Normality, "Shapiro-Wilk", normality::shapiro_wilk(&eei))?;

    Ok(PipelineOutcome {
        records,
        sensitivity,
        attribution,
        normality,
        shift_alerts,
        outputs: Vec::new(),
    })
}

/// Runs the analyses and writes all outputs under `config.report.output_dir`.
pub fn run(config: &PipelineConfig) -> Result<PipelineOutcome, EeiError> {
    let mut outcome = analyze(config)?;
    let report = &config.report;

    stage(
        Stage::Report,
        "create output directory",
        std::fs::create_dir_all(&report.output_dir).map_err(EeiError::from),
    )?;

    let table_path = report.table_path();
    stage(Stage::Report, "write table", table::write_table(&table_path, &outcome.records))?;
    outcome.outputs.push(table_path);

    if report.render_charts {
        let trend_path = report.trend_chart_path();
        stage(
            Stage::Report,
            "draw trend chart",
            charts::draw_trend_chart(&outcome.records, report, &trend_path),
        )?;
        outcome.outputs.push(trend_path);

        let scatter_path = report.scatter_chart_path();
        stage(
            Stage::Report,
            "draw scatter chart",
            charts::draw_scatter_chart(&outcome.records, report, &scatter_path),
        )?;
        outcome.outputs.push(scatter_path);
    }

    let summary_path = report.summary_path();
    let run_summary = summary::RunSummary::new(
        outcome.records.len(),
        config,
        &outcome.sensitivity,
        &outcome.attribution,
        &outcome.normality,
        &outcome.shift_alerts,
    );
    stage(Stage::Report, "write summary", summary::write_summary(&summary_path, &run_summary))?;
    outcome.outputs.push(summary_path);

    for path in &outcome.outputs {
        logging::info(Stage::Report, None, &format!("wrote {}", path.display()));
    }
    Ok(outcome)
}
