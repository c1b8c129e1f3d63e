//! Per-feature attribution of boosted-tree predictions.
//!
//! Exact path-dependent Shapley values. For a feature subset `S`, the
//! expected output `v(S)` descends each tree following the sample's branch
//! at splits on features in `S`; at splits on other features both children
//! are visited and weighted by their training cover. Shapley values are
//! then computed by enumerating all subsets:
//!
//! ```text
//!   φ_i = Σ_{S ⊆ F∖{i}} |S|! (M − |S| − 1)! / M! · (v(S ∪ {i}) − v(S))
//! ```
//!
//! For each row the values sum to `prediction − baseline`, where the
//! baseline `v(∅)` is the cover-weighted mean model output.

use serde::Serialize;

use crate::analysis::boosting::{BoostedRegressor, RegressionTree, TreeNode};
use crate::config::AttributionConfig;
use crate::model::{EeiError, EeiRecord, FEATURE_NAMES};

/// Subset enumeration is exponential in the feature count.
pub const MAX_EXPLAINED_FEATURES: usize = 16;

/// Attribution matrix for a set of rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribution {
    pub feature_names: Vec<String>,
    /// One row per sample, one column per feature.
    pub values: Vec<Vec<f64>>,
    /// Expected model output with no feature known.
    pub baseline: f64,
    pub predictions: Vec<f64>,
}

impl Attribution {
    /// `prediction − baseline − Σ φ` per row; zero up to rounding.
    pub fn residuals(&self) -> Vec<f64> {
        self.values
            .iter()
            .zip(&self.predictions)
            .map(|(row, pred)| pred - self.baseline - row.iter().sum::<f64>())
            .collect()
    }
}

/// Expected tree output given that only the features in `known` (bit mask)
/// take the sample's values.
fn conditional_expectation(tree: &RegressionTree, sample: &[f64], known: u32, node: usize) -> f64 {
    match &tree.nodes()[node] {
        TreeNode::Leaf { value, .. } => *value,
        TreeNode::Split {
            feature,
            threshold,
            left,
            right,
            cover,
        } => {
            if known & (1 << feature) != 0 {
                let x = sample.get(*feature).copied().unwrap_or(f64::NAN);
                let next = if x < *threshold { *left } else { *right };
                conditional_expectation(tree, sample, known, next)
            } else {
                let left_cover = tree.nodes()[*left].cover();
                let right_cover = tree.nodes()[*right].cover();
                (left_cover * conditional_expectation(tree, sample, known, *left)
                    + right_cover * conditional_expectation(tree, sample, known, *right))
                    / cover
            }
        }
    }
}

/// `v(S)` for every subset mask of `m` features.
fn subset_values(model: &BoostedRegressor, sample: &[f64], m: usize) -> Vec<f64> {
    (0..1u32 << m)
        .map(|mask| {
            model.base_score()
                + model
                    .trees()
                    .iter()
                    .map(|tree| conditional_expectation(tree, sample, mask, 0))
                    .sum::<f64>()
        })
        .collect()
}

/// `v(∅)`: no split reads the sample, so this is the same for every row.
fn expected_output(model: &BoostedRegressor) -> f64 {
    model.base_score()
        + model
            .trees()
            .iter()
            .map(|tree| conditional_expectation(tree, &[], 0, 0))
            .sum::<f64>()
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|k| k as f64).product()
}

/// Explains `samples` under `model`.
pub fn explain(model: &BoostedRegressor, samples: &[Vec<f64>]) -> Result<Attribution, EeiError> {
    let m = model.n_features();
    if m > MAX_EXPLAINED_FEATURES {
        return Err(EeiError::Analysis(format!(
            "exact attribution supports at most {} features, model has {}",
            MAX_EXPLAINED_FEATURES, m
        )));
    }
    if let Some(bad) = samples.iter().find(|s| s.len() != m) {
        return Err(EeiError::Analysis(format!(
            "sample has {} features, model expects {}",
            bad.len(),
            m
        )));
    }

    // Shapley weight depends only on subset size.
    let weights: Vec<f64> = (0..m)
        .map(|s| factorial(s) * factorial(m - s - 1) / factorial(m))
        .collect();

    let baseline = expected_output(model);
    let mut values = Vec::with_capacity(samples.len());
    for sample in samples {
        let v = subset_values(model, sample, m);
        let row: Vec<f64> = (0..m)
            .map(|i| {
                let bit = 1u32 << i;
                (0..1u32 << m)
                    .filter(|mask| mask & bit == 0)
                    .map(|mask| {
                        weights[mask.count_ones() as usize] * (v[(mask | bit) as usize] - v[mask as usize])
                    })
                    .sum()
            })
            .collect();
        values.push(row);
    }

    Ok(Attribution {
        feature_names: Vec::new(),
        values,
        baseline,
        predictions: model.predict_batch(samples),
    })
}

/// Fits the boosted model on (normalized features → EEI) for all rows and
/// explains every row.
pub fn attribute_records(
    records: &[EeiRecord],
    params: &AttributionConfig,
) -> Result<Attribution, EeiError> {
    let samples: Vec<Vec<f64>> = records.iter().map(|r| r.features().to_vec()).collect();
    let targets: Vec<f64> = records.iter().map(|r| r.eei).collect();

    let model = BoostedRegressor::fit(&samples, &targets, params)?;
    let mut attribution = explain(&model, &samples)?;
    attribution.feature_names = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
    Ok(attribution)
}
