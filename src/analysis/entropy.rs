//! Shannon-entropy proxy derived from the biodiversity column.
//!
//! Shannon entropy: H = -Σ p_i * ln(p_i + ε), natural log. Two ways of
//! turning the column into probabilities are supported; see `EntropyMode`.
//! Zero or non-finite denominators are not caught: the resulting NaN or
//! infinity propagates into the index.

use crate::config::{EntropyConfig, EntropyMode};

/// Shannon entropy of a count or weight vector.
///
/// Each entry is divided by the vector total to form `p`.
pub fn shannon(values: &[f64], epsilon: f64) -> f64 {
    let total: f64 = values.iter().sum();
    -values
        .iter()
        .map(|&v| {
            let p = v / total;
            p * (p + epsilon).ln()
        })
        .sum::<f64>()
}

/// Per-row entropy term for the biodiversity column.
///
/// `RowScalar` evaluates `shannon` on each row alone. With a single value the
/// only probability is 1 and every row gets `-ln(1 + ε)`, effectively 0.
///
/// `ColumnShare` gives row `i` the term `-p_i ln(p_i + ε)` with
/// `p_i = b_i / Σ b`; the rows sum to `shannon(column)`.
pub fn row_entropies(biodiversity: &[f64], config: &EntropyConfig) -> Vec<f64> {
    match config.mode {
        EntropyMode::RowScalar => biodiversity
            .iter()
            .map(|&b| shannon(&[b], config.epsilon))
            .collect(),
        EntropyMode::ColumnShare => {
            let total: f64 = biodiversity.iter().sum();
            biodiversity
                .iter()
                .map(|&b| {
                    let p = b / total;
                    -(p * (p + config.epsilon).ln())
                })
                .collect()
        }
    }
}
