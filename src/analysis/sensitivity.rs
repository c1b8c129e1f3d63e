//! Variance-based global sensitivity analysis of the index formula.
//!
//! The three normalized terms of the EEI are treated as independent uniform
//! factors and the formula is evaluated on a Saltelli design built from a
//! Sobol sequence. Output variance is decomposed into first-order (S1),
//! total-order (ST) and optionally second-order (S2) indices.
//!
//! Estimators (Saltelli et al. 2010, Jansen 1999), on standardized outputs:
//!
//! ```text
//!   S1_j  = mean(f(B) · (f(AB_j) − f(A)))            / V
//!   ST_j  = mean((f(A) − f(AB_j))²) / 2              / V
//!   S2_jk = mean(f(BA_j) · f(AB_k) − f(A) · f(B))    / V − S1_j − S1_k
//!   V     = var([f(A); f(B)])
//! ```
//!
//! Confidence half-widths come from a bootstrap over base rows, driven by a
//! seeded ChaCha8 stream so identical seeds give identical reports.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::analysis::index::calculate_eei;
use crate::analysis::sobol_sequence::SobolSequence;
use crate::analysis::special::normal_quantile;
use crate::config::{SensitivityConfig, WeightConfig};
use crate::model::{EeiError, FEATURE_NAMES};

// ---------------------------------------------------------------------------
// Problem definition
// ---------------------------------------------------------------------------

/// One uniformly distributed input factor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Factor {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensitivityProblem {
    pub factors: Vec<Factor>,
}

impl SensitivityProblem {
    /// The three EEI terms, each bounded to `[lower, upper]`.
    pub fn eei_terms(lower: f64, upper: f64) -> Self {
        Self {
            factors: FEATURE_NAMES
                .iter()
                .map(|name| Factor {
                    name: name.to_string(),
                    lower,
                    upper,
                })
                .collect(),
        }
    }

    pub fn num_vars(&self) -> usize {
        self.factors.len()
    }

    fn rows_per_base_sample(&self, second_order: bool) -> usize {
        let d = self.num_vars();
        if second_order { 2 * d + 2 } else { d + 2 }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecondOrderIndex {
    pub first: String,
    pub second: String,
    pub value: f64,
    pub confidence: f64,
}

/// Sobol indices per factor, in factor order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SobolIndices {
    pub names: Vec<String>,
    pub first_order: Vec<f64>,
    pub first_order_conf: Vec<f64>,
    pub total_order: Vec<f64>,
    pub total_order_conf: Vec<f64>,
    pub second_order: Vec<SecondOrderIndex>,
    /// Number of model evaluations the indices were estimated from.
    pub evaluations: usize,
}

impl SobolIndices {
    /// Sum of first-order indices; at most 1 (up to sampling error), and
    /// close to 1 for an additive model.
    pub fn first_order_sum(&self) -> f64 {
        self.first_order.iter().sum()
    }
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

/// Builds the Saltelli design for `problem`.
///
/// For each of `base_samples` rows of a `2D`-dimensional Sobol sequence
/// (first half `A`, second half `B`), emits `A`, then `AB_j` for every
/// factor, then `BA_j` when `second_order` is set, then `B`. The first
/// `2^⌈log2 N⌉` sequence points are skipped. `shift` scrambles the sequence
/// when given.
pub fn saltelli_sample(
    problem: &SensitivityProblem,
    base_samples: usize,
    second_order: bool,
    shift: Option<Vec<u32>>,
) -> Result<Vec<Vec<f64>>, EeiError> {
    let d = problem.num_vars();
    if d == 0 {
        return Err(EeiError::Analysis("sensitivity problem has no factors".to_string()));
    }
    if base_samples == 0 {
        return Err(EeiError::Analysis("base sample count must be positive".to_string()));
    }

    let mut sequence = match shift {
        Some(words) => SobolSequence::with_shift(2 * d, words)?,
        None => SobolSequence::new(2 * d)?,
    };
    sequence.skip_points(base_samples.next_power_of_two() as u64);

    let mut rows = Vec::with_capacity(base_samples * problem.rows_per_base_sample(second_order));
    for _ in 0..base_samples {
        let base = sequence.next().ok_or_else(|| {
            EeiError::Analysis("Sobol sequence exhausted".to_string())
        })?;
        let (a, b) = base.split_at(d);

        rows.push(a.to_vec());
        for j in 0..d {
            let mut ab = a.to_vec();
            ab[j] = b[j];
            rows.push(ab);
        }
        if second_order {
            for j in 0..d {
                let mut ba = b.to_vec();
                ba[j] = a[j];
                rows.push(ba);
            }
        }
        rows.push(b.to_vec());
    }

    for row in &mut rows {
        for (x, factor) in row.iter_mut().zip(&problem.factors) {
            *x = factor.lower + *x * (factor.upper - factor.lower);
        }
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Model outputs split back into the Saltelli blocks.
struct Blocks {
    a: Vec<f64>,
    b: Vec<f64>,
    ab: Vec<Vec<f64>>,
    ba: Vec<Vec<f64>>,
}

fn split_blocks(outputs: &[f64], d: usize, step: usize, second_order: bool) -> Blocks {
    let n = outputs.len() / step;
    let column = |offset: usize| (0..n).map(|i| outputs[i * step + offset]).collect::<Vec<f64>>();
    Blocks {
        a: column(0),
        b: column(step - 1),
        ab: (0..d).map(|j| column(j + 1)).collect(),
        ba: if second_order {
            (0..d).map(|j| column(j + 1 + d)).collect()
        } else {
            Vec::new()
        },
    }
}

fn variance_ab(blocks: &Blocks, idx: &[usize]) -> f64 {
    let n = (2 * idx.len()) as f64;
    let mean = idx.iter().map(|&i| blocks.a[i] + blocks.b[i]).sum::<f64>() / n;
    idx.iter()
        .map(|&i| (blocks.a[i] - mean).powi(2) + (blocks.b[i] - mean).powi(2))
        .sum::<f64>()
        / n
}

fn first_order(blocks: &Blocks, j: usize, idx: &[usize], var: f64) -> f64 {
    let ab = &blocks.ab[j];
    let sum: f64 = idx.iter().map(|&i| blocks.b[i] * (ab[i] - blocks.a[i])).sum();
    sum / idx.len() as f64 / var
}

fn total_order(blocks: &Blocks, j: usize, idx: &[usize], var: f64) -> f64 {
    let ab = &blocks.ab[j];
    let sum: f64 = idx.iter().map(|&i| (blocks.a[i] - ab[i]).powi(2)).sum();
    0.5 * sum / idx.len() as f64 / var
}

fn second_order(blocks: &Blocks, j: usize, k: usize, idx: &[usize], var: f64) -> f64 {
    let (ba_j, ab_k) = (&blocks.ba[j], &blocks.ab[k]);
    let sum: f64 = idx
        .iter()
        .map(|&i| ba_j[i] * ab_k[i] - blocks.a[i] * blocks.b[i])
        .sum();
    sum / idx.len() as f64 / var - first_order(blocks, j, idx, var) - first_order(blocks, k, idx, var)
}

/// Sample standard deviation (n − 1 denominator).
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Bootstrap half-width of `estimator` at the given z value.
fn bootstrap_conf<R, F>(rng: &mut R, n: usize, resamples: usize, z: f64, estimator: F) -> f64
where
    R: Rng,
    F: Fn(&[usize]) -> f64,
{
    if resamples < 2 {
        return 0.0;
    }
    let mut idx = vec![0usize; n];
    let estimates: Vec<f64> = (0..resamples)
        .map(|_| {
            for slot in idx.iter_mut() {
                *slot = rng.random_range(0..n);
            }
            estimator(&idx)
        })
        .collect();
    z * sample_std(&estimates)
}

/// Estimates Sobol indices from model outputs evaluated on a design from
/// `saltelli_sample` with the same `second_order` flag.
pub fn analyze<R: Rng>(
    problem: &SensitivityProblem,
    outputs: &[f64],
    second_order_terms: bool,
    resamples: usize,
    confidence_level: f64,
    rng: &mut R,
) -> Result<SobolIndices, EeiError> {
    let d = problem.num_vars();
    let step = problem.rows_per_base_sample(second_order_terms);
    if outputs.is_empty() || outputs.len() % step != 0 {
        return Err(EeiError::Analysis(format!(
            "{} outputs do not form whole Saltelli blocks of {}",
            outputs.len(),
            step
        )));
    }

    // Standardize outputs; the indices are invariant but the estimators are
    // better conditioned.
    let n_out = outputs.len() as f64;
    let mean = outputs.iter().sum::<f64>() / n_out;
    let std = (outputs.iter().map(|y| (y - mean).powi(2)).sum::<f64>() / n_out).sqrt();
    if !(std.is_finite() && std > 0.0) {
        return Err(EeiError::Analysis(
            "model output has zero or non-finite variance".to_string(),
        ));
    }
    let standardized: Vec<f64> = outputs.iter().map(|y| (y - mean) / std).collect();

    let blocks = split_blocks(&standardized, d, step, second_order_terms);
    let n = blocks.a.len();
    let all: Vec<usize> = (0..n).collect();
    let var = variance_ab(&blocks, &all);
    if var <= 0.0 {
        return Err(EeiError::Analysis("A/B outputs have zero variance".to_string()));
    }
    let z = normal_quantile(0.5 + confidence_level / 2.0);

    let mut indices = SobolIndices {
        names: problem.factors.iter().map(|f| f.name.clone()).collect(),
        first_order: Vec::with_capacity(d),
        first_order_conf: Vec::with_capacity(d),
        total_order: Vec::with_capacity(d),
        total_order_conf: Vec::with_capacity(d),
        second_order: Vec::new(),
        evaluations: outputs.len(),
    };

    for j in 0..d {
        indices.first_order.push(first_order(&blocks, j, &all, var));
        indices.first_order_conf.push(bootstrap_conf(rng, n, resamples, z, |idx| {
            first_order(&blocks, j, idx, variance_ab(&blocks, idx))
        }));
        indices.total_order.push(total_order(&blocks, j, &all, var));
        indices.total_order_conf.push(bootstrap_conf(rng, n, resamples, z, |idx| {
            total_order(&blocks, j, idx, variance_ab(&blocks, idx))
        }));
    }

    if second_order_terms {
        for j in 0..d {
            for k in (j + 1)..d {
                let value = second_order(&blocks, j, k, &all, var);
                let confidence = bootstrap_conf(rng, n, resamples, z, |idx| {
                    second_order(&blocks, j, k, idx, variance_ab(&blocks, idx))
                });
                indices.second_order.push(SecondOrderIndex {
                    first: problem.factors[j].name.clone(),
                    second: problem.factors[k].name.clone(),
                    value,
                    confidence,
                });
            }
        }
    }

    Ok(indices)
}

// ---------------------------------------------------------------------------
// EEI experiment
// ---------------------------------------------------------------------------

/// Runs the sensitivity experiment on the index formula with the entropy
/// term held at `config.fixed_entropy`. Independent of the observed rows.
pub fn analyze_eei_formula(
    config: &SensitivityConfig,
    weights: &WeightConfig,
) -> Result<SobolIndices, EeiError> {
    let problem = SensitivityProblem::eei_terms(config.lower_bound, config.upper_bound);
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    let shift = if config.scramble {
        Some((0..2 * problem.num_vars()).map(|_| rng.random::<u32>()).collect())
    } else {
        None
    };

    let design = saltelli_sample(&problem, config.base_samples, config.second_order, shift)?;
    let outputs: Vec<f64> = design
        .iter()
        .map(|p| calculate_eei(config.fixed_entropy, p[0], p[1], p[2], weights))
        .collect();

    analyze(
        &problem,
        &outputs,
        config.second_order,
        config.bootstrap_resamples,
        config.confidence_level,
        &mut rng,
    )
}
