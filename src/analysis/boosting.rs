//! Gradient-boosted regression trees.
//!
//! Sequential ensemble of regression trees. Each tree is grown on the
//! gradient of the squared-error loss at the current cumulative prediction
//! and predicts a residual correction. The model output is the base score
//! plus all tree outputs; leaf values already include the learning rate.
//!
//! # Training
//!
//! Second-order (Newton) boosting with exact greedy splits:
//! - gradient `g = prediction − target`, hessian `h = 1`
//! - leaf weight `−G / (H + λ)`, scaled by the learning rate
//! - split gain `½ [G_L²/(H_L+λ) + G_R²/(H_R+λ) − G²/(H+λ)] − γ`
//! - a split is kept only if both children reach `min_child_weight` and the
//!   gain is positive
//!
//! Thresholds sit midway between consecutive distinct feature values;
//! samples with `x < threshold` go left. Every node records its cover (the
//! hessian sum of the training samples that reached it), which the
//! attribution stage uses to weight unknown branches.

use crate::config::AttributionConfig;
use crate::model::EeiError;

/// Smallest gain treated as an improvement.
const MIN_SPLIT_GAIN: f64 = 1e-12;

/// Node in a regression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Leaf {
        value: f64,
        cover: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        cover: f64,
    },
}

impl TreeNode {
    pub fn cover(&self) -> f64 {
        match self {
            TreeNode::Leaf { cover, .. } | TreeNode::Split { cover, .. } => *cover,
        }
    }
}

/// A single regression tree; node 0 is the root.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Predict the residual for a single sample.
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    let x = features.get(*feature).copied().unwrap_or(f64::NAN);
                    idx = if x < *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Features this tree splits on.
    pub fn split_features(&self) -> Vec<usize> {
        let mut features: Vec<usize> = self
            .nodes
            .iter()
            .filter_map(|n| match n {
                TreeNode::Split { feature, .. } => Some(*feature),
                TreeNode::Leaf { .. } => None,
            })
            .collect();
        features.sort_unstable();
        features.dedup();
        features
    }
}

/// A boosted ensemble of regression trees.
#[derive(Debug, Clone, PartialEq)]
pub struct BoostedRegressor {
    trees: Vec<RegressionTree>,
    base_score: f64,
    n_features: usize,
}

impl BoostedRegressor {
    /// Fits the ensemble to `samples` (one feature row per sample) and
    /// `targets`. The base score is the target mean.
    ///
    /// Fails on empty input, ragged or empty feature rows, mismatched
    /// lengths, or non-finite values.
    pub fn fit(
        samples: &[Vec<f64>],
        targets: &[f64],
        params: &AttributionConfig,
    ) -> Result<Self, EeiError> {
        if samples.is_empty() {
            return Err(EeiError::Analysis("no training samples".to_string()));
        }
        if samples.len() != targets.len() {
            return Err(EeiError::Analysis(format!(
                "{} samples but {} targets",
                samples.len(),
                targets.len()
            )));
        }
        let n_features = samples[0].len();
        if n_features == 0 || samples.iter().any(|s| s.len() != n_features) {
            return Err(EeiError::Analysis("feature rows are empty or ragged".to_string()));
        }
        if samples.iter().flatten().chain(targets).any(|v| !v.is_finite()) {
            return Err(EeiError::Analysis("training data contains non-finite values".to_string()));
        }

        let base_score = targets.iter().sum::<f64>() / targets.len() as f64;
        let mut predictions = vec![base_score; targets.len()];
        let mut trees = Vec::with_capacity(params.rounds);

        for _ in 0..params.rounds {
            let gradients: Vec<f64> = predictions
                .iter()
                .zip(targets)
                .map(|(p, y)| p - y)
                .collect();
            let hessians = vec![1.0; targets.len()];

            let mut builder = TreeBuilder {
                samples,
                gradients: &gradients,
                hessians: &hessians,
                params,
                nodes: Vec::new(),
            };
            builder.grow((0..samples.len()).collect(), 0);
            let tree = RegressionTree { nodes: builder.nodes };

            for (pred, sample) in predictions.iter_mut().zip(samples) {
                *pred += tree.predict(sample);
            }
            trees.push(tree);
        }

        Ok(Self {
            trees,
            base_score,
            n_features,
        })
    }

    /// Predict the target for a single sample.
    pub fn predict(&self, features: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict(features)).sum::<f64>()
    }

    pub fn predict_batch(&self, samples: &[Vec<f64>]) -> Vec<f64> {
        samples.iter().map(|s| self.predict(s)).collect()
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

// ---------------------------------------------------------------------------
// Tree growing
// ---------------------------------------------------------------------------

struct TreeBuilder<'a> {
    samples: &'a [Vec<f64>],
    gradients: &'a [f64],
    hessians: &'a [f64],
    params: &'a AttributionConfig,
    nodes: Vec<TreeNode>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl TreeBuilder<'_> {
    /// Grows the subtree over `rows` and returns its node index.
    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let g: f64 = rows.iter().map(|&i| self.gradients[i]).sum();
        let h: f64 = rows.iter().map(|&i| self.hessians[i]).sum();
        let idx = self.nodes.len();

        let split = if depth < self.params.max_depth {
            self.best_split(&rows, g, h)
        } else {
            None
        };

        let Some(split) = split else {
            let value = -g / (h + self.params.lambda) * self.params.learning_rate;
            self.nodes.push(TreeNode::Leaf { value, cover: h });
            return idx;
        };

        // Reserve the slot so children are numbered after their parent.
        self.nodes.push(TreeNode::Leaf { value: 0.0, cover: h });
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&i| self.samples[i][split.feature] < split.threshold);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[idx] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
            cover: h,
        };
        idx
    }

    fn best_split(&self, rows: &[usize], g: f64, h: f64) -> Option<SplitCandidate> {
        let lambda = self.params.lambda;
        let parent_score = g * g / (h + lambda);
        let mut best: Option<SplitCandidate> = None;

        for feature in 0..self.samples[rows[0]].len() {
            let mut sorted = rows.to_vec();
            sorted.sort_by(|&a, &b| {
                self.samples[a][feature].total_cmp(&self.samples[b][feature])
            });

            let (mut gl, mut hl) = (0.0, 0.0);
            for pair in sorted.windows(2) {
                let (i, next) = (pair[0], pair[1]);
                gl += self.gradients[i];
                hl += self.hessians[i];
                let (x, x_next) = (self.samples[i][feature], self.samples[next][feature]);
                if x == x_next {
                    continue;
                }
                let (gr, hr) = (g - gl, h - hl);
                if hl < self.params.min_child_weight || hr < self.params.min_child_weight {
                    continue;
                }
                let gain = 0.5 * (gl * gl / (hl + lambda) + gr * gr / (hr + lambda) - parent_score)
                    - self.params.gamma;
                if gain > MIN_SPLIT_GAIN && best.as_ref().is_none_or(|b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: 0.5 * (x + x_next),
                        gain,
                    });
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> AttributionConfig {
        AttributionConfig::default()
    }

    fn line_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let samples: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64, 0.0]).collect();
        let targets: Vec<f64> = (0..8).map(|i| 2.0 * i as f64 + 1.0).collect();
        (samples, targets)
    }

    #[test]
    fn test_base_score_is_target_mean() {
        let (samples, targets) = line_data();
        let model = BoostedRegressor::fit(&samples, &targets, &params()).unwrap();
        assert!((model.base_score() - 8.0).abs() < 1e-12);
        assert_eq!(model.trees().len(), 100);
        assert_eq!(model.n_features(), 2);
    }

    #[test]
    fn test_fit_reproduces_training_targets() {
        let (samples, targets) = line_data();
        let model = BoostedRegressor::fit(&samples, &targets, &params()).unwrap();
        for (pred, y) in model.predict_batch(&samples).iter().zip(&targets) {
            assert!((pred - y).abs() < 1e-3, "predicted {}, expected {}", pred, y);
        }
    }

    #[test]
    fn test_constant_feature_is_never_split() {
        let (samples, targets) = line_data();
        let model = BoostedRegressor::fit(&samples, &targets, &params()).unwrap();
        for tree in model.trees() {
            assert!(!tree.split_features().contains(&1));
        }
    }

    #[test]
    fn test_constant_target_yields_stumps() {
        let samples: Vec<Vec<f64>> = (0..4).map(|i| vec![i as f64]).collect();
        let model = BoostedRegressor::fit(&samples, &[3.0; 4], &params()).unwrap();
        for tree in model.trees() {
            assert_eq!(tree.nodes().len(), 1);
        }
        assert!((model.predict(&[10.0]) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_depth_limit_is_respected() {
        let (samples, targets) = line_data();
        let shallow = AttributionConfig {
            max_depth: 1,
            ..params()
        };
        let model = BoostedRegressor::fit(&samples, &targets, &shallow).unwrap();
        for tree in model.trees() {
            assert!(tree.nodes().len() <= 3);
        }
    }

    #[test]
    fn test_cover_counts_samples() {
        let (samples, targets) = line_data();
        let model = BoostedRegressor::fit(&samples, &targets, &params()).unwrap();
        let tree = &model.trees()[0];
        assert_eq!(tree.nodes()[0].cover(), 8.0);
        if let TreeNode::Split { left, right, .. } = tree.nodes()[0] {
            let children = tree.nodes()[left].cover() + tree.nodes()[right].cover();
            assert_eq!(children, 8.0);
        } else {
            panic!("first tree should split on a varying target");
        }
    }

    #[test]
    fn test_min_child_weight_blocks_small_leaves() {
        let (samples, targets) = line_data();
        let strict = AttributionConfig {
            min_child_weight: 5.0,
            ..params()
        };
        let model = BoostedRegressor::fit(&samples, &targets, &strict).unwrap();
        // 8 samples cannot be split into two children of 5.
        assert!(model.trees().iter().all(|t| t.nodes().len() == 1));
    }

    #[test]
    fn test_invalid_inputs_are_rejected() {
        let p = params();
        assert!(BoostedRegressor::fit(&[], &[], &p).is_err());
        assert!(BoostedRegressor::fit(&[vec![1.0]], &[1.0, 2.0], &p).is_err());
        assert!(BoostedRegressor::fit(&[vec![1.0], vec![1.0, 2.0]], &[1.0, 2.0], &p).is_err());
        assert!(BoostedRegressor::fit(&[vec![f64::NAN]], &[1.0], &p).is_err());
    }
}
