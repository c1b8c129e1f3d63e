/// Numerical stages of the EEI analysis.
///
/// Submodules:
/// - `normalize`, `entropy`, `index` — derive the index columns row by row.
/// - `sobol_sequence`, `sensitivity` — Saltelli sampling and Sobol indices
///   for the index formula.
/// - `boosting`, `attribution` — boosted-tree surrogate of the index and its
///   per-feature Shapley values.
/// - `normality`, `special` — Shapiro–Wilk test and the normal-distribution
///   functions it needs.

pub mod attribution;
pub mod boosting;
pub mod entropy;
pub mod index;
pub mod normality;
pub mod normalize;
pub mod sensitivity;
pub mod sobol_sequence;
pub mod special;
