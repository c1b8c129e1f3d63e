//! Ecological Entropy Index (EEI) analysis.
//!
//! Builds the index from a fixed observation table, then runs global
//! sensitivity analysis, boosted-tree attribution, CUSUM change-point
//! detection and a Shapiro–Wilk normality test, and writes a results table,
//! two charts and a JSON summary. See `pipeline` for the stage order.

pub mod alert;
pub mod analysis;
pub mod config;
pub mod dataset;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod report;
