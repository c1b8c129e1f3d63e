//! Output stage: results table, charts and run summary.

pub mod charts;
pub mod summary;
pub mod table;
