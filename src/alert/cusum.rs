//! Two-sided CUSUM change-point detection on the index series.
//!
//! Deviations from a trailing rolling mean are accumulated separately for
//! upward and downward drift, each reduced by `threshold` and floored at 0.
//! Any positive accumulator value is reported as a `ShiftAlert`.
//!
//! Rows before the rolling window fills have no mean; their values are
//! `None` ("not yet detectable"). The first defined row after such a gap
//! starts again from 0.

use serde::Serialize;
use std::fmt;

use crate::config::CusumConfig;
use crate::logging::{self, Stage};
use crate::model::EeiRecord;

// ---------------------------------------------------------------------------
// Rolling statistics
// ---------------------------------------------------------------------------

/// Trailing mean over `window` values, `None` until the window is full.
pub fn rolling_mean(series: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; series.len()];
    }
    (0..series.len())
        .map(|i| {
            if i + 1 < window {
                None
            } else {
                let slice = &series[i + 1 - window..=i];
                Some(slice.iter().sum::<f64>() / window as f64)
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CUSUM
// ---------------------------------------------------------------------------

/// Upward and downward cumulative sums, row-aligned with `series`.
///
/// Row 0 is always `Some(0.0)` for both sides.
pub fn cusum(series: &[f64], threshold: f64, window: usize) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let mean = rolling_mean(series, window);
    let mut pos = Vec::with_capacity(series.len());
    let mut neg = Vec::with_capacity(series.len());

    for (i, &x) in series.iter().enumerate() {
        if i == 0 {
            pos.push(Some(0.0));
            neg.push(Some(0.0));
            continue;
        }
        match mean[i] {
            Some(m) => {
                let prev_pos: f64 = pos[i - 1].unwrap_or(0.0);
                let prev_neg: f64 = neg[i - 1].unwrap_or(0.0);
                pos.push(Some((prev_pos + x - m - threshold).max(0.0)));
                neg.push(Some((prev_neg + m - x - threshold).max(0.0)));
            }
            None => {
                pos.push(None);
                neg.push(None);
            }
        }
    }
    (pos, neg)
}

// ---------------------------------------------------------------------------
// Shift alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftDirection {
    Upward,
    Downward,
}

impl fmt::Display for ShiftDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShiftDirection::Upward => write!(f, "upward"),
            ShiftDirection::Downward => write!(f, "downward"),
        }
    }
}

/// A positive CUSUM value on one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShiftAlert {
    pub direction: ShiftDirection,
    pub row: usize,
    pub year: i32,
    pub location: String,
    pub magnitude: f64,
    pub message: String,
}

/// Collects an alert for every row whose CUSUM value is strictly positive.
pub fn detect_shifts(records: &[EeiRecord]) -> Vec<ShiftAlert> {
    let mut alerts = Vec::new();
    for (row, record) in records.iter().enumerate() {
        let sides = [
            (ShiftDirection::Upward, record.cusum_pos),
            (ShiftDirection::Downward, record.cusum_neg),
        ];
        for (direction, value) in sides {
            let Some(magnitude) = value.filter(|v| *v > 0.0) else {
                continue;
            };
            alerts.push(ShiftAlert {
                direction,
                row,
                year: record.year,
                location: record.location.clone(),
                magnitude,
                message: format!(
                    "{} shift in EEI at {} {} (cusum {:.3})",
                    direction, record.location, record.year, magnitude
                ),
            });
        }
    }
    alerts
}

/// Returns `records` with the CUSUM columns filled in from the EEI series.
pub fn apply_cusum(records: &[EeiRecord], config: &CusumConfig) -> Vec<EeiRecord> {
    let series: Vec<f64> = records.iter().map(|r| r.eei).collect();
    let (pos, neg) = cusum(&series, config.threshold, config.window);

    let undetectable = pos.iter().filter(|v| v.is_none()).count();
    if undetectable > 0 {
        logging::debug(
            Stage::ChangePoint,
            None,
            &format!(
                "{} of {} rows precede a full window of {}",
                undetectable,
                records.len(),
                config.window
            ),
        );
    }

    records
        .iter()
        .zip(pos.into_iter().zip(neg))
        .map(|(record, (cusum_pos, cusum_neg))| EeiRecord {
            cusum_pos,
            cusum_neg,
            ..record.clone()
        })
        .collect()
}
