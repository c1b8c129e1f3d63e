//! Shapiro–Wilk test for normality.
//!
//! Royston's approximation (AS R94): the coefficients `a` come from
//! polynomial corrections to normalized expected order statistics, and the
//! p-value from a normalizing transform of `W` whose mean and spread are
//! polynomials in `n` (small samples) or `ln n` (n ≥ 12). Valid for
//! 3 ≤ n ≤ 5000; larger samples are tested but flagged.

use serde::Serialize;

use crate::analysis::special::{normal_quantile, normal_sf};
use crate::logging::{self, Stage};
use crate::model::EeiError;

pub const MIN_SAMPLES: usize = 3;
/// Upper end of the range the p-value approximation was fitted on.
pub const MAX_ACCURATE_SAMPLES: usize = 5000;

const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.07119, 4.434685, -2.706056];
const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
const C3: [f64; 4] = [0.544, -0.39978, 0.025054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];
const GAMMA: [f64; 2] = [-2.273, 0.459];

const SQRT_HALF: f64 = 0.70711;
const PI_OVER_6_INV: f64 = 1.909859;
const ASIN_SQRT_THREE_QUARTERS: f64 = 1.047198;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShapiroWilk {
    pub statistic: f64,
    pub p_value: f64,
    pub n: usize,
}

impl ShapiroWilk {
    pub fn rejects_normality(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// `c[0] + c[1]·x + c[2]·x² + …`
fn poly(c: &[f64], x: f64) -> f64 {
    c.iter().rev().fold(0.0, |acc, &coef| acc * x + coef)
}

/// Upper-half coefficients `a_1 … a_{n/2}`, largest first.
fn coefficients(n: usize) -> Vec<f64> {
    if n == 3 {
        return vec![SQRT_HALF];
    }

    let half = n / 2;
    let an25 = n as f64 + 0.25;
    let m: Vec<f64> = (1..=half)
        .map(|i| normal_quantile((i as f64 - 0.375) / an25))
        .collect();
    let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / (n as f64).sqrt();

    let a1 = poly(&C1, rsn) - m[0] / ssumm2;
    let mut a = Vec::with_capacity(half);
    a.push(a1);

    let (first_scaled, fac) = if n > 5 {
        let a2 = -m[1] / ssumm2 + poly(&C2, rsn);
        a.push(a2);
        let fac = ((summ2 - 2.0 * m[0] * m[0] - 2.0 * m[1] * m[1])
            / (1.0 - 2.0 * a1 * a1 - 2.0 * a2 * a2))
            .sqrt();
        (2, fac)
    } else {
        let fac = ((summ2 - 2.0 * m[0] * m[0]) / (1.0 - 2.0 * a1 * a1)).sqrt();
        (1, fac)
    };
    a.extend(m[first_scaled..].iter().map(|mi| -mi / fac));
    a
}

/// Runs the test on `values`. Order does not matter.
pub fn shapiro_wilk(values: &[f64]) -> Result<ShapiroWilk, EeiError> {
    let n = values.len();
    if n < MIN_SAMPLES {
        return Err(EeiError::InsufficientSamples {
            method: "Shapiro-Wilk",
            required: MIN_SAMPLES,
            actual: n,
        });
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(EeiError::Analysis("Shapiro-Wilk input contains non-finite values".to_string()));
    }
    if n > MAX_ACCURATE_SAMPLES {
        logging::warn(
            Stage::Normality,
            None,
            &format!("p-value may be inaccurate for n={} (> {})", n, MAX_ACCURATE_SAMPLES),
        );
    }

    let mut x = values.to_vec();
    x.sort_by(f64::total_cmp);
    let range = x[n - 1] - x[0];
    if range < 1e-19 {
        return Err(EeiError::Analysis("Shapiro-Wilk input has zero range".to_string()));
    }

    let a = coefficients(n);
    let numerator: f64 = a
        .iter()
        .enumerate()
        .map(|(i, ai)| ai * (x[n - 1 - i] - x[i]))
        .sum();
    let mean = x.iter().sum::<f64>() / n as f64;
    let ss: f64 = x.iter().map(|v| (v - mean).powi(2)).sum();
    let statistic = (numerator * numerator / ss).min(1.0);

    Ok(ShapiroWilk {
        statistic,
        p_value: p_value(statistic, n),
        n,
    })
}

fn p_value(w: f64, n: usize) -> f64 {
    if n == 3 {
        let pw = PI_OVER_6_INV * (w.sqrt().asin() - ASIN_SQRT_THREE_QUARTERS);
        return pw.clamp(0.0, 1.0);
    }

    let nf = n as f64;
    let mut y = (1.0 - w).ln();
    let (m, s) = if n <= 11 {
        let gamma = poly(&GAMMA, nf);
        if y >= gamma {
            return 1e-99;
        }
        y = -(gamma - y).ln();
        (poly(&C3, nf), poly(&C4, nf).exp())
    } else {
        let xx = nf.ln();
        (poly(&C5, xx), poly(&C6, xx).exp())
    };
    normal_sf((y - m) / s).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poly_evaluates_ascending_coefficients() {
        assert!((poly(&[1.0, 2.0, 3.0], 2.0) - 17.0).abs() < 1e-12);
        assert_eq!(poly(&[4.0], 100.0), 4.0);
    }

    #[test]
    fn test_coefficients_are_unit_norm() {
        for n in [4, 5, 6, 11, 12, 50, 501] {
            let a = coefficients(n);
            assert_eq!(a.len(), n / 2);
            let norm = 2.0 * a.iter().map(|v| v * v).sum::<f64>();
            assert!((norm - 1.0).abs() < 1e-9, "n={} norm={}", n, norm);
            assert!(a.windows(2).all(|w| w[0] > w[1]), "n={} not decreasing", n);
        }
    }

    #[test]
    fn test_equally_spaced_triple_is_perfectly_normal() {
        let result = shapiro_wilk(&[3.0, 1.0, 2.0]).unwrap();
        assert!((result.statistic - 1.0).abs() < 1e-4);
        assert!(result.p_value > 0.99);
        assert_eq!(result.n, 3);
    }

    fn assert_known(values: &[f64], statistic: f64, p_value: f64) {
        let result = shapiro_wilk(values).unwrap();
        assert!((result.statistic - statistic).abs() < 1e-4, "W={}", result.statistic);
        assert!((result.p_value - p_value).abs() < 1e-3, "p={}", result.p_value);
    }

    #[test]
    fn test_known_answer_three_samples() {
        assert_known(&[1.0, 2.0, 4.0], 0.964286, 0.636886);
    }

    #[test]
    fn test_known_answer_small_sample() {
        // Body weights from Shapiro and Wilk (1965).
        let weights = [
            148.0, 154.0, 158.0, 160.0, 161.0, 162.0, 166.0, 170.0, 182.0, 195.0, 236.0,
        ];
        assert_known(&weights, 0.788815, 0.006704);
    }

    #[test]
    fn test_known_answer_large_sample() {
        let values: Vec<f64> = (1..=20).map(f64::from).collect();
        assert_known(&values, 0.960375, 0.551372);
    }

    #[test]
    fn test_normal_scores_are_not_rejected() {
        let n = 20;
        let values: Vec<f64> = (1..=n)
            .map(|i| normal_quantile((i as f64 - 0.375) / (n as f64 + 0.25)))
            .collect();
        let result = shapiro_wilk(&values).unwrap();
        assert!(result.statistic > 0.97, "W={}", result.statistic);
        assert!(result.p_value > 0.5, "p={}", result.p_value);
        assert!(!result.rejects_normality(0.05));
    }

    #[test]
    fn test_single_outlier_is_rejected() {
        let mut values = vec![1.0; 9];
        values.push(50.0);
        let result = shapiro_wilk(&values).unwrap();
        assert!(result.statistic < 0.5, "W={}", result.statistic);
        assert!(result.p_value < 0.01, "p={}", result.p_value);
    }

    #[test]
    fn test_statistic_and_p_value_stay_in_range() {
        let samples: [&[f64]; 4] = [
            &[7.56, 6.41, 6.66, 5.10, 6.23],
            &[1.0, 2.0, 4.0, 8.0, 16.0, 32.0],
            &[0.3, 0.1, 0.4, 0.1, 0.5, 0.9, 0.2, 0.6, 0.5, 0.3, 0.5, 0.8, 0.9, 0.7],
            &[10.0, 10.0, 10.0, 11.0],
        ];
        for values in samples {
            let result = shapiro_wilk(values).unwrap();
            assert!(result.statistic > 0.0 && result.statistic <= 1.0);
            assert!((0.0..=1.0).contains(&result.p_value));
        }
    }

    #[test]
    fn test_too_few_samples() {
        let err = shapiro_wilk(&[1.0, 2.0]).unwrap_err();
        assert_eq!(
            err,
            EeiError::InsufficientSamples {
                method: "Shapiro-Wilk",
                required: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn test_constant_input_is_rejected() {
        assert!(matches!(shapiro_wilk(&[4.0; 6]), Err(EeiError::Analysis(_))));
    }
}
