//! Linear rescaling of raw measurements to the [0, 10] range.
//!
//! Maxima are fixed per column rather than derived from the data, so a value
//! above its column maximum yields a normalized value above 10. No clamping
//! is applied.

use crate::config::NormalizationConfig;
use crate::model::{NormalizedObservation, Observation};

/// Upper end of the normalized range.
pub const NORMALIZED_SCALE: f64 = 10.0;

/// Rescales `value` so that `max_val` maps to 10.
pub fn normalize(value: f64, max_val: f64) -> f64 {
    value / max_val * NORMALIZED_SCALE
}

/// Attaches normalized salinity, biodiversity and energy flow to each row.
/// Missing salinity is normalized as 0.
pub fn normalize_observations(
    observations: &[Observation],
    bounds: &NormalizationConfig,
) -> Vec<NormalizedObservation> {
    observations
        .iter()
        .map(|obs| NormalizedObservation {
            salinity_norm: normalize(obs.salinity_or_zero(), bounds.salinity_max),
            biodiversity_norm: normalize(obs.biodiversity, bounds.biodiversity_max),
            energy_flow_norm: normalize(obs.energy_flow, bounds.energy_flow_max),
            observation: obs.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::load_observations;

    const TOL: f64 = 1e-9;

    #[test]
    fn test_column_maximum_maps_to_ten() {
        assert!((normalize(310.0, 310.0) - 10.0).abs() < TOL);
        assert!((normalize(0.0, 310.0)).abs() < TOL);
    }

    #[test]
    fn test_values_above_maximum_are_not_clamped() {
        assert!((normalize(620.0, 310.0) - 20.0).abs() < TOL);
    }

    #[test]
    fn test_urmia_1990_row() {
        let observations = load_observations().unwrap();
        let rows = normalize_observations(&observations, &NormalizationConfig::default());
        let first = &rows[0];
        assert!((first.salinity_norm - 6.451_612_903_2).abs() < 1e-9);
        assert!((first.biodiversity_norm - 10.0).abs() < TOL);
        assert!((first.energy_flow_norm - 6.666_666_666_7).abs() < 1e-9);
    }

    #[test]
    fn test_every_row_follows_the_fixed_formula() {
        let observations = load_observations().unwrap();
        let rows = normalize_observations(&observations, &NormalizationConfig::default());
        for row in &rows {
            let obs = &row.observation;
            assert!((row.salinity_norm - obs.salinity_or_zero() / 310.0 * 10.0).abs() < TOL);
            assert!((row.biodiversity_norm - obs.biodiversity / 2.5 * 10.0).abs() < TOL);
            assert!((row.energy_flow_norm - obs.energy_flow / 1200.0 * 10.0).abs() < TOL);
        }
    }

    #[test]
    fn test_missing_salinity_normalizes_to_zero() {
        let observations = load_observations().unwrap();
        let rows = normalize_observations(&observations, &NormalizationConfig::default());
        let pantanal = rows
            .iter()
            .find(|r| r.observation.location == "Pantanal")
            .expect("Pantanal row");
        assert_eq!(pantanal.salinity_norm, 0.0);
    }

    #[test]
    fn test_configured_maximum_is_used() {
        let observations = load_observations().unwrap();
        let bounds = NormalizationConfig {
            salinity_max: 400.0,
            ..NormalizationConfig::default()
        };
        let rows = normalize_observations(&observations, &bounds);
        assert!((rows[0].salinity_norm - 5.0).abs() < TOL);
    }
}
