//! Ecological Entropy Index.
//!
//! EEI = H + w_s·S + w_b·B + w_e·E, with H the entropy term and S, B, E the
//! normalized salinity, biodiversity and energy flow. Default weights are
//! 0.5, 0.3 and 0.2.

use crate::config::WeightConfig;
use crate::model::{EeiRecord, NormalizedObservation};

/// Index value for one set of inputs.
pub fn calculate_eei(
    shannon_entropy: f64,
    salinity_norm: f64,
    biodiversity_norm: f64,
    energy_flow_norm: f64,
    weights: &WeightConfig,
) -> f64 {
    shannon_entropy
        + weights.salinity * salinity_norm
        + weights.biodiversity * biodiversity_norm
        + weights.energy_flow * energy_flow_norm
}

/// Builds result records from normalized rows and their entropy terms.
///
/// The CUSUM columns are left empty; the change-point stage fills them.
pub fn index_records(
    rows: &[NormalizedObservation],
    entropies: &[f64],
    weights: &WeightConfig,
) -> Vec<EeiRecord> {
    rows.iter()
        .zip(entropies)
        .map(|(row, &entropy)| {
            let obs = &row.observation;
            EeiRecord {
                year: obs.year,
                location: obs.location.clone(),
                salinity: obs.salinity_or_zero(),
                biodiversity: obs.biodiversity,
                energy_flow: obs.energy_flow,
                salinity_norm: row.salinity_norm,
                biodiversity_norm: row.biodiversity_norm,
                energy_flow_norm: row.energy_flow_norm,
                shannon_entropy: entropy,
                eei: calculate_eei(
                    entropy,
                    row.salinity_norm,
                    row.biodiversity_norm,
                    row.energy_flow_norm,
                    weights,
                ),
                cusum_pos: None,
                cusum_neg: None,
            }
        })
        .collect()
}
