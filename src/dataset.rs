/// Observation registry for the EEI analysis service.
///
/// Defines the canonical table of site observations the pipeline runs on.
/// This is the single source of truth for the input data; all other modules
/// receive observations from `load_observations` rather than hardcoding rows.

use crate::model::{EeiError, Observation};

// ---------------------------------------------------------------------------
// Observation registry
// ---------------------------------------------------------------------------

/// Static form of one observation row.
pub struct ObservationEntry {
    pub year: i32,
    /// Water body or wetland name. Not unique across rows.
    pub location: &'static str,
    /// Salinity in g/L. `None` where no measurement exists.
    pub salinity: Option<f64>,
    /// Shannon-index proxy for species diversity.
    pub biodiversity: f64,
    /// Annual energy flow, MJ/m².
    pub energy_flow: f64,
}

/// All observations, in the row order the results table preserves.
///
/// The two Urmia rows bracket the lake's decline (1990 and 2024); the
/// remaining sites are 2020 comparison points.
pub static OBSERVATION_TABLE: &[ObservationEntry] = &[
    ObservationEntry {
        year: 1990,
        location: "Urmia",
        salinity: Some(200.0),
        biodiversity: 2.5,
        energy_flow: 800.0,
    },
    ObservationEntry {
        year: 2024,
        location: "Urmia",
        salinity: Some(310.0),
        biodiversity: 1.1,
        energy_flow: 1200.0,
    },
    ObservationEntry {
        year: 2020,
        location: "Aral Sea",
        salinity: Some(120.0),
        biodiversity: 0.8,
        energy_flow: 950.0,
    },
    ObservationEntry {
        year: 2020,
        location: "Pantanal",
        salinity: None, // freshwater wetland, not sampled
        biodiversity: 1.5,
        energy_flow: 900.0,
    },
    ObservationEntry {
        year: 2020,
        location: "Mekong Delta",
        salinity: None,
        biodiversity: 1.3,
        energy_flow: 1000.0,
    },
];

/// Full names for locations whose table label drops the water-body kind.
static DISPLAY_NAMES: &[(&str, &str)] = &[("Urmia", "Lake Urmia")];

/// Name used for `location` in chart titles.
pub fn display_name(location: &str) -> &str {
    DISPLAY_NAMES
        .iter()
        .find(|(label, _)| *label == location)
        .map_or(location, |&(_, name)| name)
}

/// Builds the observation table from `OBSERVATION_TABLE`.
///
/// Fails if any row is malformed; see `validate_observations`.
pub fn load_observations() -> Result<Vec<Observation>, EeiError> {
    let observations: Vec<Observation> = OBSERVATION_TABLE
        .iter()
        .map(|entry| Observation {
            year: entry.year,
            location: entry.location.to_string(),
            salinity: entry.salinity,
            biodiversity: entry.biodiversity,
            energy_flow: entry.energy_flow,
        })
        .collect();

    validate_observations(&observations)?;
    Ok(observations)
}

/// Checks that a table is usable by the pipeline.
///
/// Rejects an empty table, empty location labels, and any biodiversity,
/// energy flow or present salinity value that is not finite and positive.
pub fn validate_observations(observations: &[Observation]) -> Result<(), EeiError> {
    if observations.is_empty() {
        return Err(EeiError::InvalidData("observation table is empty".to_string()));
    }

    for (row, obs) in observations.iter().enumerate() {
        if obs.location.trim().is_empty() {
            return Err(EeiError::InvalidData(format!("row {}: empty location", row)));
        }
        check_positive(row, "biodiversity", obs.biodiversity)?;
        check_positive(row, "energy_flow", obs.energy_flow)?;
        if let Some(salinity) = obs.salinity {
            check_positive(row, "salinity", salinity)?;
        }
    }
    Ok(())
}

fn check_positive(row: usize, column: &str, value: f64) -> Result<(), EeiError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EeiError::InvalidData(format!(
            "row {}: {} must be finite and positive, got {}",
            row, column, value
        )))
    }
}

/// Returns the observations recorded at `location`, in table order.
pub fn observations_at<'a>(observations: &'a [Observation], location: &str) -> Vec<&'a Observation> {
    observations.iter().filter(|o| o.location == location).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
