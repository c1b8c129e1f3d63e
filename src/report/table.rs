//! Results table I/O.
//!
//! One header row followed by one row per record, columns in `EeiRecord`
//! field order. Floats use shortest round-trip formatting and missing CUSUM
//! values are written as empty fields, so reading a table back yields the
//! records that were written.

use std::fs::File;
use std::path::Path;

use crate::model::{EeiError, EeiRecord};

pub const COLUMNS: [&str; 12] = [
    "year",
    "location",
    "salinity",
    "biodiversity",
    "energy_flow",
    "salinity_norm",
    "biodiversity_norm",
    "energy_flow_norm",
    "shannon_entropy",
    "eei",
    "cusum_pos",
    "cusum_neg",
];

/// Writes `records` to `path`, replacing any existing file.
pub fn write_table<P: AsRef<Path>>(path: P, records: &[EeiRecord]) -> Result<(), EeiError> {
    let path = path.as_ref();
    let file = File::create(path)
        .map_err(|e| EeiError::Table(format!("cannot create {}: {}", path.display(), e)))?;
    let mut writer = csv::Writer::from_writer(file);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads a table previously written by `write_table`.
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<Vec<EeiRecord>, EeiError> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;

    let headers = reader.headers()?.clone();
    if headers.iter().ne(COLUMNS.iter().copied()) {
        return Err(EeiError::Table(format!(
            "{} has unexpected columns: {}",
            path.display(),
            headers.iter().collect::<Vec<_>>().join(",")
        )));
    }

    reader
        .deserialize()
        .map(|row| row.map_err(EeiError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> Vec<EeiRecord> {
        vec![
            EeiRecord {
                year: 1990,
                location: "Urmia".to_string(),
                salinity: 200.0,
                biodiversity: 2.5,
                energy_flow: 800.0,
                salinity_norm: 200.0 / 310.0 * 10.0,
                biodiversity_norm: 10.0,
                energy_flow_norm: 800.0 / 1200.0 * 10.0,
                shannon_entropy: -(1.0_f64 + 1e-10).ln(),
                eei: 7.559139784846,
                cusum_pos: Some(0.0),
                cusum_neg: Some(0.0),
            },
            EeiRecord {
                year: 2020,
                location: "Mekong Delta".to_string(),
                salinity: 0.0,
                biodiversity: 1.3,
                energy_flow: 1000.0,
                salinity_norm: 0.0,
                biodiversity_norm: 1.3 / 2.5 * 10.0,
                energy_flow_norm: 1000.0 / 1200.0 * 10.0,
                shannon_entropy: -(1.0_f64 + 1e-10).ln(),
                eei: 3.2266666666,
                cusum_pos: None,
                cusum_neg: None,
            },
        ]
    }

    #[test]
    fn test_header_and_empty_cusum_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eei_results.csv");
        write_table(&path, &sample_records()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), COLUMNS.join(","));
        assert!(lines.next().unwrap().starts_with("1990,Urmia,200.0,2.5,800.0,"));
        assert!(lines.next().unwrap().ends_with(",,"));
    }

    #[test]
    fn test_read_back_reproduces_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eei_results.csv");
        let records = sample_records();
        write_table(&path, &records).unwrap();
        assert_eq!(read_table(&path).unwrap(), records);
    }

    #[test]
    fn test_foreign_header_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();
        assert!(matches!(read_table(&path), Err(EeiError::Table(_))));
    }

    #[test]
    fn test_missing_directory_is_a_table_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("eei_results.csv");
        assert!(matches!(write_table(&path, &[]), Err(EeiError::Table(_))));
    }
}
