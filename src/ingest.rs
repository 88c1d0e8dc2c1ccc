//! Dataset ingest
//!
//! Reads a delimited file with a header row into [`VehicleRecord`]s. Column
//! names are matched case-insensitively against a small alias table, blank
//! rows are skipped, and a row whose numeric cell cannot be parsed (or that
//! is not valid UTF-8) is rejected on its own without stopping the rest of
//! the file.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::error::{Result, ValidationError};
use crate::validation::VehicleRecord;

/// Records read from a dataset, plus rows rejected during parsing
#[derive(Debug, Default)]
pub struct Dataset {
    /// Parsed records, in file order
    pub records: Vec<VehicleRecord>,
    /// Rows that could not be parsed, with their row number
    pub rejected: Vec<(usize, ValidationError)>,
}

impl Dataset {
    /// Rows seen (parsed plus rejected)
    pub fn len(&self) -> usize {
        self.records.len() + self.rejected.len()
    }

    /// Whether no rows were seen
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

const ALIASES: &[(&str, &[&str])] = &[
    ("make", &["make", "brand", "manufacturer"]),
    ("model", &["model"]),
    ("year", &["year", "model_year"]),
    ("variant", &["variant", "trim", "version"]),
    ("tire_size", &["tire_size", "tyre_size", "size", "dimension"]),
    ("category", &["category", "segment", "body_type"]),
    ("vehicle_type", &["vehicle_type", "type"]),
    ("empty_front", &["empty_front", "front_empty", "front_pressure", "pressure_empty_front"]),
    ("empty_rear", &["empty_rear", "rear_empty", "rear_pressure", "pressure_empty_rear"]),
    ("loaded_front", &["loaded_front", "front_loaded", "pressure_loaded_front"]),
    ("loaded_rear", &["loaded_rear", "rear_loaded", "pressure_loaded_rear"]),
    ("max_front", &["max_front", "front_max", "pressure_max_front"]),
    ("max_rear", &["max_rear", "rear_max", "pressure_max_rear"]),
];

/// Load a CSV dataset from disk
pub fn load_csv(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path)?;
    let dataset = read_csv(file)?;
    tracing::info!(
        path = %path.display(),
        records = dataset.records.len(),
        rejected = dataset.rejected.len(),
        "dataset loaded"
    );
    Ok(dataset)
}

/// Read a CSV dataset from any reader
pub fn read_csv<R: Read>(reader: R) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let columns = map_columns(headers.iter());

    let mut dataset = Dataset::default();
    for (idx, result) in reader.byte_records().enumerate() {
        let row_number = idx + 1;
        let row = match csv::StringRecord::from_byte_record(result?) {
            Ok(row) => row,
            Err(e) => {
                let column = e.utf8_error().field();
                let known: Option<&str> = columns
                    .iter()
                    .find_map(|(field, &col)| (col == column).then_some(*field));
                let field = known.or_else(|| headers.get(column)).unwrap_or("unknown");
                let raw = e
                    .into_byte_record()
                    .get(column)
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                    .unwrap_or_default();
                let error = ValidationError::invalid_value(field, &raw);
                tracing::debug!(row = row_number, error = %error, "dataset row is not valid UTF-8");
                dataset.rejected.push((row_number, error));
                continue;
            }
        };
        if row.iter().all(str::is_empty) {
            continue;
        }

        let cell = |field: &str| -> Option<String> {
            columns
                .get(field)
                .and_then(|&col| row.get(col))
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        match parse_row(row_number, &cell) {
            Ok(record) => dataset.records.push(record),
            Err(e) => {
                tracing::debug!(row = row_number, error = %e, "dataset row rejected");
                dataset.rejected.push((row_number, e));
            }
        }
    }

    Ok(dataset)
}

fn map_columns<'a>(headers: impl Iterator<Item = &'a str>) -> HashMap<&'static str, usize> {
    let normalized: Vec<String> = headers
        .map(|h| h.trim().to_ascii_lowercase().replace([' ', '-'], "_"))
        .collect();

    let mut columns = HashMap::new();
    for (field, aliases) in ALIASES {
        if let Some(idx) = aliases
            .iter()
            .find_map(|alias| normalized.iter().position(|h| h == alias))
        {
            columns.insert(*field, idx);
        }
    }
    columns
}

fn parse_row(
    row_number: usize,
    cell: &dyn Fn(&str) -> Option<String>,
) -> std::result::Result<VehicleRecord, ValidationError> {
    let number = |field: &str| -> std::result::Result<Option<f64>, ValidationError> {
        match cell(field) {
            None => Ok(None),
            Some(raw) => raw
                .replace(',', ".")
                .parse::<f64>()
                .map(Some)
                .map_err(|_| ValidationError::invalid_value(field, &raw)),
        }
    };

    let year = match cell("year") {
        None => None,
        Some(raw) => Some(
            raw.parse::<i32>()
                .map_err(|_| ValidationError::invalid_value("year", &raw))?,
        ),
    };

    Ok(VehicleRecord {
        row: Some(row_number),
        make: cell("make"),
        model: cell("model"),
        year,
        variant: cell("variant"),
        tire_size: cell("tire_size"),
        category: cell("category"),
        vehicle_type: cell("vehicle_type"),
        empty_front: number("empty_front")?,
        empty_rear: number("empty_rear")?,
        loaded_front: number("loaded_front")?,
        loaded_rear: number("loaded_rear")?,
        max_front: number("max_front")?,
        max_rear: number("max_rear")?,
    })
}
