//! Vehicle record validation and normalization
//!
//! [`VehicleRecordValidator::validate`] is pure: it either returns a
//! [`NormalizedRecord`] or a [`ValidationError`] carrying a machine-readable
//! category. Checks run in a fixed order and the first failure wins:
//!
//! 1. required fields
//! 2. vehicle type
//! 3. model year window
//! 4. pressure band
//! 5. loaded vs empty pressure per axle

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::config::ValidationConfig;
use crate::error::ValidationError;
use crate::types::{NaturalKey, VehicleType};

/// Raw vehicle record as read from the dataset
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleRecord {
    /// Source row number (1-based, header excluded), when read from a file
    #[serde(default)]
    pub row: Option<usize>,
    /// Manufacturer
    pub make: Option<String>,
    /// Model name
    pub model: Option<String>,
    /// Model year
    pub year: Option<i32>,
    /// Trim or variant, part of the natural key when present
    pub variant: Option<String>,
    /// Tyre size designation (e.g. "265/65 R17")
    pub tire_size: Option<String>,
    /// Vehicle category (e.g. "pickup", "sedan")
    pub category: Option<String>,
    /// Vehicle type tag (car, motorcycle, electric, hybrid)
    pub vehicle_type: Option<String>,
    /// Front pressure, unladen
    pub empty_front: Option<f64>,
    /// Rear pressure, unladen
    pub empty_rear: Option<f64>,
    /// Front pressure, fully laden
    pub loaded_front: Option<f64>,
    /// Rear pressure, fully laden
    pub loaded_rear: Option<f64>,
    /// Front pressure, maximum
    pub max_front: Option<f64>,
    /// Rear pressure, maximum
    pub max_rear: Option<f64>,
}

/// A validated record ready for generation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Derived identity
    pub key: NaturalKey,
    /// Source row number, when known
    pub row: Option<usize>,
    /// Manufacturer, trimmed
    pub make: String,
    /// Model name, trimmed
    pub model: String,
    /// Model year
    pub year: i32,
    /// Variant, trimmed, None when blank
    pub variant: Option<String>,
    /// Tyre size, trimmed
    pub tire_size: String,
    /// Category, trimmed and lowercased
    pub category: String,
    /// Parsed vehicle type
    pub vehicle_type: VehicleType,
    /// Pressures
    pub pressures: Pressures,
}

/// Pressure set of a normalized record
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pressures {
    /// Front, unladen
    pub empty_front: f64,
    /// Rear, unladen
    pub empty_rear: f64,
    /// Front, laden
    pub loaded_front: Option<f64>,
    /// Rear, laden
    pub loaded_rear: Option<f64>,
    /// Front, maximum
    pub max_front: Option<f64>,
    /// Rear, maximum
    pub max_rear: Option<f64>,
}

/// Validates and normalizes raw vehicle records
#[derive(Clone, Debug)]
pub struct VehicleRecordValidator {
    config: ValidationConfig,
    current_year: i32,
}

impl VehicleRecordValidator {
    /// Create a validator using today's year for the year window
    pub fn new(config: ValidationConfig) -> Self {
        Self::with_current_year(config, chrono::Utc::now().year())
    }

    /// Create a validator with a fixed "current" year
    pub fn with_current_year(config: ValidationConfig, current_year: i32) -> Self {
        Self {
            config,
            current_year,
        }
    }

    /// Latest accepted model year
    pub fn max_year(&self) -> i32 {
        self.current_year + self.config.years_ahead
    }

    /// Validate one record
    pub fn validate(&self, record: &VehicleRecord) -> Result<NormalizedRecord, ValidationError> {
        let result = self.check(record);
        if let Err(e) = &result {
            tracing::debug!(
                row = ?record.row,
                category = %e.category,
                field = ?e.field,
                reason = %e.message,
                "vehicle record rejected"
            );
        }
        result
    }

    fn check(&self, record: &VehicleRecord) -> Result<NormalizedRecord, ValidationError> {
        let make = required_text(&record.make, "make")?;
        let model = required_text(&record.model, "model")?;
        let year = record.year.ok_or_else(|| ValidationError::missing("year"))?;
        let tire_size = required_text(&record.tire_size, "tire_size")?;
        let empty_front = record
            .empty_front
            .ok_or_else(|| ValidationError::missing("empty_front"))?;
        let empty_rear = record
            .empty_rear
            .ok_or_else(|| ValidationError::missing("empty_rear"))?;
        let category = required_text(&record.category, "category")?;
        let raw_type = required_text(&record.vehicle_type, "vehicle_type")?;

        let vehicle_type = VehicleType::parse(&raw_type)
            .ok_or_else(|| ValidationError::invalid_value("vehicle_type", &raw_type))?;

        if year < self.config.min_year || year > self.max_year() {
            return Err(ValidationError::invalid_year(
                year,
                self.config.min_year,
                self.max_year(),
            ));
        }

        let pressures = Pressures {
            empty_front,
            empty_rear,
            loaded_front: record.loaded_front,
            loaded_rear: record.loaded_rear,
            max_front: record.max_front,
            max_rear: record.max_rear,
        };
        self.check_band(&pressures)?;
        check_axles(&pressures)?;

        let variant = record
            .variant
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        Ok(NormalizedRecord {
            key: NaturalKey::derive(&make, &model, year, variant.as_deref()),
            row: record.row,
            make,
            model,
            year,
            variant,
            tire_size,
            category: category.to_lowercase(),
            vehicle_type,
            pressures,
        })
    }

    fn check_band(&self, p: &Pressures) -> Result<(), ValidationError> {
        let (min, max) = (self.config.min_pressure, self.config.max_pressure);
        let fields = [
            ("empty_front", Some(p.empty_front)),
            ("empty_rear", Some(p.empty_rear)),
            ("loaded_front", p.loaded_front),
            ("loaded_rear", p.loaded_rear),
            ("max_front", p.max_front),
            ("max_rear", p.max_rear),
        ];
        for (name, value) in fields {
            if let Some(v) = value
                && !(min..=max).contains(&v)
            {
                return Err(ValidationError::out_of_range(name, v, min, max));
            }
        }
        Ok(())
    }
}

fn required_text(value: &Option<String>, field: &str) -> Result<String, ValidationError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ValidationError::missing(field))
}

// A laden axle needs strictly more pressure than the same axle unladen.
fn check_axles(p: &Pressures) -> Result<(), ValidationError> {
    let axles = [
        ("front", p.empty_front, p.loaded_front),
        ("rear", p.empty_rear, p.loaded_rear),
    ];
    for (axle, empty, loaded) in axles {
        if let Some(loaded) = loaded
            && loaded <= empty
        {
            return Err(ValidationError::inconsistent(axle, loaded, empty));
        }
    }
    Ok(())
}
