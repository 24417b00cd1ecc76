use entity::employees;
use serde::Serialize;

use crate::error::ValidationError;

/// A persisted employee as shown in the ledger.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EmployeeRecord {
    pub id: i32,
    pub name: String,
    pub hours_worked: i32,
    pub hourly_rate: f64,
}

impl From<employees::Model> for EmployeeRecord {
    fn from(model: employees::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            hours_worked: model.hours,
            hourly_rate: model.rate,
        }
    }
}

/// Validated form input for a record that has no id yet.
#[derive(Clone, Debug, PartialEq)]
pub struct NewEmployee {
    pub name: String,
    pub hours_worked: i32,
    pub hourly_rate: f64,
}

impl NewEmployee {
    /// Parses the three raw form fields. Surrounding whitespace is ignored.
    pub fn parse(name: &str, hours: &str, rate: &str) -> Result<Self, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        // One record per report line.
        if name.chars().any(char::is_control) {
            return Err(ValidationError::ControlCharacterInName);
        }
        let hours_worked = parse_hours(hours)?;
        let hourly_rate = parse_rate(rate)?;
        if !(f64::from(hours_worked) * hourly_rate).is_finite() {
            return Err(ValidationError::PayOverflow);
        }
        Ok(Self {
            name: name.to_string(),
            hours_worked,
            hourly_rate,
        })
    }
}

fn parse_hours(raw: &str) -> Result<i32, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::MissingHours);
    }
    let hours: i64 = raw
        .parse()
        .map_err(|_| ValidationError::InvalidHours(raw.to_string()))?;
    if hours < 0 {
        return Err(ValidationError::NegativeHours);
    }
    i32::try_from(hours).map_err(|_| ValidationError::InvalidHours(raw.to_string()))
}

fn parse_rate(raw: &str) -> Result<f64, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::MissingRate);
    }
    let rate: f64 = raw
        .parse()
        .map_err(|_| ValidationError::InvalidRate(raw.to_string()))?;
    if !rate.is_finite() || rate < 0.0 {
        return Err(ValidationError::NegativeRate);
    }
    Ok(rate)
}
