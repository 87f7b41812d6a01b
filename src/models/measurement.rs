//! Body measurement types
//!
//! Weight, height and body fat are recorded as timestamped scalar values.
//! [`SimpleMeasurements`] holds only the newest value of each kind;
//! [`Measurements`] holds the full history, newest first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which body measurement a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MeasurementKind {
    Weight,
    Height,
    BodyFat,
}

impl MeasurementKind {
    pub const ALL: [MeasurementKind; 3] = [Self::Weight, Self::Height, Self::BodyFat];

    /// Path and wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weight => "weight",
            Self::Height => "height",
            Self::BodyFat => "bodyFat",
        }
    }

    /// Check a value against the accepted range for this kind
    pub fn validate(&self, value: f64) -> Result<(), String> {
        if !value.is_finite() {
            return Err(format!("{} must be a finite number", self.as_str()));
        }
        match self {
            Self::Weight if value <= 0.0 => Err("Valid weight value is required".to_string()),
            Self::Height if value <= 0.0 => Err("Valid height value is required".to_string()),
            Self::BodyFat if !(0.0..=100.0).contains(&value) => {
                Err("Body fat must be between 0 and 100".to_string())
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasurementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weight" => Ok(Self::Weight),
            "height" => Ok(Self::Height),
            "bodyFat" | "body_fat" | "bodyfat" => Ok(Self::BodyFat),
            other => Err(format!("Invalid measurement type: {}", other)),
        }
    }
}

/// One recorded measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementEntry {
    pub id: i64,
    pub kind: MeasurementKind,
    pub value: f64,
    pub date: DateTime<Utc>,
}

/// Value and date of the latest measurement of a kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementValue {
    pub value: f64,
    pub date: DateTime<Utc>,
}

impl From<&MeasurementEntry> for MeasurementValue {
    fn from(entry: &MeasurementEntry) -> Self {
        Self {
            value: entry.value,
            date: entry.date,
        }
    }
}

/// Latest-value projection of a user's measurements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleMeasurements {
    pub weight: Option<MeasurementValue>,
    pub height: Option<MeasurementValue>,
    pub body_fat: Option<MeasurementValue>,
}

/// Full measurement history, newest first per kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurements {
    pub weight: Vec<MeasurementEntry>,
    pub height: Vec<MeasurementEntry>,
    pub body_fat: Vec<MeasurementEntry>,
}

impl Measurements {
    pub fn of_kind(&self, kind: MeasurementKind) -> &[MeasurementEntry] {
        match kind {
            MeasurementKind::Weight => &self.weight,
            MeasurementKind::Height => &self.height,
            MeasurementKind::BodyFat => &self.body_fat,
        }
    }

    /// Project the newest entry of each kind
    pub fn latest(&self) -> SimpleMeasurements {
        SimpleMeasurements {
            weight: self.weight.first().map(MeasurementValue::from),
            height: self.height.first().map(MeasurementValue::from),
            body_fat: self.body_fat.first().map(MeasurementValue::from),
        }
    }
}

/// Body of `POST /profile/measurements/:kind`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMeasurement {
    pub value: f64,
    /// Defaults to now
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_and_display() {
        assert_eq!("bodyFat".parse::<MeasurementKind>().unwrap(), MeasurementKind::BodyFat);
        assert_eq!(MeasurementKind::Weight.to_string(), "weight");
        assert!("bmi".parse::<MeasurementKind>().is_err());
    }

    #[test]
    fn test_kind_validation() {
        assert!(MeasurementKind::Weight.validate(80.0).is_ok());
        assert!(MeasurementKind::Weight.validate(0.0).is_err());
        assert!(MeasurementKind::Height.validate(-1.0).is_err());
        assert!(MeasurementKind::BodyFat.validate(0.0).is_ok());
        assert!(MeasurementKind::BodyFat.validate(100.5).is_err());
        assert!(MeasurementKind::BodyFat.validate(f64::NAN).is_err());
    }

    #[test]
    fn test_simple_measurements_camel_case() {
        let json = serde_json::to_string(&SimpleMeasurements::default()).unwrap();
        assert_eq!(json, r#"{"weight":null,"height":null,"bodyFat":null}"#);
    }
}
