use crate::types::field::{Field, Readings};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Metadata of the station an observation was taken at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationInfo {
    pub name: Option<String>,
    pub code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
    pub attribution: String,
}

/// The most recent reading of a station, under canonical field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    /// End of the observation period (UTC).
    pub timestamp: NaiveDateTime,
    pub readings: Readings,
}

impl ObservationRecord {
    pub fn temperature(&self) -> Option<f64> {
        self.readings.number(Field::Temperature)
    }

    pub fn humidity(&self) -> Option<f64> {
        self.readings.number(Field::Humidity)
    }

    pub fn pressure(&self) -> Option<f64> {
        self.readings.number(Field::Pressure)
    }

    pub fn wind_speed(&self) -> Option<f64> {
        self.readings.number(Field::WindSpeed)
    }

    pub fn wind_bearing(&self) -> Option<f64> {
        self.readings.number(Field::WindBearing)
    }

    pub fn visibility(&self) -> Option<f64> {
        self.readings.number(Field::Visibility)
    }

    pub fn dew_point(&self) -> Option<f64> {
        self.readings.number(Field::DewPoint)
    }

    pub fn snow(&self) -> Option<f64> {
        self.readings.number(Field::Snow)
    }

    pub fn precipitation(&self) -> Option<f64> {
        self.readings.number(Field::Precipitation)
    }

    pub fn condition_code(&self) -> Option<&str> {
        self.readings.text(Field::Condition)
    }
}

/// Current conditions split into station metadata and sensor data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub information: StationInfo,
    pub data: ObservationRecord,
}
