use crate::types::field::{Field, Readings, SensorValue};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Header of a normalized forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastInformation {
    pub city: Option<String>,
    pub province: Option<String>,
    pub processing_date: Option<String>,
    pub attribution: String,
    pub schema_version: String,
    /// The upstream `origen` block (producer, web, legal notice) as received.
    pub copyright: Value,
}

/// One forecast instant.
///
/// Daily records are keyed at local midnight and may carry sub-period
/// overrides under labels such as `"00-12"` or `"12-18"`. Hourly records never
/// carry sub-periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub timestamp: NaiveDateTime,
    pub readings: Readings,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub periods: BTreeMap<String, Readings>,
}

impl ForecastRecord {
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            readings: Readings::new(),
            periods: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: Field) -> Option<&SensorValue> {
        self.readings.get(field)
    }

    /// Value of `field` inside the sub-period labelled `label`, if any.
    pub fn period_value(&self, label: &str, field: Field) -> Option<&SensorValue> {
        self.periods.get(label).and_then(|p| p.get(field))
    }

    pub fn temperature(&self) -> Option<f64> {
        self.readings.number(Field::Temperature)
    }

    pub fn temperature_max(&self) -> Option<f64> {
        self.readings.number(Field::TemperatureMax)
    }

    pub fn temperature_min(&self) -> Option<f64> {
        self.readings.number(Field::TemperatureMin)
    }

    pub fn humidity(&self) -> Option<f64> {
        self.readings.number(Field::Humidity)
    }

    pub fn humidity_max(&self) -> Option<f64> {
        self.readings.number(Field::HumidityMax)
    }

    pub fn humidity_min(&self) -> Option<f64> {
        self.readings.number(Field::HumidityMin)
    }

    pub fn uv_index(&self) -> Option<f64> {
        self.readings.number(Field::UvIndex)
    }

    pub fn condition_code(&self) -> Option<&str> {
        self.readings.text(Field::Condition)
    }
}

/// A normalized municipality forecast, sorted ascending by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub information: ForecastInformation,
    pub data: Vec<ForecastRecord>,
}
