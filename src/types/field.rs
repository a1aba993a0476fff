//! Canonical sensor names and the values stored under them.
//!
//! Upstream payloads use Spanish, abbreviated and inconsistently shaped keys.
//! Every normalizer maps them onto [`Field`] so that observations and forecasts
//! can be read through the same accessors.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A canonical sensor name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Temperature,
    TemperatureMax,
    TemperatureMin,
    ThermalSensation,
    ThermalSensationMax,
    ThermalSensationMin,
    Humidity,
    HumidityMax,
    HumidityMin,
    Pressure,
    WindSpeed,
    WindBearing,
    WindGust,
    Visibility,
    DewPoint,
    Snow,
    SnowLevel,
    Precipitation,
    PrecipitationProbability,
    Condition,
    Description,
    UvIndex,
}

impl Field {
    /// Fields whose textual values are coerced to numbers.
    ///
    /// Wind bearing is excluded because forecasts report it as compass text.
    pub fn is_numeric(&self) -> bool {
        !matches!(
            self,
            Field::Condition | Field::Description | Field::WindBearing
        )
    }
}

/// A single sensor value, either numeric or textual.
///
/// Forecast payloads deliver most numbers as strings. Values that do not look
/// like numbers (for instance `"Ip"` for unmeasurable precipitation) are kept as
/// text instead of being discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorValue {
    Number(f64),
    Text(String),
}

impl SensorValue {
    /// Converts a raw JSON scalar. Empty strings, nulls and containers are absent.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().map(SensorValue::Number),
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(SensorValue::Text(s.clone())),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SensorValue::Number(n) => Some(*n),
            SensorValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SensorValue::Text(s) => Some(s),
            SensorValue::Number(_) => None,
        }
    }

    /// Best-effort numeric coercion; non-numeric text is returned unchanged.
    pub fn coerced(self) -> Self {
        match self {
            SensorValue::Text(s) => match s.trim().replace(',', ".").parse::<f64>() {
                Ok(n) if n.is_finite() => SensorValue::Number(n),
                _ => SensorValue::Text(s),
            },
            number => number,
        }
    }
}

/// Sensor values of one instant (or one sub-period), keyed by canonical name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Readings(BTreeMap<Field, SensorValue>);

impl Readings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value, replacing whatever was stored under `field` before.
    pub fn insert(&mut self, field: Field, value: SensorValue) {
        self.0.insert(field, value);
    }

    pub fn get(&self, field: Field) -> Option<&SensorValue> {
        self.0.get(&field)
    }

    pub fn number(&self, field: Field) -> Option<f64> {
        self.get(field).and_then(SensorValue::as_f64)
    }

    pub fn text(&self, field: Field) -> Option<&str> {
        self.get(field).and_then(SensorValue::as_text)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Field, &SensorValue)> {
        self.0.iter()
    }

    /// Coerces every numeric field to a number where the text allows it.
    pub fn coerce_numeric(&mut self) {
        let fields: Vec<Field> = self.0.keys().copied().filter(Field::is_numeric).collect();
        for field in fields {
            if let Some(value) = self.0.remove(&field) {
                self.0.insert(field, value.coerced());
            }
        }
    }
}

impl FromIterator<(Field, SensorValue)> for Readings {
    fn from_iter<T: IntoIterator<Item = (Field, SensorValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
