//! Read-only accessors over a [`WeatherSnapshot`] for display purposes.

use crate::types::condition::{compass_to_degrees, Condition};
use crate::types::field::{Field, SensorValue};
use crate::types::forecast::{Forecast, ForecastRecord};
use crate::types::forecast_mode::ForecastMode;
use crate::types::observation::ObservationRecord;
use crate::types::snapshot::WeatherSnapshot;
use crate::weather_data::schema::ATTRIBUTION;
use chrono::{NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// One entry of [`WeatherView::forecast`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub timestamp: NaiveDateTime,
    pub condition: Option<Condition>,
    /// Upstream sky-state text, useful when the code is not recognised.
    pub description: Option<String>,
    pub temperature: Option<f64>,
    pub temperature_low: Option<f64>,
    pub precipitation: Option<f64>,
    pub precipitation_probability: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_bearing: Option<f64>,
}

fn bearing(value: &SensorValue) -> Option<f64> {
    match value {
        SensorValue::Number(degrees) => Some(*degrees),
        SensorValue::Text(direction) => compass_to_degrees(direction),
    }
}

fn truncate_to_hour(now: NaiveDateTime) -> NaiveDateTime {
    now.date().and_hms_opt(now.hour(), 0, 0).unwrap_or(now)
}

/// Labels of the 6 and 12 hour sub-periods containing `hour`, narrowest first.
fn period_labels(hour: u32) -> [String; 2] {
    let six = hour / 6 * 6;
    let twelve = hour / 12 * 12;
    [
        format!("{:02}-{:02}", six, six + 6),
        format!("{:02}-{:02}", twelve, twelve + 12),
    ]
}

/// Snapshot as seen at a fixed local time.
///
/// Current values come from the station observation when it reports them and
/// from the hourly forecast record of the current hour otherwise.
#[derive(Debug, Clone, Copy)]
pub struct WeatherView<'a> {
    snapshot: &'a WeatherSnapshot,
    mode: ForecastMode,
    now: NaiveDateTime,
}

impl<'a> WeatherView<'a> {
    pub fn new(snapshot: &'a WeatherSnapshot, mode: ForecastMode, now: NaiveDateTime) -> Self {
        Self {
            snapshot,
            mode,
            now,
        }
    }

    pub fn snapshot(&self) -> &'a WeatherSnapshot {
        self.snapshot
    }

    fn observation(&self) -> Option<&'a ObservationRecord> {
        self.snapshot.currently.as_ref().map(|o| &o.data)
    }

    fn selected_forecast(&self) -> Option<&'a Forecast> {
        match self.mode {
            ForecastMode::Hourly => self.snapshot.hourly.as_ref(),
            ForecastMode::Daily => self.snapshot.daily.as_ref(),
        }
    }

    /// The hourly record for the current hour.
    pub fn current_forecast(&self) -> Option<&'a ForecastRecord> {
        let hour = truncate_to_hour(self.now);
        self.snapshot
            .hourly
            .as_ref()?
            .data
            .iter()
            .find(|record| record.timestamp == hour)
    }

    fn current_number(&self, field: Field) -> Option<f64> {
        self.observation()
            .and_then(|o| o.readings.number(field))
            .or_else(|| self.current_forecast()?.readings.number(field))
    }

    pub fn temperature(&self) -> Option<f64> {
        self.current_number(Field::Temperature)
    }

    pub fn humidity(&self) -> Option<f64> {
        self.current_number(Field::Humidity)
    }

    pub fn pressure(&self) -> Option<f64> {
        self.current_number(Field::Pressure)
    }

    pub fn wind_speed(&self) -> Option<f64> {
        self.current_number(Field::WindSpeed)
    }

    pub fn visibility(&self) -> Option<f64> {
        self.current_number(Field::Visibility)
    }

    pub fn dew_point(&self) -> Option<f64> {
        self.current_number(Field::DewPoint)
    }

    /// Degrees clockwise from north. Calm wind has no bearing.
    pub fn wind_bearing(&self) -> Option<f64> {
        self.observation()
            .and_then(|o| o.readings.get(Field::WindBearing))
            .and_then(bearing)
            .or_else(|| {
                self.current_forecast()?
                    .get(Field::WindBearing)
                    .and_then(bearing)
            })
    }

    pub fn condition_code(&self) -> Option<&'a str> {
        self.observation()
            .and_then(ObservationRecord::condition_code)
            .or_else(|| self.current_forecast()?.condition_code())
    }

    pub fn condition(&self) -> Option<Condition> {
        self.condition_code().and_then(Condition::from_code)
    }

    pub fn attribution(&self) -> &'a str {
        if let Some(observation) = &self.snapshot.currently {
            return &observation.information.attribution;
        }
        self.selected_forecast()
            .or(self.snapshot.daily.as_ref())
            .or(self.snapshot.hourly.as_ref())
            .map(|f| f.information.attribution.as_str())
            .unwrap_or(ATTRIBUTION)
    }

    /// Value of `field` for `record`, preferring the sub-period of today that
    /// contains the current hour.
    fn period_aware(&self, record: &'a ForecastRecord, field: Field) -> Option<&'a SensorValue> {
        if self.mode == ForecastMode::Daily && record.timestamp.date() == self.now.date() {
            let from_period = period_labels(self.now.hour())
                .iter()
                .find_map(|label| record.period_value(label, field));
            if from_period.is_some() {
                return from_period;
            }
        }
        record.get(field)
    }

    fn entry(&self, record: &'a ForecastRecord) -> ForecastEntry {
        let readings = &record.readings;
        let condition_text = self
            .period_aware(record, Field::Condition)
            .and_then(SensorValue::as_text);
        let description = self
            .period_aware(record, Field::Description)
            .and_then(SensorValue::as_text)
            .map(str::to_string);

        ForecastEntry {
            timestamp: record.timestamp,
            condition: condition_text.and_then(Condition::from_code),
            description,
            temperature: record.temperature().or_else(|| record.temperature_max()),
            temperature_low: record.temperature_min(),
            precipitation: readings.number(Field::Precipitation),
            precipitation_probability: self
                .period_aware(record, Field::PrecipitationProbability)
                .and_then(SensorValue::as_f64),
            wind_speed: self
                .period_aware(record, Field::WindSpeed)
                .and_then(SensorValue::as_f64),
            wind_bearing: self
                .period_aware(record, Field::WindBearing)
                .and_then(bearing),
        }
    }

    /// Upcoming entries of the selected forecast mode.
    ///
    /// Daily entries start today, hourly entries start at the current hour.
    pub fn forecast(&self) -> Vec<ForecastEntry> {
        let Some(forecast) = self.selected_forecast() else {
            return Vec::new();
        };
        let start = match self.mode {
            ForecastMode::Daily => self.now.date().and_time(NaiveTime::default()),
            ForecastMode::Hourly => truncate_to_hour(self.now),
        };
        forecast
            .data
            .iter()
            .filter(|record| record.timestamp >= start)
            .map(|record| self.entry(record))
            .collect()
    }
}
