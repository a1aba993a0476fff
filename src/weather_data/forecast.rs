//! Flattening of municipality forecasts.
//!
//! A forecast payload is organised per day, then per sensor group, then per
//! period. Every value is placed into a time slot derived from its `periodo`:
//!
//! * no period: the day itself (local midnight),
//! * a single hour (`"07"` or `"0707"`): that hour of the day,
//! * `"00-24"`: the day itself,
//! * any other window (`"00-12"`, `"1218"`, ...): a sub-period of the day.
//!
//! Daily forecasts keep sub-periods on the record of their day. Hourly
//! forecasts have no use for windows and drop them.

use crate::api::client::{AemetApi, Endpoint};
use crate::api::error::ApiError;
use crate::cache::{CacheKey, JsonCache, Stamped};
use crate::catalog::entry::CatalogEntry;
use crate::types::field::SensorValue;
use crate::types::forecast::{Forecast, ForecastInformation, ForecastRecord};
use crate::types::forecast_mode::ForecastMode;
use crate::utils::parse_date;
use crate::weather_data::schema::{forecast_schema, ATTRIBUTION, SUPPORTED_SCHEMA_VERSION};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, SubsecRound, Utc};
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Instant(NaiveDateTime),
    Window(String),
    Invalid,
}

fn at_hour(date: NaiveDate, hour: u32) -> Option<NaiveDateTime> {
    NaiveTime::from_hms_opt(hour, 0, 0).map(|time| date.and_time(time))
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::default())
}

fn slot(item: &Value, date: NaiveDate) -> Slot {
    let Some(period) = item.get("periodo").and_then(Value::as_str) else {
        return Slot::Instant(midnight(date));
    };
    let period = period.trim();
    let (Some(start), Some(end)) = (
        period.get(..2),
        period.len().checked_sub(2).and_then(|i| period.get(i..)),
    ) else {
        return Slot::Invalid;
    };

    if start == end {
        match start.parse::<u32>().ok().and_then(|hour| at_hour(date, hour)) {
            Some(timestamp) => Slot::Instant(timestamp),
            None => Slot::Invalid,
        }
    } else if start == "00" && end == "24" {
        Slot::Instant(midnight(date))
    } else {
        Slot::Window(format!("{start}-{end}"))
    }
}

/// Lists hold one value per entry; only the first one is used.
fn first_scalar(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.first(),
        other => Some(other),
    }
}

fn schema_version(root: &Map<String, Value>) -> String {
    match root.get("version") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(|v| format!("{v:?}"))
            .unwrap_or_else(|| n.to_string()),
        _ => String::new(),
    }
}

fn header_text(root: &Map<String, Value>, key: &str) -> Option<String> {
    root.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Flattens a forecast payload into records sorted by timestamp.
///
/// Returns `None` for payloads that are not a forecast or that declare a
/// schema version other than `1.0`.
pub fn normalize_forecast(raw: &Value, mode: ForecastMode) -> Option<Forecast> {
    let root = match raw {
        Value::Array(items) => items.first(),
        other => Some(other),
    }
    .and_then(Value::as_object);
    let Some(root) = root else {
        info!("The {} forecast payload is not a forecast", mode);
        return None;
    };

    let version = schema_version(root);
    if version != SUPPORTED_SCHEMA_VERSION {
        info!("Version {:?} of the forecast schema is not supported", version);
        return None;
    }

    let information = ForecastInformation {
        city: header_text(root, "nombre"),
        province: header_text(root, "provincia"),
        processing_date: header_text(root, "elaborado"),
        attribution: ATTRIBUTION.to_string(),
        schema_version: version,
        copyright: root.get("origen").cloned().unwrap_or(Value::Null),
    };

    let days = root
        .get("prediccion")
        .and_then(|p| p.get("dia"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut records: BTreeMap<NaiveDateTime, ForecastRecord> = BTreeMap::new();
    let mut dropped_windows = 0usize;

    for day in days {
        let Some(date) = day.get("fecha").and_then(Value::as_str).and_then(parse_date) else {
            debug!("Skipping forecast day without a valid date");
            continue;
        };

        for path in forecast_schema(mode) {
            let Some(group) = day.get(path.group) else {
                continue;
            };
            let items = match group {
                Value::Array(items) => items.as_slice(),
                single => std::slice::from_ref(single),
            };

            for item in items {
                let raw_value = match path.key {
                    Some(key) => item.get(key),
                    None => Some(item),
                };
                let Some(value) = raw_value
                    .and_then(first_scalar)
                    .and_then(SensorValue::from_json)
                else {
                    continue;
                };

                match slot(item, date) {
                    Slot::Instant(timestamp) => {
                        records
                            .entry(timestamp)
                            .or_insert_with(|| ForecastRecord::new(timestamp))
                            .readings
                            .insert(path.field, value);
                    }
                    Slot::Window(label) if mode == ForecastMode::Daily => {
                        let timestamp = midnight(date);
                        records
                            .entry(timestamp)
                            .or_insert_with(|| ForecastRecord::new(timestamp))
                            .periods
                            .entry(label)
                            .or_default()
                            .insert(path.field, value);
                    }
                    Slot::Window(_) => dropped_windows += 1,
                    Slot::Invalid => {
                        debug!("Ignoring {} value with an invalid period", path.group);
                    }
                }
            }
        }
    }

    if dropped_windows > 0 {
        debug!("Dropped {} windowed values from the {} forecast", dropped_windows, mode);
    }

    let data = records
        .into_values()
        .map(|mut record| {
            record.readings.coerce_numeric();
            for readings in record.periods.values_mut() {
                readings.coerce_numeric();
            }
            record
        })
        .collect();

    Some(Forecast { information, data })
}

/// Hourly or daily forecast for the nearest municipality.
#[derive(Debug)]
pub struct ForecastUpdater {
    mode: ForecastMode,
    api: Arc<AemetApi>,
    cache: JsonCache,
    municipality: Option<CatalogEntry>,
    data: Option<Forecast>,
}

impl ForecastUpdater {
    pub fn new(mode: ForecastMode, api: Arc<AemetApi>, cache: JsonCache) -> Self {
        Self {
            mode,
            api,
            cache,
            municipality: None,
            data: None,
        }
    }

    pub fn mode(&self) -> ForecastMode {
        self.mode
    }

    pub fn set_municipality(&mut self, municipality: Option<CatalogEntry>) {
        self.municipality = municipality;
    }

    pub fn municipality(&self) -> Option<&CatalogEntry> {
        self.municipality.as_ref()
    }

    pub fn data(&self) -> Option<&Forecast> {
        self.data.as_ref()
    }

    fn cache_key(&self) -> CacheKey {
        match self.mode {
            ForecastMode::Hourly => CacheKey::Hourly,
            ForecastMode::Daily => CacheKey::Daily,
        }
    }

    /// Fetches the forecast of the current municipality.
    ///
    /// Without a municipality the data is cleared. API errors clear the data
    /// too and are returned to the caller.
    pub async fn update(&mut self) -> Result<(), ApiError> {
        let Some(municipality) = &self.municipality else {
            info!("No municipality within range, skipping {} forecast", self.mode);
            self.data = None;
            return Ok(());
        };
        debug!(
            "Updating {} forecast for {} ({})",
            self.mode, municipality.name, municipality.code
        );

        let endpoint = Endpoint::Forecast(self.mode, municipality.code.clone());
        let data = match self.api.call(&endpoint).await {
            Ok(Some(raw)) => normalize_forecast(&raw, self.mode),
            Ok(None) => {
                info!("No {} forecast received", self.mode);
                None
            }
            Err(e) => {
                self.data = None;
                return Err(e);
            }
        };
        self.data = data;

        let stamped = Stamped {
            data: &self.data,
            saved_at: Utc::now().trunc_subsecs(0),
        };
        if let Err(e) = self.cache.write(self.cache_key(), &stamped).await {
            warn!("Could not store {} forecast: {}", self.mode, e);
        }
        Ok(())
    }
}
