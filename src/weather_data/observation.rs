use crate::api::client::{AemetApi, Endpoint};
use crate::api::error::ApiError;
use crate::cache::{CacheKey, JsonCache, Stamped};
use crate::catalog::entry::CatalogEntry;
use crate::types::field::{Readings, SensorValue};
use crate::types::observation::{Observation, ObservationRecord, StationInfo};
use crate::utils::{coerce_f64, parse_timestamp};
use crate::weather_data::schema::{
    ATTRIBUTION, OBSERVATION, OBSERVATION_TIMESTAMP, STATION_CODE, STATION_ELEVATION,
    STATION_LATITUDE, STATION_LONGITUDE, STATION_NAME,
};
use chrono::{SubsecRound, Utc};
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::sync::Arc;

fn text(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Picks the most recent reading of a station and maps it onto canonical fields.
///
/// Readings without a parseable `fint` are ignored. Returns `None` when no
/// usable reading is left.
pub fn normalize_observation(raw: &Value) -> Option<Observation> {
    let Some(readings) = raw.as_array() else {
        info!("Observation payload is not a list of readings");
        return None;
    };

    let latest = readings
        .iter()
        .filter_map(|reading| {
            let object = reading.as_object()?;
            let timestamp = object
                .get(OBSERVATION_TIMESTAMP)?
                .as_str()
                .and_then(parse_timestamp)?;
            Some((timestamp, object))
        })
        .max_by_key(|(timestamp, _)| *timestamp);

    let Some((timestamp, object)) = latest else {
        info!("No fresh readings received from the weather station");
        return None;
    };

    let information = StationInfo {
        name: text(object, STATION_NAME),
        code: text(object, STATION_CODE),
        latitude: object.get(STATION_LATITUDE).and_then(coerce_f64),
        longitude: object.get(STATION_LONGITUDE).and_then(coerce_f64),
        elevation: object.get(STATION_ELEVATION).and_then(coerce_f64),
        attribution: ATTRIBUTION.to_string(),
    };

    let mut sensors: Readings = OBSERVATION
        .iter()
        .filter_map(|(key, field)| {
            let value = SensorValue::from_json(object.get(*key)?)?;
            Some((*field, value))
        })
        .collect();
    sensors.coerce_numeric();

    Some(Observation {
        information,
        data: ObservationRecord {
            timestamp,
            readings: sensors,
        },
    })
}

/// Current conditions at the nearest weather station.
#[derive(Debug)]
pub struct CurrentConditions {
    api: Arc<AemetApi>,
    cache: JsonCache,
    station: Option<CatalogEntry>,
    data: Option<Observation>,
}

impl CurrentConditions {
    pub fn new(api: Arc<AemetApi>, cache: JsonCache) -> Self {
        Self {
            api,
            cache,
            station: None,
            data: None,
        }
    }

    pub fn set_station(&mut self, station: Option<CatalogEntry>) {
        self.station = station;
    }

    pub fn station(&self) -> Option<&CatalogEntry> {
        self.station.as_ref()
    }

    pub fn data(&self) -> Option<&Observation> {
        self.data.as_ref()
    }

    /// Fetches the latest reading of the current station.
    ///
    /// Without a station the data is cleared. API errors clear the data too
    /// and are returned to the caller.
    pub async fn update(&mut self) -> Result<(), ApiError> {
        let Some(station) = &self.station else {
            info!("No weather station within range, skipping current conditions");
            self.data = None;
            return Ok(());
        };
        debug!("Updating current conditions from station {}", station.code);

        let endpoint = Endpoint::Observation(station.code.clone());
        let data = match self.api.call(&endpoint).await {
            Ok(Some(raw)) => normalize_observation(&raw),
            Ok(None) => {
                info!("No meteorological data received");
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
        if let Err(e) = self.cache.write(CacheKey::Currently, &stamped).await {
            warn!("Could not store current conditions: {}", e);
        }
        Ok(())
    }
}
