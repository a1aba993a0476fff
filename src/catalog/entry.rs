//! Reference catalogs of weather stations and municipalities.
//!
//! Both upstream catalogs use different field names for the same concepts.
//! [`Catalog::clean`] re-keys them into [`CatalogEntry`] records and stamps
//! the result with a save timestamp. A stamped catalog is never cleaned twice.

use crate::api::client::Endpoint;
use crate::cache::CacheKey;
use crate::catalog::error::CatalogError;
use crate::types::location::LatLon;
use crate::utils::coerce_f64;
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

const MAX_AGE_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    Stations,
    Municipalities,
}

impl CatalogKind {
    /// Beyond this distance the nearest entry is assumed to be outside the
    /// covered territory.
    ///
    /// Stations are sparser than municipalities, so valid locations can be
    /// further than 25 km from the nearest one.
    pub fn max_distance_km(&self) -> f64 {
        match self {
            CatalogKind::Stations => 40.0,
            CatalogKind::Municipalities => 25.0,
        }
    }

    pub fn cache_key(&self) -> CacheKey {
        match self {
            CatalogKind::Stations => CacheKey::Stations,
            CatalogKind::Municipalities => CacheKey::Municipalities,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        match self {
            CatalogKind::Stations => Endpoint::StationCatalog,
            CatalogKind::Municipalities => Endpoint::MunicipalityCatalog,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Stations => "stations",
            CatalogKind::Municipalities => "municipalities",
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A weather station or a municipality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Canonical code, without any upstream prefix.
    pub code: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
}

impl CatalogEntry {
    pub fn lat_lon(&self) -> LatLon {
        LatLon(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy)]
enum RawField {
    Code,
    Name,
    Latitude,
    Longitude,
    Elevation,
}

/// Upstream names of both catalogs mapped onto entry fields.
const FIELD_MAP: &[(&str, RawField)] = &[
    ("idema", RawField::Code),
    ("ubi", RawField::Name),
    ("lat", RawField::Latitude),
    ("lon", RawField::Longitude),
    ("alt", RawField::Elevation),
    ("id", RawField::Code),
    ("nombre", RawField::Name),
    ("latitud_dec", RawField::Latitude),
    ("longitud_dec", RawField::Longitude),
    ("altitud", RawField::Elevation),
];

const CODE_PREFIX: &str = "id";

/// Trimmed code without the `id` prefix, as stored in a cleaned catalog.
pub fn canonical_code(code: &str) -> Option<String> {
    let code = code.trim();
    let code = code.strip_prefix(CODE_PREFIX).unwrap_or(code).trim();
    (!code.is_empty()).then(|| code.to_string())
}

fn raw_code(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => canonical_code(s),
        Value::Number(n) => canonical_code(&n.to_string()),
        _ => None,
    }
}

fn clean_entry(raw: &Value) -> Option<CatalogEntry> {
    let object = raw.as_object()?;
    let mut code = None;
    let mut name = None;
    let mut latitude = None;
    let mut longitude = None;
    let mut elevation = None;

    for (key, value) in object {
        let Some((_, field)) = FIELD_MAP.iter().find(|(raw_name, _)| *raw_name == key.as_str()) else {
            continue;
        };
        match field {
            RawField::Code => code = raw_code(value),
            RawField::Name => name = value.as_str().map(|s| s.trim().to_string()),
            RawField::Latitude => latitude = coerce_f64(value),
            RawField::Longitude => longitude = coerce_f64(value),
            RawField::Elevation => elevation = coerce_f64(value),
        }
    }

    let entry = CatalogEntry {
        code: code?,
        name: name.unwrap_or_default(),
        latitude: latitude?,
        longitude: longitude?,
        elevation,
    };
    entry.lat_lon().is_valid().then_some(entry)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub kind: CatalogKind,
    #[serde(rename = "saved")]
    pub saved_at: DateTime<Utc>,
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn from_entries(kind: CatalogKind, entries: Vec<CatalogEntry>) -> Self {
        Self {
            kind,
            saved_at: Utc::now().trunc_subsecs(0),
            entries,
        }
    }

    /// Turns an upstream payload into a catalog.
    ///
    /// Entries without a code or usable coordinates are skipped. Repeated
    /// codes keep their first occurrence, since the station endpoint returns
    /// one item per reading rather than one per station.
    pub fn clean(kind: CatalogKind, raw: Value) -> Result<Self, CatalogError> {
        if raw.get("saved").is_some() {
            debug!("Catalog of {} is already clean", kind);
            return Ok(serde_json::from_value(raw)?);
        }
        match raw {
            Value::Array(items) => {
                let mut seen = HashSet::new();
                let mut entries = Vec::with_capacity(items.len());
                let mut skipped = 0usize;
                for item in &items {
                    match clean_entry(item) {
                        Some(entry) => {
                            if seen.insert(entry.code.clone()) {
                                entries.push(entry);
                            }
                        }
                        None => skipped += 1,
                    }
                }
                if skipped > 0 {
                    warn!(
                        "Skipped {} {} entries without code or coordinates",
                        skipped, kind
                    );
                }
                debug!("Cleaned {} {} entries", entries.len(), kind);
                Ok(Self::from_entries(kind, entries))
            }
            _ => Err(CatalogError::UnexpectedShape(kind)),
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.saved_at > TimeDelta::days(MAX_AGE_DAYS)
    }

    pub fn find(&self, code: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.code == code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_municipalities() -> Value {
        json!([
            {
                "id": "id28079",
                "nombre": "Madrid",
                "latitud_dec": "40.4168",
                "longitud_dec": "-3.7038",
                "altitud": "657",
                "capital": "Madrid"
            },
            {
                "id": "id08019",
                "nombre": "Barcelona",
                "latitud_dec": "41.3874",
                "longitud_dec": "2.1686",
                "altitud": "12"
            }
        ])
    }

    #[test]
    fn municipality_code_prefix_is_stripped() -> Result<(), CatalogError> {
        let catalog = Catalog::clean(CatalogKind::Municipalities, raw_municipalities())?;
        let madrid = catalog.find("28079");

        assert_eq!(
            madrid,
            Some(&CatalogEntry {
                code: "28079".into(),
                name: "Madrid".into(),
                latitude: 40.4168,
                longitude: -3.7038,
                elevation: Some(657.0),
            })
        );
        assert_eq!(catalog.find("id28079"), None);
        Ok(())
    }

    #[test]
    fn canonical_codes() {
        assert_eq!(canonical_code("id28079"), Some("28079".to_string()));
        assert_eq!(canonical_code(" 28079 "), Some("28079".to_string()));
        assert_eq!(canonical_code("C449C"), Some("C449C".to_string()));
        assert_eq!(canonical_code("id"), None);
        assert_eq!(canonical_code("  "), None);
    }

    #[test]
    fn cleaning_is_idempotent() -> Result<(), CatalogError> {
        let once = Catalog::clean(CatalogKind::Municipalities, raw_municipalities())?;
        let stored = serde_json::to_value(&once)?;
        let twice = Catalog::clean(CatalogKind::Municipalities, stored)?;

        assert_eq!(once, twice);
        Ok(())
    }

    #[test]
    fn station_readings_are_deduplicated() -> Result<(), CatalogError> {
        let raw = json!([
            {"idema": "3195", "ubi": "MADRID RETIRO", "lat": 40.4117, "lon": -3.6781, "alt": 667.0, "ta": 20.1},
            {"idema": "3195", "ubi": "MADRID RETIRO", "lat": 40.4117, "lon": -3.6781, "alt": 667.0, "ta": 21.3},
            {"idema": "0076", "ubi": "BARCELONA AEROPUERTO", "lat": 41.2928, "lon": 2.0697, "alt": 4.0},
            {"ubi": "NO CODE", "lat": 40.0, "lon": -3.0},
            {"idema": "9999", "ubi": "NO COORDS"}
        ]);
        let catalog = Catalog::clean(CatalogKind::Stations, raw)?;

        let codes: Vec<&str> = catalog.entries.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["3195", "0076"]);
        Ok(())
    }

    #[test]
    fn non_array_payload_is_rejected() {
        let result = Catalog::clean(CatalogKind::Stations, json!("unexpected"));
        assert!(matches!(
            result,
            Err(CatalogError::UnexpectedShape(CatalogKind::Stations))
        ));
    }

    #[test]
    fn staleness_after_a_week() -> Result<(), CatalogError> {
        let mut catalog = Catalog::clean(CatalogKind::Municipalities, raw_municipalities())?;
        let now = Utc::now();
        assert!(!catalog.is_stale(now));

        catalog.saved_at = now - TimeDelta::days(8);
        assert!(catalog.is_stale(now));
        Ok(())
    }
}
