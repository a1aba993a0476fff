//! Where each canonical field lives inside the upstream payloads.

use crate::types::field::Field;
use crate::types::forecast_mode::ForecastMode;

pub(crate) const ATTRIBUTION: &str = "Data provided by AEMET. www.aemet.es";

pub(crate) const SUPPORTED_SCHEMA_VERSION: &str = "1.0";

/// Location of one sensor inside a forecast day.
///
/// `group` is a key of the day object, holding either a single object or a
/// list of per-period objects. `key` selects the value inside each of them;
/// `None` means the group itself is the value.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SensorPath {
    pub group: &'static str,
    pub key: Option<&'static str>,
    pub field: Field,
}

const fn path(group: &'static str, key: &'static str, field: Field) -> SensorPath {
    SensorPath {
        group,
        key: Some(key),
        field,
    }
}

const DAILY: &[SensorPath] = &[
    path("probPrecipitacion", "value", Field::PrecipitationProbability),
    path("cotaNieveProv", "value", Field::SnowLevel),
    path("estadoCielo", "value", Field::Condition),
    path("estadoCielo", "descripcion", Field::Description),
    path("viento", "direccion", Field::WindBearing),
    path("viento", "velocidad", Field::WindSpeed),
    path("rachaMax", "value", Field::WindGust),
    path("temperatura", "maxima", Field::TemperatureMax),
    path("temperatura", "minima", Field::TemperatureMin),
    path("sensTermica", "maxima", Field::ThermalSensationMax),
    path("sensTermica", "minima", Field::ThermalSensationMin),
    path("humedadRelativa", "maxima", Field::HumidityMax),
    path("humedadRelativa", "minima", Field::HumidityMin),
    SensorPath {
        group: "uvMax",
        key: None,
        field: Field::UvIndex,
    },
];

const HOURLY: &[SensorPath] = &[
    path("estadoCielo", "value", Field::Condition),
    path("estadoCielo", "descripcion", Field::Description),
    path("temperatura", "value", Field::Temperature),
    path("precipitacion", "value", Field::Precipitation),
    path("nieve", "value", Field::Snow),
    path("sensTermica", "value", Field::ThermalSensation),
    path("humedadRelativa", "value", Field::Humidity),
    path("vientoAndRachaMax", "direccion", Field::WindBearing),
    path("vientoAndRachaMax", "velocidad", Field::WindSpeed),
    path("vientoAndRachaMax", "value", Field::WindGust),
];

pub(crate) fn forecast_schema(mode: ForecastMode) -> &'static [SensorPath] {
    match mode {
        ForecastMode::Daily => DAILY,
        ForecastMode::Hourly => HOURLY,
    }
}

pub(crate) const OBSERVATION_TIMESTAMP: &str = "fint";

pub(crate) const STATION_CODE: &str = "idema";
pub(crate) const STATION_NAME: &str = "ubi";
pub(crate) const STATION_LATITUDE: &str = "lat";
pub(crate) const STATION_LONGITUDE: &str = "lon";
pub(crate) const STATION_ELEVATION: &str = "alt";

/// Sensor keys of a station reading. Anything else is dropped.
pub(crate) const OBSERVATION: &[(&str, Field)] = &[
    ("ta", Field::Temperature),
    ("tamin", Field::TemperatureMin),
    ("tamax", Field::TemperatureMax),
    ("hr", Field::Humidity),
    ("pres", Field::Pressure),
    ("vv", Field::WindSpeed),
    ("dv", Field::WindBearing),
    ("vmax", Field::WindGust),
    ("vis", Field::Visibility),
    ("tpr", Field::DewPoint),
    ("nieve", Field::Snow),
    ("prec", Field::Precipitation),
];
