mod aemet;
mod api;
mod cache;
mod catalog;
mod config;
mod error;
mod throttle;
mod types;
mod utils;
mod view;
mod weather_data;

#[cfg(test)]
mod test_support;

pub use aemet::Aemet;
pub use error::AemetError;

pub use api::client::{AemetApi, Endpoint, DEFAULT_BASE_URL};
pub use api::error::ApiError;
pub use api::gateway::{Gateway, HttpGateway};

pub use cache::{CacheError, CacheKey, JsonCache, Stamped};

pub use catalog::entry::{Catalog, CatalogEntry, CatalogKind};
pub use catalog::error::CatalogError;
pub use catalog::geodesic::{geodesic_km, vincenty_km};
pub use catalog::nearest::{nearest_linear, NearestStrategy, SpatialIndex};
pub use catalog::resolver::CatalogResolver;

pub use config::{Config, ConfigError, API_KEY_ENV};
pub use throttle::{Throttle, Throttled};

pub use types::condition::{compass_to_degrees, Condition};
pub use types::field::{Field, Readings, SensorValue};
pub use types::forecast::{Forecast, ForecastInformation, ForecastRecord};
pub use types::forecast_mode::ForecastMode;
pub use types::location::{LatLon, Location};
pub use types::observation::{Observation, ObservationRecord, StationInfo};
pub use types::snapshot::WeatherSnapshot;

pub use view::{ForecastEntry, WeatherView};
pub use weather_data::forecast::{normalize_forecast, ForecastUpdater};
pub use weather_data::observation::{normalize_observation, CurrentConditions};
