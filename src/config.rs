//! TOML configuration for an [`Aemet`](crate::Aemet) instance.

use crate::catalog::nearest::NearestStrategy;
use crate::throttle::DEFAULT_UPDATE_INTERVAL;
use crate::types::forecast_mode::ForecastMode;
use crate::types::location::Location;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const API_KEY_ENV: &str = "AEMET_API_KEY";
pub const DEFAULT_NAME: &str = "AEMET";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("No API key configured (set `api_key` or AEMET_API_KEY)")]
    MissingApiKey,

    #[error("Latitude {0} is outside [-90, 90]")]
    InvalidLatitude(f64),

    #[error("Longitude {0} is outside [-180, 180]")]
    InvalidLongitude(f64),
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_update_interval_secs() -> u64 {
    DEFAULT_UPDATE_INTERVAL.as_secs()
}

/// Example:
///
/// ```toml
/// api_key = "eyJhbGciOi..."
/// latitude = 40.4168
/// longitude = -3.7038
/// elevation = 667.0
/// mode = "hourly"
/// city = "id28079"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api_key: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub elevation: f64,
    #[serde(default)]
    pub mode: ForecastMode,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Pinned station code.
    #[serde(default)]
    pub weather_station: Option<String>,
    /// Pinned municipality code.
    #[serde(default)]
    pub city: Option<String>,
    /// Nearest search through a spatial index instead of a linear scan.
    #[serde(default)]
    pub experimental: bool,
    /// Display name of the instance.
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,
}

fn resolve_api_key(explicit: Option<&str>, from_env: Option<String>) -> Option<String> {
    explicit
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .or_else(|| from_env.filter(|key| !key.trim().is_empty()))
}

impl Config {
    /// Parses without validating.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Reads, parses and validates a config file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let config = Self::from_toml_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ConfigError::InvalidLatitude(self.latitude));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ConfigError::InvalidLongitude(self.longitude));
        }
        self.api_key().map(|_| ())
    }

    /// The configured key, or the one in `AEMET_API_KEY`.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        resolve_api_key(self.api_key.as_deref(), std::env::var(API_KEY_ENV).ok())
            .ok_or(ConfigError::MissingApiKey)
    }

    pub fn location(&self) -> Location {
        Location::new(self.latitude, self.longitude, self.elevation)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn strategy(&self) -> NearestStrategy {
        if self.experimental {
            NearestStrategy::SpatialIndex
        } else {
            NearestStrategy::Linear
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() -> Result<(), ConfigError> {
        let config = Config::from_toml_str(
            r#"
            api_key = "secret"
            latitude = 40.4168
            longitude = -3.7038
            "#,
        )?;

        assert_eq!(config.mode, ForecastMode::Daily);
        assert_eq!(config.elevation, 0.0);
        assert_eq!(config.name, "AEMET");
        assert_eq!(config.update_interval(), Duration::from_secs(600));
        assert_eq!(config.strategy(), NearestStrategy::Linear);
        assert_eq!(config.weather_station, None);
        assert_eq!(config.api_key()?, "secret");
        config.validate()
    }

    #[test]
    fn full_config() -> Result<(), ConfigError> {
        let config = Config::from_toml_str(
            r#"
            api_key = "secret"
            latitude = 28.4636
            longitude = -16.2518
            elevation = 35.0
            mode = "hourly"
            cache_dir = "/tmp/aemet"
            weather_station = "C449C"
            city = "id38038"
            experimental = true
            name = "Tenerife"
            update_interval_secs = 900
            "#,
        )?;

        assert_eq!(config.mode, ForecastMode::Hourly);
        assert_eq!(config.location(), Location::new(28.4636, -16.2518, 35.0));
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/aemet")));
        assert_eq!(config.city.as_deref(), Some("id38038"));
        assert_eq!(config.name, "Tenerife");
        assert_eq!(config.strategy(), NearestStrategy::SpatialIndex);
        assert_eq!(config.update_interval(), Duration::from_secs(900));
        Ok(())
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() -> Result<(), ConfigError> {
        let config = Config::from_toml_str("api_key = \"k\"\nlatitude = 91.0\nlongitude = 0.0")?;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLatitude(l)) if l == 91.0
        ));

        let config = Config::from_toml_str("api_key = \"k\"\nlatitude = 0.0\nlongitude = -181.0")?;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLongitude(_))
        ));
        Ok(())
    }

    #[test]
    fn unknown_mode_is_a_parse_error() {
        let result = Config::from_toml_str("latitude = 0.0\nlongitude = 0.0\nmode = \"weekly\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn api_key_resolution() {
        assert_eq!(
            resolve_api_key(Some(" key "), Some("env".into())),
            Some("key".to_string())
        );
        assert_eq!(
            resolve_api_key(Some(""), Some("env".into())),
            Some("env".to_string())
        );
        assert_eq!(resolve_api_key(None, Some("  ".into())), None);
        assert_eq!(resolve_api_key(None, None), None);
    }

    #[tokio::test]
    async fn load_reports_missing_file() {
        let result = Config::load("/definitely/not/here/aemet.toml").await;
        assert!(matches!(result, Err(ConfigError::Read(..))));
    }

    #[tokio::test]
    async fn load_reads_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("aemet.toml");
        tokio::fs::write(&path, "api_key = \"k\"\nlatitude = 40.0\nlongitude = -3.0\n").await?;

        let config = Config::load(&path).await?;
        assert_eq!(config.location().lat_lon(), crate::LatLon(40.0, -3.0));
        Ok(())
    }
}
