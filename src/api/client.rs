use crate::api::error::ApiError;
use crate::api::gateway::Gateway;
use crate::types::forecast_mode::ForecastMode;
use crate::utils::redact;
use log::{debug, error, info, warn};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "https://opendata.aemet.es/opendata/api";

/// The fixed set of upstream endpoints this crate consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    StationCatalog,
    MunicipalityCatalog,
    Observation(String),
    Forecast(ForecastMode, String),
}

impl Endpoint {
    pub fn path(&self) -> String {
        match self {
            Endpoint::StationCatalog => "/observacion/convencional/todas".to_string(),
            Endpoint::MunicipalityCatalog => "/maestro/municipios".to_string(),
            Endpoint::Observation(code) => {
                format!("/observacion/convencional/datos/estacion/{code}")
            }
            Endpoint::Forecast(mode, code) => format!(
                "/prediccion/especifica/municipio/{}/{code}",
                mode.path_segment()
            ),
        }
    }

    pub fn url(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.path())
    }

    /// Endpoints answering with the payload itself instead of a status envelope.
    pub fn is_direct(&self) -> bool {
        matches!(self, Endpoint::MunicipalityCatalog)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "estado")]
    status: u16,
    #[serde(rename = "descripcion", default)]
    description: Option<String>,
    #[serde(rename = "datos", default)]
    data_url: Option<String>,
}

/// Authenticated access to the AEMET OpenData endpoints.
///
/// Most endpoints answer with an envelope `{estado, descripcion, datos}`
/// whose `datos` URL has to be fetched in a second request. `Ok(None)` means
/// the transport failed on either stage; error statuses become [`ApiError`].
#[derive(Debug, Clone)]
pub struct AemetApi {
    gateway: Arc<dyn Gateway>,
    api_key: String,
    base_url: String,
}

impl AemetApi {
    pub fn new(gateway: Arc<dyn Gateway>, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        debug!("Creating API client with key {}", redact(&api_key));
        Self {
            gateway,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn call(&self, endpoint: &Endpoint) -> Result<Option<Value>, ApiError> {
        let url = endpoint.url(&self.base_url);
        let Some(response) = self.gateway.fetch(&url, Some(&self.api_key)).await else {
            return Ok(None);
        };

        if endpoint.is_direct() {
            debug!("Loaded direct data for {}", endpoint);
            return Ok(Some(response));
        }

        let envelope: Envelope =
            serde_json::from_value(response).map_err(ApiError::MalformedEnvelope)?;
        let description = envelope
            .description
            .unwrap_or_else(|| "No description provided".to_string());

        match envelope.status {
            200 => {}
            401 => {
                error!("Unauthorized for {}: {}", endpoint, description);
                return Err(ApiError::Unauthorized { description });
            }
            404 => {
                warn!("Not found {}: {}", endpoint, description);
                return Err(ApiError::NotFound { description });
            }
            429 => {
                info!("Too many requests for {}: {}", endpoint, description);
                return Err(ApiError::TooManyRequests { description });
            }
            status => {
                warn!("Request for {} failed ({}): {}", endpoint, status, description);
                return Err(ApiError::Status {
                    status,
                    description,
                });
            }
        }

        let data_url = envelope
            .data_url
            .ok_or_else(|| ApiError::MissingDataUrl(endpoint.to_string()))?;
        Ok(self.gateway.fetch(&data_url, Some(&self.api_key)).await)
    }
}
