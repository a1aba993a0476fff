//! Raw JSON transport.
//!
//! The gateway is the only place that talks HTTP. It never fails loudly:
//! connection problems, timeouts and undecodable bodies are logged and turned
//! into `None`, which every caller treats as "no data this time".

use crate::api::error::ApiError;
use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde_json::Value;
use std::fmt::Debug;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[async_trait]
pub trait Gateway: Send + Sync + Debug {
    /// Fetches `url` and decodes the body as JSON. `None` on any transport failure.
    async fn fetch(&self, url: &str, api_key: Option<&str>) -> Option<Value>;
}

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
}

impl HttpGateway {
    pub fn new() -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(ApiError::ClientBuild)?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn fetch(&self, url: &str, api_key: Option<&str>) -> Option<Value> {
        debug!("Loading data from {}", url);

        let mut request = self.client.get(url);
        if let Some(key) = api_key {
            request = request.query(&[("api_key", key)]);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Unable to retrieve data from {}: {}", url, e);
                return None;
            }
        };

        let status = response.status();
        // `text()` honours the charset the server declares (ISO-8859-15 for most payloads).
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                error!("Unable to read response body from {}: {}", url, e);
                return None;
            }
        };

        match serde_json::from_str(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                error!(
                    "Response from {} (HTTP {}) is not valid JSON: {}",
                    url, status, e
                );
                None
            }
        }
    }
}
