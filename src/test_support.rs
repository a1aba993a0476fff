use crate::api::gateway::Gateway;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

pub const BASE_URL: &str = "http://aemet.test/api";

/// In-memory gateway serving canned JSON per URL.
#[derive(Debug, Default)]
pub struct FakeGateway {
    responses: HashMap<String, Value>,
    requests: Mutex<HashMap<String, usize>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, response: Value) -> Self {
        self.responses.insert(url.to_string(), response);
        self
    }

    /// Serves `data` behind a status envelope for `path`.
    pub fn with_staged(self, path: &str, data: Value) -> Self {
        let data_url = format!("http://aemet.test/data{path}");
        self.with(
            &format!("{BASE_URL}{path}"),
            json!({"descripcion": "exito", "estado": 200, "datos": data_url}),
        )
        .with(&data_url, data)
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .map(|requests| requests.get(url).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total_requests(&self) -> usize {
        self.requests
            .lock()
            .map(|requests| requests.values().sum())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn fetch(&self, url: &str, _api_key: Option<&str>) -> Option<Value> {
        if let Ok(mut requests) = self.requests.lock() {
            *requests.entry(url.to_string()).or_default() += 1;
        }
        self.responses.get(url).cloned()
    }
}
