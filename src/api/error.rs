use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid API key: {description}")]
    Unauthorized { description: String },

    #[error("Resource not found: {description}")]
    NotFound { description: String },

    #[error("Too many requests, retry later: {description}")]
    TooManyRequests { description: String },

    #[error("Request failed with status {status}: {description}")]
    Status { status: u16, description: String },

    #[error("Response envelope could not be decoded")]
    MalformedEnvelope(#[source] serde_json::Error),

    #[error("Response envelope for {0} does not point to any data")]
    MissingDataUrl(String),

    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),
}

impl ApiError {
    /// Errors that no amount of retrying will fix.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// Errors the regular polling cadence will naturally back off from.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::TooManyRequests { .. })
    }
}
