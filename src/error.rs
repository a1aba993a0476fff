use crate::api::error::ApiError;
use crate::cache::CacheError;
use crate::catalog::error::CatalogError;
use crate::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AemetError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to determine cache directory")]
    CacheDirResolution(#[source] std::io::Error),

    #[error("Invalid location ({latitude}, {longitude})")]
    InvalidLocation { latitude: f64, longitude: f64 },
}

impl AemetError {
    /// Errors that will repeat on every update until the configuration changes.
    pub fn is_fatal(&self) -> bool {
        match self {
            AemetError::Api(e) => e.is_fatal(),
            AemetError::Catalog(e) => e.is_fatal(),
            AemetError::Cache(_) => false,
            AemetError::Config(_)
            | AemetError::CacheDirResolution(_)
            | AemetError::InvalidLocation { .. } => true,
        }
    }
}
