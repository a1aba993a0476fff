use crate::api::error::ApiError;
use crate::catalog::entry::CatalogKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Code '{code}' does not exist in the {kind} catalog")]
    InvalidPinnedCode { kind: CatalogKind, code: String },

    #[error("Failed to fetch catalog")]
    Api(#[from] ApiError),

    #[error("Stored catalog could not be decoded")]
    Malformed(#[from] serde_json::Error),

    #[error("Unexpected payload shape for the {0} catalog")]
    UnexpectedShape(CatalogKind),
}

impl CatalogError {
    pub fn is_fatal(&self) -> bool {
        match self {
            CatalogError::InvalidPinnedCode { .. } => true,
            CatalogError::Api(e) => e.is_fatal(),
            _ => false,
        }
    }
}
