//! Store error types

use greenhouse_model::ModelError;
use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// Backend write or read failed; in-memory state is kept
    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Greenhouse not found: {0}")]
    GreenhouseNotFound(String),

    #[error("Device not found: {name} in {greenhouse}")]
    DeviceNotFound { name: String, greenhouse: String },

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl StoreError {
    pub fn device_not_found(name: &str, greenhouse: &str) -> Self {
        StoreError::DeviceNotFound {
            name: name.to_string(),
            greenhouse: greenhouse.to_string(),
        }
    }
}

impl From<ModelError> for StoreError {
    fn from(err: ModelError) -> Self {
        StoreError::Validation(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
