//! Model layer error types

use thiserror::Error;

/// Result type for greenhouse-model operations
pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    /// Invalid greenhouse or device name
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Greenhouse address/port unusable
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Device is missing the trigger its type needs
    #[error("Missing trigger: {0}")]
    MissingTrigger(String),

    /// Register block shorter than the sensor layout
    #[error("Short register block: expected {expected}, got {got}")]
    ShortRegisters { expected: usize, got: usize },

    /// Unknown history period
    #[error("Unknown period: {0}")]
    UnknownPeriod(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl ModelError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ModelError::Validation(msg.into())
    }
}
