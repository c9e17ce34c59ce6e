//! Climate service error types

use greenhouse_modbus::ModbusError;
use greenhouse_store::StoreError;
use thiserror::Error;

/// Result type for control commands
pub type Result<T> = std::result::Result<T, ControlError>;

#[derive(Debug, Error)]
pub enum ControlError {
    /// Field device could not be reached or rejected the command
    #[error("Transport error: {0}")]
    Transport(#[from] ModbusError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Greenhouse not found: {0}")]
    GreenhouseNotFound(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<common::Error> for ControlError {
    fn from(err: common::Error) -> Self {
        ControlError::Config(err.to_string())
    }
}

impl From<greenhouse_model::ModelError> for ControlError {
    fn from(err: greenhouse_model::ModelError) -> Self {
        ControlError::InvalidCommand(err.to_string())
    }
}
