//! Transport error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModbusError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModbusError {
    /// TCP connect did not complete in time
    #[error("Connect timeout: {0}")]
    ConnectTimeout(String),

    /// Peer actively refused the connection
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// Any other connect failure (DNS, unreachable, ...)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Request/response exchange exceeded the transaction timeout
    #[error("Transaction timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(String),

    /// Fewer registers than requested
    #[error("Short response: expected {expected} registers, got {got}")]
    ShortResponse { expected: usize, got: usize },

    /// Slave answered with an exception PDU
    #[error("Modbus exception: function {function:#04X}, code {code:#04X}")]
    Exception { function: u8, code: u8 },

    /// Malformed or mismatched frame
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Actuator value outside the accepted set, rejected before any IO
    #[error("Invalid command value: {0}")]
    InvalidCommandValue(String),

    /// Host or port unusable, rejected before any IO
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl ModbusError {
    /// Failures raised before a socket was ever opened
    pub fn is_pre_io(&self) -> bool {
        matches!(
            self,
            ModbusError::InvalidCommandValue(_) | ModbusError::InvalidEndpoint(_)
        )
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        ModbusError::Protocol(msg.into())
    }
}

impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        ModbusError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModbusError::Exception {
            function: 0x03,
            code: 0x02,
        };
        assert_eq!(
            err.to_string(),
            "Modbus exception: function 0x03, code 0x02"
        );

        let err = ModbusError::ShortResponse {
            expected: 4,
            got: 1,
        };
        assert_eq!(
            err.to_string(),
            "Short response: expected 4 registers, got 1"
        );
    }

    #[test]
    fn test_pre_io_classification() {
        assert!(ModbusError::InvalidCommandValue("45".into()).is_pre_io());
        assert!(ModbusError::InvalidEndpoint(":0".into()).is_pre_io());
        assert!(!ModbusError::Timeout("read".into()).is_pre_io());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        assert!(matches!(ModbusError::from(io), ModbusError::Io(_)));
    }
}
