//! Validation utilities
//!
//! Pure checks on operator-entered names and endpoints. No IO.

use crate::error::{ModelError, Result};

/// Maximum length of a greenhouse or device name
pub const MAX_NAME_LEN: usize = 64;

/// Validate a greenhouse or device name
///
/// Rules:
/// - Not empty or whitespace only
/// - At most 64 characters
/// - No leading/trailing whitespace
/// - No control characters
///
/// ```
/// use greenhouse_model::validate_name;
///
/// assert!(validate_name("Greenhouse 1").is_ok());
/// assert!(validate_name("Теплица").is_ok());
/// assert!(validate_name("").is_err());
/// assert!(validate_name(" padded ").is_err());
/// ```
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ModelError::InvalidName("name cannot be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ModelError::InvalidName(format!(
            "name too long ({} characters, max {})",
            name.chars().count(),
            MAX_NAME_LEN
        )));
    }
    if name.trim() != name {
        return Err(ModelError::InvalidName(format!(
            "name has surrounding whitespace: '{}'",
            name
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(ModelError::InvalidName(
            "name contains control characters".to_string(),
        ));
    }
    Ok(())
}

/// Validate a Modbus TCP endpoint
///
/// An empty address or port 0 can never be reached.
pub fn validate_endpoint(address: &str, port: u16) -> Result<()> {
    if address.trim().is_empty() {
        return Err(ModelError::InvalidEndpoint(
            "address cannot be empty".to_string(),
        ));
    }
    if address.chars().any(char::is_whitespace) {
        return Err(ModelError::InvalidEndpoint(format!(
            "address contains whitespace: '{}'",
            address
        )));
    }
    if port == 0 {
        return Err(ModelError::InvalidEndpoint("port cannot be 0".to_string()));
    }
    Ok(())
}
