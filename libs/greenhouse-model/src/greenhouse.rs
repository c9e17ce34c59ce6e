use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::validation::{validate_endpoint, validate_name};

/// A remote sensor/actuator node reachable over Modbus TCP
///
/// `name` is the stable key; address and port may be edited later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Greenhouse {
    pub name: String,
    #[serde(rename = "ip")]
    pub address: String,
    pub port: u16,
}

impl Greenhouse {
    pub fn new(name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port,
        }
    }

    /// Full check used when the operator creates or edits a greenhouse
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_endpoint(&self.address, self.port)
    }

    pub fn endpoint_is_valid(&self) -> bool {
        validate_endpoint(&self.address, self.port).is_ok()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_field_names() {
        let gh = Greenhouse::new("North", "10.0.0.5", 502);
        let json = serde_json::to_value(&gh).unwrap();
        assert_eq!(json["name"], "North");
        assert_eq!(json["ip"], "10.0.0.5");
        assert_eq!(json["port"], 502);
    }

    #[test]
    fn test_endpoint_validity() {
        assert!(Greenhouse::new("A", "10.0.0.5", 502).endpoint_is_valid());
        assert!(!Greenhouse::new("A", "", 502).endpoint_is_valid());
        assert!(!Greenhouse::new("A", "10.0.0.5", 0).endpoint_is_valid());
        assert!(Greenhouse::new("", "10.0.0.5", 502).validate().is_err());
    }
}
