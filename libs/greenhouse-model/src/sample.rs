//! Sensor samples and the holding register layout they are decoded from

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Holding registers read per collection: temperature, humidity, CO2, soil raw
pub const SENSOR_REGISTER_COUNT: u16 = 4;

pub const REG_TEMPERATURE: usize = 0;
pub const REG_HUMIDITY: usize = 1;
pub const REG_CO2: usize = 2;
pub const REG_SOIL_RAW: usize = 3;

/// Raw soil probe reading for a completely dry probe
pub const SOIL_RAW_DRY: u16 = 1000;

/// Convert the raw soil probe value to percent moisture
///
/// Raw values above 1000 are treated as fully dry. The result has one
/// decimal place; higher means wetter.
///
/// ```
/// use greenhouse_model::soil_moisture_percent;
///
/// assert_eq!(soil_moisture_percent(0), 100.0);
/// assert_eq!(soil_moisture_percent(500), 50.0);
/// assert_eq!(soil_moisture_percent(1200), 0.0);
/// ```
pub fn soil_moisture_percent(raw: u16) -> f64 {
    let clamped = raw.min(SOIL_RAW_DRY);
    f64::from(SOIL_RAW_DRY - clamped) / 10.0
}

/// One reading of a greenhouse, real or offline
///
/// Immutable once appended to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorSample {
    pub timestamp: DateTime<Utc>,
    pub greenhouse_name: String,
    pub temperature: f64,
    pub humidity: u16,
    pub soil_moisture: f64,
    pub co2: u16,
    #[serde(rename = "isConnected", alias = "connected")]
    pub connected: bool,
}

impl SensorSample {
    /// Marker for a failed collection: all zeros, not connected
    pub fn offline(greenhouse_name: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            greenhouse_name: greenhouse_name.into(),
            temperature: 0.0,
            humidity: 0,
            soil_moisture: 0.0,
            co2: 0,
            connected: false,
        }
    }

    /// Decode `[temperature, humidity, co2, soil_raw]`
    pub fn from_registers(
        greenhouse_name: impl Into<String>,
        timestamp: DateTime<Utc>,
        registers: &[u16],
    ) -> Result<Self> {
        let expected = SENSOR_REGISTER_COUNT as usize;
        if registers.len() < expected {
            return Err(ModelError::ShortRegisters {
                expected,
                got: registers.len(),
            });
        }
        Ok(Self {
            timestamp,
            greenhouse_name: greenhouse_name.into(),
            temperature: f64::from(registers[REG_TEMPERATURE]),
            humidity: registers[REG_HUMIDITY],
            soil_moisture: soil_moisture_percent(registers[REG_SOIL_RAW]),
            co2: registers[REG_CO2],
            connected: true,
        })
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    fn ts() -> DateTime<Utc> {
        "2024-05-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_soil_conversion_boundaries() {
        assert_eq!(soil_moisture_percent(0), 100.0);
        assert_eq!(soil_moisture_percent(1000), 0.0);
        assert_eq!(soil_moisture_percent(500), 50.0);
        assert_eq!(soil_moisture_percent(1200), 0.0);
        assert_eq!(soil_moisture_percent(333), 66.7);
        assert_eq!(soil_moisture_percent(u16::MAX), 0.0);
    }

    #[test]
    fn test_from_registers_layout() {
        let sample = SensorSample::from_registers("North", ts(), &[23, 61, 540, 250]).unwrap();
        assert_eq!(sample.temperature, 23.0);
        assert_eq!(sample.humidity, 61);
        assert_eq!(sample.co2, 540);
        assert_eq!(sample.soil_moisture, 75.0);
        assert!(sample.connected);
    }

    #[test]
    fn test_from_registers_short_block() {
        let err = SensorSample::from_registers("North", ts(), &[23, 61]).unwrap_err();
        assert_eq!(
            err,
            ModelError::ShortRegisters {
                expected: 4,
                got: 2
            }
        );
    }

    #[test]
    fn test_offline_sample_is_zeroed() {
        let sample = SensorSample::offline("North", ts());
        assert!(!sample.connected);
        assert_eq!(sample.temperature, 0.0);
        assert_eq!(sample.co2, 0);
    }

    #[test]
    fn test_json_field_names() {
        let sample = SensorSample::offline("North", ts());
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["greenhouseName"], "North");
        assert_eq!(json["isConnected"], false);
        assert_eq!(json["soilMoisture"], 0.0);
    }
}
