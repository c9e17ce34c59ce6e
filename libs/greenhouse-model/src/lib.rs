//! Greenhouse Model Library
//!
//! Domain types shared by the transport, store, rules and service crates.
//! Pure data and validation, no IO.
//!
//! # Modules
//!
//! - `greenhouse`: remote node identity and endpoint
//! - `device`: actuators and their automation triggers
//! - `sample`: sensor samples and register decoding
//! - `history`: selectable history windows
//! - `settings`: bulk per-greenhouse thresholds
//! - `validation`: name and endpoint checks

pub mod device;
pub mod error;
pub mod greenhouse;
pub mod history;
pub mod sample;
pub mod settings;
pub mod validation;

pub use device::{Device, DeviceKind, LightStamp};
pub use error::{ModelError, Result};
pub use greenhouse::Greenhouse;
pub use history::HistoryPeriod;
pub use sample::{soil_moisture_percent, SensorSample, SENSOR_REGISTER_COUNT};
pub use settings::ControllerSettings;
pub use validation::{validate_endpoint, validate_name};
