//! Greenhouse Climate Service (climsrv)
//!
//! Polls greenhouse nodes over Modbus TCP, keeps the sensor history,
//! runs door/ventilation/light automation for the attended greenhouse and
//! exposes manual control through [`GreenhouseController`].

pub mod collector;
pub mod config;
pub mod controller;
pub mod error;
pub mod scheduler;
pub mod service;

pub use collector::Collector;
pub use config::{ClimsrvConfig, SERVICE_NAME};
pub use controller::{CommandReport, GreenhouseController};
pub use error::{ControlError, Result};
pub use scheduler::{ActivityStatus, Scheduler};
pub use service::ClimateService;
