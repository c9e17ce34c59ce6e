//! Greenhouse state storage
//!
//! - `registry`: greenhouses and devices, persisted on every mutation
//! - `sensor_store`: append-only samples with windowed and daily views
//! - `backend`: persistence trait with JSON file and in-memory implementations

pub mod aggregate;
pub mod backend;
pub mod error;
pub mod json_backend;
pub mod memory_backend;
pub mod registry;
pub mod sensor_store;

pub use aggregate::{aggregate_daily, DayBoundary};
pub use backend::StateBackend;
pub use error::{Result, StoreError};
pub use json_backend::JsonFileBackend;
pub use memory_backend::MemoryBackend;
pub use registry::Registry;
pub use sensor_store::SensorStore;
