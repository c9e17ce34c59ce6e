//! Shared plumbing for the greenhouse services
//!
//! Provides the pieces every service binary needs:
//! - logging initialisation
//! - layered configuration loading
//! - a clock abstraction for deterministic tests
//! - graceful shutdown signal handling

pub mod config_loader;
pub mod error;
pub mod logging;
pub mod shutdown;
pub mod time;

pub use config_loader::{load_config, load_config_from_file};
pub use error::{Error, Result};
pub use logging::LogConfig;
pub use time::{Clock, ManualClock, SystemClock};

// Re-export common dependencies
pub use serde;
pub use serde_json;
pub use tokio;
