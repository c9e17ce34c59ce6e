//! Service configuration
//!
//! Loaded through `common::load_config("climsrv", ..)`: defaults, then
//! `config/climsrv.yaml`, then an explicit file, then `CLIMSRV_*` variables
//! (`CLIMSRV_SCHEDULER__AUTOMATION_MS=1000`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use common::LogConfig;
use greenhouse_modbus::TransportTimeouts;
use greenhouse_store::DayBoundary;
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};

pub const SERVICE_NAME: &str = "climsrv";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimsrvConfig {
    /// Directory holding greenhouses.json, devices.json and sensor_data.jsonl
    pub data_dir: PathBuf,
    pub modbus: ModbusConfig,
    pub scheduler: SchedulerConfig,
    pub automation: AutomationConfig,
    /// Minutes east of UTC where calendar days start; host local time when unset
    pub day_boundary_offset_minutes: Option<i32>,
    pub logging: LogConfig,
}

impl Default for ClimsrvConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            modbus: ModbusConfig::default(),
            scheduler: SchedulerConfig::default(),
            automation: AutomationConfig::default(),
            day_boundary_offset_minutes: None,
            logging: LogConfig::new(SERVICE_NAME),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusConfig {
    pub unit_id: u8,
    pub probe_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub transaction_timeout_ms: u64,
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            unit_id: 1,
            probe_timeout_ms: 2000,
            connect_timeout_ms: 5000,
            transaction_timeout_ms: 500,
        }
    }
}

impl ModbusConfig {
    pub fn timeouts(&self) -> TransportTimeouts {
        TransportTimeouts {
            probe: Duration::from_millis(self.probe_timeout_ms),
            connect: Duration::from_millis(self.connect_timeout_ms),
            transaction: Duration::from_millis(self.transaction_timeout_ms),
        }
    }
}

/// Tick periods in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub automation_ms: u64,
    pub collection_ms: u64,
    pub live_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            automation_ms: 2000,
            collection_ms: 60_000,
            live_ms: 2000,
        }
    }
}

impl SchedulerConfig {
    pub fn automation(&self) -> Duration {
        Duration::from_millis(self.automation_ms)
    }

    pub fn collection(&self) -> Duration {
        Duration::from_millis(self.collection_ms)
    }

    pub fn live(&self) -> Duration {
        Duration::from_millis(self.live_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Greenhouse attended at startup
    pub greenhouse: Option<String>,
}

impl ClimsrvConfig {
    /// Layered load, then validation
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config: Self = common::load_config(SERVICE_NAME, explicit)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("scheduler.automation_ms", self.scheduler.automation_ms),
            ("scheduler.collection_ms", self.scheduler.collection_ms),
            ("scheduler.live_ms", self.scheduler.live_ms),
            ("modbus.probe_timeout_ms", self.modbus.probe_timeout_ms),
            ("modbus.connect_timeout_ms", self.modbus.connect_timeout_ms),
            (
                "modbus.transaction_timeout_ms",
                self.modbus.transaction_timeout_ms,
            ),
        ];
        for (key, value) in periods {
            if value == 0 {
                return Err(ControlError::Config(format!("{} must be positive", key)));
            }
        }
        if !(1..=247).contains(&self.modbus.unit_id) {
            return Err(ControlError::Config(format!(
                "modbus.unit_id must be 1-247, got {}",
                self.modbus.unit_id
            )));
        }
        if let Some(minutes) = self.day_boundary_offset_minutes {
            if DayBoundary::from_offset_minutes(minutes).is_none() {
                return Err(ControlError::Config(format!(
                    "day_boundary_offset_minutes must be within ±1439, got {}",
                    minutes
                )));
            }
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(ControlError::Config("data_dir is empty".to_string()));
        }
        Ok(())
    }

    /// Host local time unless a valid offset is configured
    pub fn day_boundary(&self) -> DayBoundary {
        self.day_boundary_offset_minutes
            .and_then(DayBoundary::from_offset_minutes)
            .unwrap_or_default()
    }
}
