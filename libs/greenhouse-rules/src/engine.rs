//! Automation tick for one greenhouse
//!
//! Each tick:
//! 1. Takes the latest connected sample of the greenhouse
//! 2. Decides every auto device against it
//! 3. For each change, updates registry memory, writes the actuator, then
//!    saves the registry
//!
//! Registry state is the commanded state. A failed write is alerted but not
//! rolled back, so the next change retries naturally. The save comes last so
//! a crash mid-change never leaves disk claiming a command that was not sent.

use std::sync::Arc;

use common::Clock;
use greenhouse_model::{Device, Greenhouse};
use greenhouse_modbus::FieldBus;
use greenhouse_store::{Registry, SensorStore};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::actuator::drive_actuator;
use crate::decision::{decide, Actuation, Decision};
use crate::notify::Notifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Previous evaluation still running
    Busy,
    NoConnectedSample,
    UnknownGreenhouse,
}

/// One device changed by a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChange {
    pub device: String,
    pub is_on: bool,
    /// Saved by the registry backend
    pub persisted: bool,
    /// Acknowledged by the field device
    pub delivered: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub skipped: Option<SkipReason>,
    pub changes: Vec<AppliedChange>,
}

impl TickReport {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            changes: Vec::new(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

pub struct AutomationEngine {
    registry: Arc<Registry>,
    samples: Arc<SensorStore>,
    bus: Arc<dyn FieldBus>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    tick_lock: Mutex<()>,
}

impl AutomationEngine {
    pub fn new(
        registry: Arc<Registry>,
        samples: Arc<SensorStore>,
        bus: Arc<dyn FieldBus>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            samples,
            bus,
            notifier,
            clock,
            tick_lock: Mutex::new(()),
        }
    }

    /// Run one automation pass for `greenhouse_name`
    pub async fn evaluate(&self, greenhouse_name: &str) -> TickReport {
        let Ok(_guard) = self.tick_lock.try_lock() else {
            debug!("Automation busy, skip {}", greenhouse_name);
            return TickReport::skipped(SkipReason::Busy);
        };

        let Some(greenhouse) = self.registry.greenhouse(greenhouse_name) else {
            warn!("Automation: unknown greenhouse {}", greenhouse_name);
            return TickReport::skipped(SkipReason::UnknownGreenhouse);
        };

        let Some(sample) = self.samples.latest_connected(greenhouse_name) else {
            debug!("Automation: no connected sample for {}", greenhouse_name);
            return TickReport::skipped(SkipReason::NoConnectedSample);
        };

        let now = self.clock.now();
        let mut report = TickReport::default();
        for device in self
            .registry
            .list_devices(greenhouse_name)
            .into_iter()
            .filter(|d| d.is_auto)
        {
            if let Decision::Actuate(actuation) = decide(&device, &sample, now) {
                if let Some(change) = self.apply(&greenhouse, &device, actuation).await {
                    report.changes.push(change);
                }
            }
        }

        if !report.changes.is_empty() {
            self.notifier.devices_changed(greenhouse_name);
        }
        report
    }

    async fn apply(
        &self,
        greenhouse: &Greenhouse,
        device: &Device,
        actuation: Actuation,
    ) -> Option<AppliedChange> {
        info!(
            "Auto {}/{} ({}): {} -> {}",
            greenhouse.name,
            device.name,
            device.kind,
            on_off(device.is_on),
            on_off(actuation.is_on)
        );

        let updated = match self.registry.stage_device_state(
            &device.name,
            &greenhouse.name,
            actuation.is_on,
            actuation.stamp,
        ) {
            Ok(updated) => updated,
            Err(e) => {
                // removed since the tick started
                warn!("Skip {}/{}: {}", greenhouse.name, device.name, e);
                return None;
            },
        };

        let delivered = match drive_actuator(self.bus.as_ref(), greenhouse, &updated).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Write {}/{} failed: {}", greenhouse.name, device.name, e);
                self.notifier.alert(
                    &greenhouse.name,
                    &format!("Could not switch {} {}: {}", device.name, on_off(updated.is_on), e),
                );
                false
            },
        };

        let persisted = match self.registry.save_devices().await {
            Ok(()) => true,
            Err(e) => {
                error!("Save {}/{} failed: {}", greenhouse.name, device.name, e);
                self.notifier.alert(
                    &greenhouse.name,
                    &format!("Could not save state of {}: {}", device.name, e),
                );
                false
            },
        };

        Some(AppliedChange {
            device: updated.name,
            is_on: updated.is_on,
            persisted,
            delivered,
        })
    }
}

fn on_off(is_on: bool) -> &'static str {
    if is_on {
        "on"
    } else {
        "off"
    }
}
