//! Command surface for the presentation layer
//!
//! Every operation returns a `Result` instead of mutating UI state. Manual
//! commands bypass automation but still go through the registry and the
//! field bus.

use std::sync::Arc;

use common::Clock;
use greenhouse_model::{
    ControllerSettings, Device, DeviceKind, Greenhouse, HistoryPeriod, LightStamp, SensorSample,
};
use greenhouse_modbus::{CoilState, FieldBus, ValveAngle};
use greenhouse_rules::{drive_actuator, endpoint_of, Notifier};
use greenhouse_store::{Registry, SensorStore};
use parking_lot::RwLock;
use tracing::{error, info, warn};

use crate::collector::Collector;
use crate::error::{ControlError, Result};

/// Outcome of a command that changes a device
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReport {
    /// Device as stored after the command
    pub device: Device,
    /// Saved by the registry backend
    pub persisted: bool,
    /// Field write result; `None` when no write was needed
    pub delivered: Option<bool>,
}

pub struct GreenhouseController {
    registry: Arc<Registry>,
    samples: Arc<SensorStore>,
    bus: Arc<dyn FieldBus>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    collector: Arc<Collector>,
    attended: RwLock<Option<String>>,
}

impl GreenhouseController {
    pub fn new(
        registry: Arc<Registry>,
        samples: Arc<SensorStore>,
        bus: Arc<dyn FieldBus>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        collector: Arc<Collector>,
    ) -> Self {
        Self {
            registry,
            samples,
            bus,
            notifier,
            clock,
            collector,
            attended: RwLock::new(None),
        }
    }

    fn require_greenhouse(&self, name: &str) -> Result<Greenhouse> {
        self.registry
            .greenhouse(name)
            .ok_or_else(|| ControlError::GreenhouseNotFound(name.to_string()))
    }

    // ------------------------------------------------------------------
    // Devices
    // ------------------------------------------------------------------

    pub fn get_devices(&self, greenhouse_name: &str) -> Vec<Device> {
        self.registry.list_devices(greenhouse_name)
    }

    /// New device, off and manual, with the default trigger for its kind
    pub async fn add_device(
        &self,
        name: &str,
        kind: DeviceKind,
        register: u16,
        greenhouse_name: &str,
    ) -> Result<Device> {
        let device = Device::new(name, kind, register, greenhouse_name);
        self.registry.add_device(device.clone()).await?;
        info!("Device added: {}/{} ({})", greenhouse_name, name, kind);
        self.notifier.devices_changed(greenhouse_name);
        Ok(device)
    }

    pub async fn remove_device(&self, name: &str, greenhouse_name: &str) -> Result<Device> {
        let removed = self.registry.remove_device(name, greenhouse_name).await?;
        info!("Device removed: {}/{}", greenhouse_name, name);
        self.notifier.devices_changed(greenhouse_name);
        Ok(removed)
    }

    pub async fn rename_device(
        &self,
        name: &str,
        greenhouse_name: &str,
        new_name: &str,
    ) -> Result<Device> {
        let renamed = self
            .registry
            .rename_device(name, greenhouse_name, new_name)
            .await?;
        self.notifier.devices_changed(greenhouse_name);
        Ok(renamed)
    }

    /// Switch a device by hand
    ///
    /// A light switched on starts a new duty cycle; switched off it forgets
    /// the cycle.
    pub async fn set_manual(
        &self,
        name: &str,
        greenhouse_name: &str,
        on: bool,
    ) -> Result<CommandReport> {
        let greenhouse = self.require_greenhouse(greenhouse_name)?;
        let device = self
            .registry
            .device(name, greenhouse_name)
            .ok_or_else(|| greenhouse_store::StoreError::device_not_found(name, greenhouse_name))?;

        let stamp = match (device.kind, on) {
            (DeviceKind::Light, true) => LightStamp::Set(self.clock.now()),
            (DeviceKind::Light, false) => LightStamp::Clear,
            _ => LightStamp::Keep,
        };
        info!("Manual {}/{} -> {}", greenhouse_name, name, on);
        self.switch(&greenhouse, device, on, stamp).await
    }

    /// Enable or disable automation for a device
    ///
    /// Disabling automation on a lit light also switches it off.
    pub async fn set_auto(
        &self,
        name: &str,
        greenhouse_name: &str,
        on: bool,
    ) -> Result<CommandReport> {
        let greenhouse = self.require_greenhouse(greenhouse_name)?;
        let device = self.registry.set_auto(name, greenhouse_name, on).await?;
        info!("Auto mode {}/{} -> {}", greenhouse_name, name, on);

        if !on && device.kind == DeviceKind::Light && device.is_on {
            return self
                .switch(&greenhouse, device, false, LightStamp::Clear)
                .await;
        }

        self.notifier.devices_changed(greenhouse_name);
        Ok(CommandReport {
            device,
            persisted: true,
            delivered: None,
        })
    }

    /// Update the registry in memory, write the field, then save
    ///
    /// Neither a write nor a persistence failure rolls the state back; both
    /// are alerted and reported.
    async fn switch(
        &self,
        greenhouse: &Greenhouse,
        device: Device,
        on: bool,
        stamp: LightStamp,
    ) -> Result<CommandReport> {
        let updated = self
            .registry
            .stage_device_state(&device.name, &greenhouse.name, on, stamp)?;

        let delivered = match drive_actuator(self.bus.as_ref(), greenhouse, &updated).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Write {}/{} failed: {}", greenhouse.name, updated.name, e);
                self.notifier.alert(
                    &greenhouse.name,
                    &format!("Could not switch {}: {}", updated.name, e),
                );
                false
            },
        };

        let persisted = match self.registry.save_devices().await {
            Ok(()) => true,
            Err(e) => {
                error!("Save {}/{} failed: {}", greenhouse.name, updated.name, e);
                self.notifier.alert(
                    &greenhouse.name,
                    &format!("Could not save state of {}: {}", updated.name, e),
                );
                false
            },
        };

        self.notifier.devices_changed(&greenhouse.name);
        Ok(CommandReport {
            device: updated,
            persisted,
            delivered: Some(delivered),
        })
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    pub fn get_controller_settings(&self, greenhouse_name: &str) -> ControllerSettings {
        ControllerSettings::from_devices(&self.registry.list_devices(greenhouse_name))
    }

    /// Apply thresholds to the first device of each kind
    ///
    /// Missing kinds are created as `<Kind>_<greenhouse>` on register 0.
    /// Values are rounded and clamped first; the light cycle restarts.
    pub async fn apply_controller_settings(
        &self,
        greenhouse_name: &str,
        settings: ControllerSettings,
    ) -> Result<ControllerSettings> {
        self.require_greenhouse(greenhouse_name)?;
        let settings = settings.normalized();
        let devices = self.registry.list_devices(greenhouse_name);

        for kind in DeviceKind::ALL {
            let apply = |device: &mut Device| match kind {
                DeviceKind::Ventilation => {
                    device.temperature_trigger = Some(settings.temperature_trigger);
                },
                DeviceKind::Door => {
                    device.soil_moisture_trigger = Some(settings.soil_moisture_trigger);
                },
                DeviceKind::Light => {
                    device.daylight_hours = Some(settings.daylight_hours_whole());
                    device.light_on_time = None;
                },
            };

            match devices.iter().find(|d| d.kind == kind) {
                Some(existing) => {
                    self.registry
                        .update_device(&existing.name, greenhouse_name, apply)
                        .await?;
                },
                None => {
                    let mut created = Device::new(
                        format!("{}_{}", kind, greenhouse_name),
                        kind,
                        0,
                        greenhouse_name,
                    );
                    apply(&mut created);
                    self.registry.add_device(created).await?;
                },
            }
        }

        info!(
            "Settings {}: t={} soil={} daylight={}h",
            greenhouse_name,
            settings.temperature_trigger,
            settings.soil_moisture_trigger,
            settings.daylight_hours
        );
        self.notifier.devices_changed(greenhouse_name);
        Ok(settings)
    }

    // ------------------------------------------------------------------
    // Readings
    // ------------------------------------------------------------------

    pub fn get_latest_reading(&self, greenhouse_name: &str) -> Option<SensorSample> {
        self.samples.latest_connected(greenhouse_name)
    }

    pub fn get_history(&self, greenhouse_name: &str, period: HistoryPeriod) -> Vec<SensorSample> {
        self.samples
            .history(greenhouse_name, period, self.clock.now())
    }

    // ------------------------------------------------------------------
    // Greenhouses
    // ------------------------------------------------------------------

    pub fn list_greenhouses(&self) -> Vec<Greenhouse> {
        self.registry.list_greenhouses()
    }

    pub async fn add_greenhouse(&self, name: &str, address: &str, port: u16) -> Result<Greenhouse> {
        let greenhouse = Greenhouse::new(name, address, port);
        self.registry.add_greenhouse(greenhouse.clone()).await?;
        info!("Greenhouse added: {} at {}:{}", name, address, port);
        Ok(greenhouse)
    }

    /// Remove a greenhouse; its devices stay in the registry
    pub async fn remove_greenhouse(&self, name: &str) -> Result<Greenhouse> {
        let removed = self.registry.remove_greenhouse(name).await?;
        self.collector.disconnect(name);
        let mut attended = self.attended.write();
        if attended.as_deref() == Some(name) {
            *attended = None;
        }
        info!("Greenhouse removed: {}", name);
        Ok(removed)
    }

    /// Move a greenhouse to a new endpoint and re-probe it if it was connected
    pub async fn update_greenhouse_endpoint(
        &self,
        name: &str,
        address: &str,
        port: u16,
    ) -> Result<Greenhouse> {
        let updated = self
            .registry
            .update_greenhouse_endpoint(name, address, port)
            .await?;
        if self.collector.is_connected(name) {
            self.collector.connect_greenhouse(name).await?;
        }
        Ok(updated)
    }

    pub async fn refresh_connections(&self) -> Vec<String> {
        self.collector.refresh_connections().await
    }

    pub async fn connect_greenhouse(&self, name: &str) -> Result<bool> {
        self.collector.connect_greenhouse(name).await
    }

    pub fn connected_greenhouses(&self) -> Vec<String> {
        self.collector.connected()
    }

    /// Choose the greenhouse automation and live refresh work on
    pub fn select_greenhouse(&self, name: &str) -> Result<()> {
        self.require_greenhouse(name)?;
        *self.attended.write() = Some(name.to_string());
        info!("Attending {}", name);
        Ok(())
    }

    pub fn attended(&self) -> Option<String> {
        self.attended.read().clone()
    }

    // ------------------------------------------------------------------
    // Commissioning
    // ------------------------------------------------------------------

    /// Write a validated raw value without touching the registry
    ///
    /// Coils accept 0 or 1, registers 0 or 90. Anything else is rejected
    /// before a connection is opened.
    pub async fn actuate_raw(
        &self,
        greenhouse_name: &str,
        address: u16,
        value: u16,
        coil: bool,
    ) -> Result<()> {
        let greenhouse = self.require_greenhouse(greenhouse_name)?;
        let endpoint = endpoint_of(&greenhouse);
        if coil {
            let state = CoilState::try_from(value)?;
            self.bus.write_coil(&endpoint, address, state).await?;
        } else {
            let angle = ValveAngle::try_from(value)?;
            self.bus.write_angle(&endpoint, address, angle).await?;
        }
        info!("Raw write {} @{} = {}", endpoint, address, value);
        Ok(())
    }
}
