//! Registry of greenhouses and devices
//!
//! Reads are served from memory. Every mutation updates memory first, then
//! saves the whole affected collection before returning. Mutations are
//! serialized by `write_gate`, held across the save, so the persisted order
//! always matches the in-memory order.
//!
//! Actuation is the exception: [`Registry::stage_device_state`] changes memory
//! only, the caller writes the field device, then [`Registry::save_devices`]
//! persists. Disk never records a command that was not yet sent.

use std::sync::Arc;

use greenhouse_model::{validate_endpoint, validate_name, Device, Greenhouse, LightStamp};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::backend::StateBackend;
use crate::error::{Result, StoreError};

#[derive(Debug, Default, Clone)]
struct RegistryState {
    greenhouses: Vec<Greenhouse>,
    devices: Vec<Device>,
}

pub struct Registry {
    state: RwLock<RegistryState>,
    write_gate: Mutex<()>,
    backend: Arc<dyn StateBackend>,
}

impl Registry {
    /// Load both collections from the backend
    pub async fn open(backend: Arc<dyn StateBackend>) -> Result<Self> {
        let greenhouses = backend.load_greenhouses().await?;
        let devices = backend.load_devices().await?;
        info!(
            "Registry: {} greenhouses, {} devices",
            greenhouses.len(),
            devices.len()
        );
        Ok(Self {
            state: RwLock::new(RegistryState {
                greenhouses,
                devices,
            }),
            write_gate: Mutex::new(()),
            backend,
        })
    }

    // ========== Reads ==========

    pub fn list_greenhouses(&self) -> Vec<Greenhouse> {
        self.state.read().greenhouses.clone()
    }

    pub fn greenhouse(&self, name: &str) -> Option<Greenhouse> {
        self.state
            .read()
            .greenhouses
            .iter()
            .find(|g| g.name == name)
            .cloned()
    }

    pub fn list_devices(&self, greenhouse_name: &str) -> Vec<Device> {
        self.state
            .read()
            .devices
            .iter()
            .filter(|d| d.greenhouse_name == greenhouse_name)
            .cloned()
            .collect()
    }

    pub fn device(&self, name: &str, greenhouse_name: &str) -> Option<Device> {
        self.state
            .read()
            .devices
            .iter()
            .find(|d| d.is_key(name, greenhouse_name))
            .cloned()
    }

    // ========== Greenhouse mutations ==========

    pub async fn add_greenhouse(&self, greenhouse: Greenhouse) -> Result<()> {
        greenhouse.validate()?;
        let _gate = self.write_gate.lock().await;
        let snapshot = {
            let mut state = self.state.write();
            if state.greenhouses.iter().any(|g| g.name == greenhouse.name) {
                return Err(StoreError::AlreadyExists(format!(
                    "greenhouse '{}'",
                    greenhouse.name
                )));
            }
            info!("Greenhouse added: {}", greenhouse.name);
            state.greenhouses.push(greenhouse);
            state.greenhouses.clone()
        };
        self.persist_greenhouses(&snapshot).await
    }

    pub async fn update_greenhouse_endpoint(
        &self,
        name: &str,
        address: &str,
        port: u16,
    ) -> Result<Greenhouse> {
        validate_endpoint(address, port)?;
        let _gate = self.write_gate.lock().await;
        let (updated, snapshot) = {
            let mut state = self.state.write();
            let greenhouse = state
                .greenhouses
                .iter_mut()
                .find(|g| g.name == name)
                .ok_or_else(|| StoreError::GreenhouseNotFound(name.to_string()))?;
            greenhouse.address = address.to_string();
            greenhouse.port = port;
            (greenhouse.clone(), state.greenhouses.clone())
        };
        info!("Greenhouse {} -> {}:{}", name, address, port);
        self.persist_greenhouses(&snapshot).await?;
        Ok(updated)
    }

    /// Remove a greenhouse entry; its devices stay registered
    pub async fn remove_greenhouse(&self, name: &str) -> Result<Greenhouse> {
        let _gate = self.write_gate.lock().await;
        let (removed, snapshot) = {
            let mut state = self.state.write();
            let idx = state
                .greenhouses
                .iter()
                .position(|g| g.name == name)
                .ok_or_else(|| StoreError::GreenhouseNotFound(name.to_string()))?;
            let removed = state.greenhouses.remove(idx);
            (removed, state.greenhouses.clone())
        };
        info!("Greenhouse removed: {}", name);
        self.persist_greenhouses(&snapshot).await?;
        Ok(removed)
    }

    // ========== Device mutations ==========

    /// Insert a new device; fails if the key is taken
    pub async fn add_device(&self, device: Device) -> Result<()> {
        device.validate()?;
        let _gate = self.write_gate.lock().await;
        let snapshot = {
            let mut state = self.state.write();
            Self::require_greenhouse(&state, &device.greenhouse_name)?;
            if state
                .devices
                .iter()
                .any(|d| d.is_key(&device.name, &device.greenhouse_name))
            {
                return Err(StoreError::AlreadyExists(format!(
                    "device '{}' in '{}'",
                    device.name, device.greenhouse_name
                )));
            }
            info!(
                "Device added: {} ({}) in {}",
                device.name, device.kind, device.greenhouse_name
            );
            state.devices.push(device);
            state.devices.clone()
        };
        self.persist_devices(&snapshot).await
    }

    /// Insert or replace by `(name, greenhouse_name)`; true when replaced
    pub async fn upsert_device(&self, device: Device) -> Result<bool> {
        device.validate()?;
        let _gate = self.write_gate.lock().await;
        let (replaced, snapshot) = {
            let mut state = self.state.write();
            Self::require_greenhouse(&state, &device.greenhouse_name)?;
            let replaced = match state
                .devices
                .iter_mut()
                .find(|d| d.is_key(&device.name, &device.greenhouse_name))
            {
                Some(existing) => {
                    *existing = device;
                    true
                },
                None => {
                    state.devices.push(device);
                    false
                },
            };
            (replaced, state.devices.clone())
        };
        self.persist_devices(&snapshot).await?;
        Ok(replaced)
    }

    pub async fn remove_device(&self, name: &str, greenhouse_name: &str) -> Result<Device> {
        let _gate = self.write_gate.lock().await;
        let (removed, snapshot) = {
            let mut state = self.state.write();
            let idx = state
                .devices
                .iter()
                .position(|d| d.is_key(name, greenhouse_name))
                .ok_or_else(|| StoreError::device_not_found(name, greenhouse_name))?;
            let removed = state.devices.remove(idx);
            (removed, state.devices.clone())
        };
        info!("Device removed: {} in {}", name, greenhouse_name);
        self.persist_devices(&snapshot).await?;
        Ok(removed)
    }

    pub async fn rename_device(
        &self,
        name: &str,
        greenhouse_name: &str,
        new_name: &str,
    ) -> Result<Device> {
        validate_name(new_name)?;
        if name == new_name {
            return self
                .device(name, greenhouse_name)
                .ok_or_else(|| StoreError::device_not_found(name, greenhouse_name));
        }
        let _gate = self.write_gate.lock().await;
        let (renamed, snapshot) = {
            let mut state = self.state.write();
            if state.devices.iter().any(|d| d.is_key(new_name, greenhouse_name)) {
                return Err(StoreError::AlreadyExists(format!(
                    "device '{}' in '{}'",
                    new_name, greenhouse_name
                )));
            }
            let device = state
                .devices
                .iter_mut()
                .find(|d| d.is_key(name, greenhouse_name))
                .ok_or_else(|| StoreError::device_not_found(name, greenhouse_name))?;
            device.name = new_name.to_string();
            (device.clone(), state.devices.clone())
        };
        info!("Device renamed: {} -> {} in {}", name, new_name, greenhouse_name);
        self.persist_devices(&snapshot).await?;
        Ok(renamed)
    }

    /// Record a new on/off state, with the light timestamp rule the caller chose
    pub async fn set_device_state(
        &self,
        name: &str,
        greenhouse_name: &str,
        is_on: bool,
        light_on_time: LightStamp,
    ) -> Result<Device> {
        self.modify(name, greenhouse_name, |device| {
            device.is_on = is_on;
            light_on_time.apply(&mut device.light_on_time);
        })
        .await
    }

    /// Change the on/off state in memory only; follow with [`Self::save_devices`]
    pub fn stage_device_state(
        &self,
        name: &str,
        greenhouse_name: &str,
        is_on: bool,
        light_on_time: LightStamp,
    ) -> Result<Device> {
        let mut state = self.state.write();
        let device = state
            .devices
            .iter_mut()
            .find(|d| d.is_key(name, greenhouse_name))
            .ok_or_else(|| StoreError::device_not_found(name, greenhouse_name))?;
        device.is_on = is_on;
        light_on_time.apply(&mut device.light_on_time);
        debug!("Device {} in {} staged: on={}", name, greenhouse_name, is_on);
        Ok(device.clone())
    }

    /// Persist the device collection as it is in memory now
    pub async fn save_devices(&self) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        let snapshot = self.state.read().devices.clone();
        self.persist_devices(&snapshot).await
    }

    pub async fn set_auto(&self, name: &str, greenhouse_name: &str, is_auto: bool) -> Result<Device> {
        self.modify(name, greenhouse_name, |device| device.is_auto = is_auto)
            .await
    }

    /// Apply `change` to a copy, validate it, then store it
    ///
    /// The device key cannot be changed this way; use [`Self::rename_device`].
    pub async fn update_device<F>(&self, name: &str, greenhouse_name: &str, change: F) -> Result<Device>
    where
        F: FnOnce(&mut Device),
    {
        let _gate = self.write_gate.lock().await;
        let (updated, snapshot) = {
            let mut state = self.state.write();
            let slot = state
                .devices
                .iter_mut()
                .find(|d| d.is_key(name, greenhouse_name))
                .ok_or_else(|| StoreError::device_not_found(name, greenhouse_name))?;
            let mut candidate = slot.clone();
            change(&mut candidate);
            if !candidate.is_key(name, greenhouse_name) {
                return Err(StoreError::Validation(
                    "device key cannot change in an update".to_string(),
                ));
            }
            candidate.validate()?;
            *slot = candidate.clone();
            (candidate, state.devices.clone())
        };
        self.persist_devices(&snapshot).await?;
        Ok(updated)
    }

    // State changes skip trigger validation so devices loaded without a
    // trigger can still be switched manually
    async fn modify<F>(&self, name: &str, greenhouse_name: &str, change: F) -> Result<Device>
    where
        F: FnOnce(&mut Device),
    {
        let _gate = self.write_gate.lock().await;
        let (updated, snapshot) = {
            let mut state = self.state.write();
            let device = state
                .devices
                .iter_mut()
                .find(|d| d.is_key(name, greenhouse_name))
                .ok_or_else(|| StoreError::device_not_found(name, greenhouse_name))?;
            change(device);
            (device.clone(), state.devices.clone())
        };
        debug!(
            "Device {} in {}: on={} auto={}",
            name, greenhouse_name, updated.is_on, updated.is_auto
        );
        self.persist_devices(&snapshot).await?;
        Ok(updated)
    }

    fn require_greenhouse(state: &RegistryState, name: &str) -> Result<()> {
        if state.greenhouses.iter().any(|g| g.name == name) {
            Ok(())
        } else {
            Err(StoreError::GreenhouseNotFound(name.to_string()))
        }
    }

    async fn persist_devices(&self, snapshot: &[Device]) -> Result<()> {
        self.backend.save_devices(snapshot).await.map_err(|e| {
            error!("Device save failed: {}", e);
            as_persistence(e)
        })
    }

    async fn persist_greenhouses(&self, snapshot: &[Greenhouse]) -> Result<()> {
        self.backend.save_greenhouses(snapshot).await.map_err(|e| {
            error!("Greenhouse save failed: {}", e);
            as_persistence(e)
        })
    }
}

// Serialization failures during a save are still persistence failures for callers
fn as_persistence(err: StoreError) -> StoreError {
    match err {
        StoreError::Persistence(_) => err,
        other => StoreError::Persistence(other.to_string()),
    }
}
