//! In-memory backend for tests and dry runs

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use greenhouse_model::{Device, Greenhouse, SensorSample};
use parking_lot::Mutex;

use crate::backend::StateBackend;
use crate::error::{Result, StoreError};

#[derive(Default)]
pub struct MemoryBackend {
    greenhouses: Mutex<Vec<Greenhouse>>,
    devices: Mutex<Vec<Device>>,
    samples: Mutex<Vec<SensorSample>>,
    fail_writes: AtomicBool,
    device_saves: AtomicUsize,
    greenhouse_saves: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated backend
    pub fn with_state(greenhouses: Vec<Greenhouse>, devices: Vec<Device>) -> Self {
        let backend = Self::default();
        *backend.greenhouses.lock() = greenhouses;
        *backend.devices.lock() = devices;
        backend
    }

    /// Make every save/append fail with a persistence error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn saved_devices(&self) -> Vec<Device> {
        self.devices.lock().clone()
    }

    pub fn saved_greenhouses(&self) -> Vec<Greenhouse> {
        self.greenhouses.lock().clone()
    }

    pub fn saved_samples(&self) -> Vec<SensorSample> {
        self.samples.lock().clone()
    }

    pub fn device_save_count(&self) -> usize {
        self.device_saves.load(Ordering::SeqCst)
    }

    pub fn greenhouse_save_count(&self) -> usize {
        self.greenhouse_saves.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Persistence("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StateBackend for MemoryBackend {
    async fn load_greenhouses(&self) -> Result<Vec<Greenhouse>> {
        Ok(self.greenhouses.lock().clone())
    }

    async fn save_greenhouses(&self, greenhouses: &[Greenhouse]) -> Result<()> {
        self.check_writable()?;
        *self.greenhouses.lock() = greenhouses.to_vec();
        self.greenhouse_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_devices(&self) -> Result<Vec<Device>> {
        Ok(self.devices.lock().clone())
    }

    async fn save_devices(&self, devices: &[Device]) -> Result<()> {
        self.check_writable()?;
        *self.devices.lock() = devices.to_vec();
        self.device_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_samples(&self) -> Result<Vec<SensorSample>> {
        Ok(self.samples.lock().clone())
    }

    async fn append_samples(&self, samples: &[SensorSample]) -> Result<()> {
        self.check_writable()?;
        self.samples.lock().extend_from_slice(samples);
        Ok(())
    }
}
