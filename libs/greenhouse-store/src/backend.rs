//! Persistence seam
//!
//! The registry and sensor store only see this trait. Collections are
//! always saved whole; samples are appended.

use async_trait::async_trait;
use greenhouse_model::{Device, Greenhouse, SensorSample};

use crate::error::Result;

#[async_trait]
pub trait StateBackend: Send + Sync + 'static {
    async fn load_greenhouses(&self) -> Result<Vec<Greenhouse>>;

    async fn save_greenhouses(&self, greenhouses: &[Greenhouse]) -> Result<()>;

    async fn load_devices(&self) -> Result<Vec<Device>>;

    async fn save_devices(&self, devices: &[Device]) -> Result<()>;

    async fn load_samples(&self) -> Result<Vec<SensorSample>>;

    async fn append_samples(&self, samples: &[SensorSample]) -> Result<()>;
}
