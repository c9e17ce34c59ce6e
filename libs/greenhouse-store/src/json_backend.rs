//! File-backed persistence
//!
//! Layout under the data directory:
//! - `greenhouses.json`: pretty JSON array, replaced atomically
//! - `devices.json`: pretty JSON array, replaced atomically
//! - `sensor_data.jsonl`: one sample per line, append only

use std::path::PathBuf;

use async_trait::async_trait;
use greenhouse_model::{Device, Greenhouse, SensorSample};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::backend::StateBackend;
use crate::error::{Result, StoreError};

pub const GREENHOUSES_FILE: &str = "greenhouses.json";
pub const DEVICES_FILE: &str = "devices.json";
pub const SAMPLES_FILE: &str = "sensor_data.jsonl";

#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    /// Create the data directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| {
            StoreError::Persistence(format!("create {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Missing, empty or corrupt files load as an empty list
    async fn load_list<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        let path = self.path(file);
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Persistence(format!(
                    "read {}: {}",
                    path.display(),
                    e
                )))
            },
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str(&text) {
            Ok(items) => Ok(items),
            Err(e) => {
                warn!("Corrupt {}, starting empty: {}", path.display(), e);
                Ok(Vec::new())
            },
        }
    }

    /// Write to a sibling temp file, then rename over the target
    async fn save_list<T: Serialize + Sync>(&self, file: &str, items: &[T]) -> Result<()> {
        let path = self.path(file);
        let tmp = self.path(&format!("{}.tmp", file));
        let json = serde_json::to_vec_pretty(items)?;

        fs::write(&tmp, &json)
            .await
            .map_err(|e| StoreError::Persistence(format!("write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::Persistence(format!("replace {}: {}", path.display(), e)))?;

        debug!("Saved {} items to {}", items.len(), path.display());
        Ok(())
    }
}

#[async_trait]
impl StateBackend for JsonFileBackend {
    async fn load_greenhouses(&self) -> Result<Vec<Greenhouse>> {
        self.load_list(GREENHOUSES_FILE).await
    }

    async fn save_greenhouses(&self, greenhouses: &[Greenhouse]) -> Result<()> {
        self.save_list(GREENHOUSES_FILE, greenhouses).await
    }

    async fn load_devices(&self) -> Result<Vec<Device>> {
        self.load_list(DEVICES_FILE).await
    }

    async fn save_devices(&self, devices: &[Device]) -> Result<()> {
        self.save_list(DEVICES_FILE, devices).await
    }

    async fn load_samples(&self) -> Result<Vec<SensorSample>> {
        let path = self.path(SAMPLES_FILE);
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Persistence(format!(
                    "read {}: {}",
                    path.display(),
                    e
                )))
            },
        };

        let mut samples = Vec::new();
        let mut skipped = 0usize;
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<SensorSample>(line) {
                Ok(sample) => samples.push(sample),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!("Skipped {} malformed lines in {}", skipped, path.display());
        }
        Ok(samples)
    }

    async fn append_samples(&self, samples: &[SensorSample]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        let mut buf = Vec::new();
        for sample in samples {
            serde_json::to_writer(&mut buf, sample)?;
            buf.push(b'\n');
        }

        let path = self.path(SAMPLES_FILE);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::Persistence(format!("open {}: {}", path.display(), e)))?;
        file.write_all(&buf)
            .await
            .map_err(|e| StoreError::Persistence(format!("append {}: {}", path.display(), e)))?;
        file.flush().await?;
        Ok(())
    }
}
