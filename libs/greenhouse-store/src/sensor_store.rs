//! Append-only sensor time series
//!
//! Samples are appended in memory and written to the backend on `flush`.
//! Offline samples are kept for history but never returned as a latest
//! connected reading.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use greenhouse_model::{HistoryPeriod, SensorSample};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::aggregate::{aggregate_daily, DayBoundary};
use crate::backend::StateBackend;
use crate::error::Result;

#[derive(Debug, Default)]
struct Series {
    samples: Vec<SensorSample>,
    /// Prefix of `samples` already on the backend
    flushed: usize,
}

pub struct SensorStore {
    series: RwLock<Series>,
    flush_lock: Mutex<()>,
    backend: Arc<dyn StateBackend>,
    day_boundary: DayBoundary,
}

impl SensorStore {
    pub async fn open(backend: Arc<dyn StateBackend>, day_boundary: DayBoundary) -> Result<Self> {
        let samples = backend.load_samples().await?;
        info!("Sensor store: {} samples", samples.len());
        let flushed = samples.len();
        Ok(Self {
            series: RwLock::new(Series { samples, flushed }),
            flush_lock: Mutex::new(()),
            backend,
            day_boundary,
        })
    }

    pub fn day_boundary(&self) -> DayBoundary {
        self.day_boundary
    }

    pub fn append(&self, sample: SensorSample) {
        debug!(
            "Sample {}: connected={} t={} soil={}",
            sample.greenhouse_name, sample.connected, sample.temperature, sample.soil_moisture
        );
        self.series.write().samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.series.read().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples appended but not yet on the backend
    pub fn pending(&self) -> usize {
        let series = self.series.read();
        series.samples.len() - series.flushed
    }

    /// Write unflushed samples to the backend; returns how many were written
    ///
    /// On failure the samples stay pending and are retried on the next flush.
    pub async fn flush(&self) -> Result<usize> {
        let _guard = self.flush_lock.lock().await;
        let (start, batch) = {
            let series = self.series.read();
            (series.flushed, series.samples[series.flushed..].to_vec())
        };
        if batch.is_empty() {
            return Ok(0);
        }

        if let Err(e) = self.backend.append_samples(&batch).await {
            error!("Sample flush failed ({} pending): {}", batch.len(), e);
            return Err(e);
        }

        let mut series = self.series.write();
        series.flushed = start + batch.len();
        debug!("Flushed {} samples", batch.len());
        Ok(batch.len())
    }

    /// Most recent connected sample of a greenhouse, by timestamp
    pub fn latest_connected(&self, greenhouse_name: &str) -> Option<SensorSample> {
        self.series
            .read()
            .samples
            .iter()
            .filter(|s| s.connected && s.greenhouse_name == greenhouse_name)
            .max_by_key(|s| s.timestamp)
            .cloned()
    }

    /// Most recent sample of a greenhouse, connected or not
    pub fn latest(&self, greenhouse_name: &str) -> Option<SensorSample> {
        self.series
            .read()
            .samples
            .iter()
            .filter(|s| s.greenhouse_name == greenhouse_name)
            .max_by_key(|s| s.timestamp)
            .cloned()
    }

    /// Samples with timestamp in `[now - period, now]`, ascending
    pub fn windowed(
        &self,
        greenhouse_name: &str,
        period: HistoryPeriod,
        now: DateTime<Utc>,
    ) -> Vec<SensorSample> {
        let from = now - period.duration();
        let mut window: Vec<SensorSample> = self
            .series
            .read()
            .samples
            .iter()
            .filter(|s| {
                s.greenhouse_name == greenhouse_name && s.timestamp >= from && s.timestamp <= now
            })
            .cloned()
            .collect();
        window.sort_by_key(|s| s.timestamp);
        window
    }

    /// Raw points for a day, daily buckets for a week or month
    pub fn history(
        &self,
        greenhouse_name: &str,
        period: HistoryPeriod,
        now: DateTime<Utc>,
    ) -> Vec<SensorSample> {
        let window = self.windowed(greenhouse_name, period, now);
        if period.is_aggregated() {
            aggregate_daily(&window, self.day_boundary)
        } else {
            window
        }
    }
}
