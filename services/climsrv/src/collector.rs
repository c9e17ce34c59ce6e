//! Sensor collection and connectivity tracking
//!
//! One FC03 read of four registers per greenhouse. Any failure becomes an
//! offline sample so every collection attempt leaves exactly one point in
//! the history.

use std::collections::BTreeSet;
use std::sync::Arc;

use common::Clock;
use futures::future::join_all;
use greenhouse_model::{Greenhouse, SensorSample, SENSOR_REGISTER_COUNT};
use greenhouse_modbus::FieldBus;
use greenhouse_rules::{endpoint_of, Notifier};
use greenhouse_store::{Registry, SensorStore};
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{ControlError, Result};

/// First sensor register
const SENSOR_START_ADDRESS: u16 = 0;

pub struct Collector {
    registry: Arc<Registry>,
    samples: Arc<SensorStore>,
    bus: Arc<dyn FieldBus>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    connected: RwLock<BTreeSet<String>>,
}

impl Collector {
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
            connected: RwLock::new(BTreeSet::new()),
        }
    }

    /// Read the sensor block once; never fails
    pub async fn read_sample(&self, greenhouse: &Greenhouse) -> SensorSample {
        let endpoint = endpoint_of(greenhouse);
        let result = self
            .bus
            .read_registers(&endpoint, SENSOR_START_ADDRESS, SENSOR_REGISTER_COUNT)
            .await;
        let now = self.clock.now();

        match result {
            Ok(registers) => match SensorSample::from_registers(&greenhouse.name, now, &registers) {
                Ok(sample) => sample,
                Err(e) => {
                    warn!("{}: bad sensor block: {}", greenhouse.name, e);
                    SensorSample::offline(&greenhouse.name, now)
                },
            },
            Err(e) => {
                warn!("{}: read failed: {}", greenhouse.name, e);
                SensorSample::offline(&greenhouse.name, now)
            },
        }
    }

    /// Read one greenhouse and append the sample
    pub async fn collect_greenhouse(&self, name: &str) -> Option<SensorSample> {
        let Some(greenhouse) = self.registry.greenhouse(name) else {
            warn!("Collect: unknown greenhouse {}", name);
            return None;
        };
        let sample = self.read_sample(&greenhouse).await;
        self.samples.append(sample.clone());
        Some(sample)
    }

    /// Collect every connected greenhouse concurrently, then flush
    ///
    /// Returns the number of samples appended.
    pub async fn collect_all(&self) -> usize {
        let names = self.connected();
        if names.is_empty() {
            debug!("Collect: no connected greenhouses");
            return 0;
        }

        let collected = join_all(names.iter().map(|name| self.collect_greenhouse(name)))
            .await
            .into_iter()
            .flatten()
            .count();

        if let Err(e) = self.samples.flush().await {
            error!("Collect: flush failed, retry next tick: {}", e);
        }
        debug!("Collect: {} samples", collected);
        collected
    }

    /// Read the attended greenhouse for display only
    pub async fn refresh_live(&self, name: &str) -> Option<SensorSample> {
        let greenhouse = self.registry.greenhouse(name)?;
        let sample = self.read_sample(&greenhouse).await;
        self.notifier.live_reading(&sample);
        Some(sample)
    }

    pub async fn probe(&self, greenhouse: &Greenhouse) -> bool {
        match self.bus.probe(&endpoint_of(greenhouse)).await {
            Ok(()) => true,
            Err(e) => {
                debug!("Probe {} failed: {}", greenhouse.name, e);
                false
            },
        }
    }

    /// Probe every registered greenhouse and rebuild the connected set
    pub async fn refresh_connections(&self) -> Vec<String> {
        let greenhouses = self.registry.list_greenhouses();
        let results = join_all(greenhouses.iter().map(|g| self.probe(g))).await;

        let connected: BTreeSet<String> = greenhouses
            .into_iter()
            .zip(results)
            .filter_map(|(g, ok)| ok.then_some(g.name))
            .collect();
        info!("Connected greenhouses: {}", connected.len());
        *self.connected.write() = connected.clone();
        connected.into_iter().collect()
    }

    /// Probe one greenhouse and add or drop it from the connected set
    pub async fn connect_greenhouse(&self, name: &str) -> Result<bool> {
        let greenhouse = self
            .registry
            .greenhouse(name)
            .ok_or_else(|| ControlError::GreenhouseNotFound(name.to_string()))?;

        let reachable = self.probe(&greenhouse).await;
        let mut connected = self.connected.write();
        if reachable {
            connected.insert(greenhouse.name);
        } else {
            connected.remove(&greenhouse.name);
        }
        Ok(reachable)
    }

    pub fn disconnect(&self, name: &str) {
        self.connected.write().remove(name);
    }

    pub fn connected(&self) -> Vec<String> {
        self.connected.read().iter().cloned().collect()
    }

    pub fn is_connected(&self, name: &str) -> bool {
        self.connected.read().contains(name)
    }
}
