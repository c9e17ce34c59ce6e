//! Service wiring and lifecycle
//!
//! ```text
//! ┌──────────────┐   2s   ┌──────────────────┐
//! │              │───────▶│ AutomationEngine │──┐
//! │              │        └──────────────────┘  │
//! │  Scheduler   │  60s   ┌──────────────────┐  │   ┌───────────┐
//! │              │───────▶│ Collector (all)  │──┼──▶│ FieldBus  │
//! │              │   2s   ┌──────────────────┐  │   └───────────┘
//! │              │───────▶│ Collector (live) │──┘
//! └──────────────┘        └──────────────────┘
//! ```
//!
//! All three share one [`SerializedBus`], so a greenhouse node never sees two
//! Modbus sessions at once. Live refresh skips its tick while a collection runs.

use std::path::Path;
use std::sync::Arc;

use common::{Clock, SystemClock};
use greenhouse_modbus::{FieldBus, ModbusTcpTransport, SerializedBus};
use greenhouse_rules::{AutomationEngine, Notifier, TracingNotifier};
use greenhouse_store::{JsonFileBackend, Registry, SensorStore, StateBackend};
use tracing::{info, warn};

use crate::collector::Collector;
use crate::config::ClimsrvConfig;
use crate::controller::GreenhouseController;
use crate::error::Result;
use crate::scheduler::{ActivityStatus, Scheduler};

pub struct ClimateService {
    config: ClimsrvConfig,
    samples: Arc<SensorStore>,
    engine: Arc<AutomationEngine>,
    collector: Arc<Collector>,
    controller: Arc<GreenhouseController>,
    scheduler: Scheduler,
}

impl ClimateService {
    /// Production wiring: JSON files under `data_dir`, Modbus TCP, wall clock
    pub async fn open(config: ClimsrvConfig) -> Result<Self> {
        let backend = Arc::new(JsonFileBackend::open(&config.data_dir).await?);
        let bus = Arc::new(
            ModbusTcpTransport::new(config.modbus.timeouts()).with_unit_id(config.modbus.unit_id),
        );
        Self::with_parts(
            config,
            backend,
            bus,
            Arc::new(TracingNotifier),
            Arc::new(SystemClock),
        )
        .await
    }

    pub async fn with_parts(
        config: ClimsrvConfig,
        backend: Arc<dyn StateBackend>,
        bus: Arc<dyn FieldBus>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let bus: Arc<dyn FieldBus> = Arc::new(SerializedBus::new(bus));
        let registry = Arc::new(Registry::open(backend.clone()).await?);
        let samples = Arc::new(SensorStore::open(backend, config.day_boundary()).await?);

        let engine = Arc::new(AutomationEngine::new(
            registry.clone(),
            samples.clone(),
            bus.clone(),
            notifier.clone(),
            clock.clone(),
        ));
        let collector = Arc::new(Collector::new(
            registry.clone(),
            samples.clone(),
            bus.clone(),
            notifier.clone(),
            clock.clone(),
        ));
        let controller = Arc::new(GreenhouseController::new(
            registry,
            samples.clone(),
            bus,
            notifier,
            clock,
            collector.clone(),
        ));

        Ok(Self {
            config,
            samples,
            engine,
            collector,
            controller,
            scheduler: Scheduler::new(),
        })
    }

    pub fn controller(&self) -> Arc<GreenhouseController> {
        self.controller.clone()
    }

    pub fn collector(&self) -> Arc<Collector> {
        self.collector.clone()
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Probe greenhouses, pick the attended one and start the tick loops
    pub async fn start(&self) {
        let connected = self.controller.refresh_connections().await;
        info!("Connected at startup: {:?}", connected);

        if let Some(name) = &self.config.automation.greenhouse {
            if let Err(e) = self.controller.select_greenhouse(name) {
                warn!("Attended greenhouse unavailable: {}", e);
            }
        }

        let engine = self.engine.clone();
        let controller = self.controller.clone();
        self.scheduler
            .on_tick("automation", self.config.scheduler.automation(), move || {
                let engine = engine.clone();
                let attended = controller.attended();
                async move {
                    if let Some(name) = attended {
                        engine.evaluate(&name).await;
                    }
                }
            });

        let collector = self.collector.clone();
        self.scheduler
            .on_tick("collection", self.config.scheduler.collection(), move || {
                let collector = collector.clone();
                async move {
                    collector.collect_all().await;
                }
            });

        let collector = self.collector.clone();
        let controller = self.controller.clone();
        self.scheduler.on_tick_yielding(
            "live",
            self.config.scheduler.live(),
            "collection",
            move || {
                let collector = collector.clone();
                let attended = controller.attended();
                async move {
                    if let Some(name) = attended {
                        collector.refresh_live(&name).await;
                    }
                }
            },
        );
    }

    pub fn status(&self) -> Vec<ActivityStatus> {
        self.scheduler.status()
    }

    /// Stop ticking and write out buffered samples
    pub async fn shutdown(&self) {
        self.scheduler.stop();
        self.scheduler.join().await;
        match self.samples.flush().await {
            Ok(n) => info!("Flushed {} samples on shutdown", n),
            Err(e) => warn!("Final flush failed: {}", e),
        }
    }
}
