//! Presentation-layer callbacks

use greenhouse_model::SensorSample;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// Receives automation and collection events
///
/// All methods default to no-ops so an observer only implements what it
/// shows.
pub trait Notifier: Send + Sync {
    /// Device list or state of a greenhouse changed
    fn devices_changed(&self, _greenhouse: &str) {}

    /// A command could not be delivered or persisted
    fn alert(&self, _greenhouse: &str, _message: &str) {}

    /// Fresh reading of the attended greenhouse
    fn live_reading(&self, _sample: &SensorSample) {}
}

/// Logs every event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn devices_changed(&self, greenhouse: &str) {
        info!("Devices changed: {}", greenhouse);
    }

    fn alert(&self, greenhouse: &str, message: &str) {
        warn!("Alert {}: {}", greenhouse, message);
    }

    fn live_reading(&self, sample: &SensorSample) {
        debug!(
            "Live {}: connected={} t={} h={} co2={} soil={}",
            sample.greenhouse_name,
            sample.connected,
            sample.temperature,
            sample.humidity,
            sample.co2,
            sample.soil_moisture
        );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotifierEvent {
    DevicesChanged(String),
    Alert { greenhouse: String, message: String },
    LiveReading(SensorSample),
}

/// Keeps events in order for assertions
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotifierEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NotifierEvent> {
        self.events.lock().clone()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                NotifierEvent::Alert { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn devices_changed(&self, greenhouse: &str) {
        self.events
            .lock()
            .push(NotifierEvent::DevicesChanged(greenhouse.to_string()));
    }

    fn alert(&self, greenhouse: &str, message: &str) {
        self.events.lock().push(NotifierEvent::Alert {
            greenhouse: greenhouse.to_string(),
            message: message.to_string(),
        });
    }

    fn live_reading(&self, sample: &SensorSample) {
        self.events
            .lock()
            .push(NotifierEvent::LiveReading(sample.clone()));
    }
}
