//! Automation engine against an in-memory bus, registry and clock

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::ManualClock;
use greenhouse_model::{Device, DeviceKind, Greenhouse, SensorSample};
use greenhouse_modbus::testing::{ScriptedFieldBus, WriteValue};
use greenhouse_modbus::{CoilState, ValveAngle};
use greenhouse_rules::{AutomationEngine, NotifierEvent, RecordingNotifier, SkipReason};
use greenhouse_store::{DayBoundary, MemoryBackend, Registry, SensorStore};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()
}

fn reading(temperature: f64, soil_moisture: f64, at: DateTime<Utc>) -> SensorSample {
    SensorSample {
        timestamp: at,
        greenhouse_name: "North".to_string(),
        temperature,
        humidity: 55,
        soil_moisture,
        co2: 420,
        connected: true,
    }
}

struct Rig {
    engine: AutomationEngine,
    registry: Arc<Registry>,
    samples: Arc<SensorStore>,
    bus: Arc<ScriptedFieldBus>,
    notifier: Arc<RecordingNotifier>,
    clock: Arc<ManualClock>,
    backend: Arc<MemoryBackend>,
}

impl Rig {
    async fn new(devices: Vec<Device>) -> Self {
        let backend = Arc::new(MemoryBackend::with_state(
            vec![
                Greenhouse::new("North", "10.0.0.5", 502),
                Greenhouse::new("South", "10.0.0.6", 502),
            ],
            devices,
        ));
        let registry = Arc::new(Registry::open(backend.clone()).await.unwrap());
        let samples = Arc::new(
            SensorStore::open(backend.clone(), DayBoundary::utc())
                .await
                .unwrap(),
        );
        let bus = Arc::new(ScriptedFieldBus::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let engine = AutomationEngine::new(
            registry.clone(),
            samples.clone(),
            bus.clone(),
            notifier.clone(),
            clock.clone(),
        );
        Self {
            engine,
            registry,
            samples,
            bus,
            notifier,
            clock,
            backend,
        }
    }

    fn is_on(&self, name: &str) -> bool {
        self.registry.device(name, "North").unwrap().is_on
    }
}

#[tokio::test]
async fn test_ventilation_end_to_end_hysteresis() {
    let rig = Rig::new(vec![
        Device::new("Vent", DeviceKind::Ventilation, 3, "North").with_auto(true)
    ])
    .await;

    let mut states = Vec::new();
    for (i, t) in [24.0, 25.2, 24.8, 24.4].into_iter().enumerate() {
        let at = t0() + Duration::seconds(2 * i as i64);
        rig.clock.set(at);
        rig.samples.append(reading(t, 50.0, at));
        rig.engine.evaluate("North").await;
        states.push(rig.is_on("Vent"));
    }
    assert_eq!(states, vec![false, true, true, false]);

    let angles: Vec<WriteValue> = rig.bus.writes().into_iter().map(|w| w.value).collect();
    assert_eq!(
        angles,
        vec![
            WriteValue::Angle(ValveAngle::Open),
            WriteValue::Angle(ValveAngle::Closed)
        ]
    );
    assert_eq!(rig.backend.device_save_count(), 2);
}

#[tokio::test]
async fn test_door_tracks_soil_and_acts_only_on_change() {
    let rig = Rig::new(vec![
        Device::new("Door", DeviceKind::Door, 5, "North").with_auto(true)
    ])
    .await;

    rig.samples.append(reading(20.0, 30.0, t0()));
    let report = rig.engine.evaluate("North").await;
    assert_eq!(report.changes.len(), 1);
    assert!(rig.is_on("Door"));

    // still dry: nothing to do
    let report = rig.engine.evaluate("North").await;
    assert!(report.changes.is_empty());
    assert_eq!(rig.bus.writes().len(), 1);

    rig.samples
        .append(reading(20.0, 45.0, t0() + Duration::minutes(1)));
    rig.engine.evaluate("North").await;
    assert!(!rig.is_on("Door"));
    assert_eq!(rig.bus.writes()[1].address, 5);
}

#[tokio::test]
async fn test_light_cycle_through_engine() {
    let rig = Rig::new(vec![
        Device::new("Lamp", DeviceKind::Light, 2, "North").with_auto(true)
    ])
    .await;
    rig.samples.append(reading(20.0, 50.0, t0()));

    rig.engine.evaluate("North").await;
    let lamp = rig.registry.device("Lamp", "North").unwrap();
    assert!(lamp.is_on);
    assert_eq!(lamp.light_on_time, Some(t0()));

    rig.clock.set(t0() + Duration::hours(12));
    rig.engine.evaluate("North").await;
    let lamp = rig.registry.device("Lamp", "North").unwrap();
    assert!(!lamp.is_on);
    assert_eq!(lamp.light_on_time, Some(t0()));

    rig.clock.set(t0() + Duration::hours(24));
    rig.engine.evaluate("North").await;
    let lamp = rig.registry.device("Lamp", "North").unwrap();
    assert!(lamp.is_on);
    assert_eq!(lamp.light_on_time, Some(t0() + Duration::hours(24)));

    let coils: Vec<WriteValue> = rig.bus.writes().into_iter().map(|w| w.value).collect();
    assert_eq!(
        coils,
        vec![
            WriteValue::Coil(CoilState::On),
            WriteValue::Coil(CoilState::Off),
            WriteValue::Coil(CoilState::On)
        ]
    );
}

#[tokio::test]
async fn test_offline_sample_is_ignored() {
    let rig = Rig::new(vec![
        Device::new("Vent", DeviceKind::Ventilation, 3, "North").with_auto(true)
    ])
    .await;

    let report = rig.engine.evaluate("North").await;
    assert_eq!(report.skipped, Some(SkipReason::NoConnectedSample));

    rig.samples.append(reading(30.0, 50.0, t0()));
    rig.samples
        .append(SensorSample::offline("North", t0() + Duration::minutes(1)));
    // the older connected reading still drives the decision
    let report = rig.engine.evaluate("North").await;
    assert_eq!(report.changes.len(), 1);
    assert!(rig.is_on("Vent"));
}

#[tokio::test]
async fn test_manual_devices_and_other_greenhouses_untouched() {
    let rig = Rig::new(vec![
        Device::new("Vent", DeviceKind::Ventilation, 3, "North"),
        Device::new("Vent", DeviceKind::Ventilation, 3, "South").with_auto(true),
    ])
    .await;
    rig.samples.append(reading(35.0, 50.0, t0()));

    let report = rig.engine.evaluate("North").await;
    assert!(!report.is_skipped());
    assert!(report.changes.is_empty());
    assert!(rig.bus.writes().is_empty());
    assert!(!rig.registry.device("Vent", "South").unwrap().is_on);

    let report = rig.engine.evaluate("West").await;
    assert_eq!(report.skipped, Some(SkipReason::UnknownGreenhouse));
}

#[tokio::test]
async fn test_field_written_before_state_is_saved() {
    let rig = Rig::new(vec![
        Device::new("Vent", DeviceKind::Ventilation, 3, "North").with_auto(true),
        Device::new("Lamp", DeviceKind::Light, 4, "North").with_auto(true),
    ])
    .await;
    let saves_at_write = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let seen = saves_at_write.clone();
    let backend = rig.backend.clone();
    rig.bus
        .set_write_hook(move |_| seen.lock().push(backend.device_save_count()));
    rig.samples.append(reading(30.0, 50.0, t0()));

    let report = rig.engine.evaluate("North").await;
    assert_eq!(report.changes.len(), 2);
    assert!(report.changes.iter().all(|c| c.persisted && c.delivered));

    // each write lands before the save that records it
    assert_eq!(*saves_at_write.lock(), vec![0, 1]);
    assert_eq!(rig.backend.device_save_count(), 2);
    assert!(rig.backend.saved_devices().iter().all(|d| d.is_on));
}

#[tokio::test]
async fn test_persistence_failure_still_drives_field_and_alerts() {
    let rig = Rig::new(vec![
        Device::new("Vent", DeviceKind::Ventilation, 3, "North").with_auto(true)
    ])
    .await;
    rig.backend.set_fail_writes(true);
    rig.samples.append(reading(30.0, 50.0, t0()));

    let report = rig.engine.evaluate("North").await;
    let change = &report.changes[0];
    assert!(change.is_on);
    assert!(!change.persisted);
    assert!(change.delivered);

    assert!(rig.is_on("Vent"));
    assert_eq!(rig.bus.writes().len(), 1);
    assert_eq!(rig.notifier.alerts().len(), 1);
    assert_eq!(
        rig.notifier.events().last(),
        Some(&NotifierEvent::DevicesChanged("North".to_string()))
    );
}

#[tokio::test]
async fn test_offline_node_write_failure_keeps_commanded_state() {
    let rig = Rig::new(vec![
        Device::new("Door", DeviceKind::Door, 5, "North").with_auto(true)
    ])
    .await;
    rig.bus.set_offline("10.0.0.5", true);
    rig.samples.append(reading(20.0, 10.0, t0()));

    let report = rig.engine.evaluate("North").await;
    assert!(!report.changes[0].delivered);
    assert!(rig.is_on("Door"));
    assert!(rig.backend.saved_devices()[0].is_on);
    assert!(rig.notifier.alerts()[0].contains("Could not switch Door on"));

    // next tick sees the commanded state and holds
    rig.bus.set_offline("10.0.0.5", false);
    let report = rig.engine.evaluate("North").await;
    assert!(report.changes.is_empty());
}
