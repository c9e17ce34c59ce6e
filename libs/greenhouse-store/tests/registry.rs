//! Integration tests for registry mutations and persistence
//!
//! Uses the in-memory backend for failure injection and a temp directory
//! for the file backend.

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use greenhouse_model::{Device, DeviceKind, Greenhouse, LightStamp};
use greenhouse_store::{JsonFileBackend, MemoryBackend, Registry, StoreError};

async fn registry_with(backend: Arc<MemoryBackend>) -> Registry {
    Registry::open(backend).await.unwrap()
}

fn seeded_backend() -> Arc<MemoryBackend> {
    Arc::new(MemoryBackend::with_state(
        vec![
            Greenhouse::new("North", "10.0.0.5", 502),
            Greenhouse::new("South", "10.0.0.6", 502),
        ],
        vec![
            Device::new("Vent", DeviceKind::Ventilation, 1, "North"),
            Device::new("Lamp", DeviceKind::Light, 2, "North"),
            Device::new("Vent", DeviceKind::Ventilation, 1, "South"),
        ],
    ))
}

#[tokio::test]
async fn test_list_devices_filters_by_greenhouse() {
    let registry = registry_with(seeded_backend()).await;
    let north: Vec<String> = registry
        .list_devices("North")
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(north, vec!["Vent", "Lamp"]);
    assert_eq!(registry.list_devices("South").len(), 1);
    assert!(registry.list_devices("Nowhere").is_empty());
}

#[tokio::test]
async fn test_add_device_persists_full_collection() {
    let backend = seeded_backend();
    let registry = registry_with(backend.clone()).await;

    registry
        .add_device(Device::new("Door", DeviceKind::Door, 3, "North"))
        .await
        .unwrap();

    assert_eq!(backend.device_save_count(), 1);
    assert_eq!(backend.saved_devices().len(), 4);
    assert!(registry.device("Door", "North").is_some());
}

#[tokio::test]
async fn test_add_device_rejects_duplicates_and_unknown_greenhouse() {
    let registry = registry_with(seeded_backend()).await;

    let dup = registry
        .add_device(Device::new("Vent", DeviceKind::Ventilation, 9, "North"))
        .await;
    assert!(matches!(dup, Err(StoreError::AlreadyExists(_))));

    let orphan = registry
        .add_device(Device::new("Vent", DeviceKind::Ventilation, 9, "West"))
        .await;
    assert!(matches!(orphan, Err(StoreError::GreenhouseNotFound(_))));
}

#[tokio::test]
async fn test_add_device_rejects_missing_trigger() {
    let registry = registry_with(seeded_backend()).await;
    let mut door = Device::new("Door", DeviceKind::Door, 3, "North");
    door.soil_moisture_trigger = None;
    assert!(matches!(
        registry.add_device(door).await,
        Err(StoreError::Validation(_))
    ));
}

#[tokio::test]
async fn test_upsert_replaces_by_key() {
    let backend = seeded_backend();
    let registry = registry_with(backend.clone()).await;

    let mut vent = Device::new("Vent", DeviceKind::Ventilation, 7, "North");
    vent.temperature_trigger = Some(30.0);
    assert!(registry.upsert_device(vent).await.unwrap());

    let stored = registry.device("Vent", "North").unwrap();
    assert_eq!(stored.register, 7);
    assert_eq!(stored.temperature_trigger, Some(30.0));
    // South's device with the same name is untouched
    assert_eq!(registry.device("Vent", "South").unwrap().register, 1);

    let fresh = Device::new("Door", DeviceKind::Door, 4, "South");
    assert!(!registry.upsert_device(fresh).await.unwrap());
    assert_eq!(backend.saved_devices().len(), 4);
}

#[tokio::test]
async fn test_set_device_state_light_stamp() {
    let registry = registry_with(seeded_backend()).await;
    let t = Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap();

    let lamp = registry
        .set_device_state("Lamp", "North", true, LightStamp::Set(t))
        .await
        .unwrap();
    assert!(lamp.is_on);
    assert_eq!(lamp.light_on_time, Some(t));

    let lamp = registry
        .set_device_state("Lamp", "North", false, LightStamp::Keep)
        .await
        .unwrap();
    assert!(!lamp.is_on);
    assert_eq!(lamp.light_on_time, Some(t));

    let lamp = registry
        .set_device_state("Lamp", "North", false, LightStamp::Clear)
        .await
        .unwrap();
    assert_eq!(lamp.light_on_time, None);
}

#[tokio::test]
async fn test_persistence_failure_keeps_memory_state() {
    let backend = seeded_backend();
    let registry = registry_with(backend.clone()).await;
    backend.set_fail_writes(true);

    let result = registry
        .set_device_state("Vent", "North", true, LightStamp::Keep)
        .await;
    assert!(matches!(result, Err(StoreError::Persistence(_))));

    // memory moved ahead, disk did not
    assert!(registry.device("Vent", "North").unwrap().is_on);
    assert!(!backend.saved_devices()[0].is_on);
}

#[tokio::test]
async fn test_staged_state_reaches_disk_only_on_save() {
    let backend = seeded_backend();
    let registry = registry_with(backend.clone()).await;
    let t = Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap();

    let lamp = registry
        .stage_device_state("Lamp", "North", true, LightStamp::Set(t))
        .unwrap();
    assert!(lamp.is_on);
    assert_eq!(registry.device("Lamp", "North").unwrap().light_on_time, Some(t));
    assert_eq!(backend.device_save_count(), 0);

    registry.save_devices().await.unwrap();
    assert_eq!(backend.device_save_count(), 1);
    let saved = backend.saved_devices();
    let lamp = saved.iter().find(|d| d.name == "Lamp").unwrap();
    assert!(lamp.is_on);
    assert_eq!(lamp.light_on_time, Some(t));

    assert!(matches!(
        registry.stage_device_state("Heater", "North", true, LightStamp::Keep),
        Err(StoreError::DeviceNotFound { .. })
    ));
}

#[tokio::test]
async fn test_remove_and_rename_device() {
    let registry = registry_with(seeded_backend()).await;

    let renamed = registry.rename_device("Lamp", "North", "Grow").await.unwrap();
    assert_eq!(renamed.name, "Grow");
    assert!(registry.device("Lamp", "North").is_none());

    let clash = registry.rename_device("Grow", "North", "Vent").await;
    assert!(matches!(clash, Err(StoreError::AlreadyExists(_))));

    registry.remove_device("Grow", "North").await.unwrap();
    assert!(matches!(
        registry.remove_device("Grow", "North").await,
        Err(StoreError::DeviceNotFound { .. })
    ));
}

#[tokio::test]
async fn test_update_device_cannot_change_key() {
    let registry = registry_with(seeded_backend()).await;
    let result = registry
        .update_device("Vent", "North", |d| d.greenhouse_name = "South".to_string())
        .await;
    assert!(matches!(result, Err(StoreError::Validation(_))));

    let updated = registry
        .update_device("Vent", "North", |d| d.temperature_trigger = Some(27.0))
        .await
        .unwrap();
    assert_eq!(updated.temperature_trigger, Some(27.0));
}

#[tokio::test]
async fn test_greenhouse_lifecycle() {
    let backend = seeded_backend();
    let registry = registry_with(backend.clone()).await;

    registry
        .add_greenhouse(Greenhouse::new("East", "10.0.0.7", 1502))
        .await
        .unwrap();
    assert!(matches!(
        registry
            .add_greenhouse(Greenhouse::new("East", "10.0.0.8", 502))
            .await,
        Err(StoreError::AlreadyExists(_))
    ));
    assert!(registry
        .add_greenhouse(Greenhouse::new("West", "", 502))
        .await
        .is_err());

    let moved = registry
        .update_greenhouse_endpoint("East", "10.0.1.7", 502)
        .await
        .unwrap();
    assert_eq!(moved.address, "10.0.1.7");

    registry.remove_greenhouse("North").await.unwrap();
    assert!(registry.greenhouse("North").is_none());
    // devices are not cascaded
    assert_eq!(registry.list_devices("North").len(), 2);
    assert_eq!(backend.saved_greenhouses().len(), 2);
}

#[tokio::test]
async fn test_file_backend_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let backend = Arc::new(JsonFileBackend::open(dir.path()).await.unwrap());
        let registry = Registry::open(backend).await.unwrap();
        registry
            .add_greenhouse(Greenhouse::new("North", "10.0.0.5", 502))
            .await
            .unwrap();
        registry
            .add_device(Device::new("Lamp", DeviceKind::Light, 2, "North").with_auto(true))
            .await
            .unwrap();
    }

    let backend = Arc::new(JsonFileBackend::open(dir.path()).await.unwrap());
    let registry = Registry::open(backend).await.unwrap();
    let lamp = registry.device("Lamp", "North").unwrap();
    assert!(lamp.is_auto);
    assert_eq!(lamp.daylight_hours, Some(12));
}
