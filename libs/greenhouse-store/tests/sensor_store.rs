//! Integration tests for the sensor time series

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use greenhouse_model::{HistoryPeriod, SensorSample};
use greenhouse_store::{DayBoundary, JsonFileBackend, MemoryBackend, SensorStore};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
}

fn online(name: &str, ts: DateTime<Utc>, temperature: f64) -> SensorSample {
    SensorSample::from_registers(name, ts, &[temperature as u16, 55, 420, 600]).unwrap()
}

async fn store(backend: Arc<MemoryBackend>) -> SensorStore {
    SensorStore::open(backend, DayBoundary::utc()).await.unwrap()
}

#[tokio::test]
async fn test_latest_connected_skips_offline_and_uses_timestamp() {
    let store = store(Arc::new(MemoryBackend::new())).await;
    store.append(online("North", now() - Duration::minutes(1), 24.0));
    // appended later but older
    store.append(online("North", now() - Duration::minutes(5), 19.0));
    store.append(SensorSample::offline("North", now()));

    let latest = store.latest_connected("North").unwrap();
    assert_eq!(latest.temperature, 24.0);
    assert!(!store.latest("North").unwrap().connected);
    assert!(store.latest_connected("South").is_none());
}

#[tokio::test]
async fn test_windowed_bounds_and_order() {
    let store = store(Arc::new(MemoryBackend::new())).await;
    store.append(online("North", now() - Duration::hours(2), 22.0));
    store.append(online("North", now() - Duration::hours(25), 10.0));
    store.append(online("North", now() - Duration::hours(24), 21.0));
    store.append(online("North", now() + Duration::minutes(1), 30.0));
    store.append(online("South", now() - Duration::hours(1), 15.0));

    let day = store.windowed("North", HistoryPeriod::Day, now());
    let temps: Vec<f64> = day.iter().map(|s| s.temperature).collect();
    assert_eq!(temps, vec![21.0, 22.0]);
}

#[tokio::test]
async fn test_week_history_is_daily_buckets() {
    let store = store(Arc::new(MemoryBackend::new())).await;
    for days_ago in 0..10 {
        let ts = now() - Duration::days(days_ago);
        store.append(online("North", ts, 20.0 + days_ago as f64));
        store.append(SensorSample::offline("North", ts + Duration::minutes(1)));
    }

    let week = store.history("North", HistoryPeriod::Week, now());
    // 7 days back from noon touches 8 calendar days
    assert_eq!(week.len(), 8);
    assert!(week.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    assert!(week.iter().all(|s| s.connected));
    assert_eq!(week.last().unwrap().temperature, 20.0);

    let day = store.history("North", HistoryPeriod::Day, now());
    assert!(day.iter().any(|s| !s.connected));
}

#[tokio::test]
async fn test_flush_writes_only_pending_and_retries_after_failure() {
    let backend = Arc::new(MemoryBackend::new());
    let store = store(backend.clone()).await;

    store.append(online("North", now(), 20.0));
    store.append(SensorSample::offline("North", now()));
    assert_eq!(store.pending(), 2);
    assert_eq!(store.flush().await.unwrap(), 2);
    assert_eq!(store.flush().await.unwrap(), 0);

    backend.set_fail_writes(true);
    store.append(online("North", now(), 21.0));
    assert!(store.flush().await.is_err());
    assert_eq!(store.pending(), 1);

    backend.set_fail_writes(false);
    assert_eq!(store.flush().await.unwrap(), 1);
    assert_eq!(backend.saved_samples().len(), 3);
}

#[tokio::test]
async fn test_samples_reload_from_file() {
    let dir = tempfile::tempdir().unwrap();
    {
        let backend = Arc::new(JsonFileBackend::open(dir.path()).await.unwrap());
        let store = SensorStore::open(backend, DayBoundary::utc()).await.unwrap();
        store.append(online("North", now(), 23.0));
        store.flush().await.unwrap();
    }

    let backend = Arc::new(JsonFileBackend::open(dir.path()).await.unwrap());
    let store = SensorStore::open(backend, DayBoundary::utc()).await.unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(store.pending(), 0);
    assert_eq!(store.latest_connected("North").unwrap().temperature, 23.0);
}
