//! One Modbus session per endpoint at a time
//!
//! Collection, live refresh, automation and manual commands all share one
//! [`SerializedBus`]. Operations against the same endpoint queue on that
//! endpoint's lock in arrival order; different endpoints run concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Mutex as SessionLock, OwnedMutexGuard};

use crate::client::{Endpoint, FieldBus};
use crate::command::{CoilState, ValveAngle};
use crate::error::Result;

pub struct SerializedBus {
    inner: Arc<dyn FieldBus>,
    sessions: Mutex<HashMap<Endpoint, Arc<SessionLock<()>>>>,
}

impl SerializedBus {
    pub fn new(inner: Arc<dyn FieldBus>) -> Self {
        Self {
            inner,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    async fn session(&self, endpoint: &Endpoint) -> OwnedMutexGuard<()> {
        let lock = self
            .sessions
            .lock()
            .entry(endpoint.clone())
            .or_default()
            .clone();
        lock.lock_owned().await
    }
}

#[async_trait]
impl FieldBus for SerializedBus {
    async fn probe(&self, endpoint: &Endpoint) -> Result<()> {
        let _session = self.session(endpoint).await;
        self.inner.probe(endpoint).await
    }

    async fn read_registers(
        &self,
        endpoint: &Endpoint,
        start: u16,
        count: u16,
    ) -> Result<Vec<u16>> {
        let _session = self.session(endpoint).await;
        self.inner.read_registers(endpoint, start, count).await
    }

    async fn write_coil(&self, endpoint: &Endpoint, address: u16, state: CoilState) -> Result<()> {
        let _session = self.session(endpoint).await;
        self.inner.write_coil(endpoint, address, state).await
    }

    async fn write_angle(
        &self,
        endpoint: &Endpoint,
        address: u16,
        angle: ValveAngle,
    ) -> Result<()> {
        let _session = self.session(endpoint).await;
        self.inner.write_angle(endpoint, address, angle).await
    }
}
