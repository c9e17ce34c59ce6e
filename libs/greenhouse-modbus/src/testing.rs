//! In-memory [`FieldBus`] for tests
//!
//! Each host can be given fixed registers, a queue of one-shot results,
//! or be taken offline. Writes are recorded in order, and the peak number of
//! operations in flight per host is tracked.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::{Endpoint, FieldBus};
use crate::command::{CoilState, ValveAngle};
use crate::error::{ModbusError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteValue {
    Coil(CoilState),
    Angle(ValveAngle),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub endpoint: Endpoint,
    pub address: u16,
    pub value: WriteValue,
}

type WriteHook = Arc<dyn Fn(&RecordedWrite) + Send + Sync>;

#[derive(Default)]
pub struct ScriptedFieldBus {
    registers: Mutex<HashMap<String, Vec<u16>>>,
    queued_reads: Mutex<HashMap<String, VecDeque<Result<Vec<u16>>>>>,
    offline: Mutex<HashSet<String>>,
    write_error: Mutex<Option<ModbusError>>,
    writes: Mutex<Vec<RecordedWrite>>,
    write_hook: Mutex<Option<WriteHook>>,
    op_delay: Mutex<Option<Duration>>,
    in_flight: Mutex<HashMap<String, usize>>,
    peak_in_flight: Mutex<HashMap<String, usize>>,
    reads: AtomicUsize,
}

/// Counts one operation against a host until dropped
struct InFlight<'a> {
    bus: &'a ScriptedFieldBus,
    host: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(count) = self.bus.in_flight.lock().get_mut(&self.host) {
            *count = count.saturating_sub(1);
        }
    }
}

impl ScriptedFieldBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers returned for every read of `host` with no queued result
    pub fn set_registers(&self, host: &str, registers: Vec<u16>) {
        self.registers.lock().insert(host.to_string(), registers);
    }

    /// One-shot read result, consumed before the fixed registers
    pub fn push_read(&self, host: &str, result: Result<Vec<u16>>) {
        self.queued_reads
            .lock()
            .entry(host.to_string())
            .or_default()
            .push_back(result);
    }

    /// Probe and reads of `host` fail with a connect timeout
    pub fn set_offline(&self, host: &str, offline: bool) {
        let mut set = self.offline.lock();
        if offline {
            set.insert(host.to_string());
        } else {
            set.remove(host);
        }
    }

    /// Every write fails with `error` until cleared
    pub fn set_write_error(&self, error: Option<ModbusError>) {
        *self.write_error.lock() = error;
    }

    /// Every probe, read and write takes `delay` before answering
    pub fn set_op_delay(&self, delay: Option<Duration>) {
        *self.op_delay.lock() = delay;
    }

    /// Most operations ever in flight at once against `host`
    pub fn peak_in_flight(&self, host: &str) -> usize {
        self.peak_in_flight.lock().get(host).copied().unwrap_or(0)
    }

    /// Called with every successful write as it happens
    pub fn set_write_hook(&self, hook: impl Fn(&RecordedWrite) + Send + Sync + 'static) {
        *self.write_hook.lock() = Some(Arc::new(hook));
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().clear();
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    async fn begin(&self, endpoint: &Endpoint) -> InFlight<'_> {
        {
            let mut in_flight = self.in_flight.lock();
            let count = in_flight.entry(endpoint.host.clone()).or_default();
            *count += 1;
            let mut peak = self.peak_in_flight.lock();
            let seen = peak.entry(endpoint.host.clone()).or_default();
            *seen = (*seen).max(*count);
        }
        let op = InFlight {
            bus: self,
            host: endpoint.host.clone(),
        };
        let delay = *self.op_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        op
    }

    fn check_online(&self, endpoint: &Endpoint) -> Result<()> {
        endpoint.validate()?;
        if self.offline.lock().contains(&endpoint.host) {
            return Err(ModbusError::ConnectTimeout(endpoint.to_string()));
        }
        Ok(())
    }

    fn record(&self, endpoint: &Endpoint, address: u16, value: WriteValue) -> Result<()> {
        self.check_online(endpoint)?;
        if let Some(err) = self.write_error.lock().clone() {
            return Err(err);
        }
        let write = RecordedWrite {
            endpoint: endpoint.clone(),
            address,
            value,
        };
        let hook = self.write_hook.lock().clone();
        if let Some(hook) = hook {
            hook(&write);
        }
        self.writes.lock().push(write);
        Ok(())
    }
}

#[async_trait]
impl FieldBus for ScriptedFieldBus {
    async fn probe(&self, endpoint: &Endpoint) -> Result<()> {
        let _op = self.begin(endpoint).await;
        self.check_online(endpoint)
    }

    async fn read_registers(
        &self,
        endpoint: &Endpoint,
        start: u16,
        count: u16,
    ) -> Result<Vec<u16>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let _op = self.begin(endpoint).await;
        self.check_online(endpoint)?;

        let queued = self
            .queued_reads
            .lock()
            .get_mut(&endpoint.host)
            .and_then(VecDeque::pop_front);
        let registers = match queued {
            Some(result) => result?,
            None => self
                .registers
                .lock()
                .get(&endpoint.host)
                .cloned()
                .ok_or_else(|| ModbusError::ConnectionRefused(endpoint.to_string()))?,
        };

        let start = start as usize;
        let wanted = count as usize;
        let available = registers.len().saturating_sub(start).min(wanted);
        if available < wanted {
            return Err(ModbusError::ShortResponse {
                expected: wanted,
                got: available,
            });
        }
        Ok(registers[start..start + wanted].to_vec())
    }

    async fn write_coil(&self, endpoint: &Endpoint, address: u16, state: CoilState) -> Result<()> {
        let _op = self.begin(endpoint).await;
        self.record(endpoint, address, WriteValue::Coil(state))
    }

    async fn write_angle(
        &self,
        endpoint: &Endpoint,
        address: u16,
        angle: ValveAngle,
    ) -> Result<()> {
        let _op = self.begin(endpoint).await;
        self.record(endpoint, address, WriteValue::Angle(angle))
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queued_then_fixed_reads() {
        let bus = ScriptedFieldBus::new();
        let ep = Endpoint::new("gh1", 502);
        bus.set_registers("gh1", vec![20, 50, 400, 600]);
        bus.push_read("gh1", Err(ModbusError::Timeout("x".into())));

        assert!(bus.read_registers(&ep, 0, 4).await.is_err());
        assert_eq!(bus.read_registers(&ep, 0, 4).await.unwrap(), vec![20, 50, 400, 600]);
        assert_eq!(bus.read_count(), 2);
    }

    #[tokio::test]
    async fn test_short_and_offline() {
        let bus = ScriptedFieldBus::new();
        let ep = Endpoint::new("gh1", 502);
        bus.set_registers("gh1", vec![20, 50]);
        assert!(matches!(
            bus.read_registers(&ep, 0, 4).await,
            Err(ModbusError::ShortResponse { expected: 4, got: 2 })
        ));

        bus.set_offline("gh1", true);
        assert!(bus.probe(&ep).await.is_err());
        bus.set_offline("gh1", false);
        assert!(bus.probe(&ep).await.is_ok());
    }

    #[tokio::test]
    async fn test_writes_recorded_unless_failing() {
        let bus = ScriptedFieldBus::new();
        let ep = Endpoint::new("gh1", 502);
        bus.write_angle(&ep, 2, ValveAngle::Open).await.unwrap();
        bus.set_write_error(Some(ModbusError::Timeout("w".into())));
        assert!(bus.write_coil(&ep, 3, CoilState::On).await.is_err());

        let writes = bus.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].value, WriteValue::Angle(ValveAngle::Open));
    }
}
