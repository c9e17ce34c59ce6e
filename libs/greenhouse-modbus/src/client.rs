//! Field bus abstraction used by collection and automation
//!
//! [`FieldBus`] is the seam between the control logic and the network;
//! [`ModbusTcpTransport`] is the production implementation.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::command::{CoilState, ValveAngle};
use crate::connection::ModbusTcpConnection;
use crate::constants::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_PROBE_TIMEOUT_MS, DEFAULT_TRANSACTION_TIMEOUT_MS,
    DEFAULT_UNIT_ID,
};
use crate::error::{ModbusError, Result};

/// Host and port of a greenhouse node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() || self.port == 0 {
            return Err(ModbusError::InvalidEndpoint(self.to_string()));
        }
        Ok(())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportTimeouts {
    /// Connectivity check
    pub probe: Duration,
    /// Connect before a read or write
    pub connect: Duration,
    /// One request/response once connected
    pub transaction: Duration,
}

impl Default for TransportTimeouts {
    fn default() -> Self {
        Self {
            probe: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
            connect: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            transaction: Duration::from_millis(DEFAULT_TRANSACTION_TIMEOUT_MS),
        }
    }
}

#[async_trait]
pub trait FieldBus: Send + Sync {
    /// Succeeds if a TCP connection can be opened
    async fn probe(&self, endpoint: &Endpoint) -> Result<()>;

    async fn read_registers(&self, endpoint: &Endpoint, start: u16, count: u16)
        -> Result<Vec<u16>>;

    async fn write_coil(&self, endpoint: &Endpoint, address: u16, state: CoilState) -> Result<()>;

    async fn write_angle(&self, endpoint: &Endpoint, address: u16, angle: ValveAngle)
        -> Result<()>;
}

/// Modbus TCP master, one connection per operation
#[derive(Debug, Clone)]
pub struct ModbusTcpTransport {
    unit_id: u8,
    timeouts: TransportTimeouts,
}

impl Default for ModbusTcpTransport {
    fn default() -> Self {
        Self::new(TransportTimeouts::default())
    }
}

impl ModbusTcpTransport {
    pub fn new(timeouts: TransportTimeouts) -> Self {
        Self {
            unit_id: DEFAULT_UNIT_ID,
            timeouts,
        }
    }

    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    pub fn timeouts(&self) -> TransportTimeouts {
        self.timeouts
    }

    async fn open(&self, endpoint: &Endpoint) -> Result<ModbusTcpConnection> {
        endpoint.validate()?;
        let conn =
            ModbusTcpConnection::connect(&endpoint.host, endpoint.port, self.timeouts.connect)
                .await?;
        Ok(conn
            .with_unit_id(self.unit_id)
            .with_transaction_timeout(self.timeouts.transaction))
    }

    /// Commissioning write of an arbitrary register value
    ///
    /// Only valve angles are accepted; the value is checked before connecting.
    pub async fn write_register_raw(&self, endpoint: &Endpoint, address: u16, value: u16) -> Result<()> {
        let angle = ValveAngle::try_from(value)?;
        self.write_angle(endpoint, address, angle).await
    }
}

#[async_trait]
impl FieldBus for ModbusTcpTransport {
    async fn probe(&self, endpoint: &Endpoint) -> Result<()> {
        endpoint.validate()?;
        let conn =
            ModbusTcpConnection::connect(&endpoint.host, endpoint.port, self.timeouts.probe)
                .await?;
        conn.close().await;
        Ok(())
    }

    async fn read_registers(
        &self,
        endpoint: &Endpoint,
        start: u16,
        count: u16,
    ) -> Result<Vec<u16>> {
        let mut conn = self.open(endpoint).await?;
        let result = conn.read_holding_registers(start, count).await;
        conn.close().await;
        if let Ok(registers) = &result {
            debug!("{} FC03 {}+{}: {:?}", endpoint, start, count, registers);
        }
        result
    }

    async fn write_coil(&self, endpoint: &Endpoint, address: u16, state: CoilState) -> Result<()> {
        let mut conn = self.open(endpoint).await?;
        let result = conn.write_single_coil(address, state.is_on()).await;
        conn.close().await;
        debug!("{} FC05 {} = {}", endpoint, address, state);
        result
    }

    async fn write_angle(
        &self,
        endpoint: &Endpoint,
        address: u16,
        angle: ValveAngle,
    ) -> Result<()> {
        let mut conn = self.open(endpoint).await?;
        let result = conn.write_single_register(address, angle.degrees()).await;
        conn.close().await;
        debug!("{} FC06 {} = {}", endpoint, address, angle);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let t = TransportTimeouts::default();
        assert_eq!(t.probe, Duration::from_secs(2));
        assert_eq!(t.connect, Duration::from_secs(5));
        assert_eq!(t.transaction, Duration::from_millis(500));
    }

    #[test]
    fn test_endpoint_validation() {
        assert!(Endpoint::new("10.0.0.2", 502).validate().is_ok());
        assert!(matches!(
            Endpoint::new("", 502).validate(),
            Err(ModbusError::InvalidEndpoint(_))
        ));
        assert!(Endpoint::new("10.0.0.2", 0).validate().is_err());
        assert_eq!(Endpoint::new("10.0.0.2", 502).to_string(), "10.0.0.2:502");
    }

    #[tokio::test]
    async fn test_invalid_endpoint_fails_before_io() {
        let transport = ModbusTcpTransport::default();
        let err = transport
            .read_registers(&Endpoint::new("", 0), 0, 4)
            .await
            .unwrap_err();
        assert!(err.is_pre_io());
    }

    #[tokio::test]
    async fn test_raw_write_rejects_bad_angle_before_io() {
        let transport = ModbusTcpTransport::default();
        // Unroutable endpoint: any IO attempt would time out instead
        let err = transport
            .write_register_raw(&Endpoint::new("10.255.255.1", 502), 0, 45)
            .await
            .unwrap_err();
        assert!(matches!(err, ModbusError::InvalidCommandValue(_)));
    }
}
