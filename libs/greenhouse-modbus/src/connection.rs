//! One Modbus TCP connection
//!
//! Opened for a single logical operation and closed afterwards; there is
//! no pooling or reconnect logic here.

use std::io::ErrorKind;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::constants::{
    DEFAULT_TRANSACTION_TIMEOUT_MS, DEFAULT_UNIT_ID, MAX_READ_REGISTERS, MBAP_HEADER_LEN,
};
use crate::error::{ModbusError, Result};
use crate::frame::{encode_tcp_frame, MbapHeader};
use crate::pdu::{parse_read_registers, verify_write_echo, ModbusPdu, PduBuilder};

#[derive(Debug)]
pub struct ModbusTcpConnection {
    stream: TcpStream,
    addr: String,
    unit_id: u8,
    transaction_timeout: Duration,
    next_transaction_id: u16,
}

impl ModbusTcpConnection {
    /// Open a TCP connection within `connect_timeout`
    pub async fn connect(host: &str, port: u16, connect_timeout: Duration) -> Result<Self> {
        let addr = format!("{host}:{port}");
        debug!("TCP connecting: {}", addr);

        let stream = match timeout(connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                debug!("TCP refused: {}", addr);
                return Err(ModbusError::ConnectionRefused(addr));
            },
            Ok(Err(e)) => {
                debug!("TCP err: {} - {}", addr, e);
                return Err(ModbusError::Connection(format!("{addr}: {e}")));
            },
            Err(_) => {
                debug!("TCP timeout: {}", addr);
                return Err(ModbusError::ConnectTimeout(format!(
                    "{addr} after {}ms",
                    connect_timeout.as_millis()
                )));
            },
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("TCP_NODELAY: {}", e);
        }

        Ok(Self {
            stream,
            addr,
            unit_id: DEFAULT_UNIT_ID,
            transaction_timeout: Duration::from_millis(DEFAULT_TRANSACTION_TIMEOUT_MS),
            next_transaction_id: 1,
        })
    }

    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    pub fn with_transaction_timeout(mut self, transaction_timeout: Duration) -> Self {
        self.transaction_timeout = transaction_timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn next_transaction_id(&mut self) -> u16 {
        let id = self.next_transaction_id;
        self.next_transaction_id = self.next_transaction_id.wrapping_add(1);
        id
    }

    /// FC03 starting at `start`
    pub async fn read_holding_registers(&mut self, start: u16, count: u16) -> Result<Vec<u16>> {
        if count == 0 || count > MAX_READ_REGISTERS {
            return Err(ModbusError::protocol(format!(
                "Register count {} outside 1..={}",
                count, MAX_READ_REGISTERS
            )));
        }
        let request = PduBuilder::read_holding_registers(start, count)?;
        let response = self.transact(&request).await?;
        parse_read_registers(&response, count)
    }

    /// FC05, `on` maps to 0xFF00
    pub async fn write_single_coil(&mut self, address: u16, on: bool) -> Result<()> {
        let request = PduBuilder::write_single_coil(address, on)?;
        let response = self.transact(&request).await?;
        verify_write_echo(&request, &response)
    }

    /// FC06
    pub async fn write_single_register(&mut self, address: u16, value: u16) -> Result<()> {
        let request = PduBuilder::write_single_register(address, value)?;
        let response = self.transact(&request).await?;
        verify_write_echo(&request, &response)
    }

    pub async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("TCP close {}: {}", self.addr, e);
        }
    }

    /// Send one request and wait for its response, bounded by the transaction timeout
    async fn transact(&mut self, request: &ModbusPdu) -> Result<ModbusPdu> {
        let transaction_id = self.next_transaction_id();
        let limit = self.transaction_timeout;

        match timeout(limit, self.exchange(transaction_id, request)).await {
            Ok(result) => result,
            Err(_) => Err(ModbusError::Timeout(format!(
                "{} no response within {}ms",
                self.addr,
                limit.as_millis()
            ))),
        }
    }

    async fn exchange(&mut self, transaction_id: u16, request: &ModbusPdu) -> Result<ModbusPdu> {
        let frame = encode_tcp_frame(transaction_id, self.unit_id, request);
        self.stream.write_all(&frame).await?;
        debug!("TCP TX: {}B", frame.len());

        let mut raw = [0u8; MBAP_HEADER_LEN];
        self.stream.read_exact(&mut raw).await.map_err(read_error)?;
        let header = MbapHeader::decode(&raw)?;
        header.matches_request(transaction_id, self.unit_id)?;

        let mut body = vec![0u8; header.pdu_len()];
        self.stream.read_exact(&mut body).await.map_err(read_error)?;
        debug!("TCP RX: {}B", MBAP_HEADER_LEN + body.len());

        ModbusPdu::from_slice(&body)
    }
}

// A peer closing mid-frame is a truncated response, not a transport fault
fn read_error(err: std::io::Error) -> ModbusError {
    if err.kind() == ErrorKind::UnexpectedEof {
        ModbusError::protocol("Connection closed mid-frame")
    } else {
        ModbusError::from(err)
    }
}
