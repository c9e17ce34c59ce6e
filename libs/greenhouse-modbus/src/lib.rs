//! Minimal Modbus TCP master
//!
//! Covers exactly what greenhouse nodes need: FC03 read holding registers,
//! FC05 write single coil and FC06 write single register on unit 1. Every
//! operation opens its own connection and closes it afterwards.

pub mod client;
pub mod command;
pub mod connection;
pub mod constants;
pub mod error;
pub mod frame;
pub mod pdu;
pub mod serialized;
pub mod testing;

pub use client::{Endpoint, FieldBus, ModbusTcpTransport, TransportTimeouts};
pub use command::{CoilState, ValveAngle};
pub use connection::ModbusTcpConnection;
pub use error::{ModbusError, Result};
pub use serialized::SerializedBus;
