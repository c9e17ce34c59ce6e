//! Modbus TCP protocol constants

/// MBAP header: transaction id (2) + protocol id (2) + length (2) + unit id (1)
pub const MBAP_HEADER_LEN: usize = 7;

/// Maximum PDU size per the Modbus application protocol
pub const MAX_PDU_SIZE: usize = 253;

/// Largest legal MBAP length field: unit id + PDU
pub const MAX_MBAP_LENGTH: usize = MAX_PDU_SIZE + 1;

/// Modbus TCP protocol identifier
pub const PROTOCOL_ID: u16 = 0;

/// Every greenhouse node answers on unit 1
pub const DEFAULT_UNIT_ID: u8 = 1;

/// Register count limit for FC03
pub const MAX_READ_REGISTERS: u16 = 125;

pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// Exception responses set the high bit of the function code
pub const EXCEPTION_FLAG: u8 = 0x80;

pub const COIL_ON: u16 = 0xFF00;
pub const COIL_OFF: u16 = 0x0000;

pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_TRANSACTION_TIMEOUT_MS: u64 = 500;
