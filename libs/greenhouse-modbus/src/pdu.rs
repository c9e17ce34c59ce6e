//! Modbus PDU buffer and request/response helpers
//!
//! The PDU lives in a fixed stack array; requests here are at most five bytes.

use tracing::debug;

use crate::constants::{
    COIL_OFF, COIL_ON, EXCEPTION_FLAG, FC_READ_HOLDING_REGISTERS, FC_WRITE_SINGLE_COIL,
    FC_WRITE_SINGLE_REGISTER, MAX_PDU_SIZE,
};
use crate::error::{ModbusError, Result};

#[derive(Debug, Clone)]
pub struct ModbusPdu {
    data: [u8; MAX_PDU_SIZE],
    len: usize,
}

impl ModbusPdu {
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0; MAX_PDU_SIZE],
            len: 0,
        }
    }

    pub fn from_slice(data: &[u8]) -> Result<Self> {
        if data.len() > MAX_PDU_SIZE {
            return Err(ModbusError::protocol(format!(
                "PDU too large: {} bytes (max {})",
                data.len(),
                MAX_PDU_SIZE
            )));
        }

        let mut pdu = Self::new();
        pdu.data[..data.len()].copy_from_slice(data);
        pdu.len = data.len();

        if let Some(fc) = pdu.function_code() {
            debug!(
                "PDU: FC={:02X} ({}), {}B",
                fc,
                function_code_description(fc),
                pdu.len
            );
        }
        Ok(pdu)
    }

    #[inline]
    pub fn push(&mut self, byte: u8) -> Result<()> {
        if self.len >= MAX_PDU_SIZE {
            return Err(ModbusError::protocol("PDU buffer full"));
        }
        self.data[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    /// Push u16 in big-endian
    #[inline]
    pub fn push_u16(&mut self, value: u16) -> Result<()> {
        let [hi, lo] = value.to_be_bytes();
        self.push(hi)?;
        self.push(lo)
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn function_code(&self) -> Option<u8> {
        (self.len > 0).then_some(self.data[0])
    }

    #[inline]
    pub fn is_exception(&self) -> bool {
        self.function_code()
            .is_some_and(|fc| fc & EXCEPTION_FLAG != 0)
    }

    pub fn exception_code(&self) -> Option<u8> {
        (self.is_exception() && self.len > 1).then_some(self.data[1])
    }

    /// Reject exception PDUs and function code mismatches
    pub fn expect_function(&self, expected_fc: u8) -> Result<()> {
        let fc = self
            .function_code()
            .ok_or_else(|| ModbusError::protocol("Empty response PDU"))?;

        if self.is_exception() {
            return Err(ModbusError::Exception {
                function: fc & !EXCEPTION_FLAG,
                code: self.exception_code().unwrap_or(0),
            });
        }
        if fc != expected_fc {
            return Err(ModbusError::protocol(format!(
                "Function code mismatch: expected {:02X}, got {:02X}",
                expected_fc, fc
            )));
        }
        Ok(())
    }
}

impl Default for ModbusPdu {
    fn default() -> Self {
        Self::new()
    }
}

fn function_code_description(fc: u8) -> &'static str {
    match fc & !EXCEPTION_FLAG {
        0x03 => "Read Holding Registers",
        0x05 => "Write Single Coil",
        0x06 => "Write Single Register",
        _ => "Unsupported Function",
    }
}

/// Fluent request builder
#[derive(Default)]
pub struct PduBuilder {
    pdu: ModbusPdu,
}

impl PduBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn function_code(mut self, fc: u8) -> Result<Self> {
        self.pdu.push(fc)?;
        Ok(self)
    }

    pub fn word(mut self, value: u16) -> Result<Self> {
        self.pdu.push_u16(value)?;
        Ok(self)
    }

    pub fn build(self) -> ModbusPdu {
        self.pdu
    }

    /// FC03: `[0x03, start, count]`
    pub fn read_holding_registers(start: u16, count: u16) -> Result<ModbusPdu> {
        Ok(Self::new()
            .function_code(FC_READ_HOLDING_REGISTERS)?
            .word(start)?
            .word(count)?
            .build())
    }

    /// FC05: `[0x05, address, 0xFF00 | 0x0000]`
    pub fn write_single_coil(address: u16, on: bool) -> Result<ModbusPdu> {
        Ok(Self::new()
            .function_code(FC_WRITE_SINGLE_COIL)?
            .word(address)?
            .word(if on { COIL_ON } else { COIL_OFF })?
            .build())
    }

    /// FC06: `[0x06, address, value]`
    pub fn write_single_register(address: u16, value: u16) -> Result<ModbusPdu> {
        Ok(Self::new()
            .function_code(FC_WRITE_SINGLE_REGISTER)?
            .word(address)?
            .word(value)?
            .build())
    }
}

/// Decode an FC03 response body into `count` registers
///
/// A response carrying fewer registers than requested is a
/// [`ModbusError::ShortResponse`].
pub fn parse_read_registers(pdu: &ModbusPdu, count: u16) -> Result<Vec<u16>> {
    pdu.expect_function(FC_READ_HOLDING_REGISTERS)?;

    let data = pdu.as_slice();
    let expected = count as usize;
    if data.len() < 2 {
        return Err(ModbusError::ShortResponse { expected, got: 0 });
    }

    let byte_count = data[1] as usize;
    let payload = &data[2..];
    let available = byte_count.min(payload.len()) / 2;
    if available < expected {
        return Err(ModbusError::ShortResponse {
            expected,
            got: available,
        });
    }

    Ok(payload[..expected * 2]
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}

/// FC05/FC06 succeed by echoing the request
pub fn verify_write_echo(request: &ModbusPdu, response: &ModbusPdu) -> Result<()> {
    let fc = request
        .function_code()
        .ok_or_else(|| ModbusError::protocol("Empty request PDU"))?;
    response.expect_function(fc)?;

    if response.as_slice() != request.as_slice() {
        return Err(ModbusError::protocol(format!(
            "Write echo mismatch: sent {:02X?}, got {:02X?}",
            request.as_slice(),
            response.as_slice()
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_read_request_layout() {
        let pdu = PduBuilder::read_holding_registers(0, 4).unwrap();
        assert_eq!(pdu.as_slice(), &[0x03, 0x00, 0x00, 0x00, 0x04]);
    }

    #[test]
    fn test_coil_request_layout() {
        let on = PduBuilder::write_single_coil(7, true).unwrap();
        assert_eq!(on.as_slice(), &[0x05, 0x00, 0x07, 0xFF, 0x00]);
        let off = PduBuilder::write_single_coil(7, false).unwrap();
        assert_eq!(off.as_slice(), &[0x05, 0x00, 0x07, 0x00, 0x00]);
    }

    #[test]
    fn test_register_request_layout() {
        let pdu = PduBuilder::write_single_register(2, 90).unwrap();
        assert_eq!(pdu.as_slice(), &[0x06, 0x00, 0x02, 0x00, 0x5A]);
    }

    #[test]
    fn test_parse_read_registers() {
        let pdu = ModbusPdu::from_slice(&[0x03, 0x08, 0, 23, 0, 61, 0x02, 0x1C, 0x01, 0xF4])
            .unwrap();
        assert_eq!(parse_read_registers(&pdu, 4).unwrap(), vec![23, 61, 540, 500]);
    }

    #[test]
    fn test_parse_read_registers_short() {
        let pdu = ModbusPdu::from_slice(&[0x03, 0x04, 0, 23, 0, 61]).unwrap();
        assert_eq!(
            parse_read_registers(&pdu, 4).unwrap_err(),
            ModbusError::ShortResponse {
                expected: 4,
                got: 2
            }
        );

        // byte count claims more than was actually sent
        let pdu = ModbusPdu::from_slice(&[0x03, 0x08, 0, 23, 0]).unwrap();
        assert!(matches!(
            parse_read_registers(&pdu, 4),
            Err(ModbusError::ShortResponse { got: 1, .. })
        ));
    }

    #[test]
    fn test_exception_response() {
        let pdu = ModbusPdu::from_slice(&[0x83, 0x02]).unwrap();
        assert!(pdu.is_exception());
        assert_eq!(
            parse_read_registers(&pdu, 4).unwrap_err(),
            ModbusError::Exception {
                function: 0x03,
                code: 0x02
            }
        );
    }

    #[test]
    fn test_write_echo() {
        let req = PduBuilder::write_single_register(1, 0).unwrap();
        let echo = ModbusPdu::from_slice(req.as_slice()).unwrap();
        assert!(verify_write_echo(&req, &echo).is_ok());

        let wrong = ModbusPdu::from_slice(&[0x06, 0x00, 0x01, 0x00, 0x5A]).unwrap();
        assert!(matches!(
            verify_write_echo(&req, &wrong),
            Err(ModbusError::Protocol(_))
        ));
    }

    #[test]
    fn test_oversized_pdu_rejected() {
        let big = vec![0u8; MAX_PDU_SIZE + 1];
        assert!(ModbusPdu::from_slice(&big).is_err());
    }
}
