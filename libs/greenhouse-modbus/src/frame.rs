//! MBAP framing for Modbus TCP

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::constants::{MAX_MBAP_LENGTH, MBAP_HEADER_LEN, PROTOCOL_ID};
use crate::error::{ModbusError, Result};
use crate::pdu::ModbusPdu;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    pub transaction_id: u16,
    pub protocol_id: u16,
    /// Unit id plus PDU bytes
    pub length: u16,
    pub unit_id: u8,
}

impl MbapHeader {
    pub fn decode(raw: &[u8; MBAP_HEADER_LEN]) -> Result<Self> {
        let header = Self {
            transaction_id: u16::from_be_bytes([raw[0], raw[1]]),
            protocol_id: u16::from_be_bytes([raw[2], raw[3]]),
            length: u16::from_be_bytes([raw[4], raw[5]]),
            unit_id: raw[6],
        };

        let length = header.length as usize;
        if length < 2 || length > MAX_MBAP_LENGTH {
            return Err(ModbusError::protocol(format!(
                "Invalid MBAP length: {}",
                length
            )));
        }
        if header.protocol_id != PROTOCOL_ID {
            return Err(ModbusError::protocol(format!(
                "Unexpected protocol id: {}",
                header.protocol_id
            )));
        }
        Ok(header)
    }

    /// PDU bytes that follow the header
    pub fn pdu_len(&self) -> usize {
        self.length as usize - 1
    }

    /// Check a response header against the request that produced it
    pub fn matches_request(&self, transaction_id: u16, unit_id: u8) -> Result<()> {
        if self.transaction_id != transaction_id {
            return Err(ModbusError::protocol(format!(
                "Transaction id mismatch: expected {:04X}, got {:04X}",
                transaction_id, self.transaction_id
            )));
        }
        if self.unit_id != unit_id {
            return Err(ModbusError::protocol(format!(
                "Unit id mismatch: expected {}, got {}",
                unit_id, self.unit_id
            )));
        }
        Ok(())
    }
}

/// Build `[transaction][protocol 0][length][unit][pdu]`
pub fn encode_tcp_frame(transaction_id: u16, unit_id: u8, pdu: &ModbusPdu) -> Bytes {
    let length = (pdu.len() + 1) as u16;

    let mut frame = BytesMut::with_capacity(MBAP_HEADER_LEN + pdu.len());
    frame.put_u16(transaction_id);
    frame.put_u16(PROTOCOL_ID);
    frame.put_u16(length);
    frame.put_u8(unit_id);
    frame.put_slice(pdu.as_slice());

    debug!(
        "TCP frame: tid={:04X} unit={} FC={:02X} len={}",
        transaction_id,
        unit_id,
        pdu.function_code().unwrap_or(0),
        pdu.len()
    );
    frame.freeze()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::pdu::PduBuilder;

    #[test]
    fn test_encode_read_frame() {
        let pdu = PduBuilder::read_holding_registers(0, 4).unwrap();
        let frame = encode_tcp_frame(0x0102, 1, &pdu);
        assert_eq!(
            frame.as_ref(),
            &[0x01, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x04]
        );
    }

    #[test]
    fn test_decode_header() {
        let header = MbapHeader::decode(&[0x00, 0x07, 0x00, 0x00, 0x00, 0x0B, 0x01]).unwrap();
        assert_eq!(header.transaction_id, 7);
        assert_eq!(header.pdu_len(), 10);
        assert!(header.matches_request(7, 1).is_ok());
        assert!(header.matches_request(8, 1).is_err());
        assert!(header.matches_request(7, 2).is_err());
    }

    #[test]
    fn test_decode_rejects_bad_length_and_protocol() {
        assert!(MbapHeader::decode(&[0, 1, 0, 0, 0, 0, 1]).is_err());
        assert!(MbapHeader::decode(&[0, 1, 0, 0, 0x01, 0x00, 1]).is_err());
        assert!(MbapHeader::decode(&[0, 1, 0, 5, 0, 6, 1]).is_err());
    }
}
