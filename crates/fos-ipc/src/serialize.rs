//! IPC Serialization
//!
//! Compact binary serialization for IPC messages.
//! Custom format (no serde) for hot paths.

use crate::IpcError;
use crate::message::{MessageType, TypedMessage};

/// IPC serialization trait
pub trait IpcSerialize: Sized {
    /// Serialize to buffer
    fn ipc_serialize(&self, buf: &mut Vec<u8>);

    /// Deserialize from reader
    fn ipc_deserialize(reader: &mut ByteReader<'_>) -> Result<Self, IpcError>;

    /// Serialize into a fresh buffer
    fn to_ipc_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.ipc_serialize(&mut buf);
        buf
    }

    /// Deserialize a whole buffer, rejecting trailing bytes
    fn from_ipc_bytes(buf: &[u8]) -> Result<Self, IpcError> {
        let mut reader = ByteReader::new(buf);
        let value = Self::ipc_deserialize(&mut reader)?;
        if !reader.is_empty() {
            return Err(IpcError::InvalidFormat);
        }
        Ok(value)
    }
}

/// Write variable-length integer (LEB128)
pub fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Write signed integer (zigzag + LEB128)
pub fn write_varint_signed(buf: &mut Vec<u8>, value: i64) {
    write_varint(buf, ((value << 1) ^ (value >> 63)) as u64);
}

/// Write u16 little-endian
pub fn write_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Write u32 little-endian
pub fn write_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Write length-prefixed bytes
pub fn write_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    write_varint(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

/// Write length-prefixed string
pub fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_bytes(buf, s.as_bytes());
}

/// Cursor over a received buffer
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], IpcError> {
        if self.remaining() < len {
            return Err(IpcError::BufferTooShort);
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, IpcError> {
        Ok(self.take(1)?[0])
    }

    /// Read u16 little-endian
    pub fn read_u16(&mut self) -> Result<u16, IpcError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read u32 little-endian
    pub fn read_u32(&mut self) -> Result<u32, IpcError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read variable-length integer (LEB128)
    pub fn read_varint(&mut self) -> Result<u64, IpcError> {
        let mut result: u64 = 0;
        let mut shift = 0;

        loop {
            if shift >= 64 {
                return Err(IpcError::InvalidFormat);
            }
            let byte = self.read_u8()?;
            result |= ((byte & 0x7F) as u64) << shift;
            shift += 7;

            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
    }

    /// Read signed integer (zigzag + LEB128)
    pub fn read_varint_signed(&mut self) -> Result<i64, IpcError> {
        let raw = self.read_varint()?;
        Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
    }

    /// Read varint that must fit in u32
    pub fn read_varint_u32(&mut self) -> Result<u32, IpcError> {
        u32::try_from(self.read_varint()?).map_err(|_| IpcError::InvalidFormat)
    }

    /// Read length-prefixed bytes
    pub fn read_bytes(&mut self) -> Result<&'a [u8], IpcError> {
        let len = usize::try_from(self.read_varint()?).map_err(|_| IpcError::InvalidFormat)?;
        self.take(len)
    }

    /// Read length-prefixed string
    pub fn read_string(&mut self) -> Result<&'a str, IpcError> {
        let bytes = self.read_bytes()?;
        std::str::from_utf8(bytes).map_err(|_| IpcError::InvalidUtf8)
    }
}

impl IpcSerialize for TypedMessage {
    fn ipc_serialize(&self, buf: &mut Vec<u8>) {
        // Message type (2 bytes)
        write_u16(buf, self.msg_type as u16);
        // Routing ID (4 bytes)
        write_u32(buf, self.routing_id);
        // Payload (length-prefixed)
        write_bytes(buf, &self.payload);
    }

    fn ipc_deserialize(reader: &mut ByteReader<'_>) -> Result<Self, IpcError> {
        let msg_type_raw = reader.read_u16()?;
        let msg_type = MessageType::from_u16(msg_type_raw)
            .ok_or(IpcError::UnknownMessageType(msg_type_raw))?;
        let routing_id = reader.read_u32()?;
        let payload = reader.read_bytes()?.to_vec();

        Ok(Self { msg_type, routing_id, payload })
    }
}

/// Message frame with header
#[derive(Debug, Clone)]
pub struct MessageFrame {
    /// Frame length (excluding header)
    pub length: u32,
    /// Checksum (simple XOR)
    pub checksum: u8,
    /// Payload
    pub payload: Vec<u8>,
}

impl MessageFrame {
    /// Create from payload
    pub fn new(payload: Vec<u8>) -> Self {
        let checksum = payload.iter().fold(0u8, |acc, &b| acc ^ b);
        Self {
            length: payload.len() as u32,
            checksum,
            payload,
        }
    }

    /// Serialize to bytes (for wire transmission)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(5 + self.payload.len());
        write_u32(&mut buf, self.length);
        buf.push(self.checksum);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Deserialize from bytes
    pub fn from_bytes(buf: &[u8]) -> Result<(Self, usize), IpcError> {
        let mut reader = ByteReader::new(buf);
        let length = reader.read_u32()?;
        let checksum = reader.read_u8()?;
        let len = usize::try_from(length).map_err(|_| IpcError::InvalidFormat)?;
        let payload = reader.take(len)?.to_vec();

        // Verify checksum
        let computed = payload.iter().fold(0u8, |acc, &b| acc ^ b);
        if computed != checksum {
            return Err(IpcError::ChecksumMismatch);
        }

        Ok((Self { length, checksum, payload }, reader.position()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_boundaries() {
        for val in [0u64, 127, 128, 16_383, 16_384, u64::MAX] {
            let mut buf = Vec::new();
            write_varint(&mut buf, val);
            assert_eq!(ByteReader::new(&buf).read_varint().unwrap(), val);
        }
        let mut buf = Vec::new();
        write_varint(&mut buf, 300);
        assert_eq!(buf, vec![0xAC, 0x02]);
    }

    #[test]
    fn test_signed_varint() {
        let mut buf = Vec::new();
        write_varint_signed(&mut buf, -1);
        assert_eq!(buf, vec![0x01]);
        write_varint_signed(&mut buf, i64::MIN);

        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_varint_signed().unwrap(), -1);
        assert_eq!(reader.read_varint_signed().unwrap(), i64::MIN);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_truncated_string() {
        let mut buf = Vec::new();
        write_string(&mut buf, "Hello, 世界!");
        buf.truncate(buf.len() - 1);
        assert_eq!(ByteReader::new(&buf).read_string(), Err(IpcError::BufferTooShort));
    }

    #[test]
    fn test_invalid_utf8() {
        let buf = vec![2, 0xC3, 0x28];
        assert_eq!(ByteReader::new(&buf).read_string(), Err(IpcError::InvalidUtf8));
    }

    #[test]
    fn test_typed_message_trailing_bytes() {
        let msg = TypedMessage::new(MessageType::CacheEvict, 7, vec![1, 2, 3]);
        let mut bytes = msg.to_ipc_bytes();

        let parsed = TypedMessage::from_ipc_bytes(&bytes).unwrap();
        assert_eq!(parsed.msg_type, MessageType::CacheEvict);
        assert_eq!(parsed.routing_id, 7);
        assert_eq!(parsed.payload, vec![1, 2, 3]);

        bytes.push(0);
        assert_eq!(TypedMessage::from_ipc_bytes(&bytes).unwrap_err(), IpcError::InvalidFormat);
    }

    #[test]
    fn test_unknown_message_type() {
        let mut buf = Vec::new();
        write_u16(&mut buf, 999);
        write_u32(&mut buf, 0);
        write_bytes(&mut buf, &[]);
        assert_eq!(
            TypedMessage::from_ipc_bytes(&buf).unwrap_err(),
            IpcError::UnknownMessageType(999)
        );
    }

    #[test]
    fn test_frame_checksum_detects_corruption() {
        let frame = MessageFrame::new(b"Test payload data".to_vec());
        let mut bytes = frame.to_bytes();
        let (parsed, consumed) = MessageFrame::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.payload, frame.payload);
        assert_eq!(consumed, bytes.len());

        bytes[6] ^= 0xFF;
        assert_eq!(MessageFrame::from_bytes(&bytes).unwrap_err(), IpcError::ChecksumMismatch);
    }
}
