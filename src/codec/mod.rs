//! Binary codec: little-endian primitive reads/writes, length-prefixed
//! strings in a choice of encodings, and the mutable [`Packet`] buffer that
//! every wire message is built from or parsed into.
//!
//! Read and write cursors are independent: writing always appends to the
//! end of the buffer (with [`Packet::write_at`] available for header
//! fixups), while reading walks forward from its own position and can be
//! rewound with [`Packet::seek`].

pub mod encoding;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

pub use encoding::{EncodingError, StringEncoding};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("buffer underflow: needed {needed} bytes, {available} available")]
    Underflow { needed: usize, available: usize },
    #[error("invalid string encoding")]
    InvalidEncoding,
    #[error("string byte count {0} is not a multiple of the code unit size")]
    MisalignedString(u16),
}

impl From<EncodingError> for CodecError {
    fn from(_: EncodingError) -> Self {
        CodecError::InvalidEncoding
    }
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Placeholder width reserved at the front of a packet for the length field
/// that gets fixed up once the body is known, plus the command code that
/// immediately follows it.
const LENGTH_PLACEHOLDER_SIZE: usize = 2;
const COMMAND_CODE_SIZE: usize = 2;

/// A mutable, growable packet buffer with independent read/write cursors.
///
/// Mirrors the role of `libcomp::Packet` in the original channel server:
/// callers build outgoing packets by writing primitives in order, and
/// parse incoming ones by reading primitives in the same order the sender
/// wrote them.
#[derive(Debug, Clone, Default)]
pub struct Packet {
    buffer: BytesMut,
    read_pos: usize,
}

impl Packet {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
            read_pos: 0,
        }
    }

    pub fn from_bytes(bytes: impl Into<BytesMut>) -> Self {
        Self {
            buffer: bytes.into(),
            read_pos: 0,
        }
    }

    /// Writes a `u16` length placeholder followed by the packet's command
    /// code, ready for a body to be appended and [`Packet::finalize`] to be
    /// called once it's complete.
    pub fn write_header(&mut self, command_code: u16) {
        self.write_u16(0);
        self.write_u16(command_code);
    }

    /// Fixes up the length placeholder written by [`Packet::write_header`]
    /// to reflect the packet's current total size.
    pub fn finalize(&mut self) {
        let total_len = self.buffer.len() as u16;
        self.write_at_u16(0, total_len);
    }

    pub fn command_code(&self) -> CodecResult<u16> {
        self.peek_u16_at(LENGTH_PLACEHOLDER_SIZE)
    }

    /// Bytes remaining for the reader.
    pub fn left(&self) -> usize {
        self.buffer.len().saturating_sub(self.read_pos)
    }

    pub fn is_empty_to_read(&self) -> bool {
        self.left() == 0
    }

    /// Moves the read cursor back to `pos`, or to the start of the buffer.
    pub fn seek(&mut self, pos: usize) {
        self.read_pos = pos.min(self.buffer.len());
    }

    pub fn rewind(&mut self) {
        self.read_pos = 0;
    }

    pub fn skip(&mut self, count: usize) -> CodecResult<()> {
        self.require(count)?;
        self.read_pos += count;
        Ok(())
    }

    fn require(&self, count: usize) -> CodecResult<()> {
        if self.left() < count {
            return Err(CodecError::Underflow {
                needed: count,
                available: self.left(),
            });
        }
        Ok(())
    }

    /// Returns an immutable, reference-counted snapshot of the packet
    /// usable after the mutable buffer has moved on (e.g. queued for send
    /// while a new packet is being built in its place).
    pub fn freeze(&self) -> ReadOnlyPacket {
        ReadOnlyPacket {
            bytes: Bytes::copy_from_slice(&self.buffer),
        }
    }

    pub fn into_bytes(self) -> BytesMut {
        self.buffer
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    // --- primitive writes (append at the end of the buffer) ---

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.put_u8(value);
    }
    pub fn write_s8(&mut self, value: i8) {
        self.buffer.put_i8(value);
    }
    pub fn write_u16(&mut self, value: u16) {
        self.buffer.put_u16_le(value);
    }
    pub fn write_s16(&mut self, value: i16) {
        self.buffer.put_i16_le(value);
    }
    pub fn write_u32(&mut self, value: u32) {
        self.buffer.put_u32_le(value);
    }
    pub fn write_s32(&mut self, value: i32) {
        self.buffer.put_i32_le(value);
    }
    pub fn write_u64(&mut self, value: u64) {
        self.buffer.put_u64_le(value);
    }
    pub fn write_s64(&mut self, value: i64) {
        self.buffer.put_i64_le(value);
    }
    pub fn write_f32(&mut self, value: f32) {
        self.buffer.put_f32_le(value);
    }
    pub fn write_array(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Writes a length-prefixed string: a `u16` byte count (including the
    /// null terminator, if requested) followed by the encoded bytes and
    /// optionally a trailing null byte.
    pub fn write_string(&mut self, value: &str, encoding: StringEncoding, null_terminate: bool) {
        let mut bytes = encoding.encode(value);
        if null_terminate {
            bytes.push(0);
        }
        self.write_u16(bytes.len() as u16);
        self.write_array(&bytes);
    }

    // --- fixed-position overwrite, used for header fixups ---

    pub fn write_at_u16(&mut self, pos: usize, value: u16) {
        let bytes = value.to_le_bytes();
        self.buffer[pos..pos + 2].copy_from_slice(&bytes);
    }

    // --- primitive reads (advance read_pos) ---

    pub fn read_u8(&mut self) -> CodecResult<u8> {
        self.require(1)?;
        let value = self.buffer[self.read_pos];
        self.read_pos += 1;
        Ok(value)
    }
    pub fn read_s8(&mut self) -> CodecResult<i8> {
        Ok(self.read_u8()? as i8)
    }
    pub fn read_u16(&mut self) -> CodecResult<u16> {
        self.require(2)?;
        let value = u16::from_le_bytes(self.buffer[self.read_pos..self.read_pos + 2].try_into().unwrap());
        self.read_pos += 2;
        Ok(value)
    }
    pub fn read_s16(&mut self) -> CodecResult<i16> {
        Ok(self.read_u16()? as i16)
    }
    pub fn read_u32(&mut self) -> CodecResult<u32> {
        self.require(4)?;
        let value = u32::from_le_bytes(self.buffer[self.read_pos..self.read_pos + 4].try_into().unwrap());
        self.read_pos += 4;
        Ok(value)
    }
    pub fn read_s32(&mut self) -> CodecResult<i32> {
        Ok(self.read_u32()? as i32)
    }
    pub fn read_u64(&mut self) -> CodecResult<u64> {
        self.require(8)?;
        let value = u64::from_le_bytes(self.buffer[self.read_pos..self.read_pos + 8].try_into().unwrap());
        self.read_pos += 8;
        Ok(value)
    }
    pub fn read_s64(&mut self) -> CodecResult<i64> {
        Ok(self.read_u64()? as i64)
    }
    pub fn read_f32(&mut self) -> CodecResult<f32> {
        self.require(4)?;
        let value = f32::from_le_bytes(self.buffer[self.read_pos..self.read_pos + 4].try_into().unwrap());
        self.read_pos += 4;
        Ok(value)
    }

    pub fn read_array(&mut self, len: usize) -> CodecResult<Vec<u8>> {
        self.require(len)?;
        let value = self.buffer[self.read_pos..self.read_pos + len].to_vec();
        self.read_pos += len;
        Ok(value)
    }

    /// Reads a length-prefixed string. `null_terminated` strips the
    /// trailing null byte (which is included in the `u16` prefix) from the
    /// returned value.
    pub fn read_string(
        &mut self,
        encoding: StringEncoding,
        null_terminated: bool,
    ) -> CodecResult<String> {
        let byte_count = self.read_u16()? as usize;
        let mut bytes = self.read_array(byte_count)?;
        if null_terminated {
            if bytes.last() == Some(&0) {
                bytes.pop();
            }
        }
        Ok(encoding.decode(&bytes)?)
    }

    // --- peeks: read without advancing the cursor ---

    pub fn peek_u8(&self) -> CodecResult<u8> {
        self.peek_u8_at(self.read_pos)
    }
    pub fn peek_u16(&self) -> CodecResult<u16> {
        self.peek_u16_at(self.read_pos)
    }
    pub fn peek_u32(&self) -> CodecResult<u32> {
        self.peek_u32_at(self.read_pos)
    }

    fn peek_u8_at(&self, pos: usize) -> CodecResult<u8> {
        if self.buffer.len() < pos + 1 {
            return Err(CodecError::Underflow {
                needed: 1,
                available: self.buffer.len().saturating_sub(pos),
            });
        }
        Ok(self.buffer[pos])
    }
    fn peek_u16_at(&self, pos: usize) -> CodecResult<u16> {
        if self.buffer.len() < pos + 2 {
            return Err(CodecError::Underflow {
                needed: 2,
                available: self.buffer.len().saturating_sub(pos),
            });
        }
        Ok(u16::from_le_bytes(self.buffer[pos..pos + 2].try_into().unwrap()))
    }
    fn peek_u32_at(&self, pos: usize) -> CodecResult<u32> {
        if self.buffer.len() < pos + 4 {
            return Err(CodecError::Underflow {
                needed: 4,
                available: self.buffer.len().saturating_sub(pos),
            });
        }
        Ok(u32::from_le_bytes(self.buffer[pos..pos + 4].try_into().unwrap()))
    }
}

/// Immutable snapshot of a packet's bytes, cheaply cloneable.
#[derive(Debug, Clone)]
pub struct ReadOnlyPacket {
    bytes: Bytes,
}

impl ReadOnlyPacket {
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Opens a fresh, rewindable [`Packet`] reader over this snapshot's
    /// bytes without copying.
    pub fn reader(&self) -> Packet {
        Packet {
            buffer: BytesMut::from(&self.bytes[..]),
            read_pos: 0,
        }
    }
}

impl From<Packet> for ReadOnlyPacket {
    fn from(packet: Packet) -> Self {
        ReadOnlyPacket {
            bytes: packet.buffer.freeze(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn primitive_round_trip() {
        let mut packet = Packet::new();
        packet.write_u8(0xAB);
        packet.write_s8(-5);
        packet.write_u16(0x1234);
        packet.write_s16(-1000);
        packet.write_u32(0xDEADBEEF);
        packet.write_s32(-123456);
        packet.write_u64(0x1122334455667788);
        packet.write_s64(-1);
        packet.write_f32(3.5);

        assert_eq!(packet.read_u8().unwrap(), 0xAB);
        assert_eq!(packet.read_s8().unwrap(), -5);
        assert_eq!(packet.read_u16().unwrap(), 0x1234);
        assert_eq!(packet.read_s16().unwrap(), -1000);
        assert_eq!(packet.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(packet.read_s32().unwrap(), -123456);
        assert_eq!(packet.read_u64().unwrap(), 0x1122334455667788);
        assert_eq!(packet.read_s64().unwrap(), -1);
        assert_eq!(packet.read_f32().unwrap(), 3.5);
        assert_eq!(packet.left(), 0);
    }

    #[test]
    fn string_round_trip_with_null_terminator() {
        let mut packet = Packet::new();
        packet.write_string("user_a", StringEncoding::Utf8, true);
        let value = packet.read_string(StringEncoding::Utf8, true).unwrap();
        assert_eq!(value, "user_a");
    }

    #[test]
    fn underflow_is_reported_not_panicking() {
        let mut packet = Packet::new();
        packet.write_u8(1);
        let _ = packet.read_u8().unwrap();
        assert_eq!(
            packet.read_u32(),
            Err(CodecError::Underflow {
                needed: 4,
                available: 0
            })
        );
    }

    #[test]
    fn header_fixup_reflects_final_length() {
        let mut packet = Packet::new();
        packet.write_header(0x00F1);
        packet.write_u32(99);
        packet.finalize();

        packet.rewind();
        let len = packet.read_u16().unwrap();
        let code = packet.read_u16().unwrap();
        assert_eq!(len as usize, packet.as_slice().len());
        assert_eq!(code, 0x00F1);
        assert_eq!(packet.read_u32().unwrap(), 99);
    }

    #[test]
    fn peek_does_not_advance_cursor() {
        let mut packet = Packet::new();
        packet.write_u16(42);
        assert_eq!(packet.peek_u16().unwrap(), 42);
        assert_eq!(packet.left(), 2);
        assert_eq!(packet.read_u16().unwrap(), 42);
        assert_eq!(packet.left(), 0);
    }

    #[test]
    fn skip_advances_read_cursor() {
        let mut packet = Packet::new();
        packet.write_u32(1);
        packet.write_u32(2);
        packet.skip(4).unwrap();
        assert_eq!(packet.read_u32().unwrap(), 2);
    }
}
