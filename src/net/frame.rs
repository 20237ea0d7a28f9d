//! Outer wire framing: a 4-byte big-endian length prefix
//! followed by that many payload bytes. This is the only layer the I/O
//! reactor touches directly; encryption and the inner command-code header
//! are applied above it by [`super::handshake`].

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

/// Frames larger than this are rejected outright rather than buffered,
/// bounding memory a single misbehaving client can force the server to
/// allocate.
const MAX_FRAME_LEN: usize = 1024 * 1024;

#[derive(Debug, Default)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 4 {
            return Ok(None);
        }

        let len = u32::from_be_bytes(src[..4].try_into().unwrap()) as usize;
        if len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame length {len} exceeds {MAX_FRAME_LEN}"),
            ));
        }

        if src.len() < 4 + len {
            src.reserve(4 + len - src.len());
            return Ok(None);
        }

        src.advance(4);
        Ok(Some(src.split_to(len)))
    }
}

impl Encoder<BytesMut> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: BytesMut, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("frame length {} exceeds {MAX_FRAME_LEN}", item.len()),
            ));
        }
        dst.reserve(4 + item.len());
        dst.put_u32(item.len() as u32);
        dst.extend_from_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_a_frame() {
        let mut codec = FrameCodec;
        let mut buffer = BytesMut::new();
        codec.encode(BytesMut::from(&b"hello"[..]), &mut buffer).unwrap();

        let decoded = codec.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(&decoded[..], b"hello");
        assert!(buffer.is_empty());
    }

    #[test]
    fn waits_for_a_full_frame_before_decoding() {
        let mut codec = FrameCodec;
        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(&5u32.to_be_bytes());
        buffer.extend_from_slice(b"he");

        assert!(codec.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"llo");
        let decoded = codec.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(&decoded[..], b"hello");
    }

    #[test]
    fn rejects_oversized_frame_length() {
        let mut codec = FrameCodec;
        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(&(MAX_FRAME_LEN as u32 + 1).to_be_bytes());
        assert!(codec.decode(&mut buffer).is_err());
    }
}
