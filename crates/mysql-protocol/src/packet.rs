//! MySQL packet header definitions.
//!
//! Every MySQL packet starts with a 4-byte header: a 24-bit little-endian
//! payload length followed by an 8-bit sequence id. Sequence ids form a
//! per-command counter that resets at each new command and wraps modulo
//! 256.

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::put_u24_le;
use crate::error::{ParseError, ParseResult};

/// MySQL packet header size in bytes.
pub const PACKET_HEADER_SIZE: usize = 4;

/// Maximum payload length a single packet can carry (16 MiB - 1).
///
/// A payload of exactly this length signals that the logical payload
/// continues in the next packet.
pub const MAX_PAYLOAD_SIZE: usize = 0xFF_FFFF;

/// MySQL packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Payload length (24-bit on the wire, never above [`MAX_PAYLOAD_SIZE`]).
    pub payload_len: u32,
    /// Per-command sequence number (wraps at 255).
    pub sequence_id: u8,
}

impl PacketHeader {
    /// Parse a packet header from the start of `src`.
    pub fn decode(src: &[u8]) -> ParseResult<Self> {
        if src.len() < PACKET_HEADER_SIZE {
            return Err(ParseError::Incomplete);
        }
        let payload_len = u32::from(src[0]) | u32::from(src[1]) << 8 | u32::from(src[2]) << 16;
        Ok(Self {
            payload_len,
            sequence_id: src[3],
        })
    }

    /// Encode the packet header.
    pub fn encode(&self, dst: &mut impl BufMut) {
        put_u24_le(dst, self.payload_len);
        dst.put_u8(self.sequence_id);
    }

    /// Total frame size including the header itself.
    #[must_use]
    pub const fn frame_len(&self) -> usize {
        PACKET_HEADER_SIZE + self.payload_len as usize
    }

    /// Whether the logical payload continues in a follow-up packet.
    #[must_use]
    pub const fn is_continued(&self) -> bool {
        self.payload_len as usize == MAX_PAYLOAD_SIZE
    }
}

/// Frame `payload` into a complete packet with the given sequence id.
///
/// Fails with [`ParseError::InvalidLength`] when the payload exceeds
/// [`MAX_PAYLOAD_SIZE`]; multi-packet command bodies are not produced by
/// this driver.
pub fn wrap_packet(payload: &[u8], sequence_id: u8) -> ParseResult<Bytes> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ParseError::InvalidLength);
    }
    let mut buf = BytesMut::with_capacity(PACKET_HEADER_SIZE + payload.len());
    PacketHeader {
        payload_len: payload.len() as u32,
        sequence_id,
    }
    .encode(&mut buf);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = PacketHeader {
            payload_len: 0x01_02_03,
            sequence_id: 7,
        };

        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), PACKET_HEADER_SIZE);
        assert_eq!(&buf[..], &[0x03, 0x02, 0x01, 0x07]);

        let decoded = PacketHeader::decode(&buf).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_header_incomplete() {
        assert_eq!(
            PacketHeader::decode(&[0x01, 0x00, 0x00]),
            Err(ParseError::Incomplete)
        );
    }

    #[test]
    fn test_wrap_packet() {
        let packet = wrap_packet(b"\x03SELECT 1", 0).unwrap();
        assert_eq!(&packet[..4], &[0x09, 0x00, 0x00, 0x00]);
        assert_eq!(&packet[4..], b"\x03SELECT 1");
    }

    #[test]
    fn test_wrap_packet_rejects_oversize() {
        let oversize = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert_eq!(wrap_packet(&oversize, 0), Err(ParseError::InvalidLength));
    }

    #[test]
    fn test_continuation_marker() {
        let full = PacketHeader {
            payload_len: MAX_PAYLOAD_SIZE as u32,
            sequence_id: 1,
        };
        assert!(full.is_continued());

        let short = PacketHeader {
            payload_len: 12,
            sequence_id: 1,
        };
        assert!(!short.is_continued());
    }
}
