//! Packet-framed connection over an async byte transport.
//!
//! [`Connection`] owns the transport and the receive [`RingBuffer`]. It
//! is used by exactly one command at a time: the caller sends a complete
//! command packet, then reads response packets until its state machine
//! finishes. Response bytes are parsed strictly in wire order.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use mysql_protocol::packet::{MAX_PAYLOAD_SIZE, PACKET_HEADER_SIZE, PacketHeader};
use mysql_protocol::ParseError;

use crate::error::CodecError;
use crate::ring::RingBuffer;

/// A complete packet extracted from the stream.
///
/// Payloads longer than 16 MiB - 1 arrive as several wire packets; those
/// are joined before a `Packet` is surfaced, so `payload` is always the
/// whole logical payload.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Sequence id of the (last) wire packet this payload came from.
    pub sequence_id: u8,
    /// Logical payload, header stripped.
    pub payload: Bytes,
    /// Length of the wire payload this packet was framed with. Differs
    /// from `payload.len()` only for joined continuations.
    pub wire_len: usize,
}

impl Packet {
    /// First payload byte, used to classify responses.
    #[must_use]
    pub fn first_byte(&self) -> Option<u8> {
        self.payload.first().copied()
    }
}

/// A MySQL connection over an arbitrary async transport.
pub struct Connection<T> {
    transport: T,
    ring: RingBuffer,
    /// Sequence id the next server packet should carry.
    expected_sequence: u8,
}

impl<T> Connection<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a connection with a receive buffer of `buffer_capacity`
    /// bytes.
    pub fn new(transport: T, buffer_capacity: usize) -> Self {
        Self {
            transport,
            ring: RingBuffer::new(buffer_capacity),
            expected_sequence: 0,
        }
    }

    /// Capacity of the receive buffer.
    #[must_use]
    pub fn buffer_capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Send one complete, already-framed packet, looping over partial
    /// writes.
    ///
    /// On completion the receive buffer is cleared (a new command starts
    /// with a clean window) and the sequence expectation is derived from
    /// the outgoing header.
    pub async fn send(&mut self, packet: &[u8]) -> Result<(), CodecError> {
        let mut sent = 0;
        while sent < packet.len() {
            let n = self.transport.write(&packet[sent..]).await?;
            if n == 0 {
                return Err(CodecError::WriteZero);
            }
            sent += n;
        }
        self.transport.flush().await?;

        self.ring.clear();
        if packet.len() >= PACKET_HEADER_SIZE {
            self.expected_sequence = packet[3].wrapping_add(1);
        }

        tracing::trace!(bytes = packet.len(), "sent command packet");
        Ok(())
    }

    /// Read the next logical packet, joining 16 MiB payload
    /// continuations.
    pub async fn read_packet(&mut self) -> Result<Packet, CodecError> {
        let first = self.read_frame().await?;
        if first.wire_len < MAX_PAYLOAD_SIZE {
            return Ok(first);
        }

        // The payload continues until a frame shorter than the maximum
        // arrives.
        let mut joined = BytesMut::from(&first.payload[..]);
        loop {
            let next = self.read_frame().await?;
            joined.extend_from_slice(&next.payload);
            if next.wire_len < MAX_PAYLOAD_SIZE {
                tracing::debug!(total = joined.len(), "joined continued payload");
                return Ok(Packet {
                    sequence_id: next.sequence_id,
                    wire_len: next.wire_len,
                    payload: joined.freeze(),
                });
            }
        }
    }

    /// Read a single wire frame, filling the ring buffer from the
    /// transport as needed.
    async fn read_frame(&mut self) -> Result<Packet, CodecError> {
        loop {
            if let Some(packet) = self.try_extract()? {
                if packet.sequence_id != self.expected_sequence {
                    // The server owns the counter; resynchronize to it.
                    tracing::warn!(
                        expected = self.expected_sequence,
                        actual = packet.sequence_id,
                        "server sequence id mismatch"
                    );
                }
                self.expected_sequence = packet.sequence_id.wrapping_add(1);
                return Ok(packet);
            }

            let n = {
                let (head, _) = self.ring.writable();
                if head.is_empty() {
                    return Err(CodecError::BufferOverflow);
                }
                self.transport.read(head).await?
            };
            if n == 0 {
                return Err(CodecError::ConnectionClosed);
            }
            self.ring.produce(n);
            tracing::trace!(bytes = n, buffered = self.ring.readable_len(), "received");
        }
    }

    /// Extract one whole frame from the ring buffer, or `None` when fewer
    /// than `4 + declared-length` bytes are buffered.
    fn try_extract(&mut self) -> Result<Option<Packet>, CodecError> {
        let (head, tail) = self.ring.readable();
        let buffered = head.len() + tail.len();
        if buffered < PACKET_HEADER_SIZE {
            return Ok(None);
        }

        let mut header_bytes = [0u8; PACKET_HEADER_SIZE];
        for (i, slot) in header_bytes.iter_mut().enumerate() {
            *slot = if i < head.len() {
                head[i]
            } else {
                tail[i - head.len()]
            };
        }
        let header = match PacketHeader::decode(&header_bytes) {
            Ok(header) => header,
            Err(ParseError::Incomplete) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let frame_len = header.frame_len();
        if frame_len > self.ring.capacity() {
            // This frame can never fit; reading more cannot help.
            return Err(CodecError::BufferOverflow);
        }
        if buffered < frame_len {
            return Ok(None);
        }

        let payload = if frame_len <= head.len() {
            Bytes::copy_from_slice(&head[PACKET_HEADER_SIZE..frame_len])
        } else {
            // The frame straddles the wrap; flatten the two segments.
            let mut flat = BytesMut::with_capacity(header.payload_len as usize);
            if head.len() > PACKET_HEADER_SIZE {
                flat.extend_from_slice(&head[PACKET_HEADER_SIZE..]);
            }
            let skip = PACKET_HEADER_SIZE.saturating_sub(head.len());
            flat.extend_from_slice(&tail[skip..frame_len - head.len()]);
            flat.freeze()
        };

        self.ring.consume(frame_len);
        Ok(Some(Packet {
            sequence_id: header.sequence_id,
            wire_len: header.payload_len as usize,
            payload,
        }))
    }

    /// Shut down the write side of the transport.
    pub async fn shutdown(&mut self) -> Result<(), CodecError> {
        self.transport.shutdown().await?;
        Ok(())
    }

    /// Consume the connection and return the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }
}

impl<T> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("buffered", &self.ring.readable_len())
            .field("expected_sequence", &self.expected_sequence)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::BufMut;
    use mysql_protocol::packet::wrap_packet;

    fn frame(payload: &[u8], seq: u8) -> Vec<u8> {
        wrap_packet(payload, seq).unwrap().to_vec()
    }

    #[tokio::test]
    async fn test_read_single_packet() {
        let wire = frame(b"\x00\x00\x00\x02\x00\x00\x00", 1);
        let (client, mut server) = tokio::io::duplex(64);
        let mut conn = Connection::new(client, 1024);

        tokio::io::AsyncWriteExt::write_all(&mut server, &wire)
            .await
            .unwrap();

        let packet = conn.read_packet().await.unwrap();
        assert_eq!(packet.sequence_id, 1);
        assert_eq!(packet.first_byte(), Some(0x00));
        assert_eq!(packet.payload.len(), 7);
    }

    #[tokio::test]
    async fn test_read_across_partial_arrivals() {
        let wire = frame(b"hello world", 0);
        let (client, mut server) = tokio::io::duplex(64);
        let mut conn = Connection::new(client, 1024);

        let (a, b) = wire.split_at(3);
        let (a, b) = (a.to_vec(), b.to_vec());
        let handle = tokio::spawn(async move {
            tokio::io::AsyncWriteExt::write_all(&mut server, &a).await.unwrap();
            tokio::task::yield_now().await;
            tokio::io::AsyncWriteExt::write_all(&mut server, &b).await.unwrap();
            server
        });

        let packet = conn.read_packet().await.unwrap();
        assert_eq!(&packet.payload[..], b"hello world");
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_peer_close_is_connection_closed() {
        let (client, server) = tokio::io::duplex(64);
        let mut conn = Connection::new(client, 1024);
        drop(server);

        match conn.read_packet().await {
            Err(CodecError::ConnectionClosed) => {}
            other => panic!("expected ConnectionClosed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_frame_larger_than_buffer_overflows() {
        let wire = frame(&vec![0xAB; 64], 0);
        let (client, mut server) = tokio::io::duplex(256);
        let mut conn = Connection::new(client, 32);

        tokio::io::AsyncWriteExt::write_all(&mut server, &wire)
            .await
            .unwrap();

        match conn.read_packet().await {
            Err(CodecError::BufferOverflow) => {}
            other => panic!("expected BufferOverflow, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_sets_sequence_expectation() {
        let (client, server) = tokio::io::duplex(256);
        let mut conn = Connection::new(client, 1024);

        let (mut server_read, mut server_write) = tokio::io::split(server);

        conn.send(&frame(b"\x03SELECT 1", 0)).await.unwrap();

        let mut received = vec![0u8; 13];
        tokio::io::AsyncReadExt::read_exact(&mut server_read, &mut received)
            .await
            .unwrap();
        assert_eq!(&received[4..], b"\x03SELECT 1");

        // Server answers with sequence 1; no mismatch expected.
        tokio::io::AsyncWriteExt::write_all(
            &mut server_write,
            &frame(b"\x00\x00\x00\x02\x00\x00\x00", 1),
        )
        .await
        .unwrap();
        let packet = conn.read_packet().await.unwrap();
        assert_eq!(packet.sequence_id, 1);
    }

    #[tokio::test]
    async fn test_joins_continued_payloads() {
        // A logical payload longer than 16 MiB - 1 arrives as a maximal
        // frame followed by the remainder; read_packet joins them.
        let first_payload = vec![0xAA; MAX_PAYLOAD_SIZE];
        let second_payload = b"tail".to_vec();

        let (client, mut server) = tokio::io::duplex(64 * 1024);
        let mut conn = Connection::new(client, MAX_PAYLOAD_SIZE + 4);

        let writer = tokio::spawn(async move {
            tokio::io::AsyncWriteExt::write_all(&mut server, &frame(&first_payload, 1))
                .await
                .unwrap();
            tokio::io::AsyncWriteExt::write_all(&mut server, &frame(&second_payload, 2))
                .await
                .unwrap();
            server
        });

        let packet = conn.read_packet().await.unwrap();
        assert_eq!(packet.payload.len(), MAX_PAYLOAD_SIZE + 4);
        assert_eq!(&packet.payload[..4], &[0xAA; 4]);
        assert_eq!(&packet.payload[MAX_PAYLOAD_SIZE..], b"tail");
        assert_eq!(packet.sequence_id, 2);
        assert!(packet.wire_len < MAX_PAYLOAD_SIZE);
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_multiple_packets_in_one_read() {
        let mut wire = Vec::new();
        wire.put_slice(&frame(b"first", 0));
        wire.put_slice(&frame(b"second", 1));

        let (client, mut server) = tokio::io::duplex(256);
        let mut conn = Connection::new(client, 1024);
        tokio::io::AsyncWriteExt::write_all(&mut server, &wire)
            .await
            .unwrap();

        let first = conn.read_packet().await.unwrap();
        assert_eq!(&first.payload[..], b"first");
        let second = conn.read_packet().await.unwrap();
        assert_eq!(&second.payload[..], b"second");
        assert_eq!(second.sequence_id, 1);
    }
}
