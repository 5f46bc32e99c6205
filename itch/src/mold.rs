//! MoldUDP64 framing
//!
//! Packets carry a 20-byte header (10-byte session, big-endian sequence
//! number, big-endian message count) followed by length-prefixed message
//! blocks. Across consecutive packets the sequence numbers tile [1, ...)
//! with no gaps or overlaps.

use crate::messages::WireError;

/// Encoded MoldUDP64 header size.
pub const MOLD_HEADER_SIZE: usize = 20;
/// Ceiling on a packet body, leaving room for IP and UDP headers in one
/// Ethernet frame.
pub const MTU_MAX: usize = 1400;

/// Callback receiving each completed packet.
pub type SendCallback = Box<dyn FnMut(&[u8]) + Send>;

/// Accumulates ITCH messages into MTU-bounded MoldUDP64 packets.
pub struct MoldUdp64Framer {
    session: [u8; 10],
    sequence_number: u64,
    pending_count: u16,
    buffer: Vec<u8>,
    send_cb: Option<SendCallback>,
}

impl MoldUdp64Framer {
    /// Build a framer. `session_id` is truncated or space-padded to 10
    /// bytes; the sequence number starts at 1.
    #[must_use]
    pub fn new(session_id: &str) -> Self {
        let mut session = [b' '; 10];
        for (dst, src) in session.iter_mut().zip(session_id.bytes()) {
            *dst = src;
        }
        Self {
            session,
            sequence_number: 1,
            pending_count: 0,
            buffer: Vec::with_capacity(MTU_MAX + MOLD_HEADER_SIZE),
            send_cb: None,
        }
    }

    /// Install the callback that receives auto-emitted packets.
    pub fn set_send_callback(&mut self, cb: impl FnMut(&[u8]) + Send + 'static) {
        self.send_cb = Some(Box::new(cb));
    }

    /// Append one message block. When the block would push the current
    /// packet past the MTU, the pending packet is emitted through the
    /// callback first and the message starts a fresh one.
    ///
    /// # Errors
    ///
    /// [`WireError::MessageTooLarge`] when the message alone cannot fit in
    /// a packet; the framer state is left untouched.
    pub fn add_message(&mut self, data: &[u8]) -> Result<(), WireError> {
        let Ok(len) = u16::try_from(data.len()) else {
            return Err(WireError::MessageTooLarge { len: data.len() });
        };
        let block_size = 2 + data.len();
        if MOLD_HEADER_SIZE + block_size > MTU_MAX {
            return Err(WireError::MessageTooLarge { len: data.len() });
        }

        if self.pending_count > 0 && MOLD_HEADER_SIZE + self.buffer.len() + block_size > MTU_MAX {
            self.emit();
        }

        self.buffer.extend_from_slice(&len.to_be_bytes());
        self.buffer.extend_from_slice(data);
        self.pending_count += 1;
        Ok(())
    }

    /// Build and return the pending packet, advancing the sequence number
    /// by the message count. Empty when nothing is pending.
    pub fn flush(&mut self) -> Vec<u8> {
        if self.pending_count == 0 {
            return Vec::new();
        }

        let mut packet = Vec::with_capacity(MOLD_HEADER_SIZE + self.buffer.len());
        packet.extend_from_slice(&self.session);
        packet.extend_from_slice(&self.sequence_number.to_be_bytes());
        packet.extend_from_slice(&self.pending_count.to_be_bytes());
        packet.extend_from_slice(&self.buffer);

        self.sequence_number += u64::from(self.pending_count);
        self.pending_count = 0;
        self.buffer.clear();
        packet
    }

    /// Flush and hand the packet to the send callback, if any.
    pub fn emit(&mut self) {
        let packet = self.flush();
        if packet.is_empty() {
            return;
        }
        if let Some(cb) = self.send_cb.as_mut() {
            cb(&packet);
        }
    }

    /// Sequence number the next packet will carry.
    #[must_use]
    pub const fn next_sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// Messages accumulated for the next packet.
    #[must_use]
    pub const fn pending_count(&self) -> u16 {
        self.pending_count
    }
}

/// A parsed MoldUDP64 packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoldPacket {
    /// 10-byte session identifier
    pub session: [u8; 10],
    /// Sequence number of the first message in the packet
    pub sequence_number: u64,
    /// Message payloads, in order
    pub messages: Vec<Vec<u8>>,
}

/// Parse a packet produced by the framer.
///
/// # Errors
///
/// [`WireError::MalformedPacket`] when the header is short, a block's
/// length prefix overruns the payload, or trailing bytes remain after the
/// declared message count.
pub fn parse_packet(data: &[u8]) -> Result<MoldPacket, WireError> {
    if data.len() < MOLD_HEADER_SIZE {
        return Err(WireError::MalformedPacket);
    }
    let mut session = [0u8; 10];
    session.copy_from_slice(&data[0..10]);
    let sequence_number = u64::from_be_bytes(data[10..18].try_into().map_err(|_| WireError::MalformedPacket)?);
    let count = u16::from_be_bytes([data[18], data[19]]);

    let mut messages = Vec::with_capacity(usize::from(count));
    let mut pos = MOLD_HEADER_SIZE;
    for _ in 0..count {
        if pos + 2 > data.len() {
            return Err(WireError::MalformedPacket);
        }
        let len = usize::from(u16::from_be_bytes([data[pos], data[pos + 1]]));
        pos += 2;
        if pos + len > data.len() {
            return Err(WireError::MalformedPacket);
        }
        messages.push(data[pos..pos + len].to_vec());
        pos += len;
    }
    if pos != data.len() {
        return Err(WireError::MalformedPacket);
    }
    Ok(MoldPacket { session, sequence_number, messages })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn flush_builds_a_parseable_packet() {
        let mut framer = MoldUdp64Framer::new("SESSION01");
        framer.add_message(b"hello").unwrap();
        framer.add_message(b"world!").unwrap();
        assert_eq!(framer.pending_count(), 2);

        let packet = framer.flush();
        assert_eq!(framer.pending_count(), 0);
        assert_eq!(framer.next_sequence_number(), 3);

        let parsed = parse_packet(&packet).unwrap();
        assert_eq!(&parsed.session, b"SESSION01 ");
        assert_eq!(parsed.sequence_number, 1);
        assert_eq!(parsed.messages, vec![b"hello".to_vec(), b"world!".to_vec()]);
    }

    #[test]
    fn empty_flush_returns_nothing() {
        let mut framer = MoldUdp64Framer::new("S");
        assert!(framer.flush().is_empty());
        assert_eq!(framer.next_sequence_number(), 1);
    }

    #[test]
    fn mtu_overflow_emits_the_previous_packet_first() {
        let packets = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&packets);
        let mut framer = MoldUdp64Framer::new("MTU");
        framer.set_send_callback(move |p: &[u8]| sink.lock().unwrap().push(p.to_vec()));

        // 300-byte messages: four fit under 1400 with prefixes, a fifth does not.
        let msg = [0xABu8; 300];
        for _ in 0..5 {
            framer.add_message(&msg).unwrap();
        }
        let emitted = packets.lock().unwrap().clone();
        assert_eq!(emitted.len(), 1);
        let first = parse_packet(&emitted[0]).unwrap();
        assert_eq!(first.messages.len(), 4);
        assert_eq!(first.sequence_number, 1);
        assert!(emitted[0].len() <= MTU_MAX);

        // The fifth message is pending in a fresh packet.
        assert_eq!(framer.pending_count(), 1);
        let second = parse_packet(&framer.flush()).unwrap();
        assert_eq!(second.sequence_number, 5);
    }

    #[test]
    fn sequence_numbers_tile_without_gaps() {
        let mut framer = MoldUdp64Framer::new("SEQ");
        let msg = [0u8; 100];
        let mut packets = Vec::new();
        for _ in 0..40 {
            // Collect via manual flush every 7 messages for uneven counts.
            framer.add_message(&msg).unwrap();
            if framer.pending_count() == 7 {
                packets.push(framer.flush());
            }
        }
        let last = framer.flush();
        if !last.is_empty() {
            packets.push(last);
        }

        let mut expected_seq = 1u64;
        for packet in &packets {
            let parsed = parse_packet(packet).unwrap();
            assert_eq!(parsed.sequence_number, expected_seq);
            expected_seq += parsed.messages.len() as u64;
        }
        assert_eq!(expected_seq, 41);
    }

    #[test]
    fn oversized_message_is_rejected_without_state_change() {
        let mut framer = MoldUdp64Framer::new("BIG");
        framer.add_message(&[1u8; 10]).unwrap();
        let err = framer.add_message(&[0u8; 2000]).unwrap_err();
        assert!(matches!(err, WireError::MessageTooLarge { len: 2000 }));
        assert_eq!(framer.pending_count(), 1);
    }

    #[test]
    fn malformed_packets_are_rejected() {
        assert!(parse_packet(&[0u8; 10]).is_err());
        // Count says one message but payload is empty.
        let mut packet = vec![b' '; 10];
        packet.extend_from_slice(&1u64.to_be_bytes());
        packet.extend_from_slice(&1u16.to_be_bytes());
        assert!(parse_packet(&packet).is_err());
    }
}
