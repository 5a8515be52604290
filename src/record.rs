//! Packet records and the append-only sink they are committed into.
//!
//! The real device holds these in a clock-domain-crossing ring buffer
//! drained over a bulk endpoint; that storage is an external collaborator
//! here (see crate docs). [`RecordSink`] stands in for it: an append-only,
//! capacity-bounded destination that a commit either fully succeeds or
//! fully fails against, matching the "reader never observes a partial
//! record" ordering guarantee.

use crate::event::{encode_event, EventCode, EVENT_RECORD_LEN};

/// Maximum payload length of a single packet record (PID byte + 1024 data
/// bytes + 2-byte CRC16).
pub const MAX_PACKET_PAYLOAD: usize = 1024 + 1 + 2;

/// Number of header bytes preceding a packet's payload (2-byte length,
/// 2-byte timestamp).
pub const PACKET_HEADER_LEN: usize = 4;

/// A destination for committed records, standing in for the ring buffer /
/// bulk endpoint pair. Implementations are append-only; [`push`] either
/// commits the whole record or reports that there was no room for it.
pub trait RecordSink {
    /// Number of bytes of backing storage still free. Used by the capture
    /// FSM to decide whether the next packet byte would overflow the ring
    /// buffer and a transition to the overrun state is required.
    fn remaining_capacity(&self) -> usize;

    /// Commit a complete, already-framed record. Implementations must
    /// either append all of `bytes` or none of it.
    fn push(&mut self, bytes: &[u8]) -> Result<(), Overrun>;
}

/// Raised when a [`RecordSink`] has no room left for a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("record sink is full")]
pub struct Overrun;

/// Encode a packet record: 2-byte BE length, 2-byte BE timestamp, payload,
/// and (if the payload length is odd) one zero pad byte.
pub fn encode_packet_record(timestamp: u16, payload: &[u8]) -> Vec<u8> {
    let len = payload.len() as u16;
    let mut out = Vec::with_capacity(PACKET_HEADER_LEN + payload.len() + 1);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&timestamp.to_be_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
    out
}

/// Encode an event record.
pub fn encode_event_record(code: EventCode, timestamp: u16) -> [u8; EVENT_RECORD_LEN] {
    encode_event(code, timestamp)
}

/// A simple in-memory [`RecordSink`] with a fixed word (2-byte) capacity,
/// used by tests and by the CLI when dumping a bounded capture to memory
/// before writing it out.
#[derive(Debug, Clone)]
pub struct InMemorySink {
    bytes: Vec<u8>,
    capacity_words: usize,
}

impl InMemorySink {
    pub fn with_capacity_words(capacity_words: usize) -> Self {
        Self {
            bytes: Vec::new(),
            capacity_words,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    fn committed_words(&self) -> usize {
        (self.bytes.len() + 1) / 2
    }
}

impl RecordSink for InMemorySink {
    fn remaining_capacity(&self) -> usize {
        self.capacity_words.saturating_sub(self.committed_words()) * 2
    }

    fn push(&mut self, bytes: &[u8]) -> Result<(), Overrun> {
        let words_needed = (bytes.len() + 1) / 2;
        if self.committed_words() + words_needed > self.capacity_words {
            return Err(Overrun);
        }
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }
}
