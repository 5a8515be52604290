//! Pull-based demultiplexing of a raw captured byte buffer into packet and
//! event records, reusable by the CLI (reading a live bulk endpoint) and by
//! tests (reading an in-memory buffer).

use crate::event::{EventCode, EVENT_RECORD_LEN, EVENT_SENTINEL};

/// One demultiplexed record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Record {
    Packet { timestamp: u16, payload: Vec<u8> },
    Event { code: EventCode, timestamp: u16 },
}

/// The outcome of one pull attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// A record was fully parsed; `consumed` bytes should be dropped from
    /// the front of the buffer before the next pull.
    Parsed { record: Record, consumed: usize },
    /// Not enough bytes are buffered yet to know whether this is a packet
    /// or an event, let alone parse it. Not an error: wait for more bytes.
    NeedMoreData,
}

/// A stateless, pull-based reader over a byte buffer. Holds no buffer of
/// its own; callers own the buffer and feed it a growing slice, the way a
/// live bulk-transfer reader accumulates bytes across multiple transfers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordReader;

impl RecordReader {
    pub fn new() -> Self {
        Self
    }

    /// Attempt to parse one record from the front of `buf`.
    pub fn pull(&self, buf: &[u8]) -> ParseOutcome {
        if buf.len() < 2 {
            return ParseOutcome::NeedMoreData;
        }
        if buf[0] == EVENT_SENTINEL {
            if buf.len() < EVENT_RECORD_LEN {
                return ParseOutcome::NeedMoreData;
            }
            let code = EventCode::from_byte(buf[1]);
            let timestamp = u16::from_be_bytes([buf[2], buf[3]]);
            return ParseOutcome::Parsed {
                record: Record::Event { code, timestamp },
                consumed: EVENT_RECORD_LEN,
            };
        }

        let len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
        let header_and_payload = 4 + len;
        let padded = header_and_payload + (len % 2);
        if buf.len() < padded {
            return ParseOutcome::NeedMoreData;
        }
        let timestamp = u16::from_be_bytes([buf[2], buf[3]]);
        let payload = buf[4..4 + len].to_vec();
        ParseOutcome::Parsed {
            record: Record::Packet { timestamp, payload },
            consumed: padded,
        }
    }

    /// Parse every complete record currently in `buf`, returning them in
    /// order along with the number of leading bytes consumed. Stops at the
    /// first [`ParseOutcome::NeedMoreData`] rather than erroring.
    pub fn pull_all(&self, mut buf: &[u8]) -> (Vec<Record>, usize) {
        let mut records = Vec::new();
        let mut total_consumed = 0;
        loop {
            match self.pull(buf) {
                ParseOutcome::Parsed { record, consumed } => {
                    records.push(record);
                    total_consumed += consumed;
                    buf = &buf[consumed..];
                }
                ParseOutcome::NeedMoreData => break,
            }
        }
        (records, total_consumed)
    }
}
