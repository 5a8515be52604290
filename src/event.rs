//! Event records: 4-byte out-of-band markers interleaved with packet records.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Sentinel leading byte that distinguishes an event record from a packet
/// record in the bulk stream (packet records never have a length field
/// whose high byte reaches this value).
pub const EVENT_SENTINEL: u8 = 0xFF;

/// Fixed size, in bytes, of an event record: sentinel, code, 2-byte BE
/// timestamp.
pub const EVENT_RECORD_LEN: usize = 4;

/// Speed reported in a capture-start event's low two bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Speed {
    High = 0b00,
    Full = 0b01,
    Low = 0b11,
}

/// The well-known event codes. Values outside this set (PHY-specific codes
/// owned by external event detectors) are preserved verbatim by
/// [`EventCode::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventCode {
    /// Timestamp counter was about to overflow; carries no meaning beyond
    /// letting the reader reconstruct full-width time.
    Rollover,
    /// Capture was stopped normally (by `capture_enable` clearing).
    CaptureStop,
    /// Capture started, at the given speed.
    CaptureStart(Speed),
    /// The programmed trigger sequence fired.
    TriggerFired,
    /// An externally-strobed event code, passed through verbatim.
    Other(u8),
}

const CAPTURE_STOP_NORMAL: u8 = 0x01;
const CAPTURE_START_BASE: u8 = 0x04;
const TRIGGER_FIRED: u8 = 0x05;
const ROLLOVER: u8 = 0x00;

impl EventCode {
    /// Decode a raw event-code byte.
    pub fn from_byte(byte: u8) -> EventCode {
        match byte {
            ROLLOVER => EventCode::Rollover,
            CAPTURE_STOP_NORMAL => EventCode::CaptureStop,
            TRIGGER_FIRED => EventCode::TriggerFired,
            b if b & !0b11 == CAPTURE_START_BASE => {
                // Low two bits are the speed; `10` is unassigned but still
                // round-trips as an opaque Speed-shaped value rather than
                // being rejected (see state register open question).
                match Speed::try_from_primitive(b & 0b11) {
                    Ok(speed) => EventCode::CaptureStart(speed),
                    Err(_) => EventCode::Other(b),
                }
            }
            other => EventCode::Other(other),
        }
    }

    /// Encode back to a raw event-code byte.
    pub fn to_byte(self) -> u8 {
        match self {
            EventCode::Rollover => ROLLOVER,
            EventCode::CaptureStop => CAPTURE_STOP_NORMAL,
            EventCode::CaptureStart(speed) => CAPTURE_START_BASE | u8::from(speed),
            EventCode::TriggerFired => TRIGGER_FIRED,
            EventCode::Other(b) => b,
        }
    }
}

/// Encode a complete 4-byte event record.
pub fn encode_event(code: EventCode, timestamp: u16) -> [u8; EVENT_RECORD_LEN] {
    let ts = timestamp.to_be_bytes();
    [EVENT_SENTINEL, code.to_byte(), ts[0], ts[1]]
}
