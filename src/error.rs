//! Error types returned by this crate.

/// Errors raised while validating or applying a vendor control request
/// against the trigger/capture state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A `SET_TRIGGER_STAGE` or `GET_TRIGGER_STAGE` request named a stage
    /// index that does not exist.
    #[error("stage index {0} is out of range")]
    InvalidStageIndex(u8),

    /// A data-out request's payload was shorter than its required length.
    #[error("expected {expected} bytes, received {received}")]
    ShortPayload { expected: usize, received: usize },

    /// The setup packet did not address this handler (wrong type,
    /// recipient, or interface index).
    #[error("request does not target this interface")]
    NotClaimed,

    /// The request code has no meaning on this interface.
    #[error("unknown vendor request code {0}")]
    UnknownRequest(u8),
}
