//! Construction-time options gating engine behavior, the way a decoder's
//! options struct gates behavior once at construction rather than through
//! global state.

use crate::vendor::state::SupportedSpeeds;

/// Options fixed for the lifetime of an [`crate::analyzer::Analyzer`].
#[derive(Debug, Clone, Copy)]
pub struct AnalyzerOptions {
    /// Speeds advertised by `GET_SPEEDS`.
    pub supported_speeds: SupportedSpeeds,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            supported_speeds: SupportedSpeeds::HIGH | SupportedSpeeds::FULL | SupportedSpeeds::LOW,
        }
    }
}
