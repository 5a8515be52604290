//! Per-byte masked compare against the currently active stage.
//!
//! The reference hardware pipelines the pattern/mask lookup by one cycle
//! because the backing memory has synchronous read latency; only the
//! end-of-packet outcome is ever observed, so this performs the masked
//! compare immediately per byte and arrives at the identical result.

use crate::trigger::tables::TriggerTables;

/// Tracks one packet's worth of match-pipeline state: whether any compared
/// byte has mismatched, and how many bytes were compared.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchPipeline {
    stage_mismatch: bool,
    stage_match_count: u16,
}

impl MatchPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset sticky state at the start of a new packet.
    pub fn start_packet(&mut self) {
        self.stage_mismatch = false;
        self.stage_match_count = 0;
    }

    /// Feed one captured byte at packet-offset `p` against `stage`, if the
    /// stage is currently active (`active_valid`).
    pub fn feed_byte(&mut self, tables: &TriggerTables, stage: u8, active_valid: bool, p: u16, b: u8) {
        if !active_valid || !tables.in_window(stage, p) {
            return;
        }
        self.stage_match_count += 1;
        if !tables.matches(stage, p, b) {
            self.stage_mismatch = true;
        }
    }

    /// Whether the active stage fully matched across the packet just ended:
    /// every byte in its window compared equal, at least one byte was
    /// compared, and the packet was long enough to cover the whole window.
    pub fn full_match(&self, tables: &TriggerTables, stage: u8, active_valid: bool, packet_size: u16) -> bool {
        if !active_valid {
            return false;
        }
        let length = match tables.length(stage) {
            Ok(l) => l as u16,
            Err(_) => return false,
        };
        let offset = match tables.offset(stage) {
            Ok(o) => o,
            Err(_) => return false,
        };
        length > 0
            && !self.stage_mismatch
            && self.stage_match_count == length
            && packet_size as u32 >= offset as u32 + length as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::tables::StageConfig;

    fn tables_with_pattern() -> TriggerTables {
        let mut t = TriggerTables::new();
        let mut cfg = StageConfig {
            offset: 1,
            length: 3,
            ..Default::default()
        };
        cfg.pattern[0] = 0xAA;
        cfg.pattern[1] = 0xBB;
        cfg.pattern[2] = 0xCC;
        t.set_stage(0, cfg).unwrap();
        t
    }

    #[test]
    fn matching_packet_is_a_full_match() {
        let tables = tables_with_pattern();
        let mut p = MatchPipeline::new();
        p.start_packet();
        for (i, b) in [0x10u8, 0xAA, 0xBB, 0xCC].iter().enumerate() {
            p.feed_byte(&tables, 0, true, i as u16, *b);
        }
        assert!(p.full_match(&tables, 0, true, 4));
    }

    #[test]
    fn mismatched_byte_prevents_full_match() {
        let tables = tables_with_pattern();
        let mut p = MatchPipeline::new();
        p.start_packet();
        for (i, b) in [0x10u8, 0xAA, 0x99, 0xCC].iter().enumerate() {
            p.feed_byte(&tables, 0, true, i as u16, *b);
        }
        assert!(!p.full_match(&tables, 0, true, 4));
    }

    #[test]
    fn short_packet_never_covers_window() {
        let tables = tables_with_pattern();
        let mut p = MatchPipeline::new();
        p.start_packet();
        p.feed_byte(&tables, 0, true, 0, 0x10);
        assert!(!p.full_match(&tables, 0, true, 1));
    }

    #[test]
    fn inactive_stage_cannot_match() {
        let tables = tables_with_pattern();
        let mut p = MatchPipeline::new();
        p.start_packet();
        assert!(!p.full_match(&tables, 0, false, 4));
    }
}
