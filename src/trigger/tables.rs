//! Per-stage offset/length/pattern/mask storage.

use crate::error::ProtocolError;

/// Number of trigger stages the tables hold.
pub const MAX_STAGES: usize = 8;

/// Maximum number of pattern/mask bytes per stage; also the clamp applied
/// to any stage's `length` field on write.
pub const MAX_PATTERN: usize = 32;

/// One stage's configuration, as read back by `GET_TRIGGER_STAGE` or written
/// by `SET_TRIGGER_STAGE`.
#[derive(Debug, Clone, Copy)]
pub struct StageConfig {
    pub offset: u16,
    pub length: u8,
    pub pattern: [u8; MAX_PATTERN],
    pub mask: [u8; MAX_PATTERN],
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            offset: 0,
            length: 0,
            pattern: [0x00; MAX_PATTERN],
            mask: [0xFF; MAX_PATTERN],
        }
    }
}

/// Backing store for all stages, addressed as a flat
/// `stage * MAX_PATTERN + index` buffer for pattern/mask bytes, the way a
/// single-read-port block memory would be laid out.
#[derive(Debug, Clone)]
pub struct TriggerTables {
    offsets: [u16; MAX_STAGES],
    lengths: [u8; MAX_STAGES],
    pattern: [u8; MAX_STAGES * MAX_PATTERN],
    mask: [u8; MAX_STAGES * MAX_PATTERN],
}

impl Default for TriggerTables {
    fn default() -> Self {
        Self {
            offsets: [0; MAX_STAGES],
            lengths: [0; MAX_STAGES],
            pattern: [0x00; MAX_STAGES * MAX_PATTERN],
            mask: [0xFF; MAX_STAGES * MAX_PATTERN],
        }
    }
}

impl TriggerTables {
    pub fn new() -> Self {
        Self::default()
    }

    fn flat_index(stage: usize, byte: usize) -> usize {
        stage * MAX_PATTERN + byte
    }

    fn check_stage(stage: u8) -> Result<usize, ProtocolError> {
        let stage = stage as usize;
        if stage < MAX_STAGES {
            Ok(stage)
        } else {
            Err(ProtocolError::InvalidStageIndex(stage as u8))
        }
    }

    pub fn offset(&self, stage: u8) -> Result<u16, ProtocolError> {
        Ok(self.offsets[Self::check_stage(stage)?])
    }

    pub fn length(&self, stage: u8) -> Result<u8, ProtocolError> {
        Ok(self.lengths[Self::check_stage(stage)?])
    }

    pub fn pattern_byte(&self, stage: u8, index: u8) -> Result<u8, ProtocolError> {
        let stage = Self::check_stage(stage)?;
        Ok(self.pattern[Self::flat_index(stage, index as usize % MAX_PATTERN)])
    }

    pub fn mask_byte(&self, stage: u8, index: u8) -> Result<u8, ProtocolError> {
        let stage = Self::check_stage(stage)?;
        Ok(self.mask[Self::flat_index(stage, index as usize % MAX_PATTERN)])
    }

    /// Read back a stage's full configuration, as `GET_TRIGGER_STAGE` does.
    pub fn stage(&self, stage: u8) -> Result<StageConfig, ProtocolError> {
        let idx = Self::check_stage(stage)?;
        let start = Self::flat_index(idx, 0);
        let end = start + MAX_PATTERN;
        let mut pattern = [0u8; MAX_PATTERN];
        let mut mask = [0u8; MAX_PATTERN];
        pattern.copy_from_slice(&self.pattern[start..end]);
        mask.copy_from_slice(&self.mask[start..end]);
        Ok(StageConfig {
            offset: self.offsets[idx],
            length: self.lengths[idx],
            pattern,
            mask,
        })
    }

    /// Commit a full stage configuration, as `SET_TRIGGER_STAGE` does.
    /// `length` is clamped to [`MAX_PATTERN`]; this is not an error.
    pub fn set_stage(&mut self, stage: u8, config: StageConfig) -> Result<(), ProtocolError> {
        let idx = Self::check_stage(stage)?;
        self.offsets[idx] = config.offset;
        self.lengths[idx] = config.length.min(MAX_PATTERN as u8);
        let start = Self::flat_index(idx, 0);
        self.pattern[start..start + MAX_PATTERN].copy_from_slice(&config.pattern);
        self.mask[start..start + MAX_PATTERN].copy_from_slice(&config.mask);
        Ok(())
    }

    /// Whether the byte `b` at packet-offset `p` matches stage `stage`'s
    /// window and masked pattern.
    pub fn matches(&self, stage: u8, p: u16, b: u8) -> bool {
        let idx = stage as usize;
        if idx >= MAX_STAGES {
            return false;
        }
        let offset = self.offsets[idx];
        let length = self.lengths[idx] as u16;
        let window_end = offset as u32 + length as u32;
        if (p as u32) < offset as u32 || (p as u32) >= window_end {
            return false;
        }
        let i = (p - offset) as usize;
        let flat = Self::flat_index(idx, i);
        let mask = self.mask[flat];
        (b & mask) == (self.pattern[flat] & mask)
    }

    /// Whether packet-offset `p` falls inside stage `stage`'s match window.
    pub fn in_window(&self, stage: u8, p: u16) -> bool {
        let idx = stage as usize;
        if idx >= MAX_STAGES {
            return false;
        }
        let offset = self.offsets[idx];
        let length = self.lengths[idx] as u16;
        let window_end = offset as u32 + length as u32;
        (p as u32) >= offset as u32 && (p as u32) < window_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_table_has_inactive_stages() {
        let t = TriggerTables::new();
        assert_eq!(t.length(0).unwrap(), 0);
        assert_eq!(t.mask_byte(0, 0).unwrap(), 0xFF);
        assert_eq!(t.pattern_byte(0, 0).unwrap(), 0x00);
    }

    #[test]
    fn out_of_range_stage_is_rejected() {
        assert!(matches!(
            TriggerTables::new().length(8),
            Err(ProtocolError::InvalidStageIndex(8))
        ));
    }

    #[test]
    fn write_then_match_exact_bytes() {
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

        assert!(!t.matches(0, 0, 0x10));
        assert!(t.matches(0, 1, 0xAA));
        assert!(t.matches(0, 2, 0xBB));
        assert!(t.matches(0, 3, 0xCC));
        assert!(!t.matches(0, 2, 0x99));
    }

    #[test]
    fn length_is_clamped_on_write() {
        let mut t = TriggerTables::new();
        let cfg = StageConfig {
            length: 200,
            ..Default::default()
        };
        t.set_stage(0, cfg).unwrap();
        assert_eq!(t.length(0).unwrap(), MAX_PATTERN as u8);
    }

    #[test]
    fn offset_near_u16_max_does_not_overflow() {
        let mut t = TriggerTables::new();
        let cfg = StageConfig {
            offset: 0xFFF0,
            length: 20,
            ..Default::default()
        };
        t.set_stage(0, cfg).unwrap();
        assert!(!t.in_window(0, 0xFFEF));
        assert!(t.in_window(0, 0xFFF0));
        assert!(t.in_window(0, 0xFFFF));
        assert!(!t.matches(0, 0xFFFF, 0x00));
    }
}
