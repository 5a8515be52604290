//! The trigger subsystem: tables, the per-byte match pipeline, and the
//! sequence FSM they drive, wired together behind one small facade.

pub mod pipeline;
pub mod sequence;
pub mod tables;

use pipeline::MatchPipeline;
use sequence::{SequenceOutcome, SequenceState};
use tables::{StageConfig, TriggerTables, MAX_STAGES};

use crate::error::ProtocolError;

/// Host-settable trigger control, committed by `SET_TRIGGER_CONTROL` and
/// read back (in part) by `GET_TRIGGER_STATUS`.
#[derive(Debug, Clone, Copy)]
pub struct TriggerControl {
    pub enable: bool,
    pub output_enable: bool,
    pub stage_count: u8,
}

impl Default for TriggerControl {
    fn default() -> Self {
        Self {
            enable: false,
            output_enable: false,
            stage_count: 0,
        }
    }
}

/// Tables, pipeline, sequence state, and control flags, wired together as
/// one per-packet evaluator.
#[derive(Debug, Clone, Default)]
pub struct TriggerSubsystem {
    tables: TriggerTables,
    pipeline: MatchPipeline,
    sequence: SequenceState,
    control: TriggerControl,
    armed: bool,
}

impl TriggerSubsystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_stage(&mut self, stage: u8, config: StageConfig) -> Result<(), ProtocolError> {
        self.tables.set_stage(stage, config)
    }

    pub fn stage(&self, stage: u8) -> Result<StageConfig, ProtocolError> {
        self.tables.stage(stage)
    }

    /// Commit `SET_TRIGGER_CONTROL`. Clearing `enable` disarms and zeros
    /// the sequence, per the disable invariant.
    pub fn set_control(&mut self, control: TriggerControl) {
        let disabling = self.control.enable && !control.enable;
        self.control = TriggerControl {
            stage_count: control.stage_count.min(MAX_STAGES as u8),
            ..control
        };
        if disabling {
            self.armed = false;
            self.sequence.reset();
        }
    }

    pub fn arm(&mut self) {
        self.armed = true;
        self.sequence.reset();
    }

    pub fn disarm(&mut self) {
        self.armed = false;
        self.sequence.reset();
    }

    /// Zero `sequence_stage` without touching `armed` or `enable`, as
    /// disabling *capture* (a different register than the trigger's own
    /// `enable` bit) does per the sequence-state invariants.
    pub fn reset_sequence_on_capture_disable(&mut self) {
        self.sequence.reset();
    }

    pub fn enable(&self) -> bool {
        self.control.enable
    }

    pub fn armed(&self) -> bool {
        self.armed
    }

    pub fn output_enable(&self) -> bool {
        self.control.output_enable
    }

    pub fn stage_count(&self) -> u8 {
        self.control.stage_count
    }

    pub fn sequence_stage(&self) -> u8 {
        self.sequence.sequence_stage()
    }

    pub fn fire_count(&self) -> u16 {
        self.sequence.fire_count()
    }

    pub fn trigger_out(&self) -> bool {
        self.sequence.trigger_out()
    }

    fn active_valid(&self) -> bool {
        self.control.enable && self.armed && self.sequence.active_stage() < self.control.stage_count
    }

    /// Begin evaluating a new packet.
    pub fn start_packet(&mut self) {
        self.pipeline.start_packet();
    }

    /// Feed one captured byte at packet-offset `p`.
    pub fn feed_byte(&mut self, p: u16, byte: u8) {
        let stage = self.sequence.active_stage();
        let active_valid = self.active_valid();
        self.pipeline.feed_byte(&self.tables, stage, active_valid, p, byte);
    }

    /// Evaluate the sequence outcome at packet end; `packet_size` is the
    /// total number of payload bytes the packet carried.
    pub fn end_packet(&mut self, packet_size: u16) -> SequenceOutcome {
        let stage = self.sequence.active_stage();
        let active_valid = self.active_valid();
        let full_match = self.pipeline.full_match(&self.tables, stage, active_valid, packet_size);
        self.sequence
            .apply_match(full_match, self.control.stage_count, self.control.output_enable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed_single_stage() -> TriggerSubsystem {
        let mut t = TriggerSubsystem::new();
        let mut cfg = StageConfig {
            offset: 1,
            length: 3,
            ..Default::default()
        };
        cfg.pattern[0] = 0xAA;
        cfg.pattern[1] = 0xBB;
        cfg.pattern[2] = 0xCC;
        t.set_stage(0, cfg).unwrap();
        t.set_control(TriggerControl {
            enable: true,
            output_enable: true,
            stage_count: 1,
        });
        t.arm();
        t
    }

    #[test]
    fn matching_single_stage_packet_fires() {
        let mut t = armed_single_stage();
        t.start_packet();
        for (i, b) in [0x10u8, 0xAA, 0xBB, 0xCC].iter().enumerate() {
            t.feed_byte(i as u16, *b);
        }
        assert_eq!(t.end_packet(4), SequenceOutcome::Fired);
        assert_eq!(t.fire_count(), 1);
        assert!(t.trigger_out());
    }

    #[test]
    fn mismatching_packet_does_not_fire() {
        let mut t = armed_single_stage();
        t.start_packet();
        for (i, b) in [0x10u8, 0xAA, 0x99, 0xCC].iter().enumerate() {
            t.feed_byte(i as u16, *b);
        }
        assert_eq!(t.end_packet(4), SequenceOutcome::NoMatch);
        assert_eq!(t.fire_count(), 0);
        assert!(!t.trigger_out());
    }

    #[test]
    fn disabling_resets_sequence_and_disarms() {
        let mut t = armed_single_stage();
        t.set_control(TriggerControl {
            stage_count: 2,
            ..t.control
        });
        t.start_packet();
        for (i, b) in [0x10u8, 0xAA, 0xBB, 0xCC].iter().enumerate() {
            t.feed_byte(i as u16, *b);
        }
        assert_eq!(t.end_packet(4), SequenceOutcome::Advanced);
        assert_eq!(t.sequence_stage(), 1);

        t.set_control(TriggerControl {
            enable: false,
            output_enable: true,
            stage_count: 2,
        });
        assert_eq!(t.sequence_stage(), 0);
        assert!(!t.armed());
    }
}
