//! Sequence state: the runtime stage counter, fire counter, and output level.

use crate::trigger::tables::MAX_STAGES;

/// The trigger's runtime sequencing state. Configuration (stages,
/// enable/armed/stage_count) lives elsewhere; this is only what advances as
/// packets are evaluated.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceState {
    sequence_stage: u8,
    fire_count: u16,
    trigger_out: bool,
}

/// What happened to the sequence at the end of one packet's evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOutcome {
    /// The active stage did not fully match; nothing changes.
    NoMatch,
    /// The active stage matched but was not the final stage in the
    /// sequence; `sequence_stage` advanced by one.
    Advanced,
    /// The active stage matched and was the final stage; the sequence
    /// fired.
    Fired,
}

impl SequenceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sequence_stage(&self) -> u8 {
        self.sequence_stage
    }

    pub fn fire_count(&self) -> u16 {
        self.fire_count
    }

    pub fn trigger_out(&self) -> bool {
        self.trigger_out
    }

    /// Active stage for the packet about to be evaluated, clamped to a
    /// valid table index.
    pub fn active_stage(&self) -> u8 {
        self.sequence_stage.min(MAX_STAGES as u8 - 1)
    }

    /// Apply one packet's match outcome. Does NOT reset `sequence_stage` on
    /// a mismatch within the active stage's window: the reference
    /// implementation only resets on disarm, disable, or a successful
    /// final-stage firing, and resuming the same stage on a later packet is
    /// intentional, not a bug.
    pub fn apply_match(&mut self, full_match: bool, stage_count: u8, output_enable: bool) -> SequenceOutcome {
        if !full_match {
            return SequenceOutcome::NoMatch;
        }
        if self.sequence_stage + 1 == stage_count {
            self.sequence_stage = 0;
            self.fire_count = self.fire_count.saturating_add(1);
            if output_enable {
                self.trigger_out = !self.trigger_out;
            }
            SequenceOutcome::Fired
        } else {
            self.sequence_stage += 1;
            SequenceOutcome::Advanced
        }
    }

    /// Force the sequence back to its start, as a disarm strobe, an arm
    /// strobe, or clearing `enable` does.
    pub fn reset(&mut self) {
        self.sequence_stage = 0;
    }
}
