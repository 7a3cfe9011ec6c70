//! Progress callbacks for front-ends.

use crate::stage::StageKind;

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a stage begins.
    fn stage_started(&self, stage: StageKind);
    /// Called when a stage completes successfully.
    fn stage_finished(&self, stage: StageKind);
    /// Called at the start of each research turn (1-based).
    fn research_turn(&self, turn: u32, max_turns: u32, items: usize);
    /// Called for each review/revise step inside drafting.
    fn drafting_step(&self, step: &str);
    /// Called when a rejection sends the article back to drafting.
    fn redraft(&self, attempt: u32, max_redrafts: u32);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _stage: StageKind) {}
    fn stage_finished(&self, _stage: StageKind) {}
    fn research_turn(&self, _turn: u32, _max_turns: u32, _items: usize) {}
    fn drafting_step(&self, _step: &str) {}
    fn redraft(&self, _attempt: u32, _max_redrafts: u32) {}
}
