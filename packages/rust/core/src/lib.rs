//! Pipeline orchestration for Newsroom.
//!
//! An idea becomes an [`newsroom_shared::Assignment`], is researched in a
//! turn-bounded loop, drafted and refined by fact and style passes, polished,
//! illustrated, and finally approved or rejected. Rejections feed back into
//! drafting a bounded number of times (see [`Newsroom::run`]).

pub mod approval;
pub mod contracts;
pub mod curation;
pub mod drafting;
pub mod illustration;
pub mod pipeline;
pub mod planning;
pub mod polishing;
pub mod progress;
pub mod prompts;
pub mod recorder;
pub mod research;
pub mod stage;
pub mod sufficiency;

#[cfg(test)]
mod test_support;

pub use pipeline::{Collaborators, Newsroom, RunOutcome};
pub use progress::{ProgressReporter, SilentProgress};
pub use recorder::{ArtifactRecorder, render_stored};
pub use research::{LoopStop, ResearchOutcome};
pub use stage::StageKind;
