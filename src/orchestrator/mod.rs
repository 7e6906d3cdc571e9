// Merge Orchestration Module - the top-level state machine
//
// Owns OrchestrationState and sequences preparation, merging, conflict
// resolution, and review across all tracked branches. Version control and
// AI analysis are injected through the traits in `traits.rs`.

pub mod state_machine;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod mocks;


pub use state_machine::{CancelToken, MergeOrchestrator};
pub use traits::{ConflictedFile, MergeAttempt, VcsExecutor};
pub use types::{
    MergeError, MergeMode, MergeResult, MergeStatus, OrchestrationState, TransitionRecord,
};
