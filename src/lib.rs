// GitMaster Library - Semantic Merge-Conflict Resolution
// This exposes the core components for the supervising dashboard

pub mod branches;
pub mod config;
pub mod conflict;
pub mod orchestrator;
pub mod resolution;
pub mod telemetry;

// Re-export key types for easy access
pub use branches::{BranchStatus, BranchTracker, CommitInfo, TrackedBranch};
pub use config::{config, init_config, AssistedFallback, GitMasterConfig};
pub use conflict::{
    classify, Complexity, Conflict, ConflictParser, ConflictSections, ConflictType,
    ResolutionStrategy,
};
pub use orchestrator::{
    CancelToken, ConflictedFile, MergeAttempt, MergeError, MergeMode, MergeOrchestrator,
    MergeResult, MergeStatus, OrchestrationState, TransitionRecord, VcsExecutor,
};
pub use resolution::{AnalysisOutcome, AnalysisProvider, ResolutionPlanner};
pub use telemetry::{generate_correlation_id, init_telemetry};
