// Orchestration state, outcome records, and the error taxonomy

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::branches::TrackedBranch;
use crate::conflict::types::{Complexity, Conflict};

/// Where the orchestrator is in the merge cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeMode {
    Idle,
    Monitoring,
    Preparing,
    Merging,
    Resolving,
    Reviewing,
}

/// Coarse health of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStatus {
    Ready,
    Busy,
    NeedsAttention,
    Error,
    Success,
}

/// Terminal outcome record of one merge attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeResult {
    pub success: bool,
    pub conflicts: Vec<Conflict>,
    pub rolled_back: bool,
    pub merged_branches: Vec<String>,
}

impl MergeResult {
    pub fn is_fully_resolved(&self) -> bool {
        self.success && self.conflicts.is_empty() && !self.rolled_back
    }
}

/// Audit-trail entry for one mode transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: MergeMode,
    pub to: MergeMode,
    pub trigger: String,
    pub timestamp: DateTime<Utc>,
}

/// The single mutable aggregate the orchestrator owns. External readers
/// only ever see cloned snapshots of this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationState {
    pub mode: MergeMode,
    pub status: MergeStatus,
    pub target_branch: String,
    pub branches: Vec<TrackedBranch>,
    pub pending_conflicts: Vec<Conflict>,
    pub resolved_files: Vec<String>,
    pub last_error: Option<String>,
    pub last_merge_result: Option<MergeResult>,
}

impl OrchestrationState {
    pub fn new(target_branch: impl Into<String>) -> Self {
        Self {
            mode: MergeMode::Idle,
            status: MergeStatus::Ready,
            target_branch: target_branch.into(),
            branches: Vec::new(),
            pending_conflicts: Vec::new(),
            resolved_files: Vec::new(),
            last_error: None,
            last_merge_result: None,
        }
    }

    pub fn has_conflicts(&self) -> bool {
        !self.pending_conflicts.is_empty()
    }

    pub fn auto_count(&self) -> usize {
        self.count_by_complexity(Complexity::Auto)
    }

    pub fn assisted_count(&self) -> usize {
        self.count_by_complexity(Complexity::Assisted)
    }

    pub fn manual_count(&self) -> usize {
        self.count_by_complexity(Complexity::Manual)
    }

    fn count_by_complexity(&self, complexity: Complexity) -> usize {
        self.pending_conflicts
            .iter()
            .filter(|c| c.complexity == complexity)
            .count()
    }

    /// True once a merge cycle finished cleanly with nothing left over.
    pub fn is_fully_resolved(&self) -> bool {
        self.last_merge_result
            .as_ref()
            .is_some_and(|r| r.is_fully_resolved())
            && self.pending_conflicts.is_empty()
    }
}

/// Orchestrator-level failures. All recoverable: each leaves the state
/// machine in a well-defined mode the caller can inspect and retry from.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("merge already in progress (mode: {mode:?})")]
    MergeInProgress { mode: MergeMode },

    #[error("no conflicts to resolve")]
    NoConflictsToResolve,

    #[error("no branches to merge")]
    NoBranchesToMerge,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("resolution failed for {file}: {reason}")]
    ResolutionFailed { file: String, reason: String },

    /// A routine outcome for manual-complexity conflicts, not a system
    /// fault. Never recorded on `last_error`.
    #[error("human intervention required for {file}")]
    HumanInterventionRequired { file: String },
}
