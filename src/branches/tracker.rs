// Branch bookkeeping for the merge orchestrator
//
// The tracker holds no merge logic. It records which agent branches are
// under consideration and answers readiness queries the orchestrator uses
// before transitioning into `preparing`.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

/// Lifecycle status of a tracked branch.
///
/// Normal progression is Pending → InProgress → Completed → Merged. `Error`
/// may be entered from any state and is terminal for the branch until
/// externally cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BranchStatus {
    Pending,
    InProgress,
    Completed,
    Merged,
    Error,
}

impl BranchStatus {
    fn rank(self) -> u8 {
        match self {
            BranchStatus::Pending => 0,
            BranchStatus::InProgress => 1,
            BranchStatus::Completed => 2,
            BranchStatus::Merged => 3,
            // Error sits outside the monotonic ladder.
            BranchStatus::Error => u8::MAX,
        }
    }
}

/// Latest known commit on a tracked branch, as supplied by the status probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub message: String,
}

/// An agent-produced branch under consideration for merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedBranch {
    pub id: Uuid,
    pub name: String,
    pub worktree_path: Option<PathBuf>,
    pub agent_id: Option<String>,
    pub status: BranchStatus,
    pub last_commit: Option<CommitInfo>,
    pub registered_at: DateTime<Utc>,
}

impl TrackedBranch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            worktree_path: None,
            agent_id: None,
            status: BranchStatus::Pending,
            last_commit: None,
            registered_at: Utc::now(),
        }
    }

    pub fn with_worktree_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.worktree_path = Some(path.into());
        self
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_status(mut self, status: BranchStatus) -> Self {
        self.status = status;
        self
    }
}

/// Bookkeeping for all branches in the current merge session.
#[derive(Debug, Clone, Default)]
pub struct BranchTracker {
    branches: Vec<TrackedBranch>,
}

impl BranchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a branch for tracking. A branch with the same name is
    /// superseded in place (branches are never deleted mid-session).
    pub fn register(&mut self, branch: TrackedBranch) {
        info!(branch = %branch.name, agent = ?branch.agent_id, "Tracking branch for merge");
        if let Some(existing) = self.branches.iter_mut().find(|b| b.name == branch.name) {
            *existing = branch;
        } else {
            self.branches.push(branch);
        }
    }

    /// Apply a status-probe result. Returns false when the update was
    /// rejected (unknown branch, non-monotonic move, or branch in `Error`).
    pub fn update_status(
        &mut self,
        name: &str,
        status: BranchStatus,
        commit: Option<CommitInfo>,
    ) -> bool {
        let Some(branch) = self.branches.iter_mut().find(|b| b.name == name) else {
            debug!(branch = %name, "Status update for unknown branch ignored");
            return false;
        };

        if branch.status == BranchStatus::Error && status != BranchStatus::Error {
            debug!(branch = %name, "Branch is in error state; clear it before updating");
            return false;
        }

        if status != BranchStatus::Error && status.rank() < branch.status.rank() {
            debug!(
                branch = %name,
                current = ?branch.status,
                requested = ?status,
                "Non-monotonic status update ignored"
            );
            return false;
        }

        if status == BranchStatus::Error {
            info!(branch = %name, "Branch entered error state");
        }

        branch.status = status;
        if let Some(commit) = commit {
            branch.last_commit = Some(commit);
        }
        true
    }

    /// Clear a branch's error state, returning it to `Pending`.
    pub fn clear_error(&mut self, name: &str) -> bool {
        let Some(branch) = self.branches.iter_mut().find(|b| b.name == name) else {
            return false;
        };
        if branch.status != BranchStatus::Error {
            return false;
        }
        branch.status = BranchStatus::Pending;
        info!(branch = %name, "Branch error cleared");
        true
    }

    /// Branches currently in `Completed` state (ready to merge).
    pub fn ready_count(&self) -> usize {
        self.branches
            .iter()
            .filter(|b| b.status == BranchStatus::Completed)
            .count()
    }

    /// True when at least one branch is tracked and every branch is
    /// `Completed` or `Merged`.
    pub fn all_complete(&self) -> bool {
        !self.branches.is_empty()
            && self.branches.iter().all(|b| {
                matches!(b.status, BranchStatus::Completed | BranchStatus::Merged)
            })
    }

    pub fn completed_branch_names(&self) -> Vec<String> {
        self.branches
            .iter()
            .filter(|b| b.status == BranchStatus::Completed)
            .map(|b| b.name.clone())
            .collect()
    }

    pub fn mark_merged(&mut self, names: &[String]) {
        for name in names {
            self.update_status(name, BranchStatus::Merged, None);
        }
    }

    pub fn get(&self, name: &str) -> Option<&TrackedBranch> {
        self.branches.iter().find(|b| b.name == name)
    }

    pub fn branches(&self) -> &[TrackedBranch] {
        &self.branches
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }
}
