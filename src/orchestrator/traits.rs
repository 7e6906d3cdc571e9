// Injected collaborator boundaries for the orchestrator
//
// The orchestrator never runs version-control commands itself; the
// surrounding application supplies a `VcsExecutor` that does.

use anyhow::Result;
use async_trait::async_trait;

/// One conflicting file as reported by the VCS executor, split into its
/// competing sections. `base` is absent for two-way conflicts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictedFile {
    pub path: String,
    pub ours: String,
    pub theirs: String,
    pub base: Option<String>,
}

/// Outcome of one merge attempt by the VCS executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeAttempt {
    Clean,
    Conflicted(Vec<ConflictedFile>),
}

/// Version-control execution interface
#[async_trait]
pub trait VcsExecutor: Send + Sync {
    /// Attempt to merge the source branches into the target, reporting
    /// either a clean merge or the conflicting files.
    async fn attempt_merge(&self, target: &str, sources: &[String]) -> Result<MergeAttempt>;

    /// Write resolved content for one conflicted file and stage it.
    async fn apply_resolution(&self, path: &str, content: &str) -> Result<()>;

    /// Finalize the in-progress merge.
    async fn commit_merge(&self, message: &str) -> Result<()>;

    /// Abort the in-progress merge, restoring the pre-merge tree.
    async fn abort_merge(&self) -> Result<()>;
}
