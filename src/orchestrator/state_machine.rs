// Merge orchestration state machine
//
// Single logical owner of OrchestrationState: every mutating operation goes
// through `&mut self`, and overlapping prepare/merge requests fail fast with
// `MergeInProgress` instead of queueing. External readers only receive
// cloned snapshots.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn, Instrument};

use crate::branches::{BranchStatus, BranchTracker, CommitInfo, TrackedBranch};
use crate::config::GitMasterConfig;
use crate::conflict::parser::ConflictParser;
use crate::conflict::types::{Complexity, Conflict, ResolutionStrategy};
use crate::orchestrator::traits::{ConflictedFile, MergeAttempt, VcsExecutor};
use crate::orchestrator::types::{
    MergeError, MergeMode, MergeResult, MergeStatus, OrchestrationState, TransitionRecord,
};
use crate::resolution::planner::{AnalysisProvider, ResolutionPlanner};
use crate::telemetry::{create_merge_span, generate_correlation_id};

/// Cooperative cancellation handle for an in-flight merge or resolution
/// batch. Cloned freely; `cancel` is observed at the next fold point and the
/// orchestrator rolls back to the pre-operation mode.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Top-level merge state machine. Sequences preparation, merging, conflict
/// resolution, and review across all tracked branches.
pub struct MergeOrchestrator {
    state: OrchestrationState,
    tracker: BranchTracker,
    parser: ConflictParser,
    planner: ResolutionPlanner,
    vcs: Arc<dyn VcsExecutor>,
    history: Vec<TransitionRecord>,
    // Source branches of the merge attempt currently in flight, so a later
    // resolve pass knows what to mark merged.
    inflight_sources: Vec<String>,
}

impl std::fmt::Debug for MergeOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeOrchestrator")
            .field("mode", &self.state.mode)
            .field("status", &self.state.status)
            .field("target_branch", &self.state.target_branch)
            .field("tracked_branches", &self.tracker.len())
            .field("pending_conflicts", &self.state.pending_conflicts.len())
            .finish()
    }
}

impl MergeOrchestrator {
    pub fn new(vcs: Arc<dyn VcsExecutor>, provider: Arc<dyn AnalysisProvider>) -> Self {
        let config = GitMasterConfig::default();
        Self::with_config(vcs, provider, &config)
    }

    pub fn with_config(
        vcs: Arc<dyn VcsExecutor>,
        provider: Arc<dyn AnalysisProvider>,
        config: &GitMasterConfig,
    ) -> Self {
        Self {
            state: OrchestrationState::new(config.merge.target_branch.clone()),
            tracker: BranchTracker::new(),
            parser: ConflictParser::new()
                .with_parallel_auto_threshold(config.classifier.parallel_auto_threshold),
            planner: ResolutionPlanner::new(provider).with_config(config.planner.clone()),
            vcs,
            history: Vec::new(),
            inflight_sources: Vec::new(),
        }
    }

    pub fn with_target_branch(mut self, target: impl Into<String>) -> Self {
        self.state.target_branch = target.into();
        self
    }

    // ---- queries -----------------------------------------------------

    /// Immutable snapshot of the orchestration state for external readers.
    pub fn snapshot(&self) -> OrchestrationState {
        self.state.clone()
    }

    pub fn mode(&self) -> MergeMode {
        self.state.mode
    }

    pub fn status(&self) -> MergeStatus {
        self.state.status
    }

    pub fn tracker(&self) -> &BranchTracker {
        &self.tracker
    }

    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    pub fn auto_count(&self) -> usize {
        self.state.auto_count()
    }

    pub fn assisted_count(&self) -> usize {
        self.state.assisted_count()
    }

    pub fn manual_count(&self) -> usize {
        self.state.manual_count()
    }

    pub fn has_conflicts(&self) -> bool {
        self.state.has_conflicts()
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.state.is_fully_resolved()
    }

    pub fn ready_to_merge_count(&self) -> usize {
        self.tracker.ready_count()
    }

    /// Suggested strategy for one pending conflict, if the planner produced
    /// one.
    pub fn suggested_strategy(&self, file_path: &str) -> Option<&ResolutionStrategy> {
        self.state
            .pending_conflicts
            .iter()
            .find(|c| c.file_path == file_path)
            .and_then(|c| c.suggested_resolution.as_ref())
    }

    // ---- commands ----------------------------------------------------

    /// Track a branch for the current session. The first registration moves
    /// an idle session into monitoring.
    pub fn register_branch(&mut self, branch: TrackedBranch) {
        self.tracker.register(branch);
        self.sync_branches();
        if self.state.mode == MergeMode::Idle {
            self.transition(MergeMode::Monitoring, "branch registered");
        }
    }

    /// Apply a branch status-probe result (push model; the orchestrator
    /// never polls).
    pub fn update_branch_status(
        &mut self,
        name: &str,
        status: BranchStatus,
        commit: Option<CommitInfo>,
    ) -> bool {
        let updated = self.tracker.update_status(name, status, commit);
        if updated {
            self.sync_branches();
        }
        updated
    }

    pub fn clear_branch_error(&mut self, name: &str) -> bool {
        let cleared = self.tracker.clear_error(name);
        if cleared {
            self.sync_branches();
        }
        cleared
    }

    /// Request a dry-run merge plan. Succeeds only from monitoring with all
    /// tracked branches complete; returns the branches that would be merged.
    pub fn prepare(&mut self) -> Result<Vec<String>, MergeError> {
        self.guard_not_in_progress()?;

        if self.tracker.is_empty() {
            return Err(self.fail(MergeError::NoBranchesToMerge));
        }
        if !self.tracker.all_complete() {
            return Err(self.fail(MergeError::InvalidState(format!(
                "{} of {} branches still incomplete",
                self.tracker.len() - self.tracker.ready_count(),
                self.tracker.len()
            ))));
        }

        let planned = self.tracker.completed_branch_names();
        if planned.is_empty() {
            // Every branch already merged: nothing left to plan.
            return Err(self.fail(MergeError::NoBranchesToMerge));
        }

        self.transition(MergeMode::Preparing, "merge plan requested");
        self.state.status = MergeStatus::Busy;
        Ok(planned)
    }

    /// Attempt the merge through the VCS executor. Clean merges complete the
    /// cycle; conflicted merges classify and plan every conflict, then move
    /// to resolving.
    pub async fn merge(&mut self, cancel: &CancelToken) -> Result<MergeResult, MergeError> {
        match self.state.mode {
            MergeMode::Preparing => {}
            MergeMode::Merging | MergeMode::Resolving | MergeMode::Reviewing => {
                return Err(self.fail(MergeError::MergeInProgress {
                    mode: self.state.mode,
                }));
            }
            MergeMode::Idle | MergeMode::Monitoring => {
                return Err(self.fail(MergeError::InvalidState(
                    "prepare a merge plan before merging".to_string(),
                )));
            }
        }

        let prior_mode = self.state.mode;
        let sources = self.tracker.completed_branch_names();
        if sources.is_empty() {
            return Err(self.fail(MergeError::NoBranchesToMerge));
        }

        self.transition(MergeMode::Merging, "merge attempt started");
        self.state.status = MergeStatus::Busy;
        self.inflight_sources = sources.clone();

        let target = self.state.target_branch.clone();
        let correlation_id = generate_correlation_id();
        let attempt = match self
            .vcs
            .attempt_merge(&target, &sources)
            .instrument(create_merge_span(
                "attempt_merge",
                Some(&target),
                Some(&correlation_id),
            ))
            .await
        {
            Ok(attempt) => attempt,
            Err(e) => {
                // Left in merging for the caller to retry or reset.
                error!(target = %target, error = %e, "Merge attempt failed");
                self.state.status = MergeStatus::Error;
                return Err(self.fail(MergeError::InvalidState(format!(
                    "merge attempt failed: {e}"
                ))));
            }
        };

        if cancel.is_cancelled() {
            return Ok(self.roll_back_merge(prior_mode, "merge cancelled").await);
        }

        match attempt {
            MergeAttempt::Clean => self.complete_merge(sources).await,
            MergeAttempt::Conflicted(files) => {
                let source_label = sources.join(", ");
                let mut conflicts: Vec<Conflict> = files
                    .into_iter()
                    .filter(|f| !(f.ours.is_empty() && f.theirs.is_empty()))
                    .map(|file| {
                        let ConflictedFile {
                            path,
                            ours,
                            theirs,
                            base,
                        } = file;
                        self.parser
                            .from_sections(&path, ours, theirs, base, &source_label, &target)
                    })
                    .collect();

                if conflicts.is_empty() {
                    // Every reported entry was unusable (both sides empty).
                    // Nothing needs resolving, so the cycle completes
                    // instead of entering resolving with an empty list.
                    info!(target = %target, "Conflicted merge attempt had no usable conflicts");
                    return self.complete_merge(sources).await;
                }

                info!(
                    conflict_count = conflicts.len(),
                    target = %target,
                    "Merge attempt produced conflicts"
                );

                if !self.plan_conflicts(&mut conflicts, cancel).await {
                    return Ok(self.roll_back_merge(prior_mode, "merge cancelled").await);
                }

                self.state.pending_conflicts = conflicts.clone();
                self.transition(MergeMode::Resolving, "conflicts detected");
                self.state.status = MergeStatus::Busy;

                let result = MergeResult {
                    success: false,
                    conflicts,
                    rolled_back: false,
                    merged_branches: Vec::new(),
                };
                self.state.last_merge_result = Some(result.clone());
                Ok(result)
            }
        }
    }

    /// Apply resolutions for the pending conflicts, one file at a time.
    /// `overrides` lets a human reviewer force a strategy per file. Conflicts
    /// without an applicable strategy stay pending and are queued for review.
    pub async fn resolve(
        &mut self,
        overrides: Option<HashMap<String, ResolutionStrategy>>,
        cancel: &CancelToken,
    ) -> Result<MergeResult, MergeError> {
        if self.state.pending_conflicts.is_empty() {
            return Err(self.fail(MergeError::NoConflictsToResolve));
        }
        if !matches!(self.state.mode, MergeMode::Resolving | MergeMode::Reviewing) {
            return Err(self.fail(MergeError::InvalidState(format!(
                "cannot resolve in mode {:?}",
                self.state.mode
            ))));
        }

        let overrides = overrides.unwrap_or_default();
        let pending = self.state.pending_conflicts.clone();
        let mut remaining: Vec<Conflict> = Vec::new();
        let mut applied: Vec<String> = Vec::new();
        let mut failures: Vec<MergeError> = Vec::new();

        // Serialized write-back: one apply at a time, so the single-owner
        // invariant holds even while assisted requests ran concurrently
        // earlier.
        for conflict in pending {
            if cancel.is_cancelled() {
                info!("Resolution batch cancelled, keeping conflict list unchanged");
                let result = MergeResult {
                    success: false,
                    conflicts: self.state.pending_conflicts.clone(),
                    rolled_back: true,
                    merged_branches: Vec::new(),
                };
                self.state.last_merge_result = Some(result.clone());
                return Ok(result);
            }

            let strategy = overrides
                .get(&conflict.file_path)
                .cloned()
                .or_else(|| conflict.suggested_resolution.clone());

            let Some(strategy) = strategy else {
                remaining.push(conflict);
                continue;
            };

            let Some(content) = strategy.resolved_content(&conflict).map(str::to_owned) else {
                // Reorder and defer carry guidance, not applicable content.
                debug!(file = %conflict.file_path, "Strategy needs a human, keeping pending");
                remaining.push(conflict);
                continue;
            };

            match self.vcs.apply_resolution(&conflict.file_path, &content).await {
                Ok(()) => {
                    info!(file = %conflict.file_path, "Resolution applied");
                    applied.push(conflict.file_path.clone());
                }
                Err(e) => {
                    warn!(file = %conflict.file_path, error = %e, "Resolution failed to apply");
                    failures.push(MergeError::ResolutionFailed {
                        file: conflict.file_path.clone(),
                        reason: e.to_string(),
                    });
                    remaining.push(conflict);
                }
            }
        }

        let nothing_applied = applied.is_empty();
        self.state.pending_conflicts = remaining.clone();
        self.state.resolved_files.extend(applied);

        if let Some(first) = failures.into_iter().next() {
            self.state.status = MergeStatus::NeedsAttention;
            return Err(self.fail(first));
        }

        if remaining.is_empty() {
            self.transition(MergeMode::Merging, "all conflicts resolved");
            let sources = std::mem::take(&mut self.inflight_sources);
            return self.complete_merge(sources).await;
        }

        // Routine outcome for manual conflicts: reported, never retried
        // automatically and never logged as a system fault.
        for conflict in &remaining {
            if conflict.complexity == Complexity::Manual || conflict.suggested_resolution.is_none()
            {
                info!(file = %conflict.file_path, "Human intervention required");
            }
        }

        if self.state.mode == MergeMode::Resolving {
            self.transition(MergeMode::Reviewing, "unresolved conflicts queued for review");
        }
        self.state.status = MergeStatus::NeedsAttention;

        let result = MergeResult {
            success: false,
            conflicts: remaining.clone(),
            rolled_back: false,
            merged_branches: Vec::new(),
        };
        self.state.last_merge_result = Some(result.clone());

        if nothing_applied {
            // Not recorded on last_error: this is the expected path for
            // manual-complexity conflicts.
            let file = remaining[0].file_path.clone();
            return Err(MergeError::HumanInterventionRequired { file });
        }
        Ok(result)
    }

    /// Reset the session: conflicts, resolved files, and errors are cleared
    /// and the machine returns to idle regardless of current mode. Tracked
    /// branches survive the reset.
    pub fn reset(&mut self) {
        self.transition(MergeMode::Idle, "session reset");
        self.state.status = MergeStatus::Ready;
        self.state.pending_conflicts.clear();
        self.state.resolved_files.clear();
        self.state.last_error = None;
        self.inflight_sources.clear();
    }

    // ---- internals ---------------------------------------------------

    /// Classify-then-plan every conflict. Assisted requests fan out
    /// concurrently over the shared provider; results fold back one at a
    /// time. Returns false when cancellation was observed.
    async fn plan_conflicts(&self, conflicts: &mut [Conflict], cancel: &CancelToken) -> bool {
        let mut assisted: JoinSet<(usize, Option<ResolutionStrategy>)> = JoinSet::new();

        for (idx, conflict) in conflicts.iter_mut().enumerate() {
            match conflict.complexity {
                Complexity::Assisted => {
                    let planner = self.planner.clone();
                    let snapshot = conflict.clone();
                    assisted.spawn(async move { (idx, planner.plan(&snapshot).await) });
                }
                // Auto and manual planning is deterministic and immediate.
                Complexity::Auto | Complexity::Manual => {
                    conflict.suggested_resolution = self.planner.plan(conflict).await;
                }
            }
        }

        while let Some(joined) = assisted.join_next().await {
            if cancel.is_cancelled() {
                assisted.abort_all();
                return false;
            }
            match joined {
                Ok((idx, strategy)) => conflicts[idx].suggested_resolution = strategy,
                Err(e) => warn!(error = %e, "Assisted planning task failed"),
            }
        }

        !cancel.is_cancelled()
    }

    /// Finalize a merge with no remaining conflicts: commit, mark branches
    /// merged, record the successful result, and move to reviewing.
    async fn complete_merge(&mut self, sources: Vec<String>) -> Result<MergeResult, MergeError> {
        let message = format!(
            "Merge {} agent branch(es) into {}",
            sources.len(),
            self.state.target_branch
        );
        if let Err(e) = self.vcs.commit_merge(&message).await {
            error!(error = %e, "Merge commit failed");
            self.state.status = MergeStatus::Error;
            return Err(self.fail(MergeError::InvalidState(format!(
                "merge commit failed: {e}"
            ))));
        }

        self.tracker.mark_merged(&sources);
        self.sync_branches();
        self.inflight_sources.clear();

        let result = MergeResult {
            success: true,
            conflicts: Vec::new(),
            rolled_back: false,
            merged_branches: sources,
        };
        self.state.last_merge_result = Some(result.clone());
        self.transition(MergeMode::Reviewing, "merge completed");
        self.state.status = MergeStatus::Success;

        info!(
            merged = result.merged_branches.len(),
            target = %self.state.target_branch,
            "Merge cycle completed successfully"
        );
        Ok(result)
    }

    /// Undo an in-flight merge attempt after cancellation: ask the executor
    /// to abort, revert the mode, and record a rolled-back result. No partial
    /// conflict list is committed.
    async fn roll_back_merge(&mut self, prior_mode: MergeMode, trigger: &str) -> MergeResult {
        if let Err(e) = self.vcs.abort_merge().await {
            warn!(error = %e, "Abort of cancelled merge failed");
        }
        self.transition(prior_mode, trigger);
        self.state.status = MergeStatus::Ready;
        self.inflight_sources.clear();

        let result = MergeResult {
            success: false,
            conflicts: Vec::new(),
            rolled_back: true,
            merged_branches: Vec::new(),
        };
        self.state.last_merge_result = Some(result.clone());
        result
    }

    fn guard_not_in_progress(&mut self) -> Result<(), MergeError> {
        match self.state.mode {
            MergeMode::Preparing
            | MergeMode::Merging
            | MergeMode::Resolving
            | MergeMode::Reviewing => Err(self.fail(MergeError::MergeInProgress {
                mode: self.state.mode,
            })),
            MergeMode::Idle | MergeMode::Monitoring => Ok(()),
        }
    }

    /// Surface an error on both channels: the command result and
    /// `last_error` on the state (except human-intervention, which is
    /// routine and handled at its call site).
    fn fail(&mut self, err: MergeError) -> MergeError {
        self.state.last_error = Some(err.to_string());
        err
    }

    fn transition(&mut self, to: MergeMode, trigger: &str) {
        let from = self.state.mode;
        info!(from = ?from, to = ?to, trigger = trigger, "Orchestration mode transition");
        self.history.push(TransitionRecord {
            from,
            to,
            trigger: trigger.to_string(),
            timestamp: Utc::now(),
        });
        self.state.mode = to;
    }

    fn sync_branches(&mut self) {
        self.state.branches = self.tracker.branches().to_vec();
    }
}
