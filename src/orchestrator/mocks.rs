// Mock collaborators for orchestrator tests - no side effects

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::conflict::types::Conflict;
use crate::orchestrator::traits::{ConflictedFile, MergeAttempt, VcsExecutor};
use crate::resolution::planner::{AnalysisOutcome, AnalysisProvider};

/// Mock VCS executor with scripted merge attempts and a record of every
/// call it received.
#[derive(Debug, Default)]
pub struct MockVcsExecutor {
    attempts: Mutex<VecDeque<MergeAttempt>>,
    fail_attempts: Mutex<bool>,
    fail_apply_for: Mutex<HashSet<String>>,
    pub merge_calls: Mutex<Vec<(String, Vec<String>)>>,
    pub applied: Mutex<Vec<(String, String)>>,
    pub commits: Mutex<Vec<String>>,
    pub aborts: Mutex<u32>,
}

impl MockVcsExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next merge attempt. With nothing queued,
    /// attempts report a clean merge.
    pub fn push_attempt(&self, attempt: MergeAttempt) {
        self.attempts.lock().unwrap().push_back(attempt);
    }

    pub fn push_conflicts(&self, files: Vec<ConflictedFile>) {
        self.push_attempt(MergeAttempt::Conflicted(files));
    }

    pub fn set_fail_attempts(&self, fail: bool) {
        *self.fail_attempts.lock().unwrap() = fail;
    }

    pub fn fail_apply_for(&self, path: &str) {
        self.fail_apply_for.lock().unwrap().insert(path.to_string());
    }

    pub fn applied_paths(&self) -> Vec<String> {
        self.applied
            .lock()
            .unwrap()
            .iter()
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub fn applied_content(&self, path: &str) -> Option<String> {
        self.applied
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, content)| content.clone())
    }

    pub fn abort_count(&self) -> u32 {
        *self.aborts.lock().unwrap()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.lock().unwrap().len()
    }
}

#[async_trait]
impl VcsExecutor for MockVcsExecutor {
    async fn attempt_merge(&self, target: &str, sources: &[String]) -> Result<MergeAttempt> {
        self.merge_calls
            .lock()
            .unwrap()
            .push((target.to_string(), sources.to_vec()));
        if *self.fail_attempts.lock().unwrap() {
            return Err(anyhow!("git merge exited non-zero"));
        }
        Ok(self
            .attempts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(MergeAttempt::Clean))
    }

    async fn apply_resolution(&self, path: &str, content: &str) -> Result<()> {
        if self.fail_apply_for.lock().unwrap().contains(path) {
            return Err(anyhow!("could not stage resolved file"));
        }
        self.applied
            .lock()
            .unwrap()
            .push((path.to_string(), content.to_string()));
        Ok(())
    }

    async fn commit_merge(&self, message: &str) -> Result<()> {
        self.commits.lock().unwrap().push(message.to_string());
        Ok(())
    }

    async fn abort_merge(&self) -> Result<()> {
        *self.aborts.lock().unwrap() += 1;
        Ok(())
    }
}

/// Mock analysis provider with per-file scripted outcomes and a call log.
#[derive(Debug, Default)]
pub struct MockAnalysisProvider {
    outcomes: Mutex<HashMap<String, AnalysisOutcome>>,
    fail_for: Mutex<HashSet<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockAnalysisProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_merged(&self, path: &str, merged_text: &str) {
        self.outcomes.lock().unwrap().insert(
            path.to_string(),
            AnalysisOutcome::Merged(merged_text.to_string()),
        );
    }

    pub fn script_declined(&self, path: &str, reason: &str) {
        self.outcomes.lock().unwrap().insert(
            path.to_string(),
            AnalysisOutcome::Declined(reason.to_string()),
        );
    }

    pub fn fail_for(&self, path: &str) {
        self.fail_for.lock().unwrap().insert(path.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AnalysisProvider for MockAnalysisProvider {
    async fn propose(&self, conflict: &Conflict) -> Result<AnalysisOutcome> {
        self.calls.lock().unwrap().push(conflict.file_path.clone());
        if self.fail_for.lock().unwrap().contains(&conflict.file_path) {
            return Err(anyhow!("analysis backend unavailable"));
        }
        Ok(self
            .outcomes
            .lock()
            .unwrap()
            .get(&conflict.file_path)
            .cloned()
            .unwrap_or_else(|| {
                AnalysisOutcome::Declined("no analysis available".to_string())
            }))
    }
}
