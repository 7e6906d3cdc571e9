// Resolution planning
//
// The planner turns a classified conflict into a concrete strategy. It
// never fabricates merged content: the assisted path delegates to an
// injected analysis collaborator and only maps its answer onto a strategy.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::{AssistedFallback, PlannerConfig};
use crate::conflict::types::{Complexity, Conflict, ResolutionStrategy};

/// Answer from the analysis collaborator for one conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// The collaborator produced merged text for the region.
    Merged(String),
    /// The collaborator declined, with a reason.
    Declined(String),
}

/// External analysis capability (the AI collaborator). Injected so planning
/// is deterministic under test; implementations must be idempotent per
/// conflict so retries are safe.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn propose(&self, conflict: &Conflict) -> Result<AnalysisOutcome>;
}

/// Plans resolutions per complexity tier:
/// auto → keep-ours, assisted → ask the provider, manual → none (queued for
/// review).
#[derive(Clone)]
pub struct ResolutionPlanner {
    provider: Arc<dyn AnalysisProvider>,
    config: PlannerConfig,
}

impl std::fmt::Debug for ResolutionPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionPlanner")
            .field("config", &self.config)
            .finish()
    }
}

impl ResolutionPlanner {
    pub fn new(provider: Arc<dyn AnalysisProvider>) -> Self {
        Self {
            provider,
            config: PlannerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Propose a strategy for a conflict, or `None` when it must go to a
    /// human reviewer.
    pub async fn plan(&self, conflict: &Conflict) -> Option<ResolutionStrategy> {
        match conflict.complexity {
            // Trivial conflicts differ only in whitespace; either side is
            // equivalent and keep-ours is the convention.
            Complexity::Auto => {
                debug!(file = %conflict.file_path, "Auto-resolvable conflict, keeping ours");
                Some(ResolutionStrategy::KeepOurs)
            }
            Complexity::Assisted => self.plan_assisted(conflict).await,
            Complexity::Manual => {
                debug!(file = %conflict.file_path, "Manual conflict queued for review");
                None
            }
        }
    }

    async fn plan_assisted(&self, conflict: &Conflict) -> Option<ResolutionStrategy> {
        let attempts = match self.config.assisted_fallback {
            AssistedFallback::DegradeToManual => 1,
            AssistedFallback::Retry => self.config.max_retry_attempts.max(1),
        };

        for attempt in 1..=attempts {
            match self.provider.propose(conflict).await {
                Ok(AnalysisOutcome::Merged(merged_text)) => {
                    info!(
                        file = %conflict.file_path,
                        attempt = attempt,
                        "Analysis collaborator proposed a combined resolution"
                    );
                    return Some(ResolutionStrategy::Combine { merged_text });
                }
                Ok(AnalysisOutcome::Declined(reason)) => {
                    info!(
                        file = %conflict.file_path,
                        reason = %reason,
                        "Analysis collaborator declined, deferring"
                    );
                    return Some(ResolutionStrategy::Defer { reason });
                }
                Err(e) => {
                    warn!(
                        file = %conflict.file_path,
                        attempt = attempt,
                        error = %e,
                        "Analysis collaborator failed"
                    );
                }
            }
        }

        // Configured fallback exhausted: degrade to manual review.
        info!(file = %conflict.file_path, "Assisted planning degraded to manual review");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedProvider {
        outcome: Option<AnalysisOutcome>,
        calls: AtomicU32,
        fail_first: u32,
    }

    impl ScriptedProvider {
        fn merged(text: &str) -> Self {
            Self {
                outcome: Some(AnalysisOutcome::Merged(text.to_string())),
                calls: AtomicU32::new(0),
                fail_first: 0,
            }
        }

        fn declined(reason: &str) -> Self {
            Self {
                outcome: Some(AnalysisOutcome::Declined(reason.to_string())),
                calls: AtomicU32::new(0),
                fail_first: 0,
            }
        }

        fn failing() -> Self {
            Self {
                outcome: None,
                calls: AtomicU32::new(0),
                fail_first: u32::MAX,
            }
        }

        fn flaky(fail_first: u32, then: AnalysisOutcome) -> Self {
            Self {
                outcome: Some(then),
                calls: AtomicU32::new(0),
                fail_first,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AnalysisProvider for ScriptedProvider {
        async fn propose(&self, _conflict: &Conflict) -> Result<AnalysisOutcome> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                anyhow::bail!("analysis backend unavailable");
            }
            Ok(self.outcome.clone().expect("scripted outcome"))
        }
    }

    fn assisted_conflict() -> Conflict {
        // Small parallel edit: classified assisted.
        Conflict::new(
            "src/api.rs",
            "left edit",
            "right edit",
            None,
            "agent001/7",
            "main",
        )
    }

    fn trivial_conflict() -> Conflict {
        Conflict::new(
            "src/api.rs",
            "let x = 1;",
            "    let x = 1;",
            None,
            "agent001/7",
            "main",
        )
    }

    #[tokio::test]
    async fn auto_returns_keep_ours_without_calling_provider() {
        let provider = Arc::new(ScriptedProvider::merged("never used"));
        let planner = ResolutionPlanner::new(provider.clone());
        let strategy = planner.plan(&trivial_conflict()).await;
        assert_eq!(strategy, Some(ResolutionStrategy::KeepOurs));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn manual_returns_none_without_calling_provider() {
        let provider = Arc::new(ScriptedProvider::merged("never used"));
        let planner = ResolutionPlanner::new(provider.clone());
        let mut conflict = assisted_conflict();
        conflict.complexity = Complexity::Manual;
        assert_eq!(planner.plan(&conflict).await, None);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn assisted_maps_merged_to_combine() {
        let provider = Arc::new(ScriptedProvider::merged("both edits"));
        let planner = ResolutionPlanner::new(provider);
        let strategy = planner.plan(&assisted_conflict()).await;
        assert_eq!(
            strategy,
            Some(ResolutionStrategy::Combine {
                merged_text: "both edits".to_string()
            })
        );
    }

    #[tokio::test]
    async fn assisted_maps_declined_to_defer() {
        let provider = Arc::new(ScriptedProvider::declined("regions overlap heavily"));
        let planner = ResolutionPlanner::new(provider);
        let strategy = planner.plan(&assisted_conflict()).await;
        assert_eq!(
            strategy,
            Some(ResolutionStrategy::Defer {
                reason: "regions overlap heavily".to_string()
            })
        );
    }

    #[tokio::test]
    async fn provider_failure_degrades_to_manual_by_default() {
        let provider = Arc::new(ScriptedProvider::failing());
        let planner = ResolutionPlanner::new(provider.clone());
        assert_eq!(planner.plan(&assisted_conflict()).await, None);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn retry_policy_reissues_up_to_the_cap() {
        let provider = Arc::new(ScriptedProvider::flaky(
            2,
            AnalysisOutcome::Merged("eventually".to_string()),
        ));
        let planner = ResolutionPlanner::new(provider.clone()).with_config(PlannerConfig {
            assisted_fallback: AssistedFallback::Retry,
            max_retry_attempts: 3,
        });
        let strategy = planner.plan(&assisted_conflict()).await;
        assert_eq!(
            strategy,
            Some(ResolutionStrategy::Combine {
                merged_text: "eventually".to_string()
            })
        );
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn retry_policy_degrades_after_exhaustion() {
        let provider = Arc::new(ScriptedProvider::failing());
        let planner = ResolutionPlanner::new(provider.clone()).with_config(PlannerConfig {
            assisted_fallback: AssistedFallback::Retry,
            max_retry_attempts: 2,
        });
        assert_eq!(planner.plan(&assisted_conflict()).await, None);
        assert_eq!(provider.calls(), 2);
    }
}
