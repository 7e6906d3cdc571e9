// Core conflict types shared by the parser, classifier, planner, and orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conflict::classifier;

/// The six mutually exclusive conflict classifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictType {
    /// Both sides are identical after stripping whitespace
    Trivial,
    /// Independent edits to the same region
    Parallel,
    /// One side's additions are a subset of the other's
    Dependent,
    /// Large restructuring on one side
    Structural,
    /// Both sides touch declarations (functions, types)
    Semantic,
    /// Non-text content on either side
    Binary,
}

/// How much external judgment a conflict needs before it can be merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Complexity {
    /// Resolvable deterministically without any collaborator
    Auto,
    /// Resolvable with help from the analysis collaborator
    Assisted,
    /// Requires a human reviewer
    Manual,
}

/// The chosen action for a conflict. The payload lives on the variant, so
/// exactly one payload is populated by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    KeepOurs,
    KeepTheirs,
    Combine { merged_text: String },
    Reorder { instructions: String },
    Defer { reason: String },
}

impl ResolutionStrategy {
    /// The file content this strategy resolves to, if it can be applied
    /// mechanically. `Reorder` and `Defer` carry guidance for a human, not
    /// applicable content.
    pub fn resolved_content<'a>(&'a self, conflict: &'a Conflict) -> Option<&'a str> {
        match self {
            ResolutionStrategy::KeepOurs => Some(&conflict.ours),
            ResolutionStrategy::KeepTheirs => Some(&conflict.theirs),
            ResolutionStrategy::Combine { merged_text } => Some(merged_text),
            ResolutionStrategy::Reorder { .. } | ResolutionStrategy::Defer { .. } => None,
        }
    }

    pub fn is_applicable(&self) -> bool {
        !matches!(
            self,
            ResolutionStrategy::Reorder { .. } | ResolutionStrategy::Defer { .. }
        )
    }
}

/// One classified conflict region for a single file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: Uuid,
    pub file_path: String,
    pub ours: String,
    pub theirs: String,
    pub base: Option<String>,
    pub conflict_type: ConflictType,
    pub complexity: Complexity,
    pub suggested_resolution: Option<ResolutionStrategy>,
    pub analysis: Option<String>,
    pub source_branch: String,
    pub target_branch: String,
    pub detected_at: DateTime<Utc>,
}

impl Conflict {
    /// Build a conflict from its sections. Classification happens here so
    /// type and complexity are always set together.
    pub fn new(
        file_path: impl Into<String>,
        ours: impl Into<String>,
        theirs: impl Into<String>,
        base: Option<String>,
        source_branch: impl Into<String>,
        target_branch: impl Into<String>,
    ) -> Self {
        let ours = ours.into();
        let theirs = theirs.into();
        let (conflict_type, complexity) = classifier::classify(&ours, &theirs, base.as_deref());

        Self {
            id: Uuid::new_v4(),
            file_path: file_path.into(),
            ours,
            theirs,
            base,
            conflict_type,
            complexity,
            suggested_resolution: None,
            analysis: None,
            source_branch: source_branch.into(),
            target_branch: target_branch.into(),
            detected_at: Utc::now(),
        }
    }
}
