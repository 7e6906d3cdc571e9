// Conflict classification heuristics
//
// `classify` is a pure function over the conflict sections. The check order
// is a deliberate precedence and must not be reordered: binary and trivial
// are unambiguous special cases, structural must win over dependent and
// semantic, and the semantic keyword check is the weakest signal so it runs
// last before the parallel fallback.

use std::collections::HashSet;

use crate::conflict::types::{Complexity, ConflictType};

/// Combined line count below which a parallel conflict is considered small
/// enough for assisted resolution.
pub const DEFAULT_PARALLEL_AUTO_THRESHOLD: usize = 50;

/// Declaration-style keywords used by the semantic check. A keyword counts
/// only at the start of a trimmed line, so mentions inside strings or prose
/// rarely trigger it.
const STRUCTURAL_KEYWORDS: &[&str] = &[
    "fn ", "pub fn ", "func ", "function ", "class ", "struct ", "enum ", "trait ", "impl ",
    "interface ", "def ", "module ",
];

/// Classify a conflict from its sections, using the default parallel
/// threshold. Type and complexity are always produced together.
pub fn classify(ours: &str, theirs: &str, base: Option<&str>) -> (ConflictType, Complexity) {
    classify_with_threshold(ours, theirs, base, DEFAULT_PARALLEL_AUTO_THRESHOLD)
}

/// Classify with an explicit parallel-size threshold (see `ClassifierConfig`).
pub fn classify_with_threshold(
    ours: &str,
    theirs: &str,
    base: Option<&str>,
    parallel_auto_threshold: usize,
) -> (ConflictType, Complexity) {
    // 1. Binary: a null byte on either side means this is not mergeable text.
    if ours.contains('\0') || theirs.contains('\0') {
        return (ConflictType::Binary, Complexity::Manual);
    }

    // 2. Trivial: both sides identical once all whitespace is stripped.
    if strip_whitespace(ours) == strip_whitespace(theirs) {
        return (ConflictType::Trivial, Complexity::Auto);
    }

    // 3. Structural: the line-count delta exceeds half of the larger side.
    let ours_lines = ours.lines().count();
    let theirs_lines = theirs.lines().count();
    let larger = ours_lines.max(theirs_lines);
    if larger > 0 && ours_lines.abs_diff(theirs_lines) > larger / 2 {
        return (ConflictType::Structural, Complexity::Manual);
    }

    // 4. Dependent: with a base available, one side's added-line set is a
    //    subset of the other's.
    if let Some(base) = base {
        let base_set: HashSet<&str> = base.lines().collect();
        let ours_added: HashSet<&str> =
            ours.lines().filter(|l| !base_set.contains(l)).collect();
        let theirs_added: HashSet<&str> =
            theirs.lines().filter(|l| !base_set.contains(l)).collect();
        if ours_added.is_subset(&theirs_added) || theirs_added.is_subset(&ours_added) {
            return (ConflictType::Dependent, Complexity::Assisted);
        }
    }

    // 5. Semantic: both sides touch declarations.
    if contains_structural_keyword(ours) && contains_structural_keyword(theirs) {
        return (ConflictType::Semantic, Complexity::Manual);
    }

    // 6. Parallel fallback, sized by combined line count.
    let complexity = if ours_lines + theirs_lines < parallel_auto_threshold {
        Complexity::Assisted
    } else {
        Complexity::Manual
    };
    (ConflictType::Parallel, complexity)
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn contains_structural_keyword(text: &str) -> bool {
    text.lines().any(|line| {
        let trimmed = line.trim_start();
        STRUCTURAL_KEYWORDS.iter().any(|kw| trimmed.starts_with(kw))
    })
}
