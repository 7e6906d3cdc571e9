// Extraction of conflict sections from marker-delimited text
//
// The scan is a four-state cursor over the standard three-way markers. A
// file may contain several consecutive conflict blocks; their sections are
// accumulated in order. Lines outside any block are discarded.

use tracing::debug;

use crate::conflict::classifier;
use crate::conflict::types::Conflict;

const MARKER_OURS: &str = "<<<<<<<";
const MARKER_BASE: &str = "|||||||";
const MARKER_SEPARATOR: &str = "=======";
const MARKER_THEIRS: &str = ">>>>>>>";

/// The raw sections extracted from one file's conflict markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictSections {
    pub ours: String,
    pub theirs: String,
    pub base: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Outside,
    Ours,
    Base,
    Theirs,
}

/// Parses conflict markers into classified `Conflict` entities.
///
/// Parsing never fails hard: malformed or marker-free input yields `None`
/// so one bad file never aborts a batch.
#[derive(Debug, Clone)]
pub struct ConflictParser {
    parallel_auto_threshold: usize,
}

impl Default for ConflictParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ConflictParser {
    pub fn new() -> Self {
        Self {
            parallel_auto_threshold: classifier::DEFAULT_PARALLEL_AUTO_THRESHOLD,
        }
    }

    pub fn with_parallel_auto_threshold(mut self, threshold: usize) -> Self {
        self.parallel_auto_threshold = threshold;
        self
    }

    /// Extract the ours/theirs/base sections from raw marker-delimited text.
    ///
    /// Returns `None` when no marker line occurs, or when neither ours nor
    /// theirs accumulated any lines (no usable conflict).
    pub fn parse_sections(&self, raw: &str) -> Option<ConflictSections> {
        let mut cursor = Cursor::Outside;
        let mut saw_marker = false;
        let mut saw_base_marker = false;
        let mut ours: Vec<&str> = Vec::new();
        let mut base: Vec<&str> = Vec::new();
        let mut theirs: Vec<&str> = Vec::new();

        for line in raw.lines() {
            match cursor {
                Cursor::Outside => {
                    if line.starts_with(MARKER_OURS) {
                        saw_marker = true;
                        cursor = Cursor::Ours;
                    }
                }
                Cursor::Ours => {
                    if line.starts_with(MARKER_BASE) {
                        saw_base_marker = true;
                        cursor = Cursor::Base;
                    } else if line.starts_with(MARKER_SEPARATOR) {
                        cursor = Cursor::Theirs;
                    } else {
                        ours.push(line);
                    }
                }
                Cursor::Base => {
                    if line.starts_with(MARKER_SEPARATOR) {
                        cursor = Cursor::Theirs;
                    } else {
                        base.push(line);
                    }
                }
                Cursor::Theirs => {
                    if line.starts_with(MARKER_THEIRS) {
                        cursor = Cursor::Outside;
                    } else {
                        theirs.push(line);
                    }
                }
            }
        }

        if !saw_marker {
            debug!("no conflict markers found");
            return None;
        }
        if ours.is_empty() && theirs.is_empty() {
            debug!("conflict markers present but both sides empty, skipping");
            return None;
        }

        Some(ConflictSections {
            ours: ours.join("\n"),
            theirs: theirs.join("\n"),
            base: saw_base_marker.then(|| base.join("\n")),
        })
    }

    /// Parse raw conflicted file content into a classified `Conflict`.
    pub fn parse(
        &self,
        raw: &str,
        file_path: &str,
        source_branch: &str,
        target_branch: &str,
    ) -> Option<Conflict> {
        let sections = self.parse_sections(raw)?;
        Some(self.from_sections(
            file_path,
            sections.ours,
            sections.theirs,
            sections.base,
            source_branch,
            target_branch,
        ))
    }

    /// Build a classified `Conflict` from already-split sections, as supplied
    /// by the VCS executor.
    pub fn from_sections(
        &self,
        file_path: &str,
        ours: String,
        theirs: String,
        base: Option<String>,
        source_branch: &str,
        target_branch: &str,
    ) -> Conflict {
        let mut conflict = Conflict::new(file_path, ours, theirs, base, source_branch, target_branch);
        // Conflict::new classifies with the default threshold; honor ours.
        let (ty, cx) = classifier::classify_with_threshold(
            &conflict.ours,
            &conflict.theirs,
            conflict.base.as_deref(),
            self.parallel_auto_threshold,
        );
        conflict.conflict_type = ty;
        conflict.complexity = cx;
        conflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::types::{Complexity, ConflictType};

    #[test]
    fn parses_two_way_block() {
        let raw = "\
context before
<<<<<<< HEAD
our line
=======
their line
>>>>>>> feature
context after";
        let sections = ConflictParser::new().parse_sections(raw).unwrap();
        assert_eq!(sections.ours, "our line");
        assert_eq!(sections.theirs, "their line");
        assert_eq!(sections.base, None);
    }

    #[test]
    fn parses_three_way_block_with_base() {
        let raw = "\
<<<<<<< HEAD
ours a
ours b
||||||| merged common ancestors
base a
=======
theirs a
>>>>>>> feature";
        let sections = ConflictParser::new().parse_sections(raw).unwrap();
        assert_eq!(sections.ours, "ours a\nours b");
        assert_eq!(sections.base.as_deref(), Some("base a"));
        assert_eq!(sections.theirs, "theirs a");
    }

    #[test]
    fn accumulates_multiple_blocks() {
        let raw = "\
<<<<<<< HEAD
ours 1
=======
theirs 1
>>>>>>> feature
unchanged middle
<<<<<<< HEAD
ours 2
=======
theirs 2
>>>>>>> feature";
        let sections = ConflictParser::new().parse_sections(raw).unwrap();
        assert_eq!(sections.ours, "ours 1\nours 2");
        assert_eq!(sections.theirs, "theirs 1\ntheirs 2");
    }

    #[test]
    fn no_markers_yields_none() {
        assert!(ConflictParser::new()
            .parse_sections("plain file\nwith no conflicts")
            .is_none());
    }

    #[test]
    fn empty_sides_yield_none() {
        let raw = "<<<<<<< HEAD\n=======\n>>>>>>> feature";
        assert!(ConflictParser::new().parse_sections(raw).is_none());
    }

    #[test]
    fn one_empty_side_is_still_usable() {
        let raw = "<<<<<<< HEAD\nkept line\n=======\n>>>>>>> feature";
        let sections = ConflictParser::new().parse_sections(raw).unwrap();
        assert_eq!(sections.ours, "kept line");
        assert_eq!(sections.theirs, "");
    }

    #[test]
    fn parse_produces_classified_conflict() {
        let raw = "<<<<<<< HEAD\nlet x = 1;\n=======\n    let x = 1;\n>>>>>>> agent001/feature";
        let conflict = ConflictParser::new()
            .parse(raw, "src/lib.rs", "agent001/feature", "main")
            .unwrap();
        assert_eq!(conflict.file_path, "src/lib.rs");
        assert_eq!(conflict.conflict_type, ConflictType::Trivial);
        assert_eq!(conflict.complexity, Complexity::Auto);
        assert_eq!(conflict.source_branch, "agent001/feature");
        assert_eq!(conflict.target_branch, "main");
        assert!(conflict.suggested_resolution.is_none());
    }
}
