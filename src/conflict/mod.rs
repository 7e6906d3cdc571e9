// Conflict parsing and classification
//
// Pure, stateless components: safe to run across independent files in
// parallel. Malformed input degrades to "no conflict" instead of failing.

pub mod classifier;
pub mod parser;
pub mod types;

pub use classifier::{classify, classify_with_threshold, DEFAULT_PARALLEL_AUTO_THRESHOLD};
pub use parser::{ConflictParser, ConflictSections};
pub use types::{Complexity, Conflict, ConflictType, ResolutionStrategy};
