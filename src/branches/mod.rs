// Tracked-branch bookkeeping

pub mod tracker;

pub use tracker::{BranchStatus, BranchTracker, CommitInfo, TrackedBranch};
