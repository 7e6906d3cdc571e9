// Resolution planning against the injected analysis collaborator

pub mod planner;

pub use planner::{AnalysisOutcome, AnalysisProvider, ResolutionPlanner};
