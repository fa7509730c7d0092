//! The search federation pipeline: normalization, fuzzy matching, quality
//! scoring, result processing, and the facade that ties them together.

pub mod engine;
pub mod fuzzy;
pub mod normalize;
pub mod processor;
pub mod quality;
pub mod series;

pub use engine::{ProcessedResults, SearchEngine, SearchOutcome, ServiceStatus};
pub use fuzzy::{FuzzyMatcher, MatchResult};
pub use processor::{AutomaticSelection, DisplayResult, ResultProcessor};
pub use quality::{QualityAssessor, QualityScore, ScoredResult};
