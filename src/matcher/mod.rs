//! Matcher (§4.B): discovers and maintains `(venue_A, venue_B)` market
//! pairs trading the same real-world question.

pub mod registry;
pub mod similarity;

pub use registry::{combinations, MatcherConfig, PairRegistry};
pub use similarity::{normalize_title, title_similarity, within_resolution_window};
