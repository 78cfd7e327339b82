//! C3: numeric range analysis.

pub mod analyzer;
pub mod lattice;

pub use analyzer::{is_reachable, precedes, RangeAnalyzer};
pub use lattice::Range;
