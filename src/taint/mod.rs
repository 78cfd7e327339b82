//! C5: interprocedural taint analysis.

pub mod config;
pub mod engine;

pub use config::{FunctionSource, Sanitizer, Sink, TaintConfig, TypeSource};
pub use engine::{FunctionTaintSummary, SinkHit, TaintEngine};
