//! Whole-program static security analysis over an SSA program
//! representation: numeric range analysis, byte-range buffer coverage,
//! interprocedural taint tracking and a rule kit built on top of them,
//! driven through a single orchestrator entry point.

pub mod byterange;
pub mod error;
pub mod issue;
pub mod orchestrator;
pub mod range;
pub mod rules;
pub mod ssa;
pub mod taint;
pub mod values;

pub use error::{DriverError, DriverResult};
pub use issue::{Confidence, Finding, Severity};
pub use orchestrator::{generate, Orchestrator, OrchestratorConfig, RuleFilter};
pub use ssa::Program;
