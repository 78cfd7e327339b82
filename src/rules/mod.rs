//! C6: the rule kit. Each rule is a self-contained analysis over one
//! function's SSA body, built on the range analyzer, byte-range tracker
//! and taint engine.

pub mod callback_misuse;
pub mod context_propagation;
pub mod hardcoded_nonce;
pub mod overflow;
pub mod request_smuggling;
pub mod slice_bounds;
pub mod taint_rules;

use crate::issue::Finding;
use crate::ssa::{Function, Program};

/// A single security check. Implementors must never panic — the
/// orchestrator catches unwinds at the rule boundary regardless, but a
/// well-behaved rule degrades to "no finding" on its own when it hits
/// something it can't reason about, rather than relying on that backstop.
pub trait Rule {
    fn id(&self) -> &'static str;

    fn describe(&self) -> &'static str;

    fn run(&self, program: &Program, f: &Function) -> Vec<Finding>;
}
