//! Cancellation-context misuse: three independent patterns sharing one
//! rule ID family.
//!
//! 1. A spawned worker (`Go`) constructed with a fresh background
//!    context instead of one derived from its caller.
//! 2. A cancel function returned from a `WithCancel`-style constructor
//!    that escapes (stored, phi'd, converted) without ever being called
//!    in its own function — a leaked cancellation.
//! 3. A blocking call inside a loop that never checks the context for
//!    cancellation anywhere in that loop, found via Tarjan's SCC over
//!    the function's basic blocks.

use crate::issue::{Confidence, Finding, Severity};
use crate::ssa::program::{Callee, Instr};
use crate::ssa::{BlockId, Function, Program, ValueId};

use super::Rule;

pub const RULE_ID: &str = "G407C";
const CWE_IMPROPER_CONTROL: u32 = 664;

pub struct ContextConfig {
    pub background_ctx_functions: Vec<String>,
    pub cancel_constructor_functions: Vec<String>,
    pub blocking_call_functions: Vec<String>,
    pub cancel_check_functions: Vec<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            background_ctx_functions: vec!["context.Background".into(), "context.TODO".into()],
            cancel_constructor_functions: vec!["context.WithCancel".into(), "context.WithTimeout".into()],
            blocking_call_functions: vec!["net.Conn.Read".into(), "time.Sleep".into()],
            cancel_check_functions: vec!["context.Context.Done".into(), "context.Context.Err".into()],
        }
    }
}

pub struct ContextPropagationRule {
    pub config: ContextConfig,
}

impl Default for ContextPropagationRule {
    fn default() -> Self {
        ContextPropagationRule { config: ContextConfig::default() }
    }
}

impl Rule for ContextPropagationRule {
    fn id(&self) -> &'static str {
        RULE_ID
    }

    fn describe(&self) -> &'static str {
        "cancellation context constructed, leaked or ignored incorrectly"
    }

    fn run(&self, _program: &Program, f: &Function) -> Vec<Finding> {
        let mut findings = Vec::new();
        findings.extend(self.background_in_spawn(f));
        findings.extend(self.leaked_cancel(f));
        findings.extend(self.blocking_without_cancel_check(f));
        findings
    }
}

impl ContextPropagationRule {
    fn background_in_spawn(&self, f: &Function) -> Vec<Finding> {
        let mut out = vec![];
        for data in &f.values {
            let Instr::Go { call } = &data.kind else { continue };
            let Instr::Call { args, .. } = &f.value(*call).kind else { continue };
            for &arg in args {
                if let Instr::Call { callee: Callee::Direct(name), .. } = &f.value(arg).kind {
                    if self.config.background_ctx_functions.iter().any(|b| b == name) {
                        out.push(Finding::new(
                            RULE_ID,
                            "spawned worker given a fresh background context instead of one derived from its caller",
                            Severity::Medium,
                            Confidence::Medium,
                            CWE_IMPROPER_CONTROL,
                            data.pos.as_ref(),
                            None,
                        ));
                    }
                }
            }
        }
        out
    }

    fn leaked_cancel(&self, f: &Function) -> Vec<Finding> {
        let mut out = vec![];
        for data in &f.values {
            let Instr::Extract { tuple, index } = &data.kind else { continue };
            if *index != 1 {
                continue;
            }
            let Instr::Call { callee: Callee::Direct(name), .. } = &f.value(*tuple).kind else { continue };
            if !self.config.cancel_constructor_functions.iter().any(|c| c == name) {
                continue;
            }
            let cancel_val = referrers_of(f, *tuple, *index);
            if cancel_val.is_empty() {
                continue;
            }
            for &cv in &cancel_val {
                if !is_ever_invoked(f, cv) {
                    out.push(Finding::new(
                        RULE_ID,
                        "cancel function escapes without ever being called",
                        Severity::Medium,
                        Confidence::Low,
                        CWE_IMPROPER_CONTROL,
                        data.pos.as_ref(),
                        None,
                    ));
                }
            }
        }
        out
    }

    fn blocking_without_cancel_check(&self, f: &Function) -> Vec<Finding> {
        let sccs = tarjan_sccs(f);
        let mut out = vec![];
        for scc in &sccs {
            if scc.len() < 2 && !self_loop(f, scc[0]) {
                continue;
            }
            let blocking = find_call_in_blocks(f, scc, &self.config.blocking_call_functions);
            let has_check = !find_call_in_blocks(f, scc, &self.config.cancel_check_functions).is_empty();
            if let Some(vid) = blocking.first() {
                if !has_check {
                    out.push(Finding::new(
                        RULE_ID,
                        "blocking call inside a loop that never checks for cancellation",
                        Severity::Low,
                        Confidence::Low,
                        CWE_IMPROPER_CONTROL,
                        f.value(*vid).pos.as_ref(),
                        None,
                    ));
                }
            }
        }
        out
    }
}

fn self_loop(f: &Function, b: BlockId) -> bool {
    f.block(b).succs.contains(&b)
}

/// The `Extract` instructions reading `index` out of `tuple`'s tuple,
/// i.e. the actual cancel-function value(s) bound from a call site. Most
/// functions extract it exactly once; modeled as a set for completeness.
fn referrers_of(f: &Function, tuple: ValueId, index: usize) -> Vec<ValueId> {
    f.value(tuple)
        .referrers
        .iter()
        .copied()
        .filter(|&r| matches!(&f.value(r).kind, Instr::Extract { index: i, .. } if *i == index))
        .collect()
}

fn is_ever_invoked(f: &Function, cancel_val: ValueId) -> bool {
    f.value(cancel_val).referrers.iter().any(|&r| match &f.value(r).kind {
        Instr::Defer { call } | Instr::Go { call } => {
            matches!(&f.value(*call).kind, Instr::Call { callee: Callee::Indirect(c), .. } if *c == cancel_val)
        }
        Instr::Call { callee: Callee::Indirect(c), .. } => *c == cancel_val,
        _ => false,
    })
}

fn find_call_in_blocks(f: &Function, blocks: &[BlockId], names: &[String]) -> Vec<ValueId> {
    let mut out = vec![];
    for &b in blocks {
        for &vid in &f.block(b).instrs {
            if let Instr::Call { callee: Callee::Direct(name), .. } = &f.value(vid).kind {
                if names.iter().any(|n| n == name) {
                    out.push(vid);
                }
            }
        }
    }
    out
}

/// Tarjan's strongly connected components over the function's block
/// graph, iterative to avoid recursion depth issues on large functions.
fn tarjan_sccs(f: &Function) -> Vec<Vec<BlockId>> {
    let n = f.blocks.len();
    let mut index = vec![None; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack = vec![];
    let mut sccs = vec![];
    let mut next_index = 0usize;

    for start in 0..n as BlockId {
        if index[start as usize].is_some() {
            continue;
        }
        // (node, child iterator position)
        let mut work: Vec<(BlockId, usize)> = vec![(start, 0)];
        index[start as usize] = Some(next_index);
        lowlink[start as usize] = next_index;
        next_index += 1;
        stack.push(start);
        on_stack[start as usize] = true;

        while let Some(&mut (v, ref mut i)) = work.last_mut() {
            let succs = &f.block(v).succs;
            if *i < succs.len() {
                let w = succs[*i];
                *i += 1;
                if index[w as usize].is_none() {
                    index[w as usize] = Some(next_index);
                    lowlink[w as usize] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w as usize] = true;
                    work.push((w, 0));
                } else if on_stack[w as usize] {
                    lowlink[v as usize] = lowlink[v as usize].min(index[w as usize].unwrap());
                }
            } else {
                work.pop();
                if let Some(&(parent, _)) = work.last() {
                    lowlink[parent as usize] = lowlink[parent as usize].min(lowlink[v as usize]);
                }
                if lowlink[v as usize] == index[v as usize].unwrap() {
                    let mut component = vec![];
                    loop {
                        let w = stack.pop().unwrap();
                        on_stack[w as usize] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    sccs.push(component);
                }
            }
        }
    }
    sccs
}
