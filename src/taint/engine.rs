//! Interprocedural taint propagation (C5).
//!
//! Single-hop summaries: a callee whose body is available gets a
//! parameter-index → return-index transfer function, computed once and
//! cached; a callee whose body isn't part of the bundle is treated as the
//! identity function over its arguments, per the engine's conservative
//! default for unresolved code.

use std::cell::RefCell;

use lru::LruCache;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::ssa::program::{Callee, Instr};
use crate::ssa::{Function, Program, ValueId};

use super::config::TaintConfig;

const MAX_DEPTH: u32 = 20;
const SUMMARY_CACHE_CAP: usize = 256;

/// Cached parameter→return taint transfer function for one function.
#[derive(Debug, Clone, Default)]
pub struct FunctionTaintSummary {
    /// param index -> set of return-tuple indices it taints.
    pub param_to_return: FxHashMap<usize, FxHashSet<usize>>,
}

/// A sink call whose arguments were proven (or assumed, for unresolved
/// callees) tainted.
#[derive(Debug, Clone)]
pub struct SinkHit {
    pub call: ValueId,
    pub qualified_name: String,
    pub tainted_args: Vec<usize>,
}

struct Ctx {
    visiting: FxHashSet<(String, ValueId)>,
    depth: u32,
}

pub struct TaintEngine<'p> {
    program: &'p Program,
    config: TaintConfig,
    summaries: RefCell<LruCache<String, FunctionTaintSummary>>,
}

impl<'p> TaintEngine<'p> {
    pub fn new(program: &'p Program, config: TaintConfig) -> Self {
        Self {
            program,
            config,
            summaries: RefCell::new(LruCache::new(
                std::num::NonZeroUsize::new(SUMMARY_CACHE_CAP).unwrap(),
            )),
        }
    }

    /// Is `v` tainted, with no hypothetical assumptions about `f`'s own
    /// parameters?
    pub fn is_tainted(&self, f: &Function, v: ValueId) -> bool {
        let mut ctx = Ctx { visiting: FxHashSet::default(), depth: 0 };
        self.is_tainted_assuming(f, v, &FxHashSet::default(), &mut ctx)
    }

    /// Scan every call in `f` that targets a configured sink, reporting
    /// the ones where a checked argument resolves tainted.
    pub fn find_sink_hits(&self, f: &Function) -> Vec<SinkHit> {
        let mut hits = Vec::new();
        for (vid, data) in f.values.iter().enumerate() {
            let vid = vid as ValueId;
            let Instr::Call { callee, args } = &data.kind else { continue };
            let Some(name) = self.qualified_callee_name(f, callee) else { continue };
            let Some(sink) = self.config.matching_sink(&name) else { continue };
            let checked: Vec<usize> = match &sink.check_args {
                Some(idxs) => idxs.clone(),
                None => (0..args.len()).collect(),
            };
            let tainted_args: Vec<usize> = checked
                .into_iter()
                .filter(|&i| args.get(i).is_some_and(|&a| self.is_tainted(f, a)))
                .collect();
            if !tainted_args.is_empty() {
                hits.push(SinkHit { call: vid, qualified_name: name, tainted_args });
            }
        }
        hits
    }

    fn get_summary(&self, func: &Function) -> FunctionTaintSummary {
        if let Some(hit) = self.summaries.borrow_mut().get(&func.name) {
            return hit.clone();
        }
        let summary = self.compute_summary(func);
        self.summaries.borrow_mut().put(func.name.clone(), summary.clone());
        summary
    }

    fn compute_summary(&self, func: &Function) -> FunctionTaintSummary {
        let mut summary = FunctionTaintSummary::default();
        for (pi, &param_v) in func.params.iter().enumerate() {
            let assumed: FxHashSet<ValueId> = [param_v].into_iter().collect();
            for data in &func.values {
                if let Instr::Return { values } = &data.kind {
                    for (ri, &rv) in values.iter().enumerate() {
                        let mut ctx = Ctx { visiting: FxHashSet::default(), depth: 0 };
                        if self.is_tainted_assuming(func, rv, &assumed, &mut ctx) {
                            summary.param_to_return.entry(pi).or_default().insert(ri);
                        }
                    }
                }
            }
        }
        summary
    }

    fn is_tainted_assuming(
        &self,
        f: &Function,
        v: ValueId,
        assumed: &FxHashSet<ValueId>,
        ctx: &mut Ctx,
    ) -> bool {
        if assumed.contains(&v) {
            return true;
        }
        let key = (f.name.clone(), v);
        if ctx.depth > MAX_DEPTH || ctx.visiting.contains(&key) {
            return false;
        }
        ctx.visiting.insert(key.clone());
        ctx.depth += 1;
        let result = self.propagate(f, v, assumed, ctx);
        ctx.depth -= 1;
        ctx.visiting.remove(&key);
        result
    }

    fn propagate(&self, f: &Function, v: ValueId, assumed: &FxHashSet<ValueId>, ctx: &mut Ctx) -> bool {
        let data = f.value(v);
        if self.config.is_source_type(&type_name(&data.ty)) {
            return true;
        }
        let mut step = |w: ValueId| self.is_tainted_assuming(f, w, assumed, ctx);
        match &data.kind {
            Instr::Param(_) | Instr::FreeVar(_) | Instr::Const(_) | Instr::Alloc { .. } => false,
            Instr::BinOp { a, b, .. } => step(*a) || step(*b),
            Instr::UnOp { a, .. } | Instr::Convert { a } => step(*a),
            Instr::Slice { base, low, high, max } => {
                step(*base)
                    || low.is_some_and(|w| step(w))
                    || high.is_some_and(|w| step(w))
                    || max.is_some_and(|w| step(w))
            }
            Instr::IndexAddr { base, index } => step(*base) || step(*index),
            Instr::FieldAddr { base, .. } => step(*base),
            Instr::Load { addr } => self.load_taint(f, data.block, *addr, assumed, ctx),
            Instr::Store { .. } => false,
            Instr::Phi { edges } => edges.iter().any(|(_, w)| step(*w)),
            Instr::Call { callee, args } => self.call_taint(f, callee, args, 0, assumed, ctx),
            Instr::Extract { tuple, index } => {
                if let Instr::Call { callee, args } = &f.value(*tuple).kind {
                    self.call_taint(f, callee, args, *index, assumed, ctx)
                } else {
                    step(*tuple)
                }
            }
            Instr::MakeClosure { captures, .. } => captures.iter().any(|&c| step(c)),
            Instr::MakeSlice { len, cap, .. } => {
                len.is_some_and(|w| step(w)) || cap.is_some_and(|w| step(w))
            }
            Instr::Go { call } | Instr::Defer { call } => step(*call),
            Instr::Return { .. } | Instr::If { .. } | Instr::Jump { .. } => false,
        }
    }

    /// Same-block reaching-definition lookup, mirroring the range
    /// analyzer's `compute_load`: an unreached load has no known taint.
    fn load_taint(
        &self,
        f: &Function,
        block: crate::ssa::BlockId,
        addr: ValueId,
        assumed: &FxHashSet<ValueId>,
        ctx: &mut Ctx,
    ) -> bool {
        let blk = f.block(block);
        for &id in blk.instrs.iter().rev() {
            if let Instr::Store { addr: a, value } = &f.value(id).kind {
                if *a == addr {
                    return self.is_tainted_assuming(f, *value, assumed, ctx);
                }
            }
        }
        false
    }

    fn call_taint(
        &self,
        f: &Function,
        callee: &Callee,
        args: &[ValueId],
        return_index: usize,
        assumed: &FxHashSet<ValueId>,
        ctx: &mut Ctx,
    ) -> bool {
        let Some(name) = self.qualified_callee_name(f, callee) else {
            return self.resolve_indirect(f, callee, args, return_index, assumed, ctx);
        };
        if self.config.is_sanitizer(&name) {
            return false;
        }
        if self.config.is_source_function(&name) {
            return true;
        }
        if let Some(callee_func) = self.program.function_by_name(&name) {
            return self.apply_summary(f, callee_func, args, return_index, assumed, ctx);
        }
        // Unavailable body: identity over arguments.
        args.iter().any(|&a| self.is_tainted_assuming(f, a, assumed, ctx))
    }

    fn apply_summary(
        &self,
        caller: &Function,
        callee: &Function,
        args: &[ValueId],
        return_index: usize,
        assumed: &FxHashSet<ValueId>,
        ctx: &mut Ctx,
    ) -> bool {
        let summary = self.get_summary(callee);
        args.iter().enumerate().any(|(i, &a)| {
            summary
                .param_to_return
                .get(&i)
                .is_some_and(|set| set.contains(&return_index))
                && self.is_tainted_assuming(caller, a, assumed, ctx)
        })
    }

    /// Closure/phi-walk resolution of an indirect or interface callee:
    /// find the `MakeClosure`/direct-function candidates a function-typed
    /// value could hold and OR their summaries together.
    fn resolve_indirect(
        &self,
        f: &Function,
        callee: &Callee,
        args: &[ValueId],
        return_index: usize,
        assumed: &FxHashSet<ValueId>,
        ctx: &mut Ctx,
    ) -> bool {
        let root = match callee {
            Callee::Indirect(v) => *v,
            Callee::Interface { receiver, .. } => *receiver,
            Callee::Direct(_) => return false,
        };
        let candidates = resolve_callee_candidates(f, root, 0);
        if candidates.is_empty() {
            // Truly unresolved: conservative identity over arguments.
            return args.iter().any(|&a| self.is_tainted_assuming(f, a, assumed, ctx));
        }
        candidates.iter().any(|name| {
            self.program
                .function_by_name(name)
                .is_some_and(|cf| self.apply_summary(f, cf, args, return_index, assumed, ctx))
        })
    }

    fn qualified_callee_name(&self, f: &Function, callee: &Callee) -> Option<String> {
        match callee {
            Callee::Direct(name) => Some(name.clone()),
            Callee::Interface { receiver, method } => {
                let ty = &f.value(*receiver).ty;
                match ty.deref_one() {
                    crate::ssa::Type::Named { pkg, name } => Some(format!("{pkg}.{name}.{method}")),
                    _ => None,
                }
            }
            Callee::Indirect(_) => None,
        }
    }
}

fn type_name(ty: &crate::ssa::Type) -> String {
    match ty.deref_one() {
        crate::ssa::Type::Named { pkg, name } => format!("{pkg}.{name}"),
        _ => String::new(),
    }
}

/// Walk a closure/phi chain looking for the concrete function names a
/// call-through-value might resolve to.
fn resolve_callee_candidates(f: &Function, v: ValueId, depth: u32) -> Vec<String> {
    if depth > MAX_DEPTH {
        return vec![];
    }
    match &f.value(v).kind {
        Instr::MakeClosure { func, .. } => vec![func.clone()],
        Instr::Phi { edges } => edges
            .iter()
            .flat_map(|(_, w)| resolve_callee_candidates(f, *w, depth + 1))
            .collect(),
        _ => vec![],
    }
}
