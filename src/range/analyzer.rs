//! Numeric interval analysis over SSA values (C3).
//!
//! `resolve_range` combines a value's intrinsic range (from its defining
//! instruction, via [`RangeAnalyzer::compute_range`]) with any refinement
//! available by walking the dominator chain from the observation block
//! upward, extracting comparison facts from `If` terminators and composing
//! them back onto the queried value through a small set of reversible
//! arithmetic operations.

use std::cell::RefCell;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ssa::program::{BinOp, Callee, Const, Instr, UnOp};
use crate::ssa::types::int_type_info;
use crate::ssa::{BlockId, Function, ValueId};

use super::lattice::Range;

const MAX_DEPTH: u32 = 20;

pub struct RangeAnalyzer<'f> {
    f: &'f Function,
    cache: RefCell<FxHashMap<(BlockId, ValueId), Range>>,
    visiting: RefCell<FxHashSet<ValueId>>,
}

impl<'f> RangeAnalyzer<'f> {
    pub fn new(f: &'f Function) -> Self {
        Self { f, cache: RefCell::new(FxHashMap::default()), visiting: RefCell::new(FxHashSet::default()) }
    }

    /// The range of `v` as observed from `block`, combining its intrinsic
    /// range with dominator-guarded control-flow facts.
    pub fn resolve_range(&self, v: ValueId, block: BlockId) -> Range {
        if let Some(hit) = self.cache.borrow().get(&(block, v)) {
            return hit.clone();
        }
        let base = self.compute_range(v, 0);
        let refined = if base.shared {
            base
        } else {
            self.refine_via_dominators(v, block, base)
        };
        self.cache.borrow_mut().insert((block, v), refined.clone());
        refined
    }

    pub fn is_non_negative(&self, v: ValueId, block: BlockId) -> bool {
        self.resolve_range(v, block).is_non_negative()
    }

    /// The value's range from its own defining instruction alone, with no
    /// knowledge of the block it's being observed from.
    pub fn compute_range(&self, v: ValueId, depth: u32) -> Range {
        if depth > MAX_DEPTH {
            return Range::top();
        }
        let data = self.f.value(v);
        match &data.kind {
            Instr::Const(Const::Int(n)) => Range::exact(*n),
            Instr::Const(Const::Bool(b)) => Range::exact(*b as i128),
            Instr::Const(Const::Zero) => Range::exact(0),
            Instr::Const(_) => Range::top(),
            Instr::Param(_) | Instr::FreeVar(_) => Range::top(),
            Instr::BinOp { op, a, b } if op.is_comparison() => {
                let _ = (a, b);
                Range::boolean()
            }
            Instr::BinOp { op, a, b } => self.compute_binop(*op, *a, *b, depth),
            Instr::UnOp { op: UnOp::Neg, a } => {
                let ra = self.compute_range(*a, depth + 1);
                negate(&ra)
            }
            Instr::UnOp { op: UnOp::Not, .. } => Range::boolean(),
            Instr::Convert { a } => self.compute_convert(v, *a, depth),
            Instr::Load { addr } => self.compute_load(data.block, *addr, depth),
            Instr::Phi { edges } => self.compute_phi(edges, depth),
            Instr::Call { callee, args } => self.compute_call(callee, args, depth),
            Instr::Extract { .. }
            | Instr::MakeClosure { .. }
            | Instr::MakeSlice { .. }
            | Instr::Alloc { .. }
            | Instr::Go { .. }
            | Instr::Defer { .. }
            | Instr::Return { .. }
            | Instr::If { .. }
            | Instr::Jump { .. }
            | Instr::Store { .. }
            | Instr::IndexAddr { .. }
            | Instr::FieldAddr { .. }
            | Instr::Slice { .. } => Range::top(),
        }
    }

    fn compute_binop(&self, op: BinOp, a: ValueId, b: ValueId, depth: u32) -> Range {
        let ra = self.compute_range(a, depth + 1);
        let rb = self.compute_range(b, depth + 1);
        match op {
            BinOp::Add => add(&ra, &rb),
            BinOp::Sub => add(&ra, &negate(&rb)),
            BinOp::Mul => mul(&ra, &rb),
            BinOp::Div => div(&ra, &rb),
            BinOp::Rem => rem(&ra, &rb),
            BinOp::Shl => shl(&ra, &rb),
            BinOp::Shr => shr(&ra, &rb),
            BinOp::And => bitand(&ra, &rb),
            BinOp::Or | BinOp::Xor => Range::top(),
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => Range::boolean(),
        }
    }

    /// `Convert` applies the target type's mask/truncate to the source
    /// range; when the source is already fully within the target's bounds
    /// the conversion is lossless and the range passes through unchanged.
    fn compute_convert(&self, v: ValueId, a: ValueId, depth: u32) -> Range {
        let src = self.compute_range(a, depth + 1);
        let target_ty = &self.f.value(v).ty;
        let info = match int_type_info(target_ty) {
            Ok(info) => info,
            Err(_) => return Range::top(),
        };
        if src.min_set && src.max_set && info.contains(src.min) && info.contains(src.max) {
            return src;
        }
        if src.min_set && src.max_set && src.min == src.max {
            return Range::exact(info.truncate(src.min));
        }
        Range::bounded(info.min, info.max)
    }

    /// Reaching-definition lookup for a same-block `Store` to `addr` that
    /// precedes this `Load`; anything else (cross-block, no matching
    /// store) widens to top per the unreached-alloc-load default.
    fn compute_load(&self, block: BlockId, addr: ValueId, depth: u32) -> Range {
        let blk = self.f.block(block);
        for &id in blk.instrs.iter().rev() {
            if let Instr::Store { addr: a, value } = &self.f.value(id).kind {
                if *a == addr {
                    return self.compute_range(*value, depth + 1);
                }
            }
        }
        Range::top()
    }

    fn compute_phi(&self, edges: &[(BlockId, ValueId)], depth: u32) -> Range {
        let incoming: Vec<ValueId> = edges.iter().map(|(_, v)| *v).collect();
        let mut acc: Option<Range> = None;
        for v in incoming {
            if self.visiting.borrow().contains(&v) {
                continue;
            }
            self.visiting.borrow_mut().insert(v);
            let r = self.compute_range(v, depth + 1);
            self.visiting.borrow_mut().remove(&v);
            acc = Some(match acc {
                None => r,
                Some(prev) => prev.union(&r),
            });
        }
        acc.unwrap_or_else(Range::top)
    }

    fn compute_call(&self, callee: &Callee, args: &[ValueId], depth: u32) -> Range {
        let name = match callee {
            Callee::Direct(name) => name.as_str(),
            _ => return Range::top(),
        };
        match name {
            "min" if args.len() == 2 => {
                let a = self.compute_range(args[0], depth + 1);
                let b = self.compute_range(args[1], depth + 1);
                min_builtin(&a, &b)
            }
            "max" if args.len() == 2 => {
                let a = self.compute_range(args[0], depth + 1);
                let b = self.compute_range(args[1], depth + 1);
                max_builtin(&a, &b)
            }
            // Integer-parsing builtins (strconv.Atoi and friends) can
            // produce any value of the result type; they never panic and
            // their error is reported out-of-band, so the happy-path
            // integer result stays unbounded rather than poisoning the
            // analysis with `NotConstant`.
            "atoi" | "parseint" | "parseuint" => Range::top(),
            _ => Range::top(),
        }
    }

    /// Walk the immediate-dominator chain from `use_block` upward,
    /// intersecting in any comparison fact from an `If` whose taken edge
    /// leads directly to the block we just came from.
    fn refine_via_dominators(&self, v: ValueId, use_block: BlockId, mut range: Range) -> Range {
        let mut cur = use_block;
        let mut steps = 0u32;
        while let Some(idom) = self.f.block(cur).idom {
            if idom == cur || steps >= MAX_DEPTH {
                break;
            }
            steps += 1;
            if let Some(fact) = branch_fact(self.f, idom, cur) {
                if let Some(refined) = apply_fact(self.f, v, &fact, &range) {
                    range = range.intersect(&refined);
                }
            }
            cur = idom;
        }
        range
    }
}

fn negate(r: &Range) -> Range {
    Range {
        min: r.max,
        max: r.min,
        min_set: r.max_set,
        max_set: r.min_set,
        explicit_positives: r.explicit_negatives.iter().map(|v| -v).collect(),
        explicit_negatives: r.explicit_positives.iter().map(|v| -v).collect(),
        is_range_check: false,
        shared: false,
    }
}

fn add(a: &Range, b: &Range) -> Range {
    if a.min_set && a.max_set && b.min_set && b.max_set {
        Range::bounded(a.min + b.min, a.max + b.max)
    } else {
        let mut r = Range::top();
        if a.min_set && b.min_set {
            r.min = a.min + b.min;
            r.min_set = true;
        }
        if a.max_set && b.max_set {
            r.max = a.max + b.max;
            r.max_set = true;
        }
        r
    }
}

fn mul(a: &Range, b: &Range) -> Range {
    if !(a.min_set && a.max_set && b.min_set && b.max_set) {
        return Range::top();
    }
    let candidates = [a.min * b.min, a.min * b.max, a.max * b.min, a.max * b.max];
    let lo = *candidates.iter().min().unwrap();
    let hi = *candidates.iter().max().unwrap();
    Range::bounded(lo, hi)
}

fn div(a: &Range, b: &Range) -> Range {
    if !(a.min_set && a.max_set && b.min_set && b.max_set) || b.min == 0 || b.max == 0 {
        return Range::top();
    }
    if (b.min < 0) != (b.max < 0) {
        // divisor range straddles zero: still bounded by |a| in magnitude
        let bound = a.min.abs().max(a.max.abs());
        return Range::bounded(-bound, bound);
    }
    let candidates = [a.min / b.min, a.min / b.max, a.max / b.min, a.max / b.max];
    let lo = *candidates.iter().min().unwrap();
    let hi = *candidates.iter().max().unwrap();
    Range::bounded(lo, hi)
}

fn rem(dividend: &Range, divisor: &Range) -> Range {
    if !divisor.min_set && !divisor.max_set {
        return Range::top();
    }
    let bound = [divisor.min, divisor.max]
        .into_iter()
        .map(i128::abs)
        .max()
        .unwrap_or(0);
    if bound == 0 {
        return Range::top();
    }
    if dividend.is_non_negative() {
        return Range::bounded(0, bound - 1);
    }
    Range::bounded(-(bound - 1), bound - 1)
}

fn shl(a: &Range, b: &Range) -> Range {
    if a.min_set && a.max_set && b.min_set && b.max_set && b.min >= 0 && b.max < 64 {
        let candidates = [a.min << b.min, a.min << b.max, a.max << b.min, a.max << b.max];
        let lo = *candidates.iter().min().unwrap();
        let hi = *candidates.iter().max().unwrap();
        Range::bounded(lo, hi)
    } else {
        Range::top()
    }
}

fn shr(a: &Range, b: &Range) -> Range {
    if a.min_set && a.max_set && b.min_set && b.max_set && b.min >= 0 && b.max < 64 {
        let candidates = [a.min >> b.min, a.min >> b.max, a.max >> b.min, a.max >> b.max];
        let lo = *candidates.iter().min().unwrap();
        let hi = *candidates.iter().max().unwrap();
        Range::bounded(lo, hi)
    } else {
        Range::top()
    }
}

fn bitand(a: &Range, b: &Range) -> Range {
    if a.is_non_negative() || b.is_non_negative() {
        let cap = [a.max_set.then_some(a.max), b.max_set.then_some(b.max)]
            .into_iter()
            .flatten()
            .filter(|&m| m >= 0)
            .min();
        match cap {
            Some(m) => Range::bounded(0, m),
            None => Range::at_least(0),
        }
    } else {
        Range::top()
    }
}

fn min_builtin(a: &Range, b: &Range) -> Range {
    Range {
        min: a.min.min(b.min),
        max: a.max.min(b.max),
        min_set: a.min_set && b.min_set,
        max_set: a.max_set || b.max_set,
        ..Range::top()
    }
}

fn max_builtin(a: &Range, b: &Range) -> Range {
    Range {
        min: a.min.max(b.min),
        max: a.max.max(b.max),
        min_set: a.min_set || b.min_set,
        max_set: a.max_set && b.max_set,
        ..Range::top()
    }
}

/// A single comparison fact extracted from an `If` terminator, normalized
/// so `lhs OP rhs_const` reads left-to-right (constants on the right).
struct ComparisonFact {
    op: BinOp,
    lhs: ValueId,
    rhs_const: i128,
}

/// If `branch_block` ends in an `If` whose then/else edge is exactly
/// `target_block`, extract the comparison fact implied by taking that
/// edge (negating the operator for the else branch).
fn branch_fact(f: &Function, branch_block: BlockId, target_block: BlockId) -> Option<ComparisonFact> {
    let blk = f.block(branch_block);
    let if_instr = blk.instrs.iter().rev().find_map(|&id| match &f.value(id).kind {
        Instr::If { cond, then_blk, else_blk } => Some((*cond, *then_blk, *else_blk)),
        _ => None,
    })?;
    let (cond, then_blk, else_blk) = if_instr;
    let took_then = then_blk == target_block;
    let took_else = else_blk == target_block;
    if !took_then && !took_else {
        return None;
    }
    let (op, a, b) = match &f.value(cond).kind {
        Instr::BinOp { op, a, b } if op.is_comparison() => (*op, *a, *b),
        _ => return None,
    };
    let (op, lhs, rhs) = if let Ok(c) = crate::values::constant_int64(f, b) {
        (op, a, c)
    } else if let Ok(c) = crate::values::constant_int64(f, a) {
        (op.flip(), b, c)
    } else {
        return None;
    };
    let op = if took_else { negate_op(op) } else { op };
    Some(ComparisonFact { op, lhs, rhs_const: rhs })
}

fn negate_op(op: BinOp) -> BinOp {
    match op {
        BinOp::Eq => BinOp::Ne,
        BinOp::Ne => BinOp::Eq,
        BinOp::Lt => BinOp::Ge,
        BinOp::Le => BinOp::Gt,
        BinOp::Gt => BinOp::Le,
        BinOp::Ge => BinOp::Lt,
        other => other,
    }
}

/// A reversible arithmetic step relating a compared value back to the
/// value actually being queried: `compared = target * scale + offset`.
#[derive(Clone, Copy)]
enum Compose {
    Affine { scale: i128, offset: i128 },
}

/// Find an affine relationship between `compared` and `target` by walking
/// up through a short chain of add/sub/mul/shl/neg instructions (the
/// "reversible compositions" the engine recognizes), composing their
/// scale/offset as it goes.
fn find_compose(f: &Function, compared: ValueId, target: ValueId, depth: u32) -> Option<Compose> {
    if compared == target {
        return Some(Compose::Affine { scale: 1, offset: 0 });
    }
    if depth > 4 {
        return None;
    }
    match &f.value(compared).kind {
        Instr::BinOp { op: BinOp::Add, a, b } => {
            let (inner, konst) = pick_inner_const(f, *a, *b)?;
            let Compose::Affine { scale, offset } = find_compose(f, inner, target, depth + 1)?;
            Some(Compose::Affine { scale, offset: offset + konst })
        }
        Instr::BinOp { op: BinOp::Sub, a, b } => {
            if let Ok(k) = crate::values::constant_int64(f, *b) {
                let Compose::Affine { scale, offset } = find_compose(f, *a, target, depth + 1)?;
                Some(Compose::Affine { scale, offset: offset - k })
            } else {
                None
            }
        }
        Instr::BinOp { op: BinOp::Mul, a, b } => {
            let (inner, konst) = pick_inner_const(f, *a, *b)?;
            if konst == 0 {
                return None;
            }
            let Compose::Affine { scale, offset } = find_compose(f, inner, target, depth + 1)?;
            Some(Compose::Affine { scale: scale * konst, offset: offset * konst })
        }
        Instr::BinOp { op: BinOp::Shl, a, b } => {
            let shift = crate::values::constant_int64(f, *b).ok()?;
            if !(0..64).contains(&shift) {
                return None;
            }
            let factor = 1i128 << shift;
            let Compose::Affine { scale, offset } = find_compose(f, *a, target, depth + 1)?;
            Some(Compose::Affine { scale: scale * factor, offset: offset * factor })
        }
        Instr::UnOp { op: UnOp::Neg, a } => {
            let Compose::Affine { scale, offset } = find_compose(f, *a, target, depth + 1)?;
            Some(Compose::Affine { scale: -scale, offset: -offset })
        }
        _ => None,
    }
}

fn pick_inner_const(f: &Function, a: ValueId, b: ValueId) -> Option<(ValueId, i128)> {
    if let Ok(k) = crate::values::constant_int64(f, b) {
        Some((a, k))
    } else {
        crate::values::constant_int64(f, a).ok().map(|k| (b, k))
    }
}

/// Apply a comparison fact to `v`, composing through whatever reversible
/// chain connects `fact.lhs` back to `v`, if any.
fn apply_fact(f: &Function, v: ValueId, fact: &ComparisonFact, current: &Range) -> Option<Range> {
    let compose = find_compose(f, fact.lhs, v, 0)?;
    let Compose::Affine { scale, offset } = compose;
    // fact.lhs OP fact.rhs_const, and fact.lhs = v*scale + offset, so
    // v*scale OP (fact.rhs_const - offset).
    let rhs = fact.rhs_const - offset;
    if scale == 0 {
        return None;
    }
    let op = if scale > 0 { fact.op } else { fact.op.flip_for_negation() };
    let bound = divide_toward(rhs, scale, op);
    let _ = current;
    Some(match op {
        BinOp::Eq => {
            let mut r = Range::top();
            r.explicit_positives.insert(bound);
            r.shared = false;
            r
        }
        BinOp::Ne => {
            let mut r = Range::top();
            r.explicit_negatives.insert(bound);
            r.shared = false;
            r
        }
        BinOp::Lt => Range::at_most(bound - 1),
        BinOp::Le => Range::at_most(bound),
        BinOp::Gt => Range::at_least(bound + 1),
        BinOp::Ge => Range::at_least(bound),
        _ => return None,
    })
}

/// Divide `rhs` by `scale`, rounding so the resulting bound stays sound
/// for the direction `op` constrains (round toward making the bound
/// looser, never tighter, when the division isn't exact).
fn divide_toward(rhs: i128, scale: i128, op: BinOp) -> i128 {
    if rhs % scale == 0 {
        return rhs / scale;
    }
    let q = rhs / scale;
    let widen_up = matches!(op, BinOp::Gt | BinOp::Ge);
    if widen_up == (rhs % scale < 0) {
        q - 1
    } else {
        q
    }
}

trait FlipForNegation {
    fn flip_for_negation(self) -> BinOp;
}

impl FlipForNegation for BinOp {
    /// Dividing an inequality by a negative number flips its direction.
    fn flip_for_negation(self) -> BinOp {
        match self {
            BinOp::Lt => BinOp::Gt,
            BinOp::Le => BinOp::Ge,
            BinOp::Gt => BinOp::Lt,
            BinOp::Ge => BinOp::Le,
            other => other,
        }
    }
}

/// Does the block containing `a`'s definition dominate the block
/// containing `b`'s definition (or are they the same block, with `a`
/// textually earlier)? A `false` result means "unknown", not "no" — the
/// engine never claims an ordering it can't prove from dominance.
pub fn precedes(f: &Function, a: ValueId, b: ValueId) -> bool {
    let (ba, bb) = (f.value(a).block, f.value(b).block);
    if ba == bb {
        let blk = f.block(ba);
        let pa = blk.instrs.iter().position(|&x| x == a);
        let pb = blk.instrs.iter().position(|&x| x == b);
        return matches!((pa, pb), (Some(pa), Some(pb)) if pa < pb);
    }
    let mut cur = Some(bb);
    let mut steps = 0u32;
    while let Some(b) = cur {
        if b == ba {
            return true;
        }
        let idom = f.block(b).idom;
        if idom == Some(b) || steps >= MAX_DEPTH {
            break;
        }
        cur = idom;
        steps += 1;
    }
    false
}

/// Forward reachability over the CFG's successor edges.
pub fn is_reachable(f: &Function, from: BlockId, to: BlockId) -> bool {
    let mut visited = FxHashSet::default();
    let mut stack = vec![from];
    while let Some(b) = stack.pop() {
        if b == to {
            return true;
        }
        if !visited.insert(b) {
            continue;
        }
        stack.extend(f.block(b).succs.iter().copied());
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::program::Position;
    use crate::ssa::types::Type;

    fn int_ty() -> Type {
        Type::Int { signed: true, bits: 64 }
    }

    #[test]
    fn const_range_is_exact() {
        let mut f = Function::new("f");
        let c = f.push(0, Instr::Const(Const::Int(42)), int_ty());
        let a = RangeAnalyzer::new(&f);
        let r = a.resolve_range(c, 0);
        assert_eq!((r.min, r.max), (42, 42));
    }

    #[test]
    fn add_widens_bounds() {
        let mut f = Function::new("f");
        let a = f.push(0, Instr::Const(Const::Int(3)), int_ty());
        let b = f.push(0, Instr::Const(Const::Int(4)), int_ty());
        let sum = f.push(0, Instr::BinOp { op: BinOp::Add, a, b }, int_ty());
        let an = RangeAnalyzer::new(&f);
        let r = an.resolve_range(sum, 0);
        assert_eq!((r.min, r.max), (7, 7));
    }

    #[test]
    fn phi_unions_branches() {
        let mut f = Function::new("f");
        let entry = f.entry;
        let then_b = f.add_block();
        let else_b = f.add_block();
        let merge = f.add_block();
        let c = f.push(entry, Instr::Const(Const::Bool(true)), Type::Bool);
        f.push(entry, Instr::If { cond: c, then_blk: then_b, else_blk: else_b }, Type::Other);
        f.set_succs(entry, vec![then_b, else_b]);
        let one = f.push(then_b, Instr::Const(Const::Int(1)), int_ty());
        f.push(then_b, Instr::Jump { target: merge }, Type::Other);
        f.set_succs(then_b, vec![merge]);
        let ten = f.push(else_b, Instr::Const(Const::Int(10)), int_ty());
        f.push(else_b, Instr::Jump { target: merge }, Type::Other);
        f.set_succs(else_b, vec![merge]);
        let phi = f.push(merge, Instr::Phi { edges: vec![(then_b, one), (else_b, ten)] }, int_ty());
        f.compute_dominators();
        let an = RangeAnalyzer::new(&f);
        let r = an.resolve_range(phi, merge);
        assert_eq!((r.min, r.max), (1, 10));
    }

    /// `if x < 10 { use x }` — inside the then branch, `x`'s range is
    /// refined to `<= 9` via the dominator-guarded comparison fact.
    #[test]
    fn dominator_refinement_narrows_guarded_value() {
        let mut f = Function::new("f");
        let entry = f.entry;
        let x = f.push_with_pos(entry, Instr::Param(0), int_ty(), Position::default());
        let ten = f.push(entry, Instr::Const(Const::Int(10)), int_ty());
        let cmp = f.push(entry, Instr::BinOp { op: BinOp::Lt, a: x, b: ten }, Type::Bool);
        let then_b = f.add_block();
        let else_b = f.add_block();
        f.push(entry, Instr::If { cond: cmp, then_blk: then_b, else_blk: else_b }, Type::Other);
        f.set_succs(entry, vec![then_b, else_b]);
        f.compute_dominators();
        let an = RangeAnalyzer::new(&f);
        let r = an.resolve_range(x, then_b);
        assert!(r.max_set);
        assert_eq!(r.max, 9);
    }

    /// `x % c` with `x` provably non-negative never goes negative, even
    /// though the raw `%` result type admits `-(c-1)..=c-1` in general.
    #[test]
    fn rem_of_non_negative_dividend_is_non_negative() {
        let mut f = Function::new("f");
        let x = f.push(0, Instr::Const(Const::Int(5)), int_ty());
        let c = f.push(0, Instr::Const(Const::Int(10)), int_ty());
        let rem = f.push(0, Instr::BinOp { op: BinOp::Rem, a: x, b: c }, int_ty());
        let an = RangeAnalyzer::new(&f);
        let r = an.resolve_range(rem, 0);
        assert_eq!((r.min, r.max), (0, 9));
    }

    #[test]
    fn rem_of_unbounded_dividend_stays_symmetric() {
        let mut f = Function::new("f");
        let x = f.push(0, Instr::Param(0), int_ty());
        let c = f.push(0, Instr::Const(Const::Int(10)), int_ty());
        let rem = f.push(0, Instr::BinOp { op: BinOp::Rem, a: x, b: c }, int_ty());
        let an = RangeAnalyzer::new(&f);
        let r = an.resolve_range(rem, 0);
        assert_eq!((r.min, r.max), (-9, 9));
    }

    #[test]
    fn precedes_same_block_by_position() {
        let mut f = Function::new("f");
        let a = f.push(0, Instr::Const(Const::Int(1)), int_ty());
        let b = f.push(0, Instr::Const(Const::Int(2)), int_ty());
        assert!(precedes(&f, a, b));
        assert!(!precedes(&f, b, a));
    }

    #[test]
    fn reachable_across_jump() {
        let mut f = Function::new("f");
        let entry = f.entry;
        let next = f.add_block();
        f.set_succs(entry, vec![next]);
        assert!(is_reachable(&f, entry, next));
        assert!(!is_reachable(&f, next, entry));
    }
}
