//! Out-of-bounds slice/index access, with dedicated loop-induction
//! recovery for the common `for i := 0; i < n; i++ { s[i] }` shape that
//! the general range analyzer can't see through (the back edge is a
//! self-referential phi, so the generic phi-union widens to top).

use crate::issue::{Confidence, Finding, Severity};
use crate::range::RangeAnalyzer;
use crate::ssa::program::{BinOp, Callee, Instr};
use crate::ssa::{BlockId, Function, Program, ValueId};
use crate::values::{buffer_len, compute_new_cap, constant_int64, is_full_slice, slice_bounds};

use super::Rule;

pub const RULE_ID: &str = "G602";
const CWE_OUT_OF_BOUNDS: u32 = 125;

pub struct SliceBoundsRule;

impl Rule for SliceBoundsRule {
    fn id(&self) -> &'static str {
        RULE_ID
    }

    fn describe(&self) -> &'static str {
        "slice or index access out of the allocated buffer's bounds"
    }

    fn run(&self, _program: &Program, f: &Function) -> Vec<Finding> {
        let analyzer = RangeAnalyzer::new(f);
        let mut findings = Vec::new();
        for (vid, data) in f.values.iter().enumerate() {
            match &data.kind {
                Instr::IndexAddr { base, index } => {
                    let len = effective_len(f, *base);
                    if len < 0 {
                        continue; // unknown length: nothing provable either way
                    }
                    if is_provably_in_bounds(f, &analyzer, *index, data.block, len) {
                        continue;
                    }
                    findings.push(Finding::new(
                        RULE_ID,
                        format!("index may be out of bounds for a buffer of length {len}"),
                        Severity::High,
                        Confidence::Medium,
                        CWE_OUT_OF_BOUNDS,
                        data.pos.as_ref(),
                        None,
                    ));
                }
                Instr::Slice { .. } => {
                    if let Some(reason) = invalid_slice_reason(f, vid as ValueId) {
                        findings.push(Finding::new(
                            RULE_ID,
                            reason,
                            Severity::High,
                            Confidence::Medium,
                            CWE_OUT_OF_BOUNDS,
                            data.pos.as_ref(),
                            None,
                        ));
                    }
                }
                _ => continue,
            }
        }
        findings
    }
}

/// Resolve a slice bound that may be absent (`None` ⇒ "use the caller's
/// default") from one that's present but not provably constant (`None` at
/// the outer layer ⇒ "give up, nothing provable").
fn resolved_bound(f: &Function, v: Option<ValueId>) -> Option<Option<i128>> {
    match v {
        None => Some(None),
        Some(id) => constant_int64(f, id).ok().map(Some),
    }
}

/// The capacity a slice's own `(low, high[, max])` resolve to, against
/// `v`'s own base — not the root allocation. A plain buffer (array,
/// `make`, string) falls back to [`buffer_len`], but a value that's
/// itself a derived slice is indexed relative to its own capacity, which
/// is usually smaller than the root's, so recurse one level at a time via
/// [`compute_new_cap`] rather than walking straight to the root.
fn effective_len(f: &Function, v: ValueId) -> i128 {
    let Instr::Slice { base, low, high, max } = &f.value(v).kind else {
        return buffer_len(f, v);
    };
    let old_cap = effective_len(f, *base);
    if old_cap < 0 {
        return -1;
    }
    let (Some(low), Some(high), Some(max)) =
        (resolved_bound(f, *low), resolved_bound(f, *high), resolved_bound(f, *max))
    else {
        return -1;
    };
    compute_new_cap(low, high, max, old_cap)
}

/// A slice is violating when its resolved `(low, high[, max])` falls
/// outside `[0, len]` (two-index) or violates `0 ≤ l ≤ h ≤ m ≤ cap`
/// (three-index), `len` being the capacity of its own immediate base, not
/// necessarily the root allocation — [`effective_len`] walks the chain of
/// derived slices itself, so a slice-of-a-slice is checked against its own
/// base's capacity rather than the root's. Returns `None` when the slice is
/// trivially full or not fully constant-resolvable (nothing provable either
/// way).
fn invalid_slice_reason(f: &Function, sl: ValueId) -> Option<String> {
    let Instr::Slice { base, .. } = &f.value(sl).kind else { return None };
    let base = *base;
    let len = effective_len(f, base);
    if len < 0 {
        return None;
    }
    if is_full_slice(f, sl, len) {
        return None;
    }

    let idx = slice_bounds(f, sl).ok()?;
    let low = resolved_bound(f, idx.low)?;
    let high = resolved_bound(f, idx.high)?;
    let max = resolved_bound(f, idx.max)?;
    let new_cap = compute_new_cap(low, high, max, len);
    let l = low.unwrap_or(0);

    let valid = if let Some(m) = max {
        let h = high.unwrap_or(m);
        0 <= l && l <= h && h <= m && m <= len
    } else {
        let h = high.unwrap_or(len);
        0 <= l && l <= h && h <= len
    };

    if valid && new_cap >= 0 {
        return None;
    }
    Some(match max {
        Some(m) => format!(
            "three-index slice [{l}:{}:{m}] violates 0 <= low <= high <= max <= {len}",
            high.unwrap_or(m)
        ),
        None => format!("slice [{l}:{}] falls outside the buffer's bounds [0, {len}]", high.unwrap_or(len)),
    })
}

fn is_provably_in_bounds(
    f: &Function,
    analyzer: &RangeAnalyzer<'_>,
    index: ValueId,
    use_block: BlockId,
    len: i128,
) -> bool {
    let range = analyzer.resolve_range(index, use_block);
    if range.min_set && range.max_set && range.min >= 0 && range.max < len {
        return true;
    }
    if let Some(bound) = recover_induction_bound(f, index) {
        return bound < len;
    }
    false
}

/// Recognize `phi = [init, phi + step]` where `init` is a known
/// non-negative start, and recover the loop's upper bound from a
/// terminating comparison in the phi's own block (the loop header),
/// comparing the phi (or a value one reversible step away from it)
/// against either a constant or `len(base)` of the same buffer.
fn recover_induction_bound(f: &Function, phi_val: ValueId) -> Option<i128> {
    let phi_block = f.value(phi_val).block;
    let Instr::Phi { edges } = &f.value(phi_val).kind else { return None };
    let has_increment = edges.iter().any(|(_, v)| is_self_increment(f, *v, phi_val));
    let has_nonneg_init = edges.iter().any(|(_, v)| {
        *v != phi_val && constant_int64(f, *v).map(|c| c >= 0).unwrap_or(false)
    });
    if !has_increment || !has_nonneg_init {
        return None;
    }
    terminating_bound(f, phi_block, phi_val)
}

fn is_self_increment(f: &Function, v: ValueId, phi_val: ValueId) -> bool {
    matches!(
        &f.value(v).kind,
        Instr::BinOp { op: BinOp::Add, a, b }
            if (*a == phi_val && constant_int64(f, *b).is_ok())
                || (*b == phi_val && constant_int64(f, *a).is_ok())
    )
}

fn terminating_bound(f: &Function, header: BlockId, phi_val: ValueId) -> Option<i128> {
    for &id in &f.block(header).instrs {
        let Instr::If { cond, .. } = &f.value(id).kind else { continue };
        let Instr::BinOp { op, a, b } = &f.value(*cond).kind else { continue };
        if !op.is_comparison() {
            continue;
        }
        if *a == phi_val {
            if let Some(bound) = comparison_bound(f, *op, *b) {
                return Some(bound);
            }
        }
        if *b == phi_val {
            if let Some(bound) = comparison_bound(f, op.flip(), *a) {
                return Some(bound);
            }
        }
    }
    None
}

/// The upper bound implied by `phi OP rhs` holding on the loop's taken
/// (continuing) edge, where `rhs` is either a literal or a `len(...)`
/// call.
fn comparison_bound(f: &Function, op: BinOp, rhs: ValueId) -> Option<i128> {
    let bound = if let Ok(c) = constant_int64(f, rhs) {
        c
    } else if let Instr::Call { callee: Callee::Direct(name), args } = &f.value(rhs).kind {
        if name != "len" {
            return None;
        }
        let base = *args.first()?;
        let l = buffer_len(f, base);
        if l < 0 {
            return None;
        }
        l
    } else {
        return None;
    };
    match op {
        BinOp::Lt => Some(bound - 1),
        BinOp::Le => Some(bound),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::program::Const;
    use crate::ssa::types::Type;

    fn int_ty() -> Type {
        Type::Int { signed: true, bits: 64 }
    }

    fn array_ty(len: usize) -> Type {
        Type::Array { elem: Box::new(int_ty()), len }
    }

    #[test]
    fn constant_index_past_end_flags() {
        let mut f = Function::new("f");
        let arr = f.push(0, Instr::Alloc { ty: array_ty(4), zero_init: true }, array_ty(4));
        let idx = f.push(0, Instr::Const(Const::Int(10)), int_ty());
        f.push(0, Instr::IndexAddr { base: arr, index: idx }, int_ty().pointer_to());
        let program = Program::new();
        assert_eq!(SliceBoundsRule.run(&program, &f).len(), 1);
    }

    #[test]
    fn constant_index_in_bounds_is_clean() {
        let mut f = Function::new("f");
        let arr = f.push(0, Instr::Alloc { ty: array_ty(4), zero_init: true }, array_ty(4));
        let idx = f.push(0, Instr::Const(Const::Int(2)), int_ty());
        f.push(0, Instr::IndexAddr { base: arr, index: idx }, int_ty().pointer_to());
        let program = Program::new();
        assert!(SliceBoundsRule.run(&program, &f).is_empty());
    }

    #[test]
    fn recovered_loop_induction_bound_is_clean() {
        let mut f = Function::new("f");
        let entry = f.entry;
        let arr = f.push(entry, Instr::Alloc { ty: array_ty(10), zero_init: true }, array_ty(10));
        let zero = f.push(entry, Instr::Const(Const::Int(0)), int_ty());
        let header = f.add_block();
        f.push(entry, Instr::Jump { target: header }, Type::Other);
        f.set_succs(entry, vec![header]);

        let one = f.push(header, Instr::Const(Const::Int(1)), int_ty());
        let ten = f.push(header, Instr::Const(Const::Int(10)), int_ty());
        // placeholder phi edges filled in once the increment value exists
        let phi = f.push(header, Instr::Phi { edges: vec![] }, int_ty());
        let inc = f.push(header, Instr::BinOp { op: BinOp::Add, a: phi, b: one }, int_ty());
        f.values[phi as usize].kind =
            Instr::Phi { edges: vec![(entry, zero), (header, inc)] };
        let cmp = f.push(header, Instr::BinOp { op: BinOp::Lt, a: phi, b: ten }, Type::Bool);
        let body = f.add_block();
        let exit = f.add_block();
        f.push(header, Instr::If { cond: cmp, then_blk: body, else_blk: exit }, Type::Other);
        f.set_succs(header, vec![body, exit]);

        f.push(body, Instr::IndexAddr { base: arr, index: phi }, int_ty().pointer_to());
        f.push(body, Instr::Jump { target: header }, Type::Other);
        f.set_succs(body, vec![header]);
        f.compute_dominators();

        let program = Program::new();
        assert!(SliceBoundsRule.run(&program, &f).is_empty());
    }

    #[test]
    fn two_index_slice_past_end_flags() {
        let mut f = Function::new("f");
        let arr = f.push(0, Instr::Alloc { ty: array_ty(4), zero_init: true }, array_ty(4));
        let high = f.push(0, Instr::Const(Const::Int(10)), int_ty());
        f.push(
            0,
            Instr::Slice { base: arr, low: None, high: Some(high), max: None },
            Type::Slice(Box::new(int_ty())),
        );
        let program = Program::new();
        assert_eq!(SliceBoundsRule.run(&program, &f).len(), 1);
    }

    #[test]
    fn two_index_slice_within_bounds_is_clean() {
        let mut f = Function::new("f");
        let arr = f.push(0, Instr::Alloc { ty: array_ty(10), zero_init: true }, array_ty(10));
        let low = f.push(0, Instr::Const(Const::Int(2)), int_ty());
        let high = f.push(0, Instr::Const(Const::Int(6)), int_ty());
        f.push(
            0,
            Instr::Slice { base: arr, low: Some(low), high: Some(high), max: None },
            Type::Slice(Box::new(int_ty())),
        );
        let program = Program::new();
        assert!(SliceBoundsRule.run(&program, &f).is_empty());
    }

    #[test]
    fn three_index_slice_violating_invariant_flags() {
        let mut f = Function::new("f");
        let arr = f.push(0, Instr::Alloc { ty: array_ty(10), zero_init: true }, array_ty(10));
        let low = f.push(0, Instr::Const(Const::Int(2)), int_ty());
        let high = f.push(0, Instr::Const(Const::Int(8)), int_ty());
        let max = f.push(0, Instr::Const(Const::Int(6)), int_ty()); // max < high: invalid
        f.push(
            0,
            Instr::Slice { base: arr, low: Some(low), high: Some(high), max: Some(max) },
            Type::Slice(Box::new(int_ty())),
        );
        let program = Program::new();
        assert_eq!(SliceBoundsRule.run(&program, &f).len(), 1);
    }

    #[test]
    fn three_index_slice_respecting_invariant_is_clean() {
        let mut f = Function::new("f");
        let arr = f.push(0, Instr::Alloc { ty: array_ty(10), zero_init: true }, array_ty(10));
        let low = f.push(0, Instr::Const(Const::Int(2)), int_ty());
        let high = f.push(0, Instr::Const(Const::Int(6)), int_ty());
        let max = f.push(0, Instr::Const(Const::Int(8)), int_ty());
        f.push(
            0,
            Instr::Slice { base: arr, low: Some(low), high: Some(high), max: Some(max) },
            Type::Slice(Box::new(int_ty())),
        );
        let program = Program::new();
        assert!(SliceBoundsRule.run(&program, &f).is_empty());
    }

    #[test]
    fn full_slice_detected_via_len_call_is_clean() {
        let mut f = Function::new("f");
        let arr = f.push(0, Instr::Alloc { ty: array_ty(4), zero_init: true }, array_ty(4));
        let len_call =
            f.push(0, Instr::Call { callee: Callee::Direct("len".into()), args: vec![arr] }, int_ty());
        f.push(
            0,
            Instr::Slice { base: arr, low: None, high: Some(len_call), max: None },
            Type::Slice(Box::new(int_ty())),
        );
        let program = Program::new();
        assert!(SliceBoundsRule.run(&program, &f).is_empty());
    }

    #[test]
    fn slice_of_a_slice_is_checked_against_its_own_capacity() {
        let mut f = Function::new("f");
        let arr = f.push(0, Instr::Alloc { ty: array_ty(10), zero_init: true }, array_ty(10));
        let mid_low = f.push(0, Instr::Const(Const::Int(2)), int_ty());
        let mid_high = f.push(0, Instr::Const(Const::Int(8)), int_ty());
        // mid = arr[2:8], capacity 6, itself valid against arr's 10.
        let mid = f.push(
            0,
            Instr::Slice { base: arr, low: Some(mid_low), high: Some(mid_high), max: None },
            Type::Slice(Box::new(int_ty())),
        );
        let low = f.push(0, Instr::Const(Const::Int(0)), int_ty());
        let high = f.push(0, Instr::Const(Const::Int(4)), int_ty());
        // sl = mid[0:4], within mid's own 6-element capacity: clean.
        f.push(
            0,
            Instr::Slice { base: mid, low: Some(low), high: Some(high), max: None },
            Type::Slice(Box::new(int_ty())),
        );
        let program = Program::new();
        assert!(SliceBoundsRule.run(&program, &f).is_empty());
    }

    #[test]
    fn slice_of_a_slice_past_its_own_capacity_flags() {
        let mut f = Function::new("f");
        let arr = f.push(0, Instr::Alloc { ty: array_ty(10), zero_init: true }, array_ty(10));
        let mid_low = f.push(0, Instr::Const(Const::Int(2)), int_ty());
        let mid_high = f.push(0, Instr::Const(Const::Int(8)), int_ty());
        // mid = arr[2:8], capacity 6.
        let mid = f.push(
            0,
            Instr::Slice { base: arr, low: Some(mid_low), high: Some(mid_high), max: None },
            Type::Slice(Box::new(int_ty())),
        );
        let high = f.push(0, Instr::Const(Const::Int(7)), int_ty());
        // sl = mid[0:7] exceeds mid's own 6-element capacity, even though
        // 7 would be in bounds against the root allocation's length of 10.
        f.push(
            0,
            Instr::Slice { base: mid, low: None, high: Some(high), max: None },
            Type::Slice(Box::new(int_ty())),
        );
        let program = Program::new();
        assert_eq!(SliceBoundsRule.run(&program, &f).len(), 1);
    }

    #[test]
    fn slice_with_symbolic_bound_is_not_claimed_violating() {
        let mut f = Function::new("f");
        let arr = f.push(0, Instr::Alloc { ty: array_ty(10), zero_init: true }, array_ty(10));
        let high = f.push(0, Instr::Param(0), int_ty());
        f.push(
            0,
            Instr::Slice { base: arr, low: None, high: Some(high), max: None },
            Type::Slice(Box::new(int_ty())),
        );
        let program = Program::new();
        assert!(SliceBoundsRule.run(&program, &f).is_empty());
    }
}
