//! C2: value helpers — pure functions over the SSA view.

use rustc_hash::FxHashMap;

use crate::error::{HelperError, HelperResult};
use crate::ssa::program::{Callee, Const, Function, Instr, ValueId};
use crate::ssa::types::Type;

/// Extract a signed integer constant, following one layer of unary negate
/// over a literal (`-5` modeled as `UnOp::Neg(Const::Int(5))`).
pub fn constant_int64(f: &Function, v: ValueId) -> HelperResult<i128> {
    match &f.value(v).kind {
        Instr::Const(c) => c.as_int().ok_or(HelperError::NotConstant),
        Instr::UnOp { op: crate::ssa::program::UnOp::Neg, a } => {
            constant_int64(f, *a).map(|v| -v)
        }
        _ => Err(HelperError::NotConstant),
    }
}

/// Unsigned variant; rejects negative literals.
pub fn constant_uint64(f: &Function, v: ValueId) -> HelperResult<u64> {
    let i = constant_int64(f, v)?;
    if i < 0 {
        Err(HelperError::NotConstant)
    } else {
        Ok(i as u64)
    }
}

/// Structural decomposition of a slice expression's indices (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SliceIndices {
    pub low: Option<ValueId>,
    pub high: Option<ValueId>,
    pub max: Option<ValueId>,
}

pub fn slice_bounds(f: &Function, slice_val: ValueId) -> HelperResult<SliceIndices> {
    match &f.value(slice_val).kind {
        Instr::Slice { low, high, max, .. } => Ok(SliceIndices { low: *low, high: *high, max: *max }),
        _ => Err(HelperError::NotFound),
    }
}

/// Resolved numeric indices, with `-1` standing in for "not specified in
/// the slice expression" per spec (not for a symbolic-but-present index,
/// which resolves to `None` at the `Option<i128>` layer used internally by
/// [`compute_new_cap`]).
pub fn slice_range(f: &Function, slice_val: ValueId) -> HelperResult<(i128, i128, i128)> {
    let idx = slice_bounds(f, slice_val)?;
    let resolve = |o: Option<ValueId>| -> i128 {
        o.and_then(|v| constant_int64(f, v).ok()).unwrap_or(-1)
    };
    Ok((resolve(idx.low), resolve(idx.high), resolve(idx.max)))
}

/// Capacity of the result of a two- or three-index slice.
///
/// `max > 0 ⇒ max − low`; otherwise `new_cap = (high or old_cap) − (low or
/// 0)`, which is algebraically identical to the four-way table in spec §6
/// (each branch there is that formula specialized to which index is
/// absent).
pub fn compute_new_cap(low: Option<i128>, high: Option<i128>, max: Option<i128>, old_cap: i128) -> i128 {
    if let Some(m) = max {
        if m > 0 {
            return m - low.unwrap_or(0);
        }
    }
    let l = low.unwrap_or(0);
    let h = high.unwrap_or(old_cap);
    h - l
}

/// Constant length of an array/slice root, walking slice-of-slice and
/// convert chains down to the underlying allocation. `-1` when unknown.
pub fn buffer_len(f: &Function, v: ValueId) -> i128 {
    match &f.value(v).kind {
        Instr::Slice { base, .. } => buffer_len(f, *base),
        Instr::Convert { a } => buffer_len(f, *a),
        Instr::Load { addr } => buffer_len(f, *addr),
        Instr::Alloc { ty, .. } => array_len(ty),
        Instr::MakeSlice { len: Some(l), .. } => constant_int64(f, *l).unwrap_or(-1),
        Instr::MakeSlice { len: None, .. } => -1,
        Instr::Const(Const::SliceLiteral(items)) => items.len() as i128,
        _ => array_len(&f.value(v).ty),
    }
}

fn array_len(ty: &Type) -> i128 {
    match ty.deref_one() {
        Type::Array { len, .. } => *len as i128,
        _ => -1,
    }
}

/// Returns the callee name of a `len(...)` builtin call over `base`, used
/// to recognize the `s[0:len(s)]` idiom structurally.
fn is_len_of(f: &Function, v: ValueId, base: ValueId) -> bool {
    matches!(
        &f.value(v).kind,
        Instr::Call { callee: Callee::Direct(name), args }
            if name == "len" && args.first() == Some(&base)
    )
}

/// A slice is "full" when it covers `[0, buf_len)` of its base, detected
/// structurally: `low` absent-or-zero and `high` absent, or `high` matching
/// a `len(base)` call, or `high` a constant equal to the known `buf_len`.
/// Matches regardless of whether `buf_len` itself is constant, per §8.
pub fn is_full_slice(f: &Function, sl: ValueId, buf_len: i128) -> bool {
    let idx = match slice_bounds(f, sl) {
        Ok(idx) => idx,
        Err(_) => return false,
    };
    let low_ok = match idx.low {
        None => true,
        Some(v) => constant_int64(f, v) == Ok(0),
    };
    if !low_ok {
        return false;
    }
    match idx.high {
        None => true,
        Some(h) => {
            if let Instr::Slice { base, .. } = &f.value(sl).kind {
                if is_len_of(f, h, *base) {
                    return true;
                }
            }
            buf_len >= 0 && constant_int64(f, h) == Ok(buf_len)
        }
    }
}

/// Containment test under the slice lattice: does `b`'s resolved `[low,
/// high)` fully contain `a`'s? Conservative — returns `false` when either
/// side isn't fully constant-resolved, matching the engine's "useful
/// precision, not soundness" stance.
pub fn is_sub_slice(f: &Function, a: ValueId, b: ValueId) -> bool {
    let (a_lo, a_hi, _) = match slice_range(f, a) {
        Ok(r) => r,
        Err(_) => return false,
    };
    let (b_lo, b_hi, _) = match slice_range(f, b) {
        Ok(r) => r,
        Err(_) => return false,
    };
    if a_lo < 0 || a_hi < 0 || b_lo < 0 || b_hi < 0 {
        return false;
    }
    b_lo <= a_lo && a_hi <= b_hi
}

/// One-pass index from callee name to its call sites, as `(caller_fn_idx,
/// call_value_id)` pairs.
pub fn build_caller_map(funcs: &[Function]) -> FxHashMap<String, Vec<(usize, ValueId)>> {
    let mut map: FxHashMap<String, Vec<(usize, ValueId)>> = FxHashMap::default();
    for (fi, f) in funcs.iter().enumerate() {
        for (vid, vd) in f.values.iter().enumerate() {
            if let Instr::Call { callee: Callee::Direct(name), .. } = &vd.kind {
                map.entry(name.clone()).or_default().push((fi, vid as ValueId));
            }
        }
    }
    map
}

/// In-order walk over every instruction in every block of every function.
pub fn traverse_ssa(funcs: &[Function], mut visitor: impl FnMut(usize, &Function, ValueId, &Instr)) {
    for (fi, f) in funcs.iter().enumerate() {
        for block in &f.blocks {
            for &vid in &block.instrs {
                visitor(fi, f, vid, &f.value(vid).kind);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::program::UnOp;
    use crate::ssa::types::Type;

    fn int_ty() -> Type {
        Type::Int { signed: true, bits: 64 }
    }

    #[test]
    fn constant_int64_follows_negate() {
        let mut f = Function::new("f");
        let five = f.push(0, Instr::Const(Const::Int(5)), int_ty());
        let neg = f.push(0, Instr::UnOp { op: UnOp::Neg, a: five }, int_ty());
        assert_eq!(constant_int64(&f, neg), Ok(-5));
    }

    #[test]
    fn constant_int64_rejects_non_constant() {
        let mut f = Function::new("f");
        let p = f.push(0, Instr::Param(0), int_ty());
        assert!(constant_int64(&f, p).is_err());
    }

    #[test]
    fn compute_new_cap_two_index_table() {
        assert_eq!(compute_new_cap(None, None, None, 10), 10);
        assert_eq!(compute_new_cap(Some(3), None, None, 10), 7);
        assert_eq!(compute_new_cap(None, Some(4), None, 10), 4);
        assert_eq!(compute_new_cap(Some(2), Some(6), None, 10), 4);
    }

    #[test]
    fn compute_new_cap_three_index() {
        assert_eq!(compute_new_cap(Some(2), Some(6), Some(8), 10), 6);
    }

    #[test]
    fn buffer_len_through_slice_chain() {
        let mut f = Function::new("f");
        let arr = f.push(0, Instr::Alloc { ty: Type::Array { elem: Box::new(int_ty()), len: 12 }, zero_init: true }, Type::Array { elem: Box::new(int_ty()), len: 12 });
        let sl = f.push(0, Instr::Slice { base: arr, low: None, high: None, max: None }, Type::Slice(Box::new(int_ty())));
        let sl2 = f.push(0, Instr::Slice { base: sl, low: None, high: None, max: None }, Type::Slice(Box::new(int_ty())));
        assert_eq!(buffer_len(&f, sl2), 12);
    }

    #[test]
    fn buffer_len_unknown_is_negative_one() {
        let mut f = Function::new("f");
        let p = f.push(0, Instr::Param(0), Type::Slice(Box::new(int_ty())));
        assert_eq!(buffer_len(&f, p), -1);
    }

    #[test]
    fn full_slice_zero_to_len() {
        let mut f = Function::new("f");
        let arr = f.push(0, Instr::Alloc { ty: Type::Array { elem: Box::new(int_ty()), len: 12 }, zero_init: true }, Type::Array { elem: Box::new(int_ty()), len: 12 });
        let len_call = f.push(0, Instr::Call { callee: Callee::Direct("len".into()), args: vec![arr] }, int_ty());
        let sl = f.push(0, Instr::Slice { base: arr, low: None, high: Some(len_call), max: None }, Type::Slice(Box::new(int_ty())));
        assert!(is_full_slice(&f, sl, 12));
    }

    #[test]
    fn sub_slice_containment() {
        let mut f = Function::new("f");
        let arr = f.push(0, Instr::Alloc { ty: Type::Array { elem: Box::new(int_ty()), len: 20 }, zero_init: true }, Type::Array { elem: Box::new(int_ty()), len: 20 });
        let lo2 = f.push(0, Instr::Const(Const::Int(2)), int_ty());
        let hi6 = f.push(0, Instr::Const(Const::Int(6)), int_ty());
        let lo0 = f.push(0, Instr::Const(Const::Int(0)), int_ty());
        let hi10 = f.push(0, Instr::Const(Const::Int(10)), int_ty());
        let inner = f.push(0, Instr::Slice { base: arr, low: Some(lo2), high: Some(hi6), max: None }, Type::Slice(Box::new(int_ty())));
        let outer = f.push(0, Instr::Slice { base: arr, low: Some(lo0), high: Some(hi10), max: None }, Type::Slice(Box::new(int_ty())));
        assert!(is_sub_slice(&f, inner, outer));
        assert!(!is_sub_slice(&f, outer, inner));
    }

    #[test]
    fn caller_map_indexes_direct_calls() {
        let mut f = Function::new("main");
        f.push(0, Instr::Call { callee: Callee::Direct("helper".into()), args: vec![] }, Type::Other);
        let map = build_caller_map(&[f]);
        assert_eq!(map.get("helper").map(|v| v.len()), Some(1));
    }

    #[test]
    fn traverse_visits_every_instruction() {
        let mut f = Function::new("f");
        f.push(0, Instr::Const(Const::Int(1)), int_ty());
        f.push(0, Instr::Const(Const::Int(2)), int_ty());
        let mut count = 0;
        traverse_ssa(std::slice::from_ref(&f), |_, _, _, _| count += 1);
        assert_eq!(count, 2);
    }
}
