//! C4: byte-range coverage tracking for buffer overwrite analysis.
//!
//! Used by the hardcoded-nonce rule to prove that every byte of a
//! statically-initialized buffer gets overwritten with non-constant data
//! before it's used, by replaying the writes touching it in execution
//! order and checking whether a single safe interval ends up covering the
//! span actually used.

use crate::ssa::{Function, ValueId};
use crate::values::slice_range;

/// A half-open byte span `[low, high)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub low: i128,
    pub high: i128,
}

impl ByteRange {
    pub fn new(low: i128, high: i128) -> Self {
        ByteRange { low, high }
    }

    pub fn overlaps(&self, other: &ByteRange) -> bool {
        self.low < other.high && other.low < self.high
    }

    pub fn adjacent_or_overlaps(&self, other: &ByteRange) -> bool {
        self.low <= other.high && other.low <= self.high
    }

    pub fn contains(&self, other: &ByteRange) -> bool {
        self.low <= other.low && other.high <= self.high
    }

    fn union(&self, other: &ByteRange) -> ByteRange {
        ByteRange::new(self.low.min(other.low), self.high.max(other.high))
    }
}

/// One write (or the root allocation) touching a tracked buffer, ordered
/// by where it happens in the function.
#[derive(Debug, Clone)]
pub struct RangeAction {
    pub instruction: ValueId,
    pub byte_range: ByteRange,
    /// Whether this action overwrites its span with non-constant
    /// (attacker- or runtime-derived) content. The allocation itself is
    /// always pinned unsafe: a freshly allocated buffer starts out
    /// holding whatever its zero-value/literal was.
    pub is_safe: bool,
}

/// Resolve the byte span a slice/index value touches, using constant
/// bounds where available. `None` when the span can't be pinned down
/// (symbolic indices on both ends, or an unresolvable buffer length).
pub fn resolve_byte_range(f: &Function, v: ValueId) -> Option<ByteRange> {
    let (low, high, _) = slice_range(f, v).ok()?;
    if low < 0 || high < 0 {
        return None;
    }
    Some(ByteRange::new(low, high))
}

/// Does some disjoint safe interval, after replaying `actions` in
/// execution order, fully cover `target`?
///
/// Actions are stable-sorted into execution order (the caller is expected
/// to have already used [`crate::range::precedes`] to establish a partial
/// order; ties and incomparable pairs keep their input order). A safe
/// write merges into the running set of safe intervals, coalescing
/// adjacent/overlapping spans; an unsafe write (including the pinned
/// root allocation) splits any existing safe interval it overlaps,
/// narrowing or removing it. Two actions with contradictory spans over
/// the same instruction widen rather than panic.
pub fn all_tainted_events_covered(target: ByteRange, actions: &[RangeAction]) -> bool {
    let mut ordered = actions.to_vec();
    ordered.sort_by(|a, b| a.instruction.cmp(&b.instruction));
    let mut safe: Vec<ByteRange> = Vec::new();
    for action in &ordered {
        if action.is_safe {
            merge_safe(&mut safe, action.byte_range);
        } else {
            split_unsafe(&mut safe, action.byte_range);
        }
    }
    safe.iter().any(|r| r.contains(&target))
}

fn merge_safe(safe: &mut Vec<ByteRange>, incoming: ByteRange) {
    let mut merged = incoming;
    safe.retain(|r| {
        if r.adjacent_or_overlaps(&merged) {
            merged = merged.union(r);
            false
        } else {
            true
        }
    });
    safe.push(merged);
}

fn split_unsafe(safe: &mut Vec<ByteRange>, clobbered: ByteRange) {
    let mut next = Vec::with_capacity(safe.len());
    for r in safe.drain(..) {
        if !r.overlaps(&clobbered) {
            next.push(r);
            continue;
        }
        if r.low < clobbered.low {
            next.push(ByteRange::new(r.low, clobbered.low));
        }
        if clobbered.high < r.high {
            next.push(ByteRange::new(clobbered.high, r.high));
        }
    }
    *safe = next;
}

/// Build the pinned root-allocation action: the buffer starts out unsafe
/// across its full (known) length.
pub fn root_allocation_action(alloc: ValueId, buffer_len: i128) -> Option<RangeAction> {
    if buffer_len < 0 {
        return None;
    }
    Some(RangeAction { instruction: alloc, byte_range: ByteRange::new(0, buffer_len), is_safe: false })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fully_overwritten_buffer_is_covered() {
        let target = ByteRange::new(0, 12);
        let actions = vec![
            RangeAction { instruction: 0, byte_range: ByteRange::new(0, 12), is_safe: false },
            RangeAction { instruction: 1, byte_range: ByteRange::new(0, 6), is_safe: true },
            RangeAction { instruction: 2, byte_range: ByteRange::new(6, 12), is_safe: true },
        ];
        assert!(all_tainted_events_covered(target, &actions));
    }

    #[test]
    fn partially_overwritten_buffer_is_not_covered() {
        let target = ByteRange::new(0, 12);
        let actions = vec![
            RangeAction { instruction: 0, byte_range: ByteRange::new(0, 12), is_safe: false },
            RangeAction { instruction: 1, byte_range: ByteRange::new(0, 6), is_safe: true },
        ];
        assert!(!all_tainted_events_covered(target, &actions));
    }

    #[test]
    fn later_unsafe_write_reopens_hole() {
        let target = ByteRange::new(0, 12);
        let actions = vec![
            RangeAction { instruction: 0, byte_range: ByteRange::new(0, 12), is_safe: false },
            RangeAction { instruction: 1, byte_range: ByteRange::new(0, 12), is_safe: true },
            RangeAction { instruction: 2, byte_range: ByteRange::new(4, 5), is_safe: false },
        ];
        assert!(!all_tainted_events_covered(target, &actions));
    }

    #[test]
    fn unknown_buffer_length_has_no_root_action() {
        assert!(root_allocation_action(0, -1).is_none());
    }
}
