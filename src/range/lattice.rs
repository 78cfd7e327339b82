//! The numeric interval lattice values resolve to.

use rustc_hash::FxHashSet;

/// A range estimate for one SSA value, as seen from one observation point.
///
/// `min`/`max` carry a contiguous interval, valid only when their paired
/// `_set` flag is true (an unset bound means "no lower/upper bound known",
/// i.e. the lattice's top on that side, not zero). `explicit_positives`/
/// `explicit_negatives` carry point facts learned from equality/inequality
/// branches that don't necessarily narrow a contiguous interval (`x == 5`
/// on an otherwise-unbounded `x`; `x != 3` on an otherwise-unbounded `x`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub min: i128,
    pub max: i128,
    pub min_set: bool,
    pub max_set: bool,
    pub explicit_positives: FxHashSet<i128>,
    pub explicit_negatives: FxHashSet<i128>,
    /// Set when the value being ranged is itself the boolean result of a
    /// comparison (`a < b`), so callers know `[0,1]` isn't a numeric fact
    /// about the comparison's operands.
    pub is_range_check: bool,
    /// Set when this `Range` doesn't depend on the block it was resolved
    /// from (no dominator-guarded refinement applied), so a caller may
    /// reuse it across observation points keyed on the value alone.
    pub shared: bool,
}

impl Default for Range {
    fn default() -> Self {
        Range::top()
    }
}

impl Range {
    /// No information: unbounded on both sides.
    pub fn top() -> Self {
        Range {
            min: 0,
            max: 0,
            min_set: false,
            max_set: false,
            explicit_positives: FxHashSet::default(),
            explicit_negatives: FxHashSet::default(),
            is_range_check: false,
            shared: true,
        }
    }

    pub fn exact(v: i128) -> Self {
        Range { min: v, max: v, min_set: true, max_set: true, ..Range::top() }
    }

    pub fn bounded(min: i128, max: i128) -> Self {
        Range { min, max, min_set: true, max_set: true, ..Range::top() }
    }

    pub fn at_least(min: i128) -> Self {
        Range { min, min_set: true, ..Range::top() }
    }

    pub fn at_most(max: i128) -> Self {
        Range { max, max_set: true, ..Range::top() }
    }

    pub fn boolean() -> Self {
        Range { is_range_check: true, ..Range::bounded(0, 1) }
    }

    /// True when every value this range admits is `>= 0`, either via the
    /// interval or via a known-positive set of explicit equalities.
    pub fn is_non_negative(&self) -> bool {
        if self.min_set && self.min >= 0 {
            return true;
        }
        if !self.explicit_positives.is_empty()
            && self.explicit_negatives.is_empty()
            && !self.min_set
            && self.explicit_positives.iter().all(|&v| v >= 0)
        {
            return true;
        }
        false
    }

    /// Lattice meet: the tightest range consistent with both facts.
    pub fn intersect(&self, other: &Range) -> Range {
        let min_set = self.min_set || other.min_set;
        let max_set = self.max_set || other.max_set;
        let min = match (self.min_set, other.min_set) {
            (true, true) => self.min.max(other.min),
            (true, false) => self.min,
            (false, true) => other.min,
            (false, false) => 0,
        };
        let max = match (self.max_set, other.max_set) {
            (true, true) => self.max.min(other.max),
            (true, false) => self.max,
            (false, true) => other.max,
            (false, false) => 0,
        };
        let mut explicit_positives = self.explicit_positives.clone();
        explicit_positives.extend(other.explicit_positives.iter().copied());
        let mut explicit_negatives = self.explicit_negatives.clone();
        explicit_negatives.extend(other.explicit_negatives.iter().copied());
        Range {
            min,
            max,
            min_set,
            max_set,
            explicit_positives,
            explicit_negatives,
            is_range_check: self.is_range_check || other.is_range_check,
            shared: false,
        }
    }

    /// Lattice join: the loosest range admitting anything either side
    /// admits. Used to union a phi's incoming edges.
    pub fn union(&self, other: &Range) -> Range {
        let min_set = self.min_set && other.min_set;
        let max_set = self.max_set && other.max_set;
        let min = if min_set { self.min.min(other.min) } else { 0 };
        let max = if max_set { self.max.max(other.max) } else { 0 };
        let explicit_positives = self
            .explicit_positives
            .intersection(&other.explicit_positives)
            .copied()
            .collect();
        let explicit_negatives = self
            .explicit_negatives
            .intersection(&other.explicit_negatives)
            .copied()
            .collect();
        Range {
            min,
            max,
            min_set,
            max_set,
            explicit_positives,
            explicit_negatives,
            is_range_check: false,
            shared: false,
        }
    }

    pub fn shl(mut self) -> Self {
        self.shared = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_narrows_bounds() {
        let a = Range::bounded(0, 100);
        let b = Range::at_least(10);
        let r = a.intersect(&b);
        assert_eq!((r.min, r.max), (10, 100));
    }

    #[test]
    fn union_widens_to_cover_both() {
        let a = Range::bounded(0, 5);
        let b = Range::bounded(10, 20);
        let r = a.union(&b);
        assert_eq!((r.min, r.max), (0, 20));
    }

    #[test]
    fn non_negative_from_interval() {
        assert!(Range::at_least(0).is_non_negative());
        assert!(!Range::at_most(-1).is_non_negative());
    }

    #[test]
    fn non_negative_from_explicit_positives_only() {
        let mut r = Range::top();
        r.explicit_positives.insert(4);
        r.explicit_positives.insert(7);
        assert!(r.is_non_negative());
    }
}
