//! Integer conversion overflow.
//!
//! Flags a `Convert` whose destination integer type can't be proven to
//! hold every value the source's resolved range admits. A widening
//! conversion that preserves signedness (or goes unsigned→signed with
//! strictly more bits) can never lose information and is never flagged
//! regardless of range precision; anything narrower is only safe when the
//! range analyzer can prove the source value already fits.

use crate::issue::{Confidence, Finding, Severity};
use crate::range::RangeAnalyzer;
use crate::ssa::program::Instr;
use crate::ssa::types::{int_type_info, IntTypeInfo};
use crate::ssa::{Function, Program};

use super::Rule;

pub const RULE_ID: &str = "G115";
const CWE_INTEGER_OVERFLOW: u32 = 190;

pub struct IntegerOverflowRule;

impl Rule for IntegerOverflowRule {
    fn id(&self) -> &'static str {
        RULE_ID
    }

    fn describe(&self) -> &'static str {
        "integer overflow conversion between integer types"
    }

    fn run(&self, _program: &Program, f: &Function) -> Vec<Finding> {
        let analyzer = RangeAnalyzer::new(f);
        let mut findings = Vec::new();
        for data in &f.values {
            let Instr::Convert { a } = &data.kind else { continue };
            let Ok(dest) = int_type_info(&data.ty) else { continue };
            let Ok(src_ty) = int_type_info(&f.value(*a).ty) else { continue };
            if src_ty.bits == dest.bits && src_ty.signed == dest.signed {
                continue; // no-op conversion
            }
            if is_safe_widening(&src_ty, &dest) {
                continue;
            }
            let range = analyzer.resolve_range(*a, data.block);
            if range.min_set && range.max_set && dest.contains(range.min) && dest.contains(range.max) {
                continue;
            }
            if !range.explicit_positives.is_empty()
                && range.explicit_positives.iter().all(|&v| dest.contains(v))
                && !range.min_set
                && !range.max_set
            {
                continue;
            }
            findings.push(Finding::new(
                RULE_ID,
                format!(
                    "potential integer overflow converting {}-bit {} value to {}-bit {}",
                    src_ty.bits,
                    if src_ty.signed { "signed" } else { "unsigned" },
                    dest.bits,
                    if dest.signed { "signed" } else { "unsigned" },
                ),
                Severity::High,
                Confidence::Medium,
                CWE_INTEGER_OVERFLOW,
                data.pos.as_ref(),
                None,
            ));
        }
        findings
    }
}

fn is_safe_widening(src: &IntTypeInfo, dest: &IntTypeInfo) -> bool {
    if dest.bits < src.bits {
        return false;
    }
    if dest.signed == src.signed {
        return true;
    }
    // unsigned -> signed is safe only when the destination has strictly
    // more bits, so the source's full unsigned range still fits.
    !src.signed && dest.signed && dest.bits > src.bits
}
