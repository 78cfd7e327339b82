//! Request smuggling via conflicting `Transfer-Encoding` and
//! `Content-Length` headers set on the same writer.

use rustc_hash::FxHashMap;

use crate::issue::{Confidence, Finding, Severity};
use crate::ssa::program::{Callee, Const, Instr};
use crate::ssa::{Function, Program, ValueId};

use super::Rule;

pub const RULE_ID: &str = "G411";
const CWE_REQUEST_SMUGGLING: u32 = 444;

const HEADER_SET_METHOD: &str = "Set";
const TRANSFER_ENCODING: &str = "Transfer-Encoding";
const CONTENT_LENGTH: &str = "Content-Length";

pub struct RequestSmugglingRule;

impl Rule for RequestSmugglingRule {
    fn id(&self) -> &'static str {
        RULE_ID
    }

    fn describe(&self) -> &'static str {
        "Transfer-Encoding and Content-Length set on the same response writer"
    }

    fn run(&self, _program: &Program, f: &Function) -> Vec<Finding> {
        let mut by_receiver: FxHashMap<ValueId, Vec<(&str, ValueId)>> = FxHashMap::default();
        for (vid, data) in f.values.iter().enumerate() {
            let vid = vid as ValueId;
            let Instr::Call { callee: Callee::Interface { receiver, method }, args } = &data.kind
            else {
                continue;
            };
            if method != HEADER_SET_METHOD {
                continue;
            }
            let Some(&name_arg) = args.first() else { continue };
            let Instr::Const(Const::Str(name)) = &f.value(name_arg).kind else { continue };
            if name == TRANSFER_ENCODING || name == CONTENT_LENGTH {
                by_receiver.entry(*receiver).or_default().push((name.as_str(), vid));
            }
        }

        let mut findings = Vec::new();
        for sets in by_receiver.values() {
            let has_te = sets.iter().any(|(n, _)| *n == TRANSFER_ENCODING);
            let has_cl = sets.iter().any(|(n, _)| *n == CONTENT_LENGTH);
            if has_te && has_cl {
                let last = sets.iter().map(|(_, v)| *v).max().unwrap();
                findings.push(Finding::new(
                    RULE_ID,
                    "both Transfer-Encoding and Content-Length set on the same writer",
                    Severity::High,
                    Confidence::High,
                    CWE_REQUEST_SMUGGLING,
                    f.value(last).pos.as_ref(),
                    None,
                ));
            }
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::types::Type;

    #[test]
    fn conflicting_headers_on_same_writer_flag() {
        let mut f = Function::new("f");
        let w = f.push(0, Instr::Param(0), Type::Other);
        let te = f.push(0, Instr::Const(Const::Str(TRANSFER_ENCODING.into())), Type::String);
        let chunked = f.push(0, Instr::Const(Const::Str("chunked".into())), Type::String);
        f.push(
            0,
            Instr::Call {
                callee: Callee::Interface { receiver: w, method: "Set".into() },
                args: vec![te, chunked],
            },
            Type::Other,
        );
        let cl = f.push(0, Instr::Const(Const::Str(CONTENT_LENGTH.into())), Type::String);
        let len = f.push(0, Instr::Const(Const::Str("10".into())), Type::String);
        f.push(
            0,
            Instr::Call {
                callee: Callee::Interface { receiver: w, method: "Set".into() },
                args: vec![cl, len],
            },
            Type::Other,
        );
        let program = Program::new();
        assert_eq!(RequestSmugglingRule.run(&program, &f).len(), 1);
    }

    #[test]
    fn single_header_is_clean() {
        let mut f = Function::new("f");
        let w = f.push(0, Instr::Param(0), Type::Other);
        let cl = f.push(0, Instr::Const(Const::Str(CONTENT_LENGTH.into())), Type::String);
        let len = f.push(0, Instr::Const(Const::Str("10".into())), Type::String);
        f.push(
            0,
            Instr::Call {
                callee: Callee::Interface { receiver: w, method: "Set".into() },
                args: vec![cl, len],
            },
            Type::Other,
        );
        let program = Program::new();
        assert!(RequestSmugglingRule.run(&program, &f).is_empty());
    }
}
