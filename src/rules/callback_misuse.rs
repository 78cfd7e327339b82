//! Public-key verification callback misuse: a field like
//! `HostKeyCallback`/`VerifyConnection` assigned a closure that mutates a
//! captured variable or a value reachable from outside the closure,
//! rather than purely returning a verification verdict — a common way an
//! "always trust" bypass hides a side effect that makes it look used.

use crate::issue::{Confidence, Finding, Severity};
use crate::ssa::program::Instr;
use crate::ssa::{Function, Program};

use super::Rule;

pub const RULE_ID: &str = "G402C";
const CWE_IMPROPER_VERIFICATION: u32 = 295;

pub struct CallbackConfig {
    pub sensitive_fields: Vec<String>,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        CallbackConfig {
            sensitive_fields: vec!["HostKeyCallback".into(), "VerifyConnection".into(), "InsecureSkipVerify".into()],
        }
    }
}

pub struct CallbackMisuseRule {
    pub config: CallbackConfig,
}

impl Default for CallbackMisuseRule {
    fn default() -> Self {
        CallbackMisuseRule { config: CallbackConfig::default() }
    }
}

impl Rule for CallbackMisuseRule {
    fn id(&self) -> &'static str {
        RULE_ID
    }

    fn describe(&self) -> &'static str {
        "verification callback field assigned a closure with a captured-state side effect"
    }

    fn run(&self, program: &Program, f: &Function) -> Vec<Finding> {
        let mut findings = Vec::new();
        for data in &f.values {
            let Instr::Store { addr, value } = &data.kind else { continue };
            let Instr::FieldAddr { field, .. } = &f.value(*addr).kind else { continue };
            if !self.config.sensitive_fields.iter().any(|s| s == field) {
                continue;
            }
            let Instr::MakeClosure { func, captures } = &f.value(*value).kind else { continue };
            if captures.is_empty() {
                continue;
            }
            let Some(closure_fn) = program.function_by_name(func) else { continue };
            if closure_mutates_capture(closure_fn) {
                findings.push(Finding::new(
                    RULE_ID,
                    format!("{field} callback mutates a captured variable"),
                    Severity::Medium,
                    Confidence::Low,
                    CWE_IMPROPER_VERIFICATION,
                    data.pos.as_ref(),
                    None,
                ));
            }
        }
        findings
    }
}

/// Does the closure body store through one of its own free variables
/// (its captures), rather than only reading them?
fn closure_mutates_capture(closure_fn: &Function) -> bool {
    closure_fn.values.iter().any(|v| {
        matches!(&v.kind, Instr::Store { addr, .. } if closure_fn.free_vars.contains(addr))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::types::Type;

    #[test]
    fn pure_callback_is_clean() {
        let mut closure = Function::new("verify");
        closure.free_vars.push(0);
        closure.values.push(crate::ssa::ValueData {
            block: 0,
            kind: Instr::Const(crate::ssa::program::Const::Bool(true)),
            ty: Type::Bool,
            referrers: vec![],
            pos: None,
        });
        closure.push(0, Instr::Return { values: vec![0] }, Type::Other);

        let mut f = Function::new("configure");
        let cfg = f.push(0, Instr::Param(0), Type::Other);
        let field = f.push(0, Instr::FieldAddr { base: cfg, field: "HostKeyCallback".into() }, Type::Other);
        let freevar = f.push(0, Instr::Param(1), Type::Other);
        let cb = f.push(0, Instr::MakeClosure { func: "verify".into(), captures: vec![freevar] }, Type::Other);
        f.push(0, Instr::Store { addr: field, value: cb }, Type::Other);

        let mut program = Program::new();
        program.add_function(closure);
        assert!(CallbackMisuseRule::default().run(&program, &f).is_empty());
    }

    #[test]
    fn mutating_callback_flags() {
        let mut closure = Function::new("verify");
        closure.free_vars.push(0);
        let v = closure.push(0, Instr::Const(crate::ssa::program::Const::Bool(true)), Type::Bool);
        closure.push(0, Instr::Store { addr: 0, value: v }, Type::Other);

        let mut f = Function::new("configure");
        let cfg = f.push(0, Instr::Param(0), Type::Other);
        let field = f.push(0, Instr::FieldAddr { base: cfg, field: "HostKeyCallback".into() }, Type::Other);
        let freevar = f.push(0, Instr::Param(1), Type::Other);
        let cb = f.push(0, Instr::MakeClosure { func: "verify".into(), captures: vec![freevar] }, Type::Other);
        f.push(0, Instr::Store { addr: field, value: cb }, Type::Other);

        let mut program = Program::new();
        program.add_function(closure);
        assert_eq!(CallbackMisuseRule::default().run(&program, &f).len(), 1);
    }
}
