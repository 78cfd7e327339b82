//! C7: rule registry, filtering, scheduling and deduplication.
//!
//! The registry is a flat table of [`RuleSpec`]s; [`generate`] turns that
//! table plus a [`RuleFilter`] into the concrete rule list a run will
//! execute (§4.6). [`Orchestrator::analyze`] is the scheduler: it walks
//! every function in the program, runs the enabled rules in registry
//! order, catches any panic a rule raises so it never escapes as "no
//! findings from that rule, that function" rather than a crashed pass,
//! and deduplicates the accumulated findings by `(rule_id, file, line,
//! column)` with first-observed-wins.

pub mod pool;

use std::panic::{self, AssertUnwindSafe};

use regex::Regex;

use crate::issue::{Finding, Severity};
use crate::ssa::{Function, Program};

use crate::rules::{
    callback_misuse::CallbackMisuseRule,
    context_propagation::ContextPropagationRule,
    hardcoded_nonce::HardcodedNonceRule,
    overflow::IntegerOverflowRule,
    request_smuggling::RequestSmugglingRule,
    slice_bounds::SliceBoundsRule,
    taint_rules::{
        command_injection_rule, log_injection_rule, path_traversal_rule, sql_injection_rule,
        ssrf_rule, xss_rule,
    },
    Rule,
};

use pool::StatePool;

/// One entry in the rule registry: everything the orchestrator needs to
/// know about a rule without instantiating it.
pub struct RuleSpec {
    pub id: &'static str,
    pub description: &'static str,
    pub severity: Severity,
    pub cwe: u32,
    pub default_enabled: bool,
    build: fn() -> Box<dyn Rule>,
}

/// An include/exclude filter over rule IDs, applied by [`generate`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RuleFilter {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Default for RuleFilter {
    /// Empty exclude-filter ⇒ include all (§4.6).
    fn default() -> Self {
        RuleFilter::Exclude(Vec::new())
    }
}

impl RuleFilter {
    fn admits(&self, rule_id: &str, default_enabled: bool) -> bool {
        match self {
            RuleFilter::Include(list) => list.iter().any(|id| id == rule_id),
            RuleFilter::Exclude(list) => {
                let _ = default_enabled;
                !list.iter().any(|id| id == rule_id)
            }
        }
    }
}

/// One row of the rule list [`generate`] produces.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RuleListEntry {
    pub rule_id: &'static str,
    pub description: &'static str,
    pub severity: Severity,
    pub cwe: u32,
    pub enabled: bool,
    pub suppressed: bool,
}

/// A path-based post-filter: findings from `rule_ids` (`"*"` for all rules)
/// whose normalized forward-slash file path matches `path_regex` are
/// dropped after rules have run (§6).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PathExclusion {
    pub path_regex: String,
    pub rule_ids: Vec<String>,
}

/// Driver-supplied configuration for a single [`Orchestrator::analyze`] run.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct OrchestratorConfig {
    pub filter: Option<RuleFilter>,
    pub track_suppressions: bool,
    pub path_exclusions: Vec<PathExclusion>,
}

/// Produce the rule list a run with this `filter` and `track_suppressions`
/// setting would execute. When `filter` is `None`, each rule's own
/// `default_enabled` flag decides inclusion. Rules excluded by an explicit
/// filter are dropped from the list entirely unless `track_suppressions`
/// is set, in which case they remain present with `enabled: false,
/// suppressed: true`.
///
/// Pure function of `(registry, filter, track_suppressions)`: calling it
/// twice with the same inputs yields the same list (rule-filter
/// idempotence, §8).
pub fn generate(
    registry: &[RuleSpec],
    filter: Option<&RuleFilter>,
    track_suppressions: bool,
) -> Vec<RuleListEntry> {
    registry
        .iter()
        .filter_map(|spec| {
            let included = match filter {
                None => spec.default_enabled,
                Some(f) => f.admits(spec.id, spec.default_enabled),
            };
            if !included && !track_suppressions {
                return None;
            }
            Some(RuleListEntry {
                rule_id: spec.id,
                description: spec.description,
                severity: spec.severity,
                cwe: spec.cwe,
                enabled: included,
                suppressed: !included,
            })
        })
        .collect()
}

/// The full, stable set of rules this crate ships (§4.6's "known IDs").
pub fn default_registry() -> Vec<RuleSpec> {
    vec![
        RuleSpec {
            id: crate::rules::overflow::RULE_ID,
            description: "integer overflow conversion between integer types",
            severity: Severity::High,
            cwe: 190,
            default_enabled: true,
            build: || Box::new(IntegerOverflowRule),
        },
        RuleSpec {
            id: crate::rules::slice_bounds::RULE_ID,
            description: "slice or index operation not provably within bounds",
            severity: Severity::High,
            cwe: 125,
            default_enabled: true,
            build: || Box::new(SliceBoundsRule),
        },
        RuleSpec {
            id: crate::rules::hardcoded_nonce::RULE_ID,
            description: "cryptographic nonce reused or hardcoded",
            severity: Severity::Critical,
            cwe: 329,
            default_enabled: true,
            build: || Box::new(HardcodedNonceRule::default()),
        },
        RuleSpec {
            id: crate::rules::context_propagation::RULE_ID,
            description: "background context used where a cancellable one is required",
            severity: Severity::Low,
            cwe: 664,
            default_enabled: true,
            build: || Box::new(ContextPropagationRule::default()),
        },
        RuleSpec {
            id: crate::rules::request_smuggling::RULE_ID,
            description: "conflicting Transfer-Encoding and Content-Length headers",
            severity: Severity::High,
            cwe: 444,
            default_enabled: true,
            build: || Box::new(RequestSmugglingRule),
        },
        RuleSpec {
            id: crate::rules::callback_misuse::RULE_ID,
            description: "verification callback with a captured-state side effect",
            severity: Severity::Medium,
            cwe: 295,
            default_enabled: true,
            build: || Box::new(CallbackMisuseRule::default()),
        },
        RuleSpec {
            id: "G201",
            description: "SQL query built from untrusted input",
            severity: Severity::High,
            cwe: 89,
            default_enabled: true,
            build: || Box::new(sql_injection_rule()),
        },
        RuleSpec {
            id: "G204",
            description: "OS command built from untrusted input",
            severity: Severity::High,
            cwe: 78,
            default_enabled: true,
            build: || Box::new(command_injection_rule()),
        },
        RuleSpec {
            id: "G304",
            description: "file path built from untrusted input",
            severity: Severity::Medium,
            cwe: 22,
            default_enabled: true,
            build: || Box::new(path_traversal_rule()),
        },
        RuleSpec {
            id: "G107",
            description: "outbound request URL built from untrusted input",
            severity: Severity::High,
            cwe: 918,
            default_enabled: true,
            build: || Box::new(ssrf_rule()),
        },
        RuleSpec {
            id: "G203",
            description: "response body written from untrusted input without escaping",
            severity: Severity::Medium,
            cwe: 79,
            default_enabled: true,
            build: || Box::new(xss_rule()),
        },
        RuleSpec {
            id: "G501",
            description: "log entry built from untrusted input without neutralizing line breaks",
            severity: Severity::Low,
            cwe: 117,
            default_enabled: false, // opt-in: noisy without a project-specific logger allowlist
            build: || Box::new(log_injection_rule()),
        },
    ]
}

/// Runs the registry's rules over a program and collects deduplicated
/// findings.
pub struct Orchestrator {
    registry: Vec<RuleSpec>,
    pool: StatePool,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Orchestrator { registry: default_registry(), pool: StatePool::new() }
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule_list(&self, config: &OrchestratorConfig) -> Vec<RuleListEntry> {
        generate(&self.registry, config.filter.as_ref(), config.track_suppressions)
    }

    /// Runs every enabled rule over every function in `program`, in
    /// registry order, and returns the deduplicated findings.
    ///
    /// `program` is taken mutably only so the "SSA pass first" structural
    /// prerequisite — referrer lists and dominator trees — can be
    /// (re)computed before any rule runs; rules themselves only read it.
    pub fn analyze(&self, program: &mut Program, config: &OrchestratorConfig) -> Vec<Finding> {
        for f in program.functions.iter_mut() {
            f.build_referrers();
            f.compute_dominators();
        }

        let entries = self.rule_list(config);
        let active: Vec<&RuleSpec> = self
            .registry
            .iter()
            .filter(|spec| entries.iter().any(|e| e.rule_id == spec.id && e.enabled))
            .collect();

        let mut state = self.pool.acquire();
        let mut findings = Vec::new();
        let program_ref: &Program = program;
        for f in &program_ref.functions {
            for spec in &active {
                let span = tracing::info_span!("rule", function = %f.name, rule = spec.id);
                let _enter = span.enter();
                let rule = (spec.build)();
                let hits = run_rule_catching_panics(rule.as_ref(), program_ref, f);
                for finding in hits {
                    let key = (finding.rule_id.clone(), finding.file.clone(), finding.line, finding.column);
                    if state.seen.insert(key) {
                        findings.push(finding);
                    }
                }
            }
        }

        let compiled = compile_path_exclusions(&config.path_exclusions);
        findings.retain(|f| !is_path_excluded(f, &compiled));
        findings
    }
}

/// `(regex, rule_ids)` pairs with unparseable patterns dropped rather than
/// failing the whole run — a path exclusion is a best-effort post-filter,
/// not a driver-contract input.
fn compile_path_exclusions(exclusions: &[PathExclusion]) -> Vec<(Regex, Vec<String>)> {
    exclusions
        .iter()
        .filter_map(|ex| Regex::new(&ex.path_regex).ok().map(|re| (re, ex.rule_ids.clone())))
        .collect()
}

fn is_path_excluded(finding: &Finding, compiled: &[(Regex, Vec<String>)]) -> bool {
    let normalized = finding.file.replace('\\', "/");
    compiled.iter().any(|(re, rule_ids)| {
        rule_ids.iter().any(|r| r == "*" || r == &finding.rule_id) && re.is_match(&normalized)
    })
}

fn run_rule_catching_panics(rule: &dyn Rule, program: &Program, f: &Function) -> Vec<Finding> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| rule.run(program, f)));
    match result {
        Ok(findings) => findings,
        Err(_) => {
            tracing::warn!(rule = rule.id(), function = %f.name, "rule panicked, treating as no findings");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: &'static str, default_enabled: bool) -> RuleSpec {
        RuleSpec {
            id,
            description: "test rule",
            severity: Severity::Low,
            cwe: 0,
            default_enabled,
            build: || Box::new(crate::rules::overflow::IntegerOverflowRule),
        }
    }

    #[test]
    fn empty_exclude_filter_includes_all() {
        let registry = vec![spec("G1", false), spec("G2", true)];
        let filter = RuleFilter::Exclude(vec![]);
        let list = generate(&registry, Some(&filter), false);
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|e| e.enabled));
    }

    #[test]
    fn empty_include_filter_includes_none() {
        let registry = vec![spec("G1", true), spec("G2", true)];
        let filter = RuleFilter::Include(vec![]);
        let list = generate(&registry, Some(&filter), false);
        assert!(list.is_empty());
    }

    #[test]
    fn empty_include_filter_with_suppression_tracking_keeps_entries_flagged() {
        let registry = vec![spec("G1", true)];
        let filter = RuleFilter::Include(vec![]);
        let list = generate(&registry, Some(&filter), true);
        assert_eq!(list.len(), 1);
        assert!(!list[0].enabled);
        assert!(list[0].suppressed);
    }

    #[test]
    fn no_filter_uses_default_enabled() {
        let registry = vec![spec("G1", true), spec("G2", false)];
        let list = generate(&registry, None, false);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].rule_id, "G1");
    }

    #[test]
    fn filter_application_is_idempotent() {
        let registry = vec![spec("G1", true), spec("G2", true)];
        let filter = RuleFilter::Exclude(vec!["G2".into()]);
        let once = generate(&registry, Some(&filter), false);
        let twice = generate(&registry, Some(&filter), false);
        assert_eq!(once, twice);
    }

    #[test]
    fn default_registry_has_unique_ids() {
        let registry = default_registry();
        let mut ids: Vec<&str> = registry.iter().map(|s| s.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), registry.len());
    }

    #[test]
    fn path_exclusion_drops_matching_finding_by_rule_and_pattern() {
        let finding = crate::issue::Finding::new(
            "G115",
            "desc",
            Severity::High,
            crate::issue::Confidence::Medium,
            190,
            Some(&crate::ssa::program::Position { file: "vendor/generated.go".into(), line: 1, column: 1 }),
            None,
        );
        let exclusions = vec![PathExclusion { path_regex: "^vendor/".into(), rule_ids: vec!["G115".into()] }];
        let compiled = compile_path_exclusions(&exclusions);
        assert!(is_path_excluded(&finding, &compiled));

        let exclusions_other_rule =
            vec![PathExclusion { path_regex: "^vendor/".into(), rule_ids: vec!["G201".into()] }];
        let compiled_other = compile_path_exclusions(&exclusions_other_rule);
        assert!(!is_path_excluded(&finding, &compiled_other));
    }
}
