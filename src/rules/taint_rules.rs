//! The six source-sink-sanitizer rule families built directly on C5: SQL
//! injection, OS command injection, path traversal, server-side request
//! forgery, reflected XSS and log injection. Each is just a [`TaintConfig`]
//! plus metadata — all the propagation logic lives in
//! [`crate::taint::engine`].

use crate::issue::{Confidence, Finding, Severity};
use crate::ssa::{Function, Program};
use crate::taint::{TaintConfig, TaintEngine};

use super::Rule;

pub struct TaintFamilyRule {
    pub rule_id: &'static str,
    pub description: &'static str,
    pub severity: Severity,
    pub cwe: u32,
    pub config: TaintConfig,
}

impl Rule for TaintFamilyRule {
    fn id(&self) -> &'static str {
        self.rule_id
    }

    fn describe(&self) -> &'static str {
        self.description
    }

    fn run(&self, program: &Program, f: &Function) -> Vec<Finding> {
        let engine = TaintEngine::new(program, self.config.clone());
        engine
            .find_sink_hits(f)
            .into_iter()
            .map(|hit| {
                Finding::new(
                    self.rule_id,
                    format!("tainted value reaches {} (argument {:?})", hit.qualified_name, hit.tainted_args),
                    self.severity,
                    Confidence::Medium,
                    self.cwe,
                    f.value(hit.call).pos.as_ref(),
                    None,
                )
            })
            .collect()
    }
}

fn sources(functions: &[&str], types: &[&str]) -> (Vec<crate::taint::FunctionSource>, Vec<crate::taint::TypeSource>) {
    (
        functions.iter().map(|n| crate::taint::FunctionSource { qualified_name: (*n).into() }).collect(),
        types.iter().map(|n| crate::taint::TypeSource { type_name: (*n).into() }).collect(),
    )
}

fn sinks(entries: &[(&str, Option<&[usize]>)]) -> Vec<crate::taint::Sink> {
    entries
        .iter()
        .map(|(n, idxs)| crate::taint::Sink {
            qualified_name: (*n).into(),
            check_args: idxs.map(|v| v.to_vec()),
        })
        .collect()
}

fn sanitizers(names: &[&str]) -> Vec<crate::taint::Sanitizer> {
    names.iter().map(|n| crate::taint::Sanitizer { qualified_name: (*n).into() }).collect()
}

pub fn sql_injection_rule() -> TaintFamilyRule {
    let (function_sources, type_sources) =
        sources(&["net/http.Request.FormValue", "net/http.Request.URL.Query"], &["net/http.Request"]);
    TaintFamilyRule {
        rule_id: "G201",
        description: "SQL query built from untrusted input",
        severity: Severity::High,
        cwe: 89,
        config: TaintConfig {
            type_sources,
            function_sources,
            sinks: sinks(&[("database/sql.DB.Query", None), ("database/sql.DB.Exec", None)]),
            sanitizers: sanitizers(&["database/sql.DB.Prepare"]),
        },
    }
}

pub fn command_injection_rule() -> TaintFamilyRule {
    let (function_sources, type_sources) = sources(&["net/http.Request.FormValue"], &["net/http.Request"]);
    TaintFamilyRule {
        rule_id: "G204",
        description: "OS command built from untrusted input",
        severity: Severity::High,
        cwe: 78,
        config: TaintConfig {
            type_sources,
            function_sources,
            sinks: sinks(&[("os/exec.Command", None), ("os/exec.CommandContext", Some(&[1]))]),
            sanitizers: vec![],
        },
    }
}

pub fn path_traversal_rule() -> TaintFamilyRule {
    let (function_sources, type_sources) = sources(&["net/http.Request.FormValue"], &["net/http.Request"]);
    TaintFamilyRule {
        rule_id: "G304",
        description: "file path built from untrusted input",
        severity: Severity::Medium,
        cwe: 22,
        config: TaintConfig {
            type_sources,
            function_sources,
            sinks: sinks(&[("os.Open", None), ("os.ReadFile", None), ("os.Create", None)]),
            sanitizers: sanitizers(&["path/filepath.Clean", "path/filepath.Base"]),
        },
    }
}

pub fn ssrf_rule() -> TaintFamilyRule {
    let (function_sources, type_sources) = sources(&["net/http.Request.FormValue"], &["net/http.Request"]);
    TaintFamilyRule {
        rule_id: "G107",
        description: "outbound request URL built from untrusted input",
        severity: Severity::High,
        cwe: 918,
        config: TaintConfig {
            type_sources,
            function_sources,
            sinks: sinks(&[("net/http.Get", None), ("net/http.Client.Do", None)]),
            sanitizers: vec![],
        },
    }
}

pub fn xss_rule() -> TaintFamilyRule {
    let (function_sources, type_sources) = sources(&["net/http.Request.FormValue"], &["net/http.Request"]);
    TaintFamilyRule {
        rule_id: "G203",
        description: "response body written from untrusted input without escaping",
        severity: Severity::Medium,
        cwe: 79,
        config: TaintConfig {
            type_sources,
            function_sources,
            sinks: sinks(&[("net/http.ResponseWriter.Write", None), ("fmt.Fprintf", Some(&[1]))]),
            sanitizers: sanitizers(&["html/template.HTMLEscapeString"]),
        },
    }
}

pub fn log_injection_rule() -> TaintFamilyRule {
    let (function_sources, type_sources) = sources(&["net/http.Request.FormValue"], &["net/http.Request"]);
    TaintFamilyRule {
        rule_id: "G501",
        description: "log entry built from untrusted input without neutralizing line breaks",
        severity: Severity::Low,
        cwe: 117,
        config: TaintConfig {
            type_sources,
            function_sources,
            sinks: sinks(&[("log.Printf", None), ("log.Println", None)]),
            sanitizers: sanitizers(&["strings.ReplaceAll"]),
        },
    }
}
