//! C8: the finding record every rule emits.

use std::fmt;

use crate::ssa::program::Position;

/// Lines of source shown around a finding's position.
const SNIPPET_OFFSET: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::Low => "LOW",
            Confidence::Medium => "MEDIUM",
            Confidence::High => "HIGH",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Finding {
    pub rule_id: String,
    pub description: String,
    #[serde(with = "severity_serde")]
    pub severity: Severity,
    #[serde(with = "confidence_serde")]
    pub confidence: Confidence,
    pub cwe: u32,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub code_snippet: String,
}

impl Finding {
    /// Build a finding, reading the snippet out of `source` when a
    /// position is available. Missing file content or missing position
    /// (§7, `FilePositionMissing`) still produces a finding — just with
    /// an empty snippet, rather than dropping it.
    pub fn new(
        rule_id: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
        confidence: Confidence,
        cwe: u32,
        pos: Option<&Position>,
        source: Option<&str>,
    ) -> Self {
        let (file, line, column) = match pos {
            Some(p) => (p.file.clone(), p.line, p.column),
            None => (String::new(), 0, 0),
        };
        let code_snippet = match (pos, source) {
            (Some(p), Some(src)) => snippet_around(src, p.line),
            _ => String::new(),
        };
        Finding {
            rule_id: rule_id.into(),
            description: description.into(),
            severity,
            confidence,
            cwe,
            file,
            line,
            column,
            code_snippet,
        }
    }
}

fn snippet_around(source: &str, line: u32) -> String {
    if line == 0 {
        return String::new();
    }
    let lines: Vec<&str> = source.lines().collect();
    let center = (line - 1) as usize;
    if center >= lines.len() {
        return String::new();
    }
    let start = center.saturating_sub(SNIPPET_OFFSET as usize);
    let end = (center + SNIPPET_OFFSET as usize + 1).min(lines.len());
    lines[start..end].join("\n")
}

mod severity_serde {
    use super::Severity;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(s: &Severity, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&s.to_string())
    }
}

mod confidence_serde {
    use super::Confidence;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(c: &Confidence, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&c.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_reads_window_around_line() {
        let source = "one\ntwo\nthree\nfour\nfive\nsix\nseven";
        let s = snippet_around(source, 4);
        assert_eq!(s, "two\nthree\nfour\nfive\nsix");
    }

    #[test]
    fn missing_position_yields_empty_snippet() {
        let f = Finding::new("G100", "desc", Severity::Low, Confidence::Low, 0, None, Some("a\nb"));
        assert_eq!(f.code_snippet, "");
        assert_eq!(f.line, 0);
    }

    #[test]
    fn missing_source_yields_empty_snippet_but_keeps_position() {
        let pos = Position { file: "f.go".into(), line: 3, column: 1 };
        let f = Finding::new("G100", "desc", Severity::Low, Confidence::Low, 0, Some(&pos), None);
        assert_eq!(f.code_snippet, "");
        assert_eq!(f.line, 3);
    }
}
