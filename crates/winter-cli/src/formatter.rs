//! Output formatting for validation reports.

use clap::ValueEnum;
use serde_json::json;
use winter_core::FieldViolation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One violation per line
    Text,
    /// JSON report
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

pub fn format_report(violations: &[FieldViolation], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_text(violations),
        OutputFormat::Json => format_json(violations),
    }
}

fn format_text(violations: &[FieldViolation]) -> String {
    if violations.is_empty() {
        return "valid".to_string();
    }
    let mut out = format!("{} violation(s)", violations.len());
    for violation in violations {
        let path = if violation.path.is_empty() {
            "<object>"
        } else {
            violation.path.as_str()
        };
        out.push_str(&format!("\n  {}: {}", path, violation.violation.message));
    }
    out
}

fn format_json(violations: &[FieldViolation]) -> String {
    let entries: Vec<_> = violations
        .iter()
        .map(|v| {
            json!({
                "path": v.path,
                "kind": v.violation.kind.code(),
                "message": v.violation.message,
            })
        })
        .collect();
    let report = json!({
        "valid": violations.is_empty(),
        "violations": entries,
    });
    serde_json::to_string_pretty(&report).unwrap_or_else(|_| report.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use winter_core::{Violation, ViolationKind};

    fn sample() -> Vec<FieldViolation> {
        vec![
            FieldViolation {
                path: String::new(),
                violation: Violation::new(
                    ViolationKind::PredicateFailed {
                        expression: "start < end".to_string(),
                    },
                    "start must precede end",
                ),
            },
            FieldViolation {
                path: "status".to_string(),
                violation: Violation::new(ViolationKind::NullNotAllowed, "null is not allowed"),
            },
        ]
    }

    #[test]
    fn test_text() {
        assert_eq!(format_report(&[], OutputFormat::Text), "valid");
        assert_eq!(
            format_report(&sample(), OutputFormat::Text),
            "2 violation(s)\n  <object>: start must precede end\n  status: null is not allowed"
        );
    }

    #[test]
    fn test_json() {
        let report: serde_json::Value =
            serde_json::from_str(&format_report(&sample(), OutputFormat::Json)).unwrap();
        assert_eq!(report["valid"], false);
        assert_eq!(report["violations"][1]["kind"], "null_not_allowed");
        assert_eq!(report["violations"][0]["path"], "");
    }
}
