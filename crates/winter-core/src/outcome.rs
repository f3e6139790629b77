//! Check outcomes.
//!
//! An unmet constraint is data, not an error: every check returns a
//! [`CheckOutcome`], and a failure carries a [`Violation`] with a message fit
//! for the end user.

use std::fmt;

use winter_lang::EvaluationError;

use crate::error::ProviderError;

/// Why a check failed.
#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    /// Value is not in the allowed set.
    NotAllowed { value: String, allowed: Vec<String> },
    /// Null where the enum spec forbids it.
    NullNotAllowed,
    /// Provider failed and the engine is configured to fail on that.
    ProviderUnavailable(ProviderError),
    /// Expression evaluated to false.
    PredicateFailed { expression: String },
    /// Expression could not be evaluated; counted as a failure.
    EvaluationFailed {
        expression: String,
        error: EvaluationError,
    },
}

impl ViolationKind {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ViolationKind::NotAllowed { .. } => "not_allowed",
            ViolationKind::NullNotAllowed => "null_not_allowed",
            ViolationKind::ProviderUnavailable(_) => "provider_unavailable",
            ViolationKind::PredicateFailed { .. } => "predicate_failed",
            ViolationKind::EvaluationFailed { .. } => "evaluation_failed",
        }
    }
}

/// A failed check.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub message: String,
}

impl Violation {
    pub fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result of a single constraint check.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Passed,
    Failed(Violation),
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, CheckOutcome::Passed)
    }

    /// Failure message, or an empty string when the check passed.
    pub fn message(&self) -> &str {
        match self {
            CheckOutcome::Passed => "",
            CheckOutcome::Failed(violation) => &violation.message,
        }
    }

    pub fn violation(&self) -> Option<&Violation> {
        match self {
            CheckOutcome::Passed => None,
            CheckOutcome::Failed(violation) => Some(violation),
        }
    }

    pub fn into_violation(self) -> Option<Violation> {
        match self {
            CheckOutcome::Passed => None,
            CheckOutcome::Failed(violation) => Some(violation),
        }
    }
}

impl From<Violation> for CheckOutcome {
    fn from(violation: Violation) -> Self {
        CheckOutcome::Failed(violation)
    }
}

/// Substitute `{name}` placeholders in one left-to-right pass.
///
/// Substituted text is never scanned again, so a value that itself looks like
/// a placeholder is kept verbatim. Unknown placeholders are left as written.
pub(crate) fn render_template(template: &str, args: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let substituted = after.find('}').and_then(|close| {
            let name = &after[..close];
            args.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match substituted {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// `[A, B, C]`
pub(crate) fn format_list<'a>(items: impl IntoIterator<Item = &'a str>) -> String {
    let items: Vec<&str> = items.into_iter().collect();
    format!("[{}]", items.join(", "))
}
