//! Error types for parsing, compilation and evaluation.

use crate::span::{offset_to_line_col, Span};
use thiserror::Error;

/// Error during lexing/parsing.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseError {
    /// The error message.
    pub message: String,
    /// Source span where the error occurred.
    pub span: Span,
    /// Optional hint for fixing the error.
    pub hint: Option<String>,
}

impl ParseError {
    /// Create a new parse error.
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            hint: None,
        }
    }

    /// Add a hint to the error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Format the error with source context.
    pub fn format_with_source(&self, source: &str) -> String {
        let mut result = format!("error: {}\n", self.message);
        render_location(&mut result, source, self.span);
        if let Some(hint) = &self.hint {
            result.push_str(&format!("   = hint: {}\n", hint));
        }
        result
    }
}

/// Error while lowering a parsed expression.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CompileError {
    /// The error message.
    pub message: String,
    /// Source span where the error occurred.
    pub span: Span,
    /// Error kind for programmatic handling.
    pub kind: CompileErrorKind,
}

/// Kinds of compilation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    /// Call to a function that does not exist.
    UnknownFunction,
    /// Function called with the wrong number of arguments.
    WrongArity,
    /// `matches` pattern is not a valid regular expression.
    InvalidPattern,
}

impl CompileError {
    /// Create a new compile error.
    pub fn new(message: impl Into<String>, span: Span, kind: CompileErrorKind) -> Self {
        Self {
            message: message.into(),
            span,
            kind,
        }
    }

    pub fn unknown_function(name: &str, span: Span) -> Self {
        Self::new(
            format!("unknown function '{}'", name),
            span,
            CompileErrorKind::UnknownFunction,
        )
    }

    pub fn wrong_arity(name: &str, expected: usize, got: usize, span: Span) -> Self {
        Self::new(
            format!(
                "function '{}' takes {} argument(s), got {}",
                name, expected, got
            ),
            span,
            CompileErrorKind::WrongArity,
        )
    }

    pub fn invalid_pattern(pattern: &str, reason: impl std::fmt::Display, span: Span) -> Self {
        Self::new(
            format!("invalid pattern '{}': {}", pattern, reason),
            span,
            CompileErrorKind::InvalidPattern,
        )
    }

    /// Format the error with source context.
    pub fn format_with_source(&self, source: &str) -> String {
        let mut result = format!("error[{:?}]: {}\n", self.kind, self.message);
        render_location(&mut result, source, self.span);
        result
    }
}

/// Append `--> line:col`, the source line and a caret/underline for `span`.
fn render_location(out: &mut String, source: &str, span: Span) {
    let (line, col) = offset_to_line_col(source, span.start);
    out.push_str(&format!("  --> line {}:{}\n", line, col));

    let Some(source_line) = source.lines().nth(line - 1) else {
        return;
    };
    out.push_str(&format!("   |\n{:3}| {}\n   |", line, source_line));
    for _ in 0..col {
        out.push(' ');
    }
    out.push('^');

    let remaining = source_line.len().saturating_sub(col - 1);
    for _ in 1..span.len().min(remaining) {
        out.push('~');
    }
    out.push('\n');
}

/// Combined error for `compile`: the expression is malformed.
#[derive(Debug, Clone, Error)]
pub enum LangError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
}

impl LangError {
    /// Format the error with source context.
    pub fn format_with_source(&self, source: &str) -> String {
        match self {
            LangError::Parse(e) => e.format_with_source(source),
            LangError::Compile(e) => e.format_with_source(source),
        }
    }

    /// Get the span of the error.
    pub fn span(&self) -> Span {
        match self {
            LangError::Parse(e) => e.span,
            LangError::Compile(e) => e.span,
        }
    }
}

/// Runtime failure while evaluating a compiled expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    /// Referenced field does not exist on the bound object.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// `#name` refers to a variable that was not bound.
    #[error("unknown variable '#{0}'")]
    UnknownVariable(String),

    /// Expression needs the root object but none was published.
    #[error("no root object is bound")]
    MissingRoot,

    /// Member access on something that is not an object.
    #[error("cannot read field '{field}' of {type_name}")]
    NotAnObject { field: String, type_name: &'static str },

    /// Member access or indexing on null without `?.`.
    #[error("cannot read '{0}' of null")]
    NullReference(String),

    /// Operand types do not fit the operator.
    #[error("type mismatch: cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    /// An operand or argument had the wrong type.
    #[error("expected {expected} for {context}, found {found}")]
    UnexpectedType {
        expected: &'static str,
        found: &'static str,
        context: String,
    },

    /// List index outside of the list.
    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in '{0}'")]
    Overflow(&'static str),

    /// Expression evaluated to null instead of a boolean.
    #[error("expression evaluated to null")]
    NullResult,

    /// Expression evaluated to a non-boolean value.
    #[error("expression evaluated to {0}, expected bool")]
    NotBoolean(&'static str),
}
