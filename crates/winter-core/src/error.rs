//! Core error types.
//!
//! Only [`ConfigurationError`] ever leaves this crate as a failure. Provider and
//! evaluation problems are absorbed into a failed or degraded check, and an
//! unmet constraint is an ordinary [`Violation`](crate::Violation).

use std::path::PathBuf;

use thiserror::Error;
use winter_lang::LangError;

/// A constraint or configuration could not be built.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Expression source does not compile.
    #[error("invalid expression '{source_text}': {error}")]
    InvalidExpression {
        source_text: String,
        #[source]
        error: LangError,
    },

    /// Declaration is structurally wrong (empty dict type, unknown field, ...).
    #[error("invalid declaration: {0}")]
    InvalidDeclaration(String),

    /// Config or declaration file could not be read.
    #[error("cannot read {path}: {error}")]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Config or declaration file is not valid JSON for its schema.
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigurationError {
    /// Render an expression error with a caret under the offending span.
    pub fn detailed(&self) -> String {
        match self {
            ConfigurationError::InvalidExpression { source_text, error } => {
                error.format_with_source(source_text)
            }
            other => other.to_string(),
        }
    }
}

/// A dynamic value provider failed to produce values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Backing source could not be reached.
    #[error("provider '{provider}' unavailable for '{dict_type}': {reason}")]
    Unavailable {
        provider: String,
        dict_type: String,
        reason: String,
    },

    /// Provider claims support but has nothing for this type.
    #[error("provider '{provider}' has no dictionary '{dict_type}'")]
    UnknownDictionary { provider: String, dict_type: String },

    #[error("provider failure: {0}")]
    Other(String),
}

impl ProviderError {
    pub fn unavailable(
        provider: impl Into<String>,
        dict_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ProviderError::Unavailable {
            provider: provider.into(),
            dict_type: dict_type.into(),
            reason: reason.into(),
        }
    }
}
