//! Validation configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// What to do when a dynamic provider fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFailureMode {
    /// Log the failure and continue with the fixed values only.
    #[default]
    Degrade,
    /// Report the check as failed with a provider-specific message.
    Fail,
}

/// How much detail an expression failure message carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionMessages {
    /// Description or generic message only.
    #[default]
    Description,
    /// Append the evaluation error text when evaluation failed.
    Detailed,
}

/// Which registered providers are consulted for a dictionary type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// First provider, in candidate order, whose `supports` returns true.
    #[default]
    FirstSupporting,
    /// Only the highest-priority provider is consulted.
    PrimaryOnly,
}

/// Switches and policies for a validation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Master switch. When false every check passes.
    pub enabled: bool,

    /// Expression constraints are evaluated.
    pub expression_enabled: bool,

    /// Enum constraints are evaluated.
    pub dynamic_enum_enabled: bool,

    /// Emit a debug record for every check outcome.
    pub verbose: bool,

    pub provider_failure: ProviderFailureMode,

    pub expression_messages: ExpressionMessages,

    pub selection_policy: SelectionPolicy,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            expression_enabled: true,
            dynamic_enum_enabled: true,
            verbose: false,
            provider_failure: ProviderFailureMode::default(),
            expression_messages: ExpressionMessages::default(),
            selection_policy: SelectionPolicy::default(),
        }
    }
}

impl ValidationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|error| ConfigurationError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        Self::from_json_str(&text)
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_expression_enabled(mut self, enabled: bool) -> Self {
        self.expression_enabled = enabled;
        self
    }

    pub fn with_dynamic_enum_enabled(mut self, enabled: bool) -> Self {
        self.dynamic_enum_enabled = enabled;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_provider_failure(mut self, mode: ProviderFailureMode) -> Self {
        self.provider_failure = mode;
        self
    }

    pub fn with_expression_messages(mut self, messages: ExpressionMessages) -> Self {
        self.expression_messages = messages;
        self
    }

    pub fn with_selection_policy(mut self, policy: SelectionPolicy) -> Self {
        self.selection_policy = policy;
        self
    }

    /// Whether enum checks run at all.
    pub fn enum_checks_active(&self) -> bool {
        self.enabled && self.dynamic_enum_enabled
    }

    /// Whether expression checks run at all.
    pub fn expression_checks_active(&self) -> bool {
        self.enabled && self.expression_enabled
    }
}
