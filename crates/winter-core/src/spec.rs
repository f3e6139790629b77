//! Constraint specifications.
//!
//! A spec is built once from a declaration and then shared read-only by every
//! check made against that declaration.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use winter_lang::{CompiledExpression, ExpressionCache, Value};

use crate::error::ConfigurationError;

/// Membership constraint against fixed values and a dynamic dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumConstraintSpec {
    dict_type: String,
    fixed_values: IndexSet<String>,
    allow_null: bool,
    ignore_case: bool,
    reverse: bool,
    message: Option<String>,
}

impl EnumConstraintSpec {
    /// A spec backed by the dictionary `dict_type`. An empty type means fixed
    /// values only.
    pub fn new(dict_type: impl Into<String>) -> Self {
        Self {
            dict_type: dict_type.into(),
            ..Default::default()
        }
    }

    /// A spec with fixed values only.
    pub fn fixed<V, I>(values: I) -> Self
    where
        V: Into<String>,
        I: IntoIterator<Item = V>,
    {
        Self::default().with_values(values)
    }

    /// Append fixed values, keeping first-seen order.
    pub fn with_values<V, I>(mut self, values: I) -> Self
    where
        V: Into<String>,
        I: IntoIterator<Item = V>,
    {
        self.fixed_values.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn allow_null(mut self, allow: bool) -> Self {
        self.allow_null = allow;
        self
    }

    pub fn ignore_case(mut self, ignore: bool) -> Self {
        self.ignore_case = ignore;
        self
    }

    /// Ask the provider for its keys instead of its values.
    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Failure message template; `{value}` and `{allowed}` are substituted.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn dict_type(&self) -> &str {
        &self.dict_type
    }

    pub fn has_dict_type(&self) -> bool {
        !self.dict_type.trim().is_empty()
    }

    pub fn fixed_values(&self) -> &IndexSet<String> {
        &self.fixed_values
    }

    pub fn allows_null(&self) -> bool {
        self.allow_null
    }

    pub fn is_ignore_case(&self) -> bool {
        self.ignore_case
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Reject declarations that can never be satisfied by anything but null.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.has_dict_type() && self.fixed_values.is_empty() {
            return Err(ConfigurationError::InvalidDeclaration(
                "enum constraint needs a dictionary type or fixed values".to_string(),
            ));
        }
        Ok(())
    }
}

/// What an expression constraint is attached to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExpressionTarget {
    /// A single field. `root` is the object published by the context propagator.
    #[default]
    Field,
    /// A whole object. The object is both the value under test and the root.
    Object,
}

/// A compiled boolean expression with its reporting metadata.
#[derive(Debug, Clone)]
pub struct ExpressionConstraintSpec {
    compiled: Arc<CompiledExpression>,
    description: Option<String>,
    message: Option<String>,
    target: ExpressionTarget,
    variables: IndexMap<String, Value>,
}

impl ExpressionConstraintSpec {
    /// Compile `source` through the process-wide cache.
    pub fn compile(source: &str) -> Result<Self, ConfigurationError> {
        Self::compile_with(ExpressionCache::global(), source)
    }

    /// Compile `source` through `cache`.
    pub fn compile_with(cache: &ExpressionCache, source: &str) -> Result<Self, ConfigurationError> {
        let compiled = cache
            .get_or_compile(source)
            .map_err(|error| ConfigurationError::InvalidExpression {
                source_text: source.to_string(),
                error,
            })?;
        Ok(Self::from_compiled(compiled))
    }

    pub fn from_compiled(compiled: Arc<CompiledExpression>) -> Self {
        Self {
            compiled,
            description: None,
            message: None,
            target: ExpressionTarget::default(),
            variables: IndexMap::new(),
        }
    }

    /// Human-readable description, used as the failure message.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Failure message template; `{value}` and `{expression}` are substituted.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_target(mut self, target: ExpressionTarget) -> Self {
        self.target = target;
        self
    }

    /// Bind a constant readable as `#name`.
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn source(&self) -> &str {
        self.compiled.source()
    }

    pub fn compiled(&self) -> &CompiledExpression {
        &self.compiled
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn target(&self) -> ExpressionTarget {
        self.target
    }

    pub fn variables(&self) -> &IndexMap<String, Value> {
        &self.variables
    }
}
