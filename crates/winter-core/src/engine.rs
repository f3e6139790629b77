//! Validation engine.
//!
//! Owns the configuration, the provider registry and the expression cache, and
//! hands out constraints wired to them.

use std::sync::Arc;

use tracing::info;
use winter_lang::ExpressionCache;

use crate::config::ValidationConfig;
use crate::enum_constraint::EnumConstraint;
use crate::error::ConfigurationError;
use crate::expression_constraint::ExpressionConstraint;
use crate::provider::{DictDataProvider, ProviderRegistry};
use crate::resolver::DynamicValueResolver;
use crate::spec::{EnumConstraintSpec, ExpressionConstraintSpec, ExpressionTarget};

#[derive(Debug, Clone)]
pub struct ValidationEngine {
    config: Arc<ValidationConfig>,
    registry: Arc<ProviderRegistry>,
    resolver: Arc<DynamicValueResolver>,
    cache: Arc<ExpressionCache>,
}

impl ValidationEngine {
    pub fn new(config: ValidationConfig) -> Self {
        Self::with_cache(config, Arc::new(ExpressionCache::new()))
    }

    /// Engine sharing an existing expression cache.
    pub fn with_cache(config: ValidationConfig, cache: Arc<ExpressionCache>) -> Self {
        let registry = Arc::new(ProviderRegistry::new());
        let resolver = DynamicValueResolver::new(Arc::clone(&registry))
            .with_policy(config.selection_policy)
            .with_failure_mode(config.provider_failure);

        info!(
            enabled = config.enabled,
            expression_enabled = config.expression_enabled,
            dynamic_enum_enabled = config.dynamic_enum_enabled,
            policy = ?config.selection_policy,
            provider_failure = ?config.provider_failure,
            "validation engine configured"
        );

        Self {
            config: Arc::new(config),
            registry,
            resolver: Arc::new(resolver),
            cache,
        }
    }

    /// Register a provider with priority 0.
    pub fn with_provider(self, provider: Arc<dyn DictDataProvider>) -> Self {
        self.registry.register(provider);
        self
    }

    pub fn with_provider_priority(self, provider: Arc<dyn DictDataProvider>, priority: i32) -> Self {
        self.registry.register_with_priority(provider, priority);
        self
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &DynamicValueResolver {
        &self.resolver
    }

    pub fn cache(&self) -> &ExpressionCache {
        &self.cache
    }

    /// Build an enum constraint; rejects specs with neither a dictionary type
    /// nor fixed values.
    pub fn enum_constraint(&self, spec: EnumConstraintSpec) -> Result<EnumConstraint, ConfigurationError> {
        spec.validate()?;
        Ok(EnumConstraint::new(
            spec,
            Arc::clone(&self.resolver),
            Arc::clone(&self.config),
        ))
    }

    /// Compile `source` through this engine's cache.
    pub fn expression(&self, source: &str) -> Result<ExpressionConstraintSpec, ConfigurationError> {
        ExpressionConstraintSpec::compile_with(&self.cache, source)
    }

    pub fn expression_constraint(&self, spec: ExpressionConstraintSpec) -> ExpressionConstraint {
        ExpressionConstraint::new(spec, Arc::clone(&self.config))
    }

    /// Field-level constraint from source and optional description.
    pub fn field_expression(
        &self,
        source: &str,
        description: Option<&str>,
    ) -> Result<ExpressionConstraint, ConfigurationError> {
        self.described(source, description, ExpressionTarget::Field)
    }

    /// Object-level constraint from source and optional description.
    pub fn object_expression(
        &self,
        source: &str,
        description: Option<&str>,
    ) -> Result<ExpressionConstraint, ConfigurationError> {
        self.described(source, description, ExpressionTarget::Object)
    }

    fn described(
        &self,
        source: &str,
        description: Option<&str>,
        target: ExpressionTarget,
    ) -> Result<ExpressionConstraint, ConfigurationError> {
        let mut spec = self.expression(source)?.with_target(target);
        if let Some(description) = description {
            spec = spec.with_description(description);
        }
        Ok(self.expression_constraint(spec))
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}
