//! Allowed-value resolution.
//!
//! The allowed set for an enum spec is its fixed values followed by whatever
//! the selected provider returns for the spec's dictionary type. Order is
//! first-seen and case is kept as given; case folding happens at match time.
//! Each resolution makes at most one provider call.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use tracing::{debug, instrument, warn};

use crate::config::{ProviderFailureMode, SelectionPolicy};
use crate::error::ProviderError;
use crate::provider::{DictDataProvider, ProviderRegistry};
use crate::spec::EnumConstraintSpec;

/// Ordered, de-duplicated set of allowed values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedValues {
    values: IndexSet<String>,
}

impl AllowedValues {
    pub fn new<V, I>(values: I) -> Self
    where
        V: Into<String>,
        I: IntoIterator<Item = V>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Membership, optionally ignoring case.
    pub fn contains(&self, candidate: &str, ignore_case: bool) -> bool {
        if !ignore_case {
            return self.values.contains(candidate);
        }
        let folded = candidate.to_lowercase();
        self.values.iter().any(|v| v.to_lowercase() == folded)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_set(&self) -> &IndexSet<String> {
        &self.values
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.values.iter().cloned().collect()
    }

    fn extend(&mut self, values: impl IntoIterator<Item = String>) {
        self.values.extend(values);
    }
}

impl fmt::Display for AllowedValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::outcome::format_list(self.iter()))
    }
}

/// Merges fixed values with values from the registered providers.
#[derive(Debug)]
pub struct DynamicValueResolver {
    registry: Arc<ProviderRegistry>,
    policy: SelectionPolicy,
    failure_mode: ProviderFailureMode,
}

impl DynamicValueResolver {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            policy: SelectionPolicy::default(),
            failure_mode: ProviderFailureMode::default(),
        }
    }

    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_failure_mode(mut self, mode: ProviderFailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Resolve the allowed set for `spec`.
    ///
    /// In [`ProviderFailureMode::Degrade`] this never fails: a provider error is
    /// logged and the fixed values are returned. In
    /// [`ProviderFailureMode::Fail`] the provider error is returned.
    #[instrument(level = "debug", skip(self, spec), fields(dict_type = %spec.dict_type()))]
    pub fn resolve(&self, spec: &EnumConstraintSpec) -> Result<AllowedValues, ProviderError> {
        let provider = if spec.has_dict_type() {
            self.registry.select(spec.dict_type(), self.policy)
        } else {
            None
        };
        let result = resolve_with(spec, provider.as_deref());

        match (result, self.failure_mode) {
            (Ok(allowed), _) => Ok(allowed),
            (Err(error), ProviderFailureMode::Fail) => Err(error),
            (Err(error), ProviderFailureMode::Degrade) => {
                warn!(
                    dict_type = spec.dict_type(),
                    error = %error,
                    "dynamic provider failed, using fixed values only"
                );
                Ok(AllowedValues::new(spec.fixed_values().iter().cloned()))
            }
        }
    }
}

/// Resolve against an already selected provider.
///
/// Returns the provider's error unchanged; callers decide whether to degrade.
pub fn resolve_with(
    spec: &EnumConstraintSpec,
    provider: Option<&dyn DictDataProvider>,
) -> Result<AllowedValues, ProviderError> {
    let mut allowed = AllowedValues::new(spec.fixed_values().iter().cloned());

    let Some(provider) = provider else {
        debug!(dict_type = spec.dict_type(), "no provider, fixed values only");
        return Ok(allowed);
    };

    let dynamic = provider.get_dict_values(spec.dict_type(), spec.is_reverse())?;
    debug!(
        dict_type = spec.dict_type(),
        provider = provider.name(),
        count = dynamic.len(),
        "dynamic values loaded"
    );
    allowed.extend(dynamic);
    Ok(allowed)
}
