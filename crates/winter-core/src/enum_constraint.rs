//! Enum membership constraint.

use std::sync::Arc;

use tracing::debug;
use winter_lang::Value;

use crate::config::ValidationConfig;
use crate::outcome::{format_list, render_template, CheckOutcome, Violation, ViolationKind};
use crate::resolver::{AllowedValues, DynamicValueResolver};
use crate::spec::EnumConstraintSpec;

/// Checks that a value belongs to the resolved allowed set of a spec.
///
/// The allowed set is resolved on every check so that changes in a dynamic
/// source are visible without rebuilding the constraint.
#[derive(Debug, Clone)]
pub struct EnumConstraint {
    spec: Arc<EnumConstraintSpec>,
    resolver: Arc<DynamicValueResolver>,
    config: Arc<ValidationConfig>,
}

impl EnumConstraint {
    pub fn new(
        spec: EnumConstraintSpec,
        resolver: Arc<DynamicValueResolver>,
        config: Arc<ValidationConfig>,
    ) -> Self {
        Self {
            spec: Arc::new(spec),
            resolver,
            config,
        }
    }

    pub fn spec(&self) -> &EnumConstraintSpec {
        &self.spec
    }

    /// Allowed values as the resolver currently sees them.
    pub fn allowed_values(&self) -> AllowedValues {
        self.resolver
            .resolve(&self.spec)
            .unwrap_or_else(|_| AllowedValues::new(self.spec.fixed_values().iter().cloned()))
    }

    pub fn check(&self, value: &Value) -> CheckOutcome {
        if !self.config.enum_checks_active() {
            return CheckOutcome::Passed;
        }

        let outcome = if value.is_null() {
            check_resolved(value, &self.spec, &AllowedValues::default())
        } else {
            match self.resolver.resolve(&self.spec) {
                Ok(allowed) => check_resolved(value, &self.spec, &allowed),
                Err(error) => {
                    let message = format!(
                        "allowed values for '{}' are unavailable: {}",
                        self.spec.dict_type(),
                        error
                    );
                    Violation::new(ViolationKind::ProviderUnavailable(error), message).into()
                }
            }
        };

        if self.config.verbose {
            debug!(
                dict_type = self.spec.dict_type(),
                value = %value,
                passed = outcome.passed(),
                "enum check"
            );
        }
        outcome
    }
}

/// Membership test against an already resolved allowed set.
pub fn check_resolved(
    value: &Value,
    spec: &EnumConstraintSpec,
    allowed: &AllowedValues,
) -> CheckOutcome {
    if value.is_null() {
        if spec.allows_null() {
            return CheckOutcome::Passed;
        }
        let message = match spec.message() {
            Some(template) => render_template(template, &[("value", "null"), ("allowed", "[]")]),
            None => "null is not allowed".to_string(),
        };
        return Violation::new(ViolationKind::NullNotAllowed, message).into();
    }

    let text = value.to_string();
    if allowed.contains(&text, spec.is_ignore_case()) {
        return CheckOutcome::Passed;
    }

    let listed = format_list(allowed.iter());
    let message = match spec.message() {
        Some(template) => render_template(template, &[("value", &text), ("allowed", &listed)]),
        None => format!("value '{text}' is not allowed; allowed values: {listed}"),
    };
    Violation::new(
        ViolationKind::NotAllowed {
            value: text,
            allowed: allowed.to_vec(),
        },
        message,
    )
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderFailureMode;
    use crate::error::ProviderError;
    use crate::provider::{DictDataProvider, ProviderRegistry, StaticDictProvider};
    use pretty_assertions::assert_eq;

    struct Offline;

    impl DictDataProvider for Offline {
        fn supports(&self, _: &str) -> bool {
            true
        }

        fn get_dict_values(&self, dict_type: &str, _: bool) -> Result<Vec<String>, ProviderError> {
            Err(ProviderError::unavailable("offline", dict_type, "connection refused"))
        }
    }

    fn constraint(
        spec: EnumConstraintSpec,
        provider: Arc<dyn DictDataProvider>,
        config: ValidationConfig,
    ) -> EnumConstraint {
        let registry = Arc::new(ProviderRegistry::new());
        registry.register(provider);
        let resolver = DynamicValueResolver::new(registry).with_failure_mode(config.provider_failure);
        EnumConstraint::new(spec, Arc::new(resolver), Arc::new(config))
    }

    fn statuses() -> Arc<dyn DictDataProvider> {
        Arc::new(StaticDictProvider::new().with_values("status", ["INACTIVE"]))
    }

    #[test]
    fn test_null_follows_allow_null() {
        let allowed = AllowedValues::new(["A"]);
        let permissive = EnumConstraintSpec::fixed(["A"]).allow_null(true);
        let strict = EnumConstraintSpec::fixed(["A"]);

        assert!(check_resolved(&Value::Null, &permissive, &allowed).passed());
        let outcome = check_resolved(&Value::Null, &strict, &allowed);
        assert_eq!(outcome.message(), "null is not allowed");
    }

    #[test]
    fn test_case_sensitivity() {
        let allowed = AllowedValues::new(["A"]);
        let value = Value::from("a");

        assert!(check_resolved(&value, &EnumConstraintSpec::fixed(["A"]).ignore_case(true), &allowed).passed());
        assert!(!check_resolved(&value, &EnumConstraintSpec::fixed(["A"]), &allowed).passed());
    }

    #[test]
    fn test_violation_lists_value_and_allowed_set() {
        let c = constraint(
            EnumConstraintSpec::new("status").with_values(["ACTIVE"]),
            statuses(),
            ValidationConfig::default(),
        );
        let outcome = c.check(&Value::from("pending"));

        assert_eq!(
            outcome.message(),
            "value 'pending' is not allowed; allowed values: [ACTIVE, INACTIVE]"
        );
        assert_eq!(
            outcome.violation().map(|v| v.kind.clone()),
            Some(ViolationKind::NotAllowed {
                value: "pending".to_string(),
                allowed: vec!["ACTIVE".to_string(), "INACTIVE".to_string()],
            })
        );
    }

    #[test]
    fn test_non_string_values_are_stringified() {
        let c = constraint(
            EnumConstraintSpec::fixed(["1", "2"]),
            statuses(),
            ValidationConfig::default(),
        );
        assert!(c.check(&Value::Int(2)).passed());
        assert!(!c.check(&Value::Int(3)).passed());
    }

    #[test]
    fn test_message_template() {
        let c = constraint(
            EnumConstraintSpec::fixed(["A", "B"]).with_message("{value} must be one of {allowed}"),
            statuses(),
            ValidationConfig::default(),
        );
        assert_eq!(c.check(&Value::from("C")).message(), "C must be one of [A, B]");
    }

    #[test]
    fn test_message_template_keeps_placeholder_like_input() {
        let c = constraint(
            EnumConstraintSpec::fixed(["A", "B"]).with_message("rejected {value}; allowed {allowed}"),
            statuses(),
            ValidationConfig::default(),
        );
        assert_eq!(
            c.check(&Value::from("{allowed}")).message(),
            "rejected {allowed}; allowed [A, B]"
        );
    }

    #[test]
    fn test_empty_allowed_set_rejects_everything_but_null() {
        let c = constraint(
            EnumConstraintSpec::new("unknown").allow_null(true),
            statuses(),
            ValidationConfig::default(),
        );
        assert!(c.check(&Value::Null).passed());
        assert!(!c.check(&Value::from("anything")).passed());
    }

    #[test]
    fn test_provider_failure_degrades() {
        let c = constraint(
            EnumConstraintSpec::new("status").with_values(["ACTIVE"]),
            Arc::new(Offline),
            ValidationConfig::default(),
        );
        assert!(c.check(&Value::from("ACTIVE")).passed());
        assert!(!c.check(&Value::from("INACTIVE")).passed());
    }

    #[test]
    fn test_provider_failure_in_fail_mode() {
        let c = constraint(
            EnumConstraintSpec::new("status").with_values(["ACTIVE"]),
            Arc::new(Offline),
            ValidationConfig::default().with_provider_failure(ProviderFailureMode::Fail),
        );
        let outcome = c.check(&Value::from("ACTIVE"));
        assert!(matches!(
            outcome.violation().map(|v| &v.kind),
            Some(ViolationKind::ProviderUnavailable(_))
        ));
        assert!(outcome.message().starts_with("allowed values for 'status' are unavailable"));
    }

    #[test]
    fn test_disabled_checks_pass() {
        let c = constraint(
            EnumConstraintSpec::fixed(["A"]),
            statuses(),
            ValidationConfig::default().with_dynamic_enum_enabled(false),
        );
        assert!(c.check(&Value::from("Z")).passed());
        assert!(c.check(&Value::Null).passed());
    }
}
