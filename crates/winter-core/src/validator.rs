//! Object validation driver.
//!
//! [`ObjectValidator`] walks one object: object-level expressions, then
//! per-field constraints, then nested validators for object and list fields.
//! Each object is validated inside its own root scope, so field expressions in
//! a nested validator see the nested object as `root`. A root is only published
//! for validators whose field constraints read it.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use winter_lang::Value;

use crate::context::ContextPropagator;
use crate::enum_constraint::EnumConstraint;
use crate::expression_constraint::ExpressionConstraint;
use crate::outcome::{CheckOutcome, Violation};
use crate::spec::ExpressionTarget;

/// A constraint attachable to a field.
#[derive(Debug, Clone)]
pub enum Constraint {
    Enum(EnumConstraint),
    Expression(ExpressionConstraint),
}

impl Constraint {
    pub fn check(&self, value: &Value) -> CheckOutcome {
        match self {
            Constraint::Enum(c) => c.check(value),
            Constraint::Expression(c) => c.check(value),
        }
    }

    /// Whether the check reads the root published by [`ContextPropagator`].
    pub fn reads_root(&self) -> bool {
        matches!(self, Constraint::Expression(c) if c.spec().target() == ExpressionTarget::Field)
    }
}

impl From<EnumConstraint> for Constraint {
    fn from(c: EnumConstraint) -> Self {
        Constraint::Enum(c)
    }
}

impl From<ExpressionConstraint> for Constraint {
    fn from(c: ExpressionConstraint) -> Self {
        Constraint::Expression(c)
    }
}

/// A violation located within the validated object.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldViolation {
    /// Empty for object-level constraints on the top-level object.
    pub path: String,
    pub violation: Violation,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.violation.message)
        } else {
            write!(f, "{}: {}", self.path, self.violation.message)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObjectValidator {
    object_constraints: Vec<ExpressionConstraint>,
    fields: IndexMap<String, Vec<Constraint>>,
    nested: IndexMap<String, ObjectValidator>,
}

impl ObjectValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an expression evaluated against the whole object.
    pub fn with_object_constraint(mut self, constraint: ExpressionConstraint) -> Self {
        self.object_constraints.push(constraint);
        self
    }

    pub fn with_field(mut self, field: impl Into<String>, constraint: impl Into<Constraint>) -> Self {
        self.fields
            .entry(field.into())
            .or_default()
            .push(constraint.into());
        self
    }

    /// Validate an object or list-of-objects field with `validator`.
    pub fn with_nested(mut self, field: impl Into<String>, validator: ObjectValidator) -> Self {
        self.nested.insert(field.into(), validator);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.object_constraints.is_empty() && self.fields.is_empty() && self.nested.is_empty()
    }

    /// Validate `object` and everything nested under it.
    pub fn validate(&self, object: &Value) -> Vec<FieldViolation> {
        let mut violations = Vec::new();
        self.validate_into(object, None, "", &mut violations);
        violations
    }

    /// Like [`validate`](Self::validate), but publishes `object` itself as the
    /// top-level root instead of a copy.
    pub fn validate_shared(&self, object: Arc<Value>) -> Vec<FieldViolation> {
        let mut violations = Vec::new();
        self.validate_into(&object, Some(&object), "", &mut violations);
        violations
    }

    /// Validate a single field of `object`, with `object` published as root.
    pub fn validate_field(&self, object: &Value, field: &str) -> Vec<FieldViolation> {
        let mut violations = Vec::new();
        self.scoped(object, None, || {
            self.check_field(object, field, "", &mut violations);
        });
        if let Some(nested) = self.nested.get(field) {
            nested.validate_child(field_value(object, field), field, &mut violations);
        }
        violations
    }

    pub fn is_valid(&self, object: &Value) -> bool {
        self.validate(object).is_empty()
    }

    /// All violations as `path: message; path: message`.
    pub fn validation_message(&self, object: &Value) -> String {
        join_violations(&self.validate(object))
    }

    fn reads_root(&self) -> bool {
        self.fields.values().flatten().any(Constraint::reads_root)
    }

    /// Run `body` with `object` published as root when a field constraint
    /// reads it. `shared` is published as is; otherwise `object` is copied once.
    fn scoped<R>(&self, object: &Value, shared: Option<&Arc<Value>>, body: impl FnOnce() -> R) -> R {
        if !self.reads_root() {
            return body();
        }
        let root = match shared {
            Some(root) => Arc::clone(root),
            None => Arc::new(object.clone()),
        };
        ContextPropagator::with_root(root, body)
    }

    fn validate_into(
        &self,
        object: &Value,
        shared: Option<&Arc<Value>>,
        prefix: &str,
        out: &mut Vec<FieldViolation>,
    ) {
        self.scoped(object, shared, || {
            for constraint in &self.object_constraints {
                if let Some(violation) = constraint.check(object).into_violation() {
                    out.push(FieldViolation {
                        path: prefix.to_string(),
                        violation,
                    });
                }
            }
            for field in self.fields.keys() {
                self.check_field(object, field, prefix, out);
            }
        });

        for (field, validator) in &self.nested {
            let path = join_path(prefix, field);
            validator.validate_child(field_value(object, field), &path, out);
        }
    }

    fn check_field(&self, object: &Value, field: &str, prefix: &str, out: &mut Vec<FieldViolation>) {
        let Some(constraints) = self.fields.get(field) else {
            return;
        };
        let value = field_value(object, field);
        for constraint in constraints {
            if let Some(violation) = constraint.check(value).into_violation() {
                out.push(FieldViolation {
                    path: join_path(prefix, field),
                    violation,
                });
            }
        }
    }

    fn validate_child(&self, child: &Value, path: &str, out: &mut Vec<FieldViolation>) {
        match child {
            Value::Object(_) => self.validate_into(child, None, path, out),
            Value::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    if !item.is_null() {
                        self.validate_into(item, None, &format!("{path}[{index}]"), out);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Missing fields read as null.
fn field_value<'a>(object: &'a Value, field: &str) -> &'a Value {
    static NULL: Value = Value::Null;
    object.get(field).unwrap_or(&NULL)
}

fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

/// `path: message; path: message`
pub fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ValidationEngine;
    use crate::error::ProviderError;
    use crate::provider::{DictDataProvider, StaticDictProvider};
    use parking_lot::Mutex;
    use crate::spec::EnumConstraintSpec;
    use pretty_assertions::assert_eq;

    fn engine() -> ValidationEngine {
        ValidationEngine::default().with_provider(Arc::new(
            StaticDictProvider::new().with_values("status", ["ACTIVE", "INACTIVE"]),
        ))
    }

    fn order_validator(engine: &ValidationEngine) -> ObjectValidator {
        let line = ObjectValidator::new()
            .with_field("code", engine.enum_constraint(EnumConstraintSpec::fixed(["A1", "B2"])).unwrap())
            .with_field("qty", engine.field_expression("value <= root.max", Some("qty exceeds max")).unwrap());

        ObjectValidator::new()
            .with_object_constraint(
                engine
                    .object_expression("start < end", Some("start must precede end"))
                    .unwrap(),
            )
            .with_field("status", engine.enum_constraint(EnumConstraintSpec::new("status")).unwrap())
            .with_nested("items", line)
    }

    fn order(status: &str, start: i64, end: i64, items: Vec<Value>) -> Value {
        Value::object([
            ("status", Value::from(status)),
            ("start", Value::Int(start)),
            ("end", Value::Int(end)),
            ("items", Value::List(items)),
        ])
    }

    fn line(code: &str, qty: i64, max: i64) -> Value {
        Value::object([
            ("code", Value::from(code)),
            ("qty", Value::Int(qty)),
            ("max", Value::Int(max)),
        ])
    }

    #[test]
    fn test_valid_object() {
        let engine = engine();
        let validator = order_validator(&engine);
        let value = order("ACTIVE", 1, 2, vec![line("A1", 1, 5)]);
        assert!(validator.is_valid(&value));
        assert_eq!(validator.validation_message(&value), "");
    }

    #[test]
    fn test_paths_and_nested_roots() {
        let engine = engine();
        let validator = order_validator(&engine);
        let value = order(
            "PENDING",
            5,
            1,
            vec![line("A1", 1, 5), line("Z9", 9, 5)],
        );

        let paths: Vec<_> = validator
            .validate(&value)
            .into_iter()
            .map(|v| v.path)
            .collect();
        assert_eq!(paths, vec!["", "status", "items[1].code", "items[1].qty"]);
    }

    #[test]
    fn test_validation_message_joins_entries() {
        let engine = engine();
        let validator = order_validator(&engine);
        let value = order("ACTIVE", 5, 1, Vec::new());
        assert_eq!(
            validator.validation_message(&value),
            "start must precede end"
        );
    }

    #[test]
    fn test_validation_message_separates_without_trailing_separator() {
        let engine = engine();
        let validator = order_validator(&engine);
        let value = order("PENDING", 5, 1, vec![line("Z9", 1, 5)]);
        assert_eq!(
            validator.validation_message(&value),
            "start must precede end; status: value 'PENDING' is not allowed; allowed values: [ACTIVE, INACTIVE]; items[0].code: value 'Z9' is not allowed; allowed values: [A1, B2]"
        );
    }

    #[test]
    fn test_missing_field_is_null() {
        let engine = engine();
        let validator = ObjectValidator::new().with_field(
            "status",
            engine.enum_constraint(EnumConstraintSpec::new("status")).unwrap(),
        );
        let violations = validator.validate(&Value::object(Vec::<(String, Value)>::new()));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].to_string(), "status: null is not allowed");
    }

    #[test]
    fn test_validate_field_publishes_root() {
        let engine = engine();
        let validator = ObjectValidator::new()
            .with_field(
                "end",
                engine.field_expression("value > root.start", Some("end before start")).unwrap(),
            )
            .with_field(
                "status",
                engine.enum_constraint(EnumConstraintSpec::new("status")).unwrap(),
            );
        let value = Value::object([("start", 10), ("end", 5)]);

        let violations = validator.validate_field(&value, "end");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].to_string(), "end: end before start");
        assert_eq!(ContextPropagator::depth(), 0);
    }

    /// Records the root visible to each dictionary lookup.
    #[derive(Default)]
    struct RootRecorder {
        seen: Mutex<Vec<Option<Arc<Value>>>>,
    }

    impl DictDataProvider for RootRecorder {
        fn supports(&self, dict_type: &str) -> bool {
            dict_type == "status"
        }

        fn get_dict_values(&self, _: &str, _: bool) -> Result<Vec<String>, ProviderError> {
            self.seen.lock().push(ContextPropagator::current());
            Ok(vec!["ACTIVE".to_string()])
        }
    }

    #[test]
    fn test_root_is_not_published_without_field_expressions() {
        let recorder = Arc::new(RootRecorder::default());
        let engine = ValidationEngine::default().with_provider(recorder.clone());
        let validator = ObjectValidator::new()
            .with_object_constraint(engine.object_expression("start < end", None).unwrap())
            .with_field("status", engine.enum_constraint(EnumConstraintSpec::new("status")).unwrap());

        let value = order("ACTIVE", 1, 2, Vec::new());
        assert!(validator.is_valid(&value));
        assert_eq!(recorder.seen.lock().len(), 1);
        assert!(recorder.seen.lock()[0].is_none());
    }

    #[test]
    fn test_validate_shared_publishes_the_given_root() {
        let recorder = Arc::new(RootRecorder::default());
        let engine = ValidationEngine::default().with_provider(recorder.clone());
        let validator = ObjectValidator::new()
            .with_field("status", engine.enum_constraint(EnumConstraintSpec::new("status")).unwrap())
            .with_field("end", engine.field_expression("value > root.start", None).unwrap());

        let value = Arc::new(order("ACTIVE", 1, 2, Vec::new()));
        assert!(validator.validate_shared(Arc::clone(&value)).is_empty());

        let seen = recorder.seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].as_ref().is_some_and(|root| Arc::ptr_eq(root, &value)));
        assert_eq!(ContextPropagator::depth(), 0);
    }
}
