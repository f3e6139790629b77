//! Boolean expression constraint.
//!
//! Null input passes: requiring a value is a separate concern. Any
//! [`EvaluationError`](winter_lang::EvaluationError) is caught here and reported
//! as a failed check, so a bad expression or an unexpected value shape fails the
//! one constraint instead of aborting the validation pass. The error is logged
//! at `warn` and, with detailed messages enabled, appended to the message.

use std::sync::Arc;

use tracing::{debug, warn};
use winter_lang::{EvaluationContext, EvaluationError, Value};

use crate::config::{ExpressionMessages, ValidationConfig};
use crate::context::ContextPropagator;
use crate::outcome::{render_template, CheckOutcome, Violation, ViolationKind};
use crate::spec::{ExpressionConstraintSpec, ExpressionTarget};

#[derive(Debug, Clone)]
pub struct ExpressionConstraint {
    spec: Arc<ExpressionConstraintSpec>,
    config: Arc<ValidationConfig>,
}

impl ExpressionConstraint {
    pub fn new(spec: ExpressionConstraintSpec, config: Arc<ValidationConfig>) -> Self {
        Self {
            spec: Arc::new(spec),
            config,
        }
    }

    pub fn spec(&self) -> &ExpressionConstraintSpec {
        &self.spec
    }

    /// Check `value`. Field targets read their root from [`ContextPropagator`].
    pub fn check(&self, value: &Value) -> CheckOutcome {
        match self.spec.target() {
            ExpressionTarget::Object => self.check_with_root(value, Some(value)),
            ExpressionTarget::Field => {
                let root = ContextPropagator::current();
                self.check_with_root(value, root.as_deref())
            }
        }
    }

    /// Check `value` against an explicit root.
    pub fn check_with_root(&self, value: &Value, root: Option<&Value>) -> CheckOutcome {
        if !self.config.expression_checks_active() || value.is_null() {
            return CheckOutcome::Passed;
        }

        let mut ctx = EvaluationContext::new(value).with_root(root);
        for (name, bound) in self.spec.variables() {
            ctx = ctx.with_variable(name.clone(), bound.clone());
        }

        let outcome = match self.spec.compiled().evaluate(&ctx) {
            Ok(true) => CheckOutcome::Passed,
            Ok(false) => self.predicate_failed(value),
            Err(error) => {
                warn!(
                    expression = self.spec.source(),
                    error = %error,
                    "expression evaluation failed, reporting violation"
                );
                self.evaluation_failed(value, error)
            }
        };

        if self.config.verbose {
            debug!(
                expression = self.spec.source(),
                value = %value,
                has_root = root.is_some(),
                passed = outcome.passed(),
                "expression check"
            );
        }
        outcome
    }

    fn base_message(&self, value: &Value) -> String {
        let source = self.spec.source();
        if let Some(template) = self.spec.message() {
            let text = value.to_string();
            return render_template(template, &[("value", &text), ("expression", source)]);
        }
        match self.spec.description() {
            Some(description) => description.to_string(),
            None => format!("expression '{source}' is not satisfied"),
        }
    }

    fn predicate_failed(&self, value: &Value) -> CheckOutcome {
        Violation::new(
            ViolationKind::PredicateFailed {
                expression: self.spec.source().to_string(),
            },
            self.base_message(value),
        )
        .into()
    }

    fn evaluation_failed(&self, value: &Value, error: EvaluationError) -> CheckOutcome {
        let mut message = self.base_message(value);
        if self.config.expression_messages == ExpressionMessages::Detailed {
            message = format!("{message} ({error})");
        }
        Violation::new(
            ViolationKind::EvaluationFailed {
                expression: self.spec.source().to_string(),
                error,
            },
            message,
        )
        .into()
    }
}
