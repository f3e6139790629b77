//! Winter validation core.
//!
//! Two kinds of constraint over [`Value`]s:
//!
//! - [`EnumConstraint`]: membership in a set assembled from fixed values and a
//!   dynamic [`DictDataProvider`], with null, case and key/label options.
//! - [`ExpressionConstraint`]: a boolean expression from `winter-lang`, which
//!   may refer to the enclosing object through `root`.
//!
//! The enclosing object is published per thread by [`ContextPropagator`], so a
//! validation driver does not need to pass it into every field check.
//!
//! ```rust
//! use std::sync::Arc;
//! use winter_core::{
//!     ContextPropagator, EnumConstraintSpec, StaticDictProvider, ValidationEngine, Value,
//! };
//!
//! let engine = ValidationEngine::default()
//!     .with_provider(Arc::new(StaticDictProvider::new().with_values("status", ["INACTIVE"])));
//!
//! let status = engine
//!     .enum_constraint(EnumConstraintSpec::new("status").with_values(["ACTIVE"]).ignore_case(true))
//!     .unwrap();
//! assert!(status.check(&Value::from("active")).passed());
//!
//! let end = engine.field_expression("value > root.start", Some("end must follow start")).unwrap();
//! let booking = Value::object([("start", 10), ("end", 5)]);
//! let outcome = ContextPropagator::with_root(booking, || end.check(&Value::Int(5)));
//! assert_eq!(outcome.message(), "end must follow start");
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod enum_constraint;
pub mod error;
pub mod expression_constraint;
pub mod outcome;
pub mod provider;
pub mod resolver;
pub mod spec;
pub mod validator;

pub use config::{ExpressionMessages, ProviderFailureMode, SelectionPolicy, ValidationConfig};
pub use context::{ContextPropagator, RootGuard};
pub use engine::ValidationEngine;
pub use enum_constraint::EnumConstraint;
pub use error::{ConfigurationError, ProviderError};
pub use expression_constraint::ExpressionConstraint;
pub use outcome::{CheckOutcome, Violation, ViolationKind};
pub use provider::{DefaultDictProvider, DictDataProvider, ProviderRegistry, StaticDictProvider};
pub use resolver::{AllowedValues, DynamicValueResolver};
pub use spec::{EnumConstraintSpec, ExpressionConstraintSpec, ExpressionTarget};
pub use validator::{Constraint, FieldViolation, ObjectValidator};

pub use winter_lang::{EvaluationError, Value};
