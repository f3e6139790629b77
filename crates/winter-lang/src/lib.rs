//! Winter constraint expression language.
//!
//! Small, side-effect free boolean expressions used to declare validation
//! constraints. An expression is compiled once into an immutable
//! [`CompiledExpression`] and evaluated any number of times, possibly from many
//! threads, against a per-call [`EvaluationContext`].
//!
//! # Syntax
//!
//! ```text
//! value > 0
//! len(trim(value)) >= 3 && len(value) <= 20
//! root.start < root.end
//! status in ['ACTIVE', 'PENDING'] || #override == true
//! email matches '^[^@]+@[^@]+$'
//! owner?.name is not null
//! ```
//!
//! - `value` / `this` is the value under test, `root` is the enclosing object.
//! - `#name` reads a named variable bound on the context.
//! - Other bare names are fields of the value (when it is an object) or of root.
//!
//! # Usage
//!
//! ```rust
//! use winter_lang::{compile, EvaluationContext, Value};
//!
//! let expr = compile("value > 0").unwrap();
//! let value = Value::Int(5);
//! assert!(expr.evaluate(&EvaluationContext::new(&value)).unwrap());
//! ```

pub mod ast;
pub mod cache;
pub mod compiler;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod value;

pub use cache::{CacheStats, ExpressionCache};
pub use compiler::{CompiledExpression, ROOT_BINDING, THIS_BINDING, VALUE_BINDING};
pub use error::{CompileError, CompileErrorKind, EvaluationError, LangError, ParseError};
pub use eval::EvaluationContext;
pub use span::{Span, Spanned};
pub use value::Value;

/// Parse a source string into an AST.
pub fn parse(source: &str) -> Result<ast::Expr, ParseError> {
    parser::parse(source)
}

/// Parse and compile an expression.
///
/// Fails with [`LangError`] for any syntactic problem, unknown function,
/// wrong arity or invalid `matches` pattern.
///
/// ```rust
/// use winter_lang::compile;
///
/// assert!(compile("root.start < root.end").is_ok());
/// assert!(compile("root.start <").is_err());
/// ```
pub fn compile(source: &str) -> Result<CompiledExpression, LangError> {
    let expr = parse(source)?;
    Ok(compiler::compile(source, expr)?)
}
