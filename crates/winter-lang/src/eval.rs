//! Evaluation of compiled expressions against a per-call context.

use std::cmp::Ordering;

use indexmap::IndexMap;

use crate::compiler::{ArithOp, Binding, CompareOp, CompiledExpression, Function, Node};
use crate::error::EvaluationError;
use crate::value::Value;

/// Bindings for a single evaluation.
///
/// Borrowed, short-lived and never shared between evaluations; the compiled
/// expression it is passed to holds no per-call state.
#[derive(Debug, Clone)]
pub struct EvaluationContext<'a> {
    value: &'a Value,
    root: Option<&'a Value>,
    variables: IndexMap<String, Value>,
}

impl<'a> EvaluationContext<'a> {
    /// Context with `value` under test and no root object.
    pub fn new(value: &'a Value) -> Self {
        Self {
            value,
            root: None,
            variables: IndexMap::new(),
        }
    }

    /// Bind the root object.
    pub fn with_root(mut self, root: Option<&'a Value>) -> Self {
        self.root = root;
        self
    }

    /// Bind an extra `#name` variable.
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn value(&self) -> &'a Value {
        self.value
    }

    pub fn root(&self) -> Option<&'a Value> {
        self.root
    }

    /// Object unqualified field names resolve against.
    fn context_object(&self) -> Option<&'a Value> {
        if matches!(self.value, Value::Object(_)) {
            Some(self.value)
        } else {
            self.root
        }
    }
}

impl CompiledExpression {
    /// Evaluate to a boolean; null and non-boolean results are errors.
    pub fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<bool, EvaluationError> {
        match self.evaluate_value(ctx)? {
            Value::Bool(b) => Ok(b),
            Value::Null => Err(EvaluationError::NullResult),
            other => Err(EvaluationError::NotBoolean(other.type_name())),
        }
    }

    /// Evaluate to whatever value the expression produces.
    pub fn evaluate_value(&self, ctx: &EvaluationContext<'_>) -> Result<Value, EvaluationError> {
        eval(self.node(), ctx)
    }
}

fn eval(node: &Node, ctx: &EvaluationContext<'_>) -> Result<Value, EvaluationError> {
    match node {
        Node::Const(v) => Ok(v.clone()),
        Node::Binding(binding) => resolve_binding(binding, ctx).cloned(),
        Node::Implicit(field) => {
            let object = ctx.context_object().ok_or(EvaluationError::MissingRoot)?;
            read_field(object, field, false)
        }
        Node::Member {
            object,
            field,
            null_safe,
        } => {
            let object = eval(object, ctx)?;
            read_field(&object, field, *null_safe)
        }
        Node::Index { object, index } => {
            let object = eval(object, ctx)?;
            let index = eval(index, ctx)?;
            read_index(&object, &index)
        }
        Node::List(items) => items
            .iter()
            .map(|item| eval(item, ctx))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Node::Not(operand) => Ok(Value::Bool(!expect_bool(eval(operand, ctx)?, "'!'")?)),
        Node::Neg(operand) => match eval(operand, ctx)? {
            Value::Int(i) => i
                .checked_neg()
                .map(Value::Int)
                .ok_or(EvaluationError::Overflow("-")),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(EvaluationError::UnexpectedType {
                expected: "number",
                found: other.type_name(),
                context: "unary '-'".to_string(),
            }),
        },
        Node::And(left, right) => {
            if !expect_bool(eval(left, ctx)?, "'&&'")? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(expect_bool(eval(right, ctx)?, "'&&'")?))
        }
        Node::Or(left, right) => {
            if expect_bool(eval(left, ctx)?, "'||'")? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(expect_bool(eval(right, ctx)?, "'||'")?))
        }
        Node::Compare { op, left, right } => {
            let left = eval(left, ctx)?;
            let right = eval(right, ctx)?;
            compare(*op, &left, &right).map(Value::Bool)
        }
        Node::Arith { op, left, right } => {
            let left = eval(left, ctx)?;
            let right = eval(right, ctx)?;
            arithmetic(*op, left, right)
        }
        Node::In {
            needle,
            haystack,
            negated,
        } => {
            let needle = eval(needle, ctx)?;
            let found = match eval(haystack, ctx)? {
                Value::List(items) => items.iter().any(|item| item.loose_eq(&needle)),
                other => {
                    return Err(EvaluationError::UnexpectedType {
                        expected: "list",
                        found: other.type_name(),
                        context: "'in'".to_string(),
                    })
                }
            };
            Ok(Value::Bool(found != *negated))
        }
        Node::IsNull { operand, negated } => {
            let is_null = eval(operand, ctx)?.is_null();
            Ok(Value::Bool(is_null != *negated))
        }
        Node::Matches {
            operand,
            regex,
            negated,
        } => match eval(operand, ctx)? {
            Value::String(s) => Ok(Value::Bool(regex.is_match(&s) != *negated)),
            other => Err(EvaluationError::UnexpectedType {
                expected: "string",
                found: other.type_name(),
                context: "'matches'".to_string(),
            }),
        },
        Node::Call { function, args } => {
            let args = args
                .iter()
                .map(|arg| eval(arg, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            call(*function, args)
        }
    }
}

fn resolve_binding<'a>(
    binding: &Binding,
    ctx: &'a EvaluationContext<'_>,
) -> Result<&'a Value, EvaluationError> {
    match binding {
        Binding::Value => Ok(ctx.value),
        Binding::Root => ctx.root.ok_or(EvaluationError::MissingRoot),
        Binding::Variable(name) => ctx
            .variables
            .get(name)
            .ok_or_else(|| EvaluationError::UnknownVariable(name.clone())),
    }
}

fn read_field(object: &Value, field: &str, null_safe: bool) -> Result<Value, EvaluationError> {
    match object {
        Value::Object(fields) => fields
            .get(field)
            .cloned()
            .ok_or_else(|| EvaluationError::UnknownField(field.to_string())),
        Value::Null if null_safe => Ok(Value::Null),
        Value::Null => Err(EvaluationError::NullReference(field.to_string())),
        other => Err(EvaluationError::NotAnObject {
            field: field.to_string(),
            type_name: other.type_name(),
        }),
    }
}

fn read_index(object: &Value, index: &Value) -> Result<Value, EvaluationError> {
    match (object, index) {
        (Value::List(items), Value::Int(i)) => usize::try_from(*i)
            .ok()
            .and_then(|idx| items.get(idx))
            .cloned()
            .ok_or(EvaluationError::IndexOutOfBounds {
                index: *i,
                len: items.len(),
            }),
        (Value::Object(_), Value::String(key)) => read_field(object, key, false),
        (Value::Null, _) => Err(EvaluationError::NullReference(index.to_string())),
        _ => Err(EvaluationError::TypeMismatch {
            op: "[]",
            left: object.type_name(),
            right: index.type_name(),
        }),
    }
}

fn expect_bool(value: Value, context: &str) -> Result<bool, EvaluationError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(EvaluationError::UnexpectedType {
            expected: "bool",
            found: other.type_name(),
            context: context.to_string(),
        }),
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, EvaluationError> {
    match op {
        CompareOp::Eq => return Ok(left.loose_eq(right)),
        CompareOp::Ne => return Ok(!left.loose_eq(right)),
        _ => {}
    }

    // Ordering against null is never satisfied.
    if left.is_null() || right.is_null() {
        return Ok(false);
    }

    let ordering = left
        .compare(right)
        .ok_or(EvaluationError::TypeMismatch {
            op: compare_symbol(op),
            left: left.type_name(),
            right: right.type_name(),
        })?;

    Ok(match op {
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Eq | CompareOp::Ne => unreachable!("equality handled above"),
    })
}

fn compare_symbol(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "==",
        CompareOp::Ne => "!=",
        CompareOp::Lt => "<",
        CompareOp::Le => "<=",
        CompareOp::Gt => ">",
        CompareOp::Ge => ">=",
    }
}

fn arith_symbol(op: ArithOp) -> &'static str {
    match op {
        ArithOp::Add => "+",
        ArithOp::Sub => "-",
        ArithOp::Mul => "*",
        ArithOp::Div => "/",
        ArithOp::Rem => "%",
    }
}

fn arithmetic(op: ArithOp, left: Value, right: Value) -> Result<Value, EvaluationError> {
    let symbol = arith_symbol(op);

    if op == ArithOp::Add && (matches!(left, Value::String(_)) || matches!(right, Value::String(_)))
    {
        return Ok(Value::String(format!("{}{}", left, right)));
    }

    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            if matches!(op, ArithOp::Div | ArithOp::Rem) && b == 0 {
                return Err(EvaluationError::DivisionByZero);
            }
            let result = match op {
                ArithOp::Add => a.checked_add(b),
                ArithOp::Sub => a.checked_sub(b),
                ArithOp::Mul => a.checked_mul(b),
                ArithOp::Div => a.checked_div(b),
                ArithOp::Rem => a.checked_rem(b),
            };
            result.map(Value::Int).ok_or(EvaluationError::Overflow(symbol))
        }
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let a = as_f64(&left);
            let b = as_f64(&right);
            if matches!(op, ArithOp::Div | ArithOp::Rem) && b == 0.0 {
                return Err(EvaluationError::DivisionByZero);
            }
            Ok(Value::Float(match op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                ArithOp::Div => a / b,
                ArithOp::Rem => a % b,
            }))
        }
        _ => Err(EvaluationError::TypeMismatch {
            op: symbol,
            left: left.type_name(),
            right: right.type_name(),
        }),
    }
}

fn as_f64(value: &Value) -> f64 {
    match value {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => f64::NAN,
    }
}

fn call(function: Function, args: Vec<Value>) -> Result<Value, EvaluationError> {
    let mut args = args.into_iter();
    let first = args.next().unwrap_or_default();

    let string_arg = |value: Value| match value {
        Value::String(s) => Ok(s),
        other => Err(EvaluationError::UnexpectedType {
            expected: "string",
            found: other.type_name(),
            context: format!("{}()", function.name()),
        }),
    };

    match function {
        Function::Len => match first {
            Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
            Value::List(items) => Ok(Value::Int(items.len() as i64)),
            Value::Object(fields) => Ok(Value::Int(fields.len() as i64)),
            other => Err(EvaluationError::UnexpectedType {
                expected: "string, list or object",
                found: other.type_name(),
                context: "len()".to_string(),
            }),
        },
        Function::Lower => Ok(Value::String(string_arg(first)?.to_lowercase())),
        Function::Upper => Ok(Value::String(string_arg(first)?.to_uppercase())),
        Function::Trim => Ok(Value::String(string_arg(first)?.trim().to_string())),
        Function::Contains => {
            let needle = args.next().unwrap_or_default();
            match first {
                Value::String(s) => Ok(Value::Bool(s.contains(string_arg(needle)?.as_str()))),
                Value::List(items) => Ok(Value::Bool(items.iter().any(|i| i.loose_eq(&needle)))),
                other => Err(EvaluationError::UnexpectedType {
                    expected: "string or list",
                    found: other.type_name(),
                    context: "contains()".to_string(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile;

    fn eval_with(source: &str, value: Value, root: Option<&Value>) -> Result<bool, EvaluationError> {
        let compiled = compile(source).unwrap();
        compiled.evaluate(&EvaluationContext::new(&value).with_root(root))
    }

    fn eval_value(source: &str, value: Value) -> Result<bool, EvaluationError> {
        eval_with(source, value, None)
    }

    #[test]
    fn test_value_greater_than_zero() {
        assert_eq!(eval_value("value > 0", Value::Int(5)), Ok(true));
        assert_eq!(eval_value("value > 0", Value::Int(-1)), Ok(false));
        assert!(matches!(
            eval_value("value > 0", Value::from("x")),
            Err(EvaluationError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_this_alias_and_hash_variables() {
        assert_eq!(eval_value("this == 'A'", Value::from("A")), Ok(true));
        assert_eq!(eval_value("#this == 'A'", Value::from("A")), Ok(true));

        let compiled = compile("value <= #max").unwrap();
        let value = Value::Int(3);
        let ctx = EvaluationContext::new(&value).with_variable("max", 5);
        assert_eq!(compiled.evaluate(&ctx), Ok(true));

        assert_eq!(
            compiled.evaluate(&EvaluationContext::new(&value)),
            Err(EvaluationError::UnknownVariable("max".to_string()))
        );
    }

    #[test]
    fn test_cross_field_with_root() {
        let booking = Value::object([("start", 10), ("end", 5)]);
        assert_eq!(
            eval_with("root.start < root.end", Value::Int(10), Some(&booking)),
            Ok(false)
        );
        assert_eq!(
            eval_with("root.start < root.end", Value::Int(10), None),
            Err(EvaluationError::MissingRoot)
        );
    }

    #[test]
    fn test_implicit_fields_prefer_object_value() {
        let booking = Value::object([("start", 1), ("end", 5)]);
        assert_eq!(eval_value("start < end", booking.clone()), Ok(true));

        // Scalar value under test: names resolve against the root.
        assert_eq!(eval_with("value >= start", Value::Int(3), Some(&booking)), Ok(true));
        assert_eq!(
            eval_value("start < 3", Value::Int(1)),
            Err(EvaluationError::MissingRoot)
        );
    }

    #[test]
    fn test_unknown_field() {
        let obj = Value::object([("a", 1)]);
        assert_eq!(
            eval_value("value.b > 0", obj),
            Err(EvaluationError::UnknownField("b".to_string()))
        );
    }

    #[test]
    fn test_null_handling() {
        let obj = Value::object([("owner", Value::Null)]);
        assert_eq!(eval_value("owner is null", obj.clone()), Ok(true));
        assert_eq!(eval_value("owner?.name is null", obj.clone()), Ok(true));
        assert_eq!(
            eval_value("owner.name == 'x'", obj.clone()),
            Err(EvaluationError::NullReference("name".to_string()))
        );
        assert_eq!(eval_value("owner > 3", obj.clone()), Ok(false));
        assert_eq!(eval_value("owner", obj), Err(EvaluationError::NullResult));
    }

    #[test]
    fn test_non_boolean_result() {
        assert_eq!(
            eval_value("value + 1", Value::Int(1)),
            Err(EvaluationError::NotBoolean("int"))
        );
    }

    #[test]
    fn test_logic_short_circuits() {
        // Right side would fail with MissingRoot if evaluated.
        assert_eq!(eval_value("value > 0 || root.x", Value::Int(1)), Ok(true));
        assert_eq!(eval_value("value < 0 && root.x", Value::Int(1)), Ok(false));
        assert!(matches!(
            eval_value("value && true", Value::Int(1)),
            Err(EvaluationError::UnexpectedType { expected: "bool", .. })
        ));
    }

    #[test]
    fn test_membership_and_patterns() {
        assert_eq!(eval_value("value in ['A', 'B']", Value::from("B")), Ok(true));
        assert_eq!(eval_value("value not in [1, 2]", Value::Float(2.0)), Ok(false));
        assert_eq!(eval_value("value matches '^[A-Z]{3}$'", Value::from("ABC")), Ok(true));
        assert_eq!(eval_value("value not matches '^[0-9]+$'", Value::from("12a")), Ok(true));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval_value("value * 2 + 1 == 7", Value::Int(3)), Ok(true));
        assert_eq!(eval_value("value / 2 == 2.5", Value::Float(5.0)), Ok(true));
        assert_eq!(eval_value("value % 2 == 0", Value::Int(4)), Ok(true));
        assert_eq!(eval_value("-value < 0", Value::Int(4)), Ok(true));
        assert_eq!(
            eval_value("value / 0 > 1", Value::Int(4)),
            Err(EvaluationError::DivisionByZero)
        );
        assert_eq!(
            eval_value("value + 1 > 0", Value::Int(i64::MAX)),
            Err(EvaluationError::Overflow("+"))
        );
        assert_eq!(eval_value("'id-' + value == 'id-7'", Value::Int(7)), Ok(true));
    }

    #[test]
    fn test_functions() {
        assert_eq!(eval_value("len(trim(value)) == 3", Value::from("  abc ")), Ok(true));
        assert_eq!(eval_value("lower(value) == 'abc'", Value::from("AbC")), Ok(true));
        assert_eq!(eval_value("upper(value) == 'ABC'", Value::from("abc")), Ok(true));
        assert_eq!(eval_value("contains(value, 'b')", Value::from("abc")), Ok(true));
        assert_eq!(
            eval_value("contains(value, 3)", Value::from(vec![1, 2, 3])),
            Ok(true)
        );
        assert!(eval_value("len(value) > 0", Value::Int(3)).is_err());
    }

    #[test]
    fn test_indexing() {
        let order = Value::object([("items", Value::from(vec!["a", "b"]))]);
        assert_eq!(eval_value("items[1] == 'b'", order.clone()), Ok(true));
        assert_eq!(eval_value("value['items'][0] == 'a'", order.clone()), Ok(true));
        assert_eq!(
            eval_value("items[5] == 'b'", order),
            Err(EvaluationError::IndexOutOfBounds { index: 5, len: 2 })
        );
    }
}
