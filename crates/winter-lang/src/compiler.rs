//! Compiler from AST to an immutable evaluation tree.
//!
//! Compilation resolves bindings, checks function names and arity, compiles
//! `matches` patterns and folds constant list literals. Everything that can be
//! rejected without data is rejected here, so a malformed declaration fails when
//! it is registered rather than when the first value is checked.

use regex_lite::Regex;

use crate::ast::{BinaryOp, Expr, ExprKind, Literal, UnaryOp};
use crate::error::CompileError;
use crate::value::Value;

/// Name bound to the value under test.
pub const VALUE_BINDING: &str = "value";
/// Alias for [`VALUE_BINDING`].
pub const THIS_BINDING: &str = "this";
/// Name bound to the root object.
pub const ROOT_BINDING: &str = "root";

/// A parsed and validated expression, safe to share across threads.
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    source: String,
    root: Node,
    uses_root: bool,
}

impl CompiledExpression {
    /// The expression text this was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the expression refers to `root` explicitly.
    pub fn uses_root(&self) -> bool {
        self.uses_root
    }

    pub(crate) fn node(&self) -> &Node {
        &self.root
    }
}

/// Named inputs an expression can read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// `value`, `this`, `#value`, `#this`.
    Value,
    /// `root`, `#root`.
    Root,
    /// Any other `#name`.
    Variable(String),
}

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Len,
    Lower,
    Upper,
    Trim,
    Contains,
}

impl Function {
    fn lookup(name: &str) -> Option<Function> {
        match name {
            "len" => Some(Function::Len),
            "lower" => Some(Function::Lower),
            "upper" => Some(Function::Upper),
            "trim" => Some(Function::Trim),
            "contains" => Some(Function::Contains),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Len => "len",
            Function::Lower => "lower",
            Function::Upper => "upper",
            Function::Trim => "trim",
            Function::Contains => "contains",
        }
    }

    fn arity(self) -> usize {
        match self {
            Function::Contains => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Evaluation tree node.
#[derive(Debug, Clone)]
pub enum Node {
    Const(Value),
    Binding(Binding),
    /// Field of the context object (the value if it is an object, else root).
    Implicit(String),
    Member {
        object: Box<Node>,
        field: String,
        null_safe: bool,
    },
    Index {
        object: Box<Node>,
        index: Box<Node>,
    },
    List(Vec<Node>),
    Not(Box<Node>),
    Neg(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Compare {
        op: CompareOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Arith {
        op: ArithOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    In {
        needle: Box<Node>,
        haystack: Box<Node>,
        negated: bool,
    },
    IsNull {
        operand: Box<Node>,
        negated: bool,
    },
    Matches {
        operand: Box<Node>,
        regex: Regex,
        negated: bool,
    },
    Call {
        function: Function,
        args: Vec<Node>,
    },
}

struct Compiler {
    uses_root: bool,
}

impl Compiler {
    fn lower(&mut self, expr: Expr) -> Result<Node, CompileError> {
        Ok(match expr.kind {
            ExprKind::Literal(lit) => Node::Const(literal_value(lit)),
            ExprKind::Ident(name) => match name.as_str() {
                VALUE_BINDING | THIS_BINDING => Node::Binding(Binding::Value),
                ROOT_BINDING => {
                    self.uses_root = true;
                    Node::Binding(Binding::Root)
                }
                _ => Node::Implicit(name),
            },
            ExprKind::Variable(name) => match name.as_str() {
                VALUE_BINDING | THIS_BINDING => Node::Binding(Binding::Value),
                ROOT_BINDING => {
                    self.uses_root = true;
                    Node::Binding(Binding::Root)
                }
                _ => Node::Binding(Binding::Variable(name)),
            },
            ExprKind::Member {
                object,
                field,
                null_safe,
            } => Node::Member {
                object: self.lower_boxed(*object)?,
                field: field.value,
                null_safe,
            },
            ExprKind::Index { object, index } => Node::Index {
                object: self.lower_boxed(*object)?,
                index: self.lower_boxed(*index)?,
            },
            ExprKind::Call { name, args } => {
                let function = Function::lookup(&name.value)
                    .ok_or_else(|| CompileError::unknown_function(&name.value, name.span))?;
                if args.len() != function.arity() {
                    return Err(CompileError::wrong_arity(
                        function.name(),
                        function.arity(),
                        args.len(),
                        expr.span,
                    ));
                }
                Node::Call {
                    function,
                    args: self.lower_all(args)?,
                }
            }
            ExprKind::List(items) => {
                let nodes = self.lower_all(items)?;
                fold_list(nodes)
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.lower_boxed(*operand)?;
                match op {
                    UnaryOp::Not => Node::Not(operand),
                    UnaryOp::Neg => Node::Neg(operand),
                }
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.lower_boxed(*left)?;
                let right = self.lower_boxed(*right)?;
                binary_node(op, left, right)
            }
            ExprKind::In {
                needle,
                haystack,
                negated,
            } => Node::In {
                needle: self.lower_boxed(*needle)?,
                haystack: self.lower_boxed(*haystack)?,
                negated,
            },
            ExprKind::IsNull { operand, negated } => Node::IsNull {
                operand: self.lower_boxed(*operand)?,
                negated,
            },
            ExprKind::Matches {
                operand,
                pattern,
                negated,
            } => {
                let regex = Regex::new(&pattern.value).map_err(|e| {
                    CompileError::invalid_pattern(&pattern.value, e, pattern.span)
                })?;
                Node::Matches {
                    operand: self.lower_boxed(*operand)?,
                    regex,
                    negated,
                }
            }
        })
    }

    fn lower_boxed(&mut self, expr: Expr) -> Result<Box<Node>, CompileError> {
        self.lower(expr).map(Box::new)
    }

    fn lower_all(&mut self, exprs: Vec<Expr>) -> Result<Vec<Node>, CompileError> {
        exprs.into_iter().map(|e| self.lower(e)).collect()
    }
}

fn literal_value(lit: Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(b),
        Literal::Int(i) => Value::Int(i),
        Literal::Float(f) => Value::Float(f),
        Literal::String(s) => Value::String(s),
    }
}

/// A list of constants becomes a single constant.
fn fold_list(nodes: Vec<Node>) -> Node {
    if nodes.iter().all(|n| matches!(n, Node::Const(_))) {
        let values = nodes
            .into_iter()
            .filter_map(|n| match n {
                Node::Const(v) => Some(v),
                _ => None,
            })
            .collect();
        Node::Const(Value::List(values))
    } else {
        Node::List(nodes)
    }
}

fn binary_node(op: BinaryOp, left: Box<Node>, right: Box<Node>) -> Node {
    let compare = match op {
        BinaryOp::Eq => Some(CompareOp::Eq),
        BinaryOp::Ne => Some(CompareOp::Ne),
        BinaryOp::Lt => Some(CompareOp::Lt),
        BinaryOp::Le => Some(CompareOp::Le),
        BinaryOp::Gt => Some(CompareOp::Gt),
        BinaryOp::Ge => Some(CompareOp::Ge),
        _ => None,
    };
    if let Some(op) = compare {
        return Node::Compare { op, left, right };
    }

    let arith = match op {
        BinaryOp::Or => return Node::Or(left, right),
        BinaryOp::And => return Node::And(left, right),
        BinaryOp::Add => ArithOp::Add,
        BinaryOp::Sub => ArithOp::Sub,
        BinaryOp::Mul => ArithOp::Mul,
        BinaryOp::Div => ArithOp::Div,
        _ => ArithOp::Rem,
    };
    Node::Arith {
        op: arith,
        left,
        right,
    }
}

/// Lower a parsed expression into its compiled form.
pub fn compile(source: &str, expr: Expr) -> Result<CompiledExpression, CompileError> {
    let mut compiler = Compiler { uses_root: false };
    let root = compiler.lower(expr)?;
    Ok(CompiledExpression {
        source: source.to_string(),
        root,
        uses_root: compiler.uses_root,
    })
}
