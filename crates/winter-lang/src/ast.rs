//! Abstract Syntax Tree for constraint expressions.

use crate::span::{Span, Spanned};

/// An expression node with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// A literal value.
    Literal(Literal),
    /// A bare identifier: a binding (`value`, `this`, `root`) or an
    /// implicit field of the context object.
    Ident(String),
    /// `#name`, an explicit variable reference.
    Variable(String),
    /// `object.field` or `object?.field`.
    Member {
        object: Box<Expr>,
        field: Spanned<String>,
        null_safe: bool,
    },
    /// `object[index]`.
    Index { object: Box<Expr>, index: Box<Expr> },
    /// `name(args...)`.
    Call {
        name: Spanned<String>,
        args: Vec<Expr>,
    },
    /// `[a, b, c]`.
    List(Vec<Expr>),
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `expr in list` / `expr not in list`.
    In {
        needle: Box<Expr>,
        haystack: Box<Expr>,
        negated: bool,
    },
    /// `expr is null` / `expr is not null`.
    IsNull { operand: Box<Expr>, negated: bool },
    /// `expr matches 'pattern'`.
    Matches {
        operand: Box<Expr>,
        pattern: Spanned<String>,
        negated: bool,
    },
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    /// Operator symbol as written in source.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }
}
