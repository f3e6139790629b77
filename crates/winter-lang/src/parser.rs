//! Recursive descent parser for constraint expressions.

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{tokenize, SpannedToken, Token};
use crate::span::{Span, Spanned};

/// Deepest expression tree the parser accepts. Compilation and evaluation
/// recurse over the tree, so this bounds their stack use as well.
pub const MAX_NESTING: usize = 128;

/// Parser over a pre-tokenized expression.
pub struct Parser<'source> {
    tokens: Vec<SpannedToken>,
    pos: usize,
    depth: usize,
    source: &'source str,
}

impl<'source> Parser<'source> {
    /// Tokenize `source` and create a parser for it.
    pub fn new(source: &'source str) -> Result<Self, ParseError> {
        let tokens = tokenize(source).map_err(|e| annotate_lex_error(e, source))?;
        Ok(Self {
            tokens,
            pos: 0,
            depth: 0,
            source,
        })
    }

    /// Parse a complete expression; trailing tokens are an error.
    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        if self.tokens.is_empty() {
            return Err(ParseError::new("empty expression", Span::eof(self.source)));
        }

        let expr = self.parse_or()?;

        if let Some(tok) = self.peek() {
            return Err(ParseError::new(
                format!("unexpected {} after end of expression", tok.token.describe()),
                tok.span,
            )
            .with_hint("combine conditions with '&&' or '||'"));
        }

        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let base = self.descend()?;
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            self.descend()?;
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let mut left = self.parse_not()?;
        while self.eat(&Token::And) {
            self.descend()?;
            let right = self.parse_not()?;
            left = binary(BinaryOp::And, left, right);
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.check(&Token::Bang) || self.check(&Token::Not) {
            let start = self.next_token()?.span;
            let base = self.descend()?;
            let operand = self.parse_not()?;
            self.depth = base;
            let span = start.merge(operand.span);
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.parse_comparison()
    }

    /// Comparisons are non-associative: `a < b < c` is rejected.
    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive()?;

        let Some(token) = self.peek().map(|t| t.token.clone()) else {
            return Ok(left);
        };

        let op = match token {
            Token::Eq => Some(BinaryOp::Eq),
            Token::Ne => Some(BinaryOp::Ne),
            Token::Lt => Some(BinaryOp::Lt),
            Token::Le => Some(BinaryOp::Le),
            Token::Gt => Some(BinaryOp::Gt),
            Token::Ge => Some(BinaryOp::Ge),
            _ => None,
        };
        if let Some(op) = op {
            self.next_token()?;
            let right = self.parse_additive()?;
            return Ok(binary(op, left, right));
        }

        match token {
            Token::In => {
                self.next_token()?;
                self.finish_in(left, false)
            }
            Token::Matches => {
                self.next_token()?;
                self.finish_matches(left, false)
            }
            Token::Not => {
                self.next_token()?;
                let next = self.next_token()?;
                match next.token {
                    Token::In => self.finish_in(left, true),
                    Token::Matches => self.finish_matches(left, true),
                    other => Err(ParseError::new(
                        format!(
                            "expected 'in' or 'matches' after 'not', found {}",
                            other.describe()
                        ),
                        next.span,
                    )),
                }
            }
            Token::Is => {
                self.next_token()?;
                let negated = self.eat(&Token::Not);
                let null_tok = self.next_token()?;
                if null_tok.token != Token::Null {
                    return Err(ParseError::new(
                        format!(
                            "expected 'null' after 'is', found {}",
                            null_tok.token.describe()
                        ),
                        null_tok.span,
                    ));
                }
                let span = left.span.merge(null_tok.span);
                Ok(Expr::new(
                    ExprKind::IsNull {
                        operand: Box::new(left),
                        negated,
                    },
                    span,
                ))
            }
            _ => Ok(left),
        }
    }

    fn finish_in(&mut self, needle: Expr, negated: bool) -> Result<Expr, ParseError> {
        let haystack = self.parse_additive()?;
        let span = needle.span.merge(haystack.span);
        Ok(Expr::new(
            ExprKind::In {
                needle: Box::new(needle),
                haystack: Box::new(haystack),
                negated,
            },
            span,
        ))
    }

    fn finish_matches(&mut self, operand: Expr, negated: bool) -> Result<Expr, ParseError> {
        let pattern = self.parse_string_literal()?;
        let span = operand.span.merge(pattern.span);
        Ok(Expr::new(
            ExprKind::Matches {
                operand: Box::new(operand),
                pattern,
                negated,
            },
            span,
        ))
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().map(|t| &t.token) {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.next_token()?;
            self.descend()?;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek().map(|t| &t.token) {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.next_token()?;
            self.descend()?;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.check(&Token::Minus) {
            let start = self.next_token()?.span;
            let base = self.descend()?;
            let operand = self.parse_unary()?;
            self.depth = base;
            let span = start.merge(operand.span);
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let mut expr = self.parse_primary()?;

        loop {
            let token = self.peek().map(|t| t.token.clone());
            if matches!(token, Some(Token::Dot | Token::SafeDot | Token::LBracket)) {
                self.descend()?;
            }
            let null_safe = match token {
                Some(Token::Dot) => false,
                Some(Token::SafeDot) => true,
                Some(Token::LBracket) => {
                    self.next_token()?;
                    let index = self.parse_or()?;
                    let close = self.expect_token(Token::RBracket)?;
                    let span = expr.span.merge(close.span);
                    expr = Expr::new(
                        ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                    continue;
                }
                _ => break,
            };
            self.next_token()?;
            let field = self.expect_ident()?;
            let span = expr.span.merge(field.span);
            expr = Expr::new(
                ExprKind::Member {
                    object: Box::new(expr),
                    field,
                    null_safe,
                },
                span,
            );
        }

        self.depth = base;
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.next_token()?;
        let span = tok.span;

        let kind = match tok.token {
            Token::Null => ExprKind::Literal(Literal::Null),
            Token::True => ExprKind::Literal(Literal::Bool(true)),
            Token::False => ExprKind::Literal(Literal::Bool(false)),
            Token::Int(i) => ExprKind::Literal(Literal::Int(i)),
            Token::Float(f) => ExprKind::Literal(Literal::Float(f)),
            Token::String(s) | Token::StringSingle(s) => ExprKind::Literal(Literal::String(s)),
            Token::Ident(name) => {
                if self.check(&Token::LParen) {
                    return self.parse_call(Spanned::new(name, span));
                }
                ExprKind::Ident(name)
            }
            Token::Hash => {
                let name = self.expect_ident()?;
                return Ok(Expr::new(
                    ExprKind::Variable(name.value),
                    span.merge(name.span),
                ));
            }
            Token::LParen => {
                let inner = self.parse_or()?;
                let close = self.expect_token(Token::RParen)?;
                return Ok(Expr::new(inner.kind, span.merge(close.span)));
            }
            Token::LBracket => {
                let (items, close) = self.parse_list_items(Token::RBracket)?;
                return Ok(Expr::new(ExprKind::List(items), span.merge(close)));
            }
            other => {
                return Err(ParseError::new(
                    format!("expected a value, found {}", other.describe()),
                    span,
                ))
            }
        };

        Ok(Expr::new(kind, span))
    }

    fn parse_call(&mut self, name: Spanned<String>) -> Result<Expr, ParseError> {
        self.expect_token(Token::LParen)?;
        let (args, close) = self.parse_list_items(Token::RParen)?;
        let span = name.span.merge(close);
        Ok(Expr::new(ExprKind::Call { name, args }, span))
    }

    /// Parse comma-separated expressions up to and including `close`.
    fn parse_list_items(&mut self, close: Token) -> Result<(Vec<Expr>, Span), ParseError> {
        let mut items = Vec::new();

        if self.check(&close) {
            let end = self.next_token()?.span;
            return Ok((items, end));
        }

        items.push(self.parse_or()?);
        while self.eat(&Token::Comma) {
            items.push(self.parse_or()?);
        }

        let end = self.expect_token(close)?.span;
        Ok((items, end))
    }

    fn parse_string_literal(&mut self) -> Result<Spanned<String>, ParseError> {
        let tok = self.next_token()?;
        match tok.token {
            Token::String(s) | Token::StringSingle(s) => Ok(Spanned::new(s, tok.span)),
            other => Err(ParseError::new(
                format!("expected string literal, found {}", other.describe()),
                tok.span,
            )),
        }
    }

    fn expect_ident(&mut self) -> Result<Spanned<String>, ParseError> {
        let tok = self.next_token()?;
        match tok.token {
            Token::Ident(name) => Ok(Spanned::new(name, tok.span)),
            other => Err(ParseError::new(
                format!("expected identifier, found {}", other.describe()),
                tok.span,
            )),
        }
    }

    fn expect_token(&mut self, expected: Token) -> Result<SpannedToken, ParseError> {
        let tok = self.next_token()?;
        if std::mem::discriminant(&tok.token) == std::mem::discriminant(&expected) {
            Ok(tok)
        } else {
            Err(ParseError::new(
                format!("expected {:?}, found {}", expected, tok.token.describe()),
                tok.span,
            ))
        }
    }

    /// Go one level deeper, returning the depth to restore afterwards.
    fn descend(&mut self) -> Result<usize, ParseError> {
        let base = self.depth;
        self.depth += 1;
        if self.depth > MAX_NESTING {
            let span = self
                .peek()
                .map(|t| t.span)
                .unwrap_or_else(|| Span::eof(self.source));
            return Err(ParseError::new(
                format!("expression is nested more than {MAX_NESTING} levels deep"),
                span,
            )
            .with_hint("split the condition into several constraints"));
        }
        Ok(base)
    }

    fn peek(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn check(&self, expected: &Token) -> bool {
        self.peek().is_some_and(|t| &t.token == expected)
    }

    /// Consume the next token if it equals `expected`.
    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Get the next token or error if EOF.
    fn next_token(&mut self) -> Result<SpannedToken, ParseError> {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| ParseError::new("unexpected end of input", Span::eof(self.source)))?;
        self.pos += 1;
        Ok(tok)
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let span = left.span.merge(right.span);
    Expr::new(
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    )
}

/// Attach hints for the usual suspects from other expression languages.
fn annotate_lex_error(err: ParseError, source: &str) -> ParseError {
    match err.span.snippet(source) {
        Some("=") => err.with_hint("use '==' for equality comparison"),
        Some("&") => err.with_hint("use '&&' or 'and' for logical and"),
        Some("|") => err.with_hint("use '||' or 'or' for logical or"),
        _ => err,
    }
}

/// Parse a source string into an expression tree.
pub fn parse(source: &str) -> Result<Expr, ParseError> {
    Parser::new(source)?.parse_expression()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kind(source: &str) -> ExprKind {
        parse(source).unwrap().kind
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        for source in [
            format!("{}value{}", "(".repeat(5000), ")".repeat(5000)),
            format!("{}true", "!".repeat(5000)),
            format!("{}1", "-".repeat(5000)),
            format!("1{}", " + 1".repeat(5000)),
            format!("a{}", ".b".repeat(5000)),
        ] {
            let err = parse(&source).unwrap_err();
            assert!(err.message.contains("nested more than"), "{}", err.message);
        }
    }

    #[test]
    fn test_moderate_nesting_is_accepted() {
        let source = format!("{}value{} > 0", "(".repeat(20), ")".repeat(20));
        assert!(parse(&source).is_ok());
        assert!(parse(&format!("1{} > 0", " + 1".repeat(60))).is_ok());
    }

    #[test]
    fn test_parse_simple_comparison() {
        match kind("value > 0") {
            ExprKind::Binary { op, left, right } => {
                assert_eq!(op, BinaryOp::Gt);
                assert_eq!(left.kind, ExprKind::Ident("value".to_string()));
                assert_eq!(right.kind, ExprKind::Literal(Literal::Int(0)));
            }
            other => panic!("expected Binary, got {:?}", other),
        }
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        match kind("a == 1 || b == 2 && c == 3") {
            ExprKind::Binary { op, right, .. } => {
                assert_eq!(op, BinaryOp::Or);
                assert!(matches!(
                    right.kind,
                    ExprKind::Binary {
                        op: BinaryOp::And,
                        ..
                    }
                ));
            }
            other => panic!("expected Or, got {:?}", other),
        }
    }

    #[test]
    fn test_member_chain_and_span() {
        let expr = parse("root.owner.name").unwrap();
        assert_eq!(expr.span, Span::new(0, 15));
        match expr.kind {
            ExprKind::Member { object, field, null_safe } => {
                assert_eq!(field.value, "name");
                assert!(!null_safe);
                assert!(matches!(object.kind, ExprKind::Member { .. }));
            }
            other => panic!("expected Member, got {:?}", other),
        }
    }

    #[test]
    fn test_arithmetic_precedence() {
        match kind("a + b * 2 > 10") {
            ExprKind::Binary { op: BinaryOp::Gt, left, .. } => match left.kind {
                ExprKind::Binary { op, right, .. } => {
                    assert_eq!(op, BinaryOp::Add);
                    assert!(matches!(
                        right.kind,
                        ExprKind::Binary {
                            op: BinaryOp::Mul,
                            ..
                        }
                    ));
                }
                other => panic!("expected Add, got {:?}", other),
            },
            other => panic!("expected Gt, got {:?}", other),
        }
    }

    #[test]
    fn test_not_in_list() {
        match kind("status not in ['DELETED', 'ARCHIVED']") {
            ExprKind::In { haystack, negated, .. } => {
                assert!(negated);
                match haystack.kind {
                    ExprKind::List(items) => assert_eq!(items.len(), 2),
                    other => panic!("expected List, got {:?}", other),
                }
            }
            other => panic!("expected In, got {:?}", other),
        }
    }

    #[test]
    fn test_is_not_null() {
        assert!(matches!(
            kind("root.end is not null"),
            ExprKind::IsNull { negated: true, .. }
        ));
    }

    #[test]
    fn test_matches_and_call() {
        assert!(matches!(
            kind(r#"value matches "^[A-Z]+$""#),
            ExprKind::Matches { negated: false, .. }
        ));
        match kind("len(trim(value))") {
            ExprKind::Call { name, args } => {
                assert_eq!(name.value, "len");
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected Call, got {:?}", other),
        }
    }

    #[test]
    fn test_variables_and_indexing() {
        match kind("#root.items[0]?.code") {
            ExprKind::Member { object, null_safe, .. } => {
                assert!(null_safe);
                assert!(matches!(object.kind, ExprKind::Index { .. }));
            }
            other => panic!("expected Member, got {:?}", other),
        }
    }

    #[test]
    fn test_chained_comparison_is_rejected() {
        let err = parse("1 < value < 10").unwrap_err();
        assert!(err.message.contains("after end of expression"));
    }

    #[test]
    fn test_single_equals_hint() {
        let err = parse("value = 3").unwrap_err();
        assert_eq!(err.hint.as_deref(), Some("use '==' for equality comparison"));
    }

    #[test]
    fn test_empty_and_truncated_input() {
        assert_eq!(parse("   ").unwrap_err().message, "empty expression");
        assert_eq!(parse("value >").unwrap_err().message, "unexpected end of input");
        assert!(parse("(value > 1").is_err());
    }
}
