//! Operator-precedence parser over the token stream.

use super::ast::{BinaryOp, Expr, Property, UnaryOp};
use super::lexer::{Token, TokenKind};
use crate::error::ParseError;
use crate::value::{format_number, Value};

/// Parse a full token stream into a single expression.
pub(crate) fn parse_tokens(tokens: &[Token], max_depth: usize) -> Result<Expr, ParseError> {
    if tokens.is_empty() {
        return Err(ParseError::UnexpectedEnd);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        max_depth,
    };
    let expr = parser.parse_expression()?;

    match parser.current() {
        None => Ok(expr),
        Some(token) => Err(ParseError::UnexpectedToken {
            expected: "end of expression".to_string(),
            found: token.kind.to_string(),
            offset: token.offset,
        }),
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    fn current(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn current_kind(&self) -> Option<&'a TokenKind> {
        self.current().map(|t| &t.kind)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ParseError> {
        match self.current() {
            Some(token) if token.kind == kind => {
                self.advance();
                Ok(())
            }
            Some(token) => Err(ParseError::UnexpectedToken {
                expected: kind.to_string(),
                found: token.kind.to_string(),
                offset: token.offset,
            }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    /// Guard one level of nesting.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= self.max_depth {
            return Err(ParseError::DepthExceeded {
                limit: self.max_depth,
            });
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.nested(|p| p.parse_binary(0))
    }

    fn parse_binary(&mut self, min_precedence: u8) -> Result<Expr, ParseError> {
        let mut left = self.parse_operand()?;

        while let Some(op) = self.current_kind().and_then(binary_op) {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.advance();

            let right = if op.is_right_associative() {
                self.nested(|p| p.parse_binary(precedence))?
            } else {
                self.parse_binary(precedence + 1)?
            };
            left = Expr::binary(op, left, right);
        }

        Ok(left)
    }

    /// A unary expression followed by any ternary suffixes.
    ///
    /// `?:` binds tighter than every binary operator: its condition is the
    /// operand immediately before `?`.
    fn parse_operand(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_unary()?;

        while self.current_kind() == Some(&TokenKind::Question) {
            self.advance();
            let consequent = self.parse_expression()?;
            self.expect(TokenKind::Colon)?;
            let alternate = self.parse_expression()?;
            expr = Expr::Ternary {
                condition: Box::new(expr),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            };
        }

        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.current_kind() {
            Some(TokenKind::Bang) => UnaryOp::Not,
            Some(TokenKind::Minus) => UnaryOp::Negate,
            Some(TokenKind::Plus) => UnaryOp::Plus,
            Some(TokenKind::Tilde) => UnaryOp::BitNot,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.nested(|p| p.parse_unary())?;
        Ok(Expr::unary(op, operand))
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.current_kind() {
                Some(TokenKind::Dot) => {
                    self.advance();
                    let name = self.property_name()?;
                    expr = Expr::member(expr, Property::Static(name));
                }
                Some(TokenKind::LBracket) => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Expr::member(expr, Property::Computed(Box::new(index)));
                }
                Some(TokenKind::LParen) => {
                    self.advance();
                    let args = self.parse_list(TokenKind::RParen)?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn property_name(&mut self) -> Result<String, ParseError> {
        let token = self.current().ok_or(ParseError::UnexpectedEnd)?;
        let name = match &token.kind {
            TokenKind::Ident(name) => name.clone(),
            TokenKind::Number(n) => format_number(*n),
            // Keywords are valid property names: `flags.null`.
            TokenKind::True => "true".to_string(),
            TokenKind::False => "false".to_string(),
            TokenKind::Null => "null".to_string(),
            TokenKind::Undefined => "undefined".to_string(),
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "property name".to_string(),
                    found: other.to_string(),
                    offset: token.offset,
                })
            }
        };
        self.advance();
        Ok(name)
    }

    /// Comma-separated expressions up to and including `close`.
    fn parse_list(&mut self, close: TokenKind) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();

        if self.current_kind() == Some(&close) {
            self.advance();
            return Ok(items);
        }

        loop {
            items.push(self.parse_expression()?);
            match self.current() {
                Some(token) if token.kind == TokenKind::Comma => self.advance(),
                Some(token) if token.kind == close => {
                    self.advance();
                    return Ok(items);
                }
                Some(token) => {
                    return Err(ParseError::UnexpectedToken {
                        expected: format!("',' or {}", close),
                        found: token.kind.to_string(),
                        offset: token.offset,
                    })
                }
                None => return Err(ParseError::UnexpectedEnd),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.current().ok_or(ParseError::UnexpectedEnd)?;
        self.advance();

        let expr = match &token.kind {
            TokenKind::Number(n) => Expr::number(*n),
            TokenKind::Str(s) => Expr::Literal(Value::String(s.clone())),
            TokenKind::True => Expr::Literal(Value::Bool(true)),
            TokenKind::False => Expr::Literal(Value::Bool(false)),
            TokenKind::Null => Expr::Literal(Value::Null),
            TokenKind::Undefined => Expr::Literal(Value::Undefined),
            TokenKind::Ident(name) => Expr::Identifier(name.clone()),
            TokenKind::LParen => {
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                inner
            }
            TokenKind::LBracket => {
                let items = self.nested(|p| p.parse_list(TokenKind::RBracket))?;
                Expr::Array(items)
            }
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "expression".to_string(),
                    found: other.to_string(),
                    offset: token.offset,
                })
            }
        };

        Ok(expr)
    }
}

fn binary_op(kind: &TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::QuestionQuestion => BinaryOp::Coalesce,
        TokenKind::PipePipe => BinaryOp::Or,
        TokenKind::AmpAmp => BinaryOp::And,
        TokenKind::Pipe => BinaryOp::BitOr,
        TokenKind::Caret => BinaryOp::BitXor,
        TokenKind::Amp => BinaryOp::BitAnd,
        TokenKind::EqEq => BinaryOp::Eq,
        TokenKind::BangEq => BinaryOp::NotEq,
        TokenKind::EqEqEq => BinaryOp::StrictEq,
        TokenKind::BangEqEq => BinaryOp::StrictNotEq,
        TokenKind::Lt => BinaryOp::Lt,
        TokenKind::Gt => BinaryOp::Gt,
        TokenKind::LtEq => BinaryOp::LtEq,
        TokenKind::GtEq => BinaryOp::GtEq,
        TokenKind::LtLt => BinaryOp::Shl,
        TokenKind::GtGt => BinaryOp::Shr,
        TokenKind::GtGtGt => BinaryOp::UShr,
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Rem,
        TokenKind::StarStar => BinaryOp::Pow,
        _ => return None,
    };
    Some(op)
}

#[cfg(test)]
mod tests {
    use super::super::lexer::tokenize;
    use super::*;

    fn parse(source: &str) -> Result<Expr, ParseError> {
        parse_tokens(&tokenize(source)?, 100)
    }

    fn ident(name: &str) -> Expr {
        Expr::identifier(name)
    }

    #[test]
    fn test_precedence() {
        let expr = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::binary(
                BinaryOp::Add,
                Expr::number(1.0),
                Expr::binary(BinaryOp::Mul, Expr::number(2.0), Expr::number(3.0)),
            )
        );

        let expr = parse("a ?? b || c").unwrap();
        assert_eq!(
            expr,
            Expr::binary(
                BinaryOp::Coalesce,
                ident("a"),
                Expr::binary(BinaryOp::Or, ident("b"), ident("c")),
            )
        );
    }

    #[test]
    fn test_left_and_right_associativity() {
        let expr = parse("10 - 4 - 3").unwrap();
        assert_eq!(
            expr,
            Expr::binary(
                BinaryOp::Sub,
                Expr::binary(BinaryOp::Sub, Expr::number(10.0), Expr::number(4.0)),
                Expr::number(3.0),
            )
        );

        let expr = parse("2 ** 3 ** 2").unwrap();
        assert_eq!(
            expr,
            Expr::binary(
                BinaryOp::Pow,
                Expr::number(2.0),
                Expr::binary(BinaryOp::Pow, Expr::number(3.0), Expr::number(2.0)),
            )
        );
    }

    #[test]
    fn test_member_and_call_chain() {
        let expr = parse("player.items[0].name").unwrap();
        let expected = Expr::member(
            Expr::member(
                Expr::member(ident("player"), Property::Static("items".into())),
                Property::Computed(Box::new(Expr::number(0.0))),
            ),
            Property::Static("name".into()),
        );
        assert_eq!(expr, expected);

        let expr = parse("max(gold, 3)").unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                callee: Box::new(ident("max")),
                args: vec![ident("gold"), Expr::number(3.0)],
            }
        );
    }

    #[test]
    fn test_ternary_binds_tighter_than_binary() {
        let expr = parse("x > 1 ? a : b").unwrap();
        let Expr::Binary { op, right, .. } = expr else {
            panic!("expected binary at the root");
        };
        assert_eq!(op, BinaryOp::Gt);
        assert!(matches!(*right, Expr::Ternary { .. }));

        let expr = parse("(x > 1) ? a : b").unwrap();
        assert!(matches!(expr, Expr::Ternary { .. }));
    }

    #[test]
    fn test_unary_is_the_ternary_condition() {
        let expr = parse("!seen ? 'new' : 'old'").unwrap();
        let Expr::Ternary { condition, .. } = expr else {
            panic!("expected ternary at the root");
        };
        assert_eq!(*condition, Expr::unary(UnaryOp::Not, ident("seen")));
    }

    #[test]
    fn test_array_literal() {
        let expr = parse("[1, 'two', []]").unwrap();
        assert_eq!(
            expr,
            Expr::Array(vec![
                Expr::number(1.0),
                Expr::Literal(Value::string("two")),
                Expr::Array(vec![]),
            ])
        );
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(parse(""), Err(ParseError::UnexpectedEnd)));
        assert!(matches!(parse("1 +"), Err(ParseError::UnexpectedEnd)));
        assert!(matches!(parse("(1"), Err(ParseError::UnexpectedEnd)));
        assert!(matches!(parse("1 2"), Err(ParseError::UnexpectedToken { .. })));
        assert!(matches!(parse("a ? b"), Err(ParseError::UnexpectedEnd)));
        assert!(matches!(parse("f(1,)"), Err(ParseError::UnexpectedToken { .. })));
    }

    #[test]
    fn test_depth_limit() {
        let ok = format!("{}1{}", "(".repeat(99), ")".repeat(99));
        assert!(parse(&ok).is_ok());

        let deep = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert!(matches!(
            parse(&deep),
            Err(ParseError::DepthExceeded { limit: 100 })
        ));

        let unary_chain = format!("{}x", "!".repeat(500));
        assert!(matches!(
            parse(&unary_chain),
            Err(ParseError::DepthExceeded { .. })
        ));
    }
}
