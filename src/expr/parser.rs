//! Recursive descent expression parser.
//!
//! Parses expression text into an [`Expr`]. Uses the logos-based tokenizer
//! from [`crate::expr::tokenizer`]. Precedence, loosest first:
//! `;`, assignment, `?:`, `||`, `&&`, equality, relational, additive,
//! multiplicative, unary, postfix (`.`, `[]`, `()`).

use crate::expr::ast::*;
use crate::expr::tokenizer::{tokenize, Spanned, Token};

/// Errors from expression parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected token at position {position}: {message}")]
    UnexpectedToken { position: usize, message: String },
    #[error("unexpected end of input: {0}")]
    UnexpectedEof(String),
    #[error("invalid character at position {0}")]
    InvalidCharacter(usize),
}

/// Parse an expression string.
pub fn parse_expression(input: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(input).map_err(ParseError::InvalidCharacter)?;
    let mut parser = Parser { tokens, cursor: 0 };
    let expr = parser.parse_sequence()?;
    if let Some(tok) = parser.peek() {
        return Err(ParseError::UnexpectedToken {
            position: tok.offset,
            message: format!("expected end of expression, found '{}'", tok.text),
        });
    }
    Ok(expr)
}

/// Recursive descent parser state.
struct Parser {
    tokens: Vec<Spanned>,
    cursor: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.cursor)
    }

    fn peek_token(&self) -> Option<Token> {
        self.peek().map(|t| t.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let tok = self.tokens.get(self.cursor).cloned();
        if tok.is_some() {
            self.cursor += 1;
        }
        tok
    }

    /// Consume the next token if it matches.
    fn eat(&mut self, token: Token) -> bool {
        if self.peek_token() == Some(token) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<Spanned, ParseError> {
        match self.advance() {
            Some(tok) if tok.token == token => Ok(tok),
            Some(tok) => Err(ParseError::UnexpectedToken {
                position: tok.offset,
                message: format!("expected {what}, found '{}'", tok.text),
            }),
            None => Err(ParseError::UnexpectedEof(format!("expected {what}"))),
        }
    }

    // ── Grammar ─────────────────────────────────────────────────────────

    fn parse_sequence(&mut self) -> Result<Expr, ParseError> {
        let mut items = Vec::new();
        loop {
            // Tolerate empty statements: `a;` and `;a`.
            while self.eat(Token::Semicolon) {}
            if self.peek().is_none() {
                break;
            }
            items.push(self.parse_assignment()?);
            if !self.eat(Token::Semicolon) {
                break;
            }
        }
        match items.len() {
            0 => Err(ParseError::UnexpectedEof("empty expression".into())),
            1 => Ok(items.remove(0)),
            _ => Ok(Expr::Sequence(items)),
        }
    }

    fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        let target = self.parse_conditional()?;
        let op = match self.peek_token() {
            Some(Token::Assign) => AssignOp::Set,
            Some(Token::PlusAssign) => AssignOp::Add,
            Some(Token::MinusAssign) => AssignOp::Sub,
            _ => return Ok(target),
        };
        let Some(tok) = self.advance() else {
            return Ok(target);
        };
        if !target.is_assignable() {
            return Err(ParseError::UnexpectedToken {
                position: tok.offset,
                message: "invalid assignment target".into(),
            });
        }
        let value = self.parse_assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let test = self.parse_or()?;
        if !self.eat(Token::Question) {
            return Ok(test);
        }
        let consequent = self.parse_assignment()?;
        self.expect(Token::Colon, "':'")?;
        let alternate = self.parse_assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat(Token::Or) {
            let right = self.parse_and()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;
        while self.eat(Token::And) {
            let right = self.parse_equality()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// One left-associative binary level.
    fn parse_binary_level(
        &mut self,
        ops: &[(Token, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut left = next(self)?;
        'outer: loop {
            for &(token, op) in ops {
                if self.eat(token) {
                    let right = next(self)?;
                    left = Expr::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(
            &[
                (Token::StrictEq, BinaryOp::StrictEq),
                (Token::StrictNe, BinaryOp::StrictNe),
                (Token::Eq, BinaryOp::Eq),
                (Token::Ne, BinaryOp::Ne),
            ],
            Self::parse_relational,
        )
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(
            &[
                (Token::Lt, BinaryOp::Lt),
                (Token::Gt, BinaryOp::Gt),
                (Token::Le, BinaryOp::Le),
                (Token::Ge, BinaryOp::Ge),
            ],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(
            &[(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Sub)],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(
            &[
                (Token::Star, BinaryOp::Mul),
                (Token::Slash, BinaryOp::Div),
                (Token::Percent, BinaryOp::Rem),
            ],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek_token() {
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            _ => return self.parse_postfix(),
        };
        self.cursor += 1;
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(Token::Dot) {
                let name = self.expect(Token::Ident, "property name")?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: name.text,
                };
            } else if self.eat(Token::BracketOpen) {
                let index = self.parse_assignment()?;
                self.expect(Token::BracketClose, "']'")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.eat(Token::ParenOpen) {
                let args = self.parse_list(Token::ParenClose, "')'")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma-separated expressions up to `close` (consumed). Trailing comma allowed.
    fn parse_list(&mut self, close: Token, what: &str) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                return Ok(items);
            }
            items.push(self.parse_assignment()?);
            if !self.eat(Token::Comma) {
                self.expect(close, what)?;
                return Ok(items);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let Some(tok) = self.advance() else {
            return Err(ParseError::UnexpectedEof("expected expression".into()));
        };
        match tok.token {
            Token::Number => tok
                .text
                .parse::<f64>()
                .map(|n| Expr::Literal(Literal::Number(n)))
                .map_err(|_| ParseError::UnexpectedToken {
                    position: tok.offset,
                    message: format!("invalid number '{}'", tok.text),
                }),
            Token::DoubleQuoted | Token::SingleQuoted => {
                Ok(Expr::Literal(Literal::String(unquote(&tok.text).into())))
            }
            Token::Ident => Ok(match tok.text.as_str() {
                "true" => Expr::Literal(Literal::Bool(true)),
                "false" => Expr::Literal(Literal::Bool(false)),
                "null" => Expr::Literal(Literal::Null),
                "undefined" => Expr::Literal(Literal::Undefined),
                _ => Expr::Ident {
                    name: tok.text,
                    local: false,
                },
            }),
            Token::ParenOpen => {
                let inner = self.parse_sequence()?;
                self.expect(Token::ParenClose, "')'")?;
                Ok(inner)
            }
            Token::BracketOpen => Ok(Expr::Array(self.parse_list(Token::BracketClose, "']'")?)),
            Token::BraceOpen => self.parse_object(),
            _ => Err(ParseError::UnexpectedToken {
                position: tok.offset,
                message: format!("unexpected '{}'", tok.text),
            }),
        }
    }

    /// Object literal body after `{`. Keys are identifiers, strings or numbers.
    fn parse_object(&mut self) -> Result<Expr, ParseError> {
        let mut props = Vec::new();
        loop {
            if self.eat(Token::BraceClose) {
                return Ok(Expr::Object(props));
            }
            let Some(key) = self.advance() else {
                return Err(ParseError::UnexpectedEof("expected property name".into()));
            };
            let name = match key.token {
                Token::Ident | Token::Number => key.text,
                Token::DoubleQuoted | Token::SingleQuoted => unquote(&key.text),
                _ => {
                    return Err(ParseError::UnexpectedToken {
                        position: key.offset,
                        message: format!("expected property name, found '{}'", key.text),
                    })
                }
            };
            self.expect(Token::Colon, "':'")?;
            let value = self.parse_assignment()?;
            props.push((name, value));
            if !self.eat(Token::Comma) {
                self.expect(Token::BraceClose, "'}'")?;
                return Ok(Expr::Object(props));
            }
        }
    }
}

/// Strip the surrounding quotes and resolve backslash escapes.
fn unquote(raw: &str) -> String {
    let inner = raw.get(1..raw.len().saturating_sub(1)).unwrap_or_default();
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
