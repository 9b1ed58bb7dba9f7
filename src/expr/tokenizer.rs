//! logos-based expression tokenizer.
//!
//! Token priority in logos is determined by:
//! 1. Longest match wins (e.g. `===` beats `==` beats `=`)
//! 2. For equal length matches, earlier-defined variants win
//!
//! Keywords (`true`, `null`, ...) lex as [`Token::Ident`]; the parser
//! classifies them.

use logos::Logos;

/// Expression token produced by the lexer.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\n\r\f]+")]
pub enum Token {
    // ── Literals and names ───────────────────────────────────────────

    /// Number: integer or decimal, optional exponent.
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?")]
    Number,

    /// Double-quoted string with backslash escapes.
    #[regex(r#""([^"\\]|\\.)*""#)]
    DoubleQuoted,

    /// Single-quoted string with backslash escapes.
    #[regex(r"'([^'\\]|\\.)*'")]
    SingleQuoted,

    /// Identifier: `count`, `$el`, `_private`.
    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*")]
    Ident,

    // ── Multi-character operators ────────────────────────────────────

    #[token("===")]
    StrictEq,
    #[token("!==")]
    StrictNe,
    #[token("==")]
    Eq,
    #[token("!=")]
    Ne,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,

    // ── Single-character punctuation ─────────────────────────────────

    #[token("=")]
    Assign,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("!")]
    Bang,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token("{")]
    BraceOpen,
    #[token("}")]
    BraceClose,
}

/// A token with its source text and byte offset.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub text: String,
    pub offset: usize,
}

/// Tokenize an expression.
///
/// Returns the byte offset of the first character that fails to lex.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, usize> {
    Token::lexer(input)
        .spanned()
        .map(|(result, span)| match result {
            Ok(token) => Ok(Spanned {
                token,
                text: input[span.clone()].to_string(),
                offset: span.start,
            }),
            Err(()) => Err(span.start),
        })
        .collect()
}
