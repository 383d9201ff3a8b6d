//! Token definitions for the expression grammar
//!
//! Tokens are defined with the logos derive macro. Sentinel tokens written
//! by the guard module lex as a single token and are resolved into
//! identifier-like or string-like tokens before parsing, depending on the
//! sentinel kind.

use std::fmt;

use crate::stencil::expr::ast::ExprError;
use logos::Logos;

/// All tokens of the expression grammar
#[derive(Logos, Debug, Clone, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    #[regex(r"[0-9]+(?:\.[0-9]+)?", |lex| lex.slice().to_owned())]
    Number(String),

    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("nil")]
    Nil,

    #[regex(r"[\p{L}_][\p{L}\p{N}_]*", |lex| lex.slice().to_owned())]
    Ident(String),

    // Declared variables keep their `$` prefix
    #[regex(r"\$[\p{L}_][\p{L}\p{N}_]*", |lex| lex.slice().to_owned())]
    Var(String),

    // A serialized sentinel from the guard module; resolved by `lex`
    #[regex(r"\u{e000}[a-z][0-9]+\u{e001}", |lex| lex.slice().to_owned())]
    Sentinel(String),

    #[regex(r#""(?:[^"\\]|\\.)*""#, |lex| lex.slice().to_owned())]
    Str(String),

    #[token("...")]
    Ellipsis,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
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
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(s) => write!(f, "{}", s),
            Token::True => f.write_str("true"),
            Token::False => f.write_str("false"),
            Token::Nil => f.write_str("nil"),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Var(s) => write!(f, "{}", s),
            Token::Sentinel(s) => write!(f, "{}", s),
            Token::Str(s) => write!(f, "{}", s),
            Token::Ellipsis => f.write_str("..."),
            Token::Dot => f.write_str("."),
            Token::Comma => f.write_str(","),
            Token::Colon => f.write_str(":"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::LBracket => f.write_str("["),
            Token::RBracket => f.write_str("]"),
            Token::EqEq => f.write_str("=="),
            Token::NotEq => f.write_str("!="),
            Token::Le => f.write_str("<="),
            Token::Ge => f.write_str(">="),
            Token::Shl => f.write_str("<<"),
            Token::Shr => f.write_str(">>"),
            Token::AndAnd => f.write_str("&&"),
            Token::OrOr => f.write_str("||"),
            Token::Lt => f.write_str("<"),
            Token::Gt => f.write_str(">"),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::Percent => f.write_str("%"),
            Token::Bang => f.write_str("!"),
            Token::Amp => f.write_str("&"),
            Token::Pipe => f.write_str("|"),
            Token::Caret => f.write_str("^"),
        }
    }
}

/// Tokenize an expression fragment.
///
/// Sentinels are resolved here: reserved-word sentinels behave like
/// identifiers (they take the global prefix, selectors apply), protected
/// string and raw-literal sentinels behave like string literals (emitted
/// verbatim, restored later).
pub fn lex(text: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(text).spanned() {
        match result {
            Ok(token) => tokens.push(resolve_sentinel(token)),
            Err(()) => {
                return Err(ExprError::new(format!(
                    "unexpected character at offset {}",
                    span.start
                )))
            }
        }
    }
    Ok(tokens)
}

fn resolve_sentinel(token: Token) -> Token {
    match token {
        Token::Sentinel(text) => {
            let kind = text.chars().nth(1).unwrap_or('s');
            match kind {
                's' | 'm' => Token::Str(text),
                _ => Token::Ident(text),
            }
        }
        other => other,
    }
}
