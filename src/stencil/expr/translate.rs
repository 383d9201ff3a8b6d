//! Expression fragment translation
//!
//! The full pipeline for one recognized expression fragment:
//! 1. Protect single-line string literals so normalization cannot touch
//!    their contents
//! 2. Normalize Unicode operators and reserved words
//! 3. Parse with the general expression grammar
//! 4. Walk the AST into directive call syntax
//! 5. Restore protected literals and reserved spellings
//!
//! A parse failure never escapes in `Lenient` mode: the fragment comes back
//! unchanged so a later, more specific cascade rule can try it instead.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::stencil::expr::ast::ExprError;
use crate::stencil::expr::emit::emit;
use crate::stencil::expr::parser::{DefaultExpressionParser, ExpressionParser};
use crate::stencil::guard::{ProtectedLiteralBuffer, SentinelKind};

/// What to do when the fragment does not parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslateMode {
    /// Surface the parse failure to the caller
    Strict,
    /// Return the fragment unchanged and let a later rule attempt it
    Lenient,
}

/// Words the expression grammar would misread as structure when they appear
/// as data names; substituted with private tokens before parsing and
/// restored afterwards.
const RESERVED_WORDS: &[&str] = &[
    "if", "else", "range", "with", "define", "block", "end", "template",
];

static RESERVED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b(?:{})\b", RESERVED_WORDS.join("|"))).unwrap()
});

/// Unicode math operators accepted as alternate spellings
const UNICODE_OPERATORS: &[(char, &str)] = &[
    ('\u{2260}', "!="), // ≠
    ('\u{00f7}', "/"),  // ÷
    ('\u{2266}', "<="), // ≦
    ('\u{2267}', ">="), // ≧
    ('\u{00ab}', "<<"), // «
    ('\u{00bb}', ">>"), // »
];

/// Translate one expression fragment into directive call syntax
pub fn translate_expr(fragment: &str, mode: TranslateMode) -> Result<String, ExprError> {
    let trimmed = fragment.trim();
    if trimmed.is_empty() {
        return Err(ExprError::new("empty expression fragment"));
    }

    let mut buffer = ProtectedLiteralBuffer::new();
    let protected = match protect_strings(trimmed, &mut buffer) {
        Ok(text) => text,
        Err(err) => return lenient_or(mode, fragment, err),
    };
    let normalized = normalize(&protected, &mut buffer);

    let ast = match DefaultExpressionParser.parse(&normalized) {
        Ok(ast) => ast,
        Err(err) => return lenient_or(mode, fragment, err),
    };
    let emitted = match emit(&ast) {
        Ok(text) => text,
        Err(err) => return lenient_or(mode, fragment, err),
    };

    Ok(buffer.restore_all(&emitted))
}

fn lenient_or(mode: TranslateMode, fragment: &str, err: ExprError) -> Result<String, ExprError> {
    match mode {
        TranslateMode::Strict => Err(err),
        TranslateMode::Lenient => Ok(fragment.to_string()),
    }
}

/// Protect quoted spans; single-quoted strings are stored in the
/// double-quoted spelling the directive syntax accepts.
fn protect_strings(text: &str, buffer: &mut ProtectedLiteralBuffer) -> Result<String, ExprError> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices();
    while let Some((start, ch)) = chars.next() {
        if ch != '"' && ch != '\'' {
            out.push(ch);
            continue;
        }
        let mut content = String::new();
        let mut closed = false;
        let mut escaped = false;
        for (_, c) in chars.by_ref() {
            if escaped {
                content.push('\\');
                content.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == ch {
                closed = true;
                break;
            } else {
                content.push(c);
            }
        }
        if !closed {
            return Err(ExprError::new(format!(
                "unterminated string literal at offset {}",
                start
            )));
        }
        let stored = format!("\"{}\"", content);
        out.push_str(&buffer.protect(SentinelKind::StringLiteral, stored));
    }
    Ok(out)
}

/// Map Unicode operator spellings to ASCII and hide reserved words
fn normalize(text: &str, buffer: &mut ProtectedLiteralBuffer) -> String {
    let mut normalized = String::with_capacity(text.len());
    for ch in text.chars() {
        match UNICODE_OPERATORS.iter().find(|(u, _)| *u == ch) {
            Some((_, ascii)) => normalized.push_str(ascii),
            None => normalized.push(ch),
        }
    }
    RESERVED_RE
        .replace_all(&normalized, |caps: &regex::Captures| {
            buffer.protect(SentinelKind::ReservedWord, caps[0].to_string())
        })
        .into_owned()
}
