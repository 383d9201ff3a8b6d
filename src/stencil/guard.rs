//! Literal protection for the rewrite cascade
//!
//! Before any rewrite rule runs, fragile literal spans are replaced with
//! sentinel tokens so no rule can fire inside them; after the cascade the
//! substitution is reversed. Three span families are guarded:
//! 1. Multi-line raw literals (backquote-delimited) — extracted verbatim
//! 2. Pre-existing doubled markers (`@@`) — the escape spelling for one
//!    literal marker character
//! 3. Markers in email position (`user@example.com`) — a marker that cannot
//!    begin a directive
//!
//! A sentinel is an explicit `(kind, index)` token serialized into a
//! private-use codepoint frame. This module owns the serialization format;
//! nothing else in the crate constructs or parses sentinel text directly.
//!
//! Invariant: `restore(guard(text))` reproduces `text` exactly for every
//! input, including inputs with zero guarded spans.

use crate::stencil::delimiters::DelimiterSet;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Opens a serialized sentinel token
pub const SENTINEL_OPEN: char = '\u{e000}';

/// Closes a serialized sentinel token
pub const SENTINEL_CLOSE: char = '\u{e001}';

/// Internal marker appended to translated call names so later rules cannot
/// re-match them; stripped at the end of the rewrite pass.
pub const CALL_MARKER: char = '\u{e002}';

/// Matches any serialized sentinel: frame, kind character, index
static SENTINEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("\u{e000}([a-z])([0-9]+)\u{e001}").unwrap());

/// What a protected span was before it was replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelKind {
    /// A backquote-delimited raw literal, possibly spanning lines
    RawLiteral,
    /// A single-line quoted string inside an expression fragment
    StringLiteral,
    /// A reserved word substituted during expression normalization
    ReservedWord,
    /// A doubled marker written by the user (`@@`); restores verbatim
    EscapedMarker,
    /// An `EscapedMarker` consumed by the unescape rule; restores to one marker
    UnescapedMarker,
    /// A marker in email position; restores to the single original marker
    DoubledMarker,
}

impl SentinelKind {
    /// One-character wire code used in the serialized token
    pub fn code(self) -> char {
        match self {
            SentinelKind::RawLiteral => 'm',
            SentinelKind::StringLiteral => 's',
            SentinelKind::ReservedWord => 'r',
            SentinelKind::EscapedMarker => 'e',
            SentinelKind::UnescapedMarker => 'u',
            SentinelKind::DoubledMarker => 'd',
        }
    }
}

/// Errors raised while guarding literal spans
#[derive(Debug, Clone, PartialEq)]
pub enum GuardError {
    /// An opening backquote with no closing backquote; the span cannot be
    /// guarded and restored safely
    UnterminatedLiteral { position: usize },
}

impl fmt::Display for GuardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardError::UnterminatedLiteral { position } => {
                write!(f, "unterminated raw literal starting at byte {}", position)
            }
        }
    }
}

impl std::error::Error for GuardError {}

/// Ordered, append-only store of guarded literal spans.
///
/// Indices are monotonically increasing within one guard/restore cycle.
/// `restore_all` only rewrites sentinels whose kind code matches the entry
/// recorded at that index, so buffers from nested cycles (the expression
/// translator keeps its own) cannot clobber each other's tokens.
#[derive(Debug, Default)]
pub struct ProtectedLiteralBuffer {
    entries: Vec<(SentinelKind, String)>,
}

impl ProtectedLiteralBuffer {
    pub fn new() -> Self {
        ProtectedLiteralBuffer::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a literal span and return the sentinel token that replaces it
    pub fn protect(&mut self, kind: SentinelKind, text: String) -> String {
        let index = self.entries.len();
        self.entries.push((kind, text));
        format!("{}{}{}{}", SENTINEL_OPEN, kind.code(), index, SENTINEL_CLOSE)
    }

    /// Reverse every sentinel owned by this buffer.
    ///
    /// A sentinel whose index or kind does not match a recorded entry is
    /// left in place: it belongs to another cycle, or it is a defect the
    /// caller should surface rather than silently paper over.
    pub fn restore_all(&self, text: &str) -> String {
        SENTINEL_RE
            .replace_all(text, |caps: &regex::Captures| {
                let kind_code = caps[1].chars().next().unwrap();
                let index: usize = match caps[2].parse() {
                    Ok(index) => index,
                    Err(_) => return caps[0].to_string(),
                };
                match self.entries.get(index) {
                    // The unescape rule swaps 'e' to 'u' in the text; the
                    // stored doubled marker collapses to a single marker.
                    Some((SentinelKind::EscapedMarker, stored)) if kind_code == 'u' => {
                        stored[..stored.len() / 2].to_string()
                    }
                    Some((kind, stored)) if kind.code() == kind_code => stored.clone(),
                    _ => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// True if `text` still carries a sentinel this buffer owns
    pub fn has_unrestored(&self, text: &str) -> bool {
        SENTINEL_RE.captures_iter(text).any(|caps| {
            let kind_code = caps[1].chars().next().unwrap();
            let index: usize = match caps[2].parse() {
                Ok(index) => index,
                Err(_) => return false,
            };
            matches!(self.entries.get(index), Some((kind, _))
                if kind.code() == kind_code || (kind_code == 'u' && kind.code() == 'e'))
        })
    }
}

/// Guard every fragile literal span in `text`.
///
/// Returns the protected text and the buffer needed to reverse it.
pub fn guard(
    text: &str,
    delimiters: &DelimiterSet,
) -> Result<(String, ProtectedLiteralBuffer), GuardError> {
    let mut buffer = ProtectedLiteralBuffer::new();
    let text = protect_raw_literals(text, &mut buffer)?;
    let text = protect_escaped_markers(&text, delimiters, &mut buffer);
    let text = protect_mail_markers(&text, delimiters, &mut buffer);
    Ok((text, buffer))
}

/// Reverse a previous `guard` call
pub fn restore(text: &str, buffer: &ProtectedLiteralBuffer) -> String {
    buffer.restore_all(text)
}

/// Extract backquote-delimited raw literals verbatim
fn protect_raw_literals(
    text: &str,
    buffer: &mut ProtectedLiteralBuffer,
) -> Result<String, GuardError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut offset = 0;
    while let Some(start) = rest.find('`') {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 1..];
        match after_open.find('`') {
            Some(end) => {
                let literal = &rest[start..start + 1 + end + 1];
                out.push_str(&buffer.protect(SentinelKind::RawLiteral, literal.to_string()));
                rest = &after_open[end + 1..];
                offset += start + 1 + end + 1;
            }
            None => {
                return Err(GuardError::UnterminatedLiteral {
                    position: offset + start,
                });
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Replace pre-existing doubled markers with escaped-marker sentinels
fn protect_escaped_markers(
    text: &str,
    delimiters: &DelimiterSet,
    buffer: &mut ProtectedLiteralBuffer,
) -> String {
    let doubled = delimiters.doubled_marker();
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(&doubled) {
        out.push_str(&rest[..pos]);
        out.push_str(&buffer.protect(SentinelKind::EscapedMarker, doubled.clone()));
        rest = &rest[pos + doubled.len()..];
    }
    out.push_str(rest);
    out
}

/// Neutralize markers in email position so they can never begin a directive
fn protect_mail_markers(
    text: &str,
    delimiters: &DelimiterSet,
    buffer: &mut ProtectedLiteralBuffer,
) -> String {
    let pattern = format!(
        r"(?P<local>[A-Za-z0-9._%+\-]+){}(?P<domain>[A-Za-z0-9.\-]+\.[A-Za-z]{{2,}})",
        regex::escape(&delimiters.marker)
    );
    let mail = Regex::new(&pattern).expect("mail pattern is valid for every marker");
    mail.replace_all(text, |caps: &regex::Captures| {
        format!(
            "{}{}{}",
            &caps["local"],
            buffer.protect(SentinelKind::DoubledMarker, delimiters.marker.clone()),
            &caps["domain"]
        )
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(input: &str) -> String {
        let delims = DelimiterSet::default();
        let (guarded, buffer) = guard(input, &delims).expect("guard should succeed");
        restore(&guarded, &buffer)
    }

    #[test]
    fn test_roundtrip_plain_text() {
        let input = "nothing to protect here";
        assert_eq!(roundtrip(input), input);
    }

    #[test]
    fn test_roundtrip_empty() {
        assert_eq!(roundtrip(""), "");
    }

    #[test]
    fn test_roundtrip_raw_literal() {
        let input = "before `raw\nmulti-line\nliteral` after";
        assert_eq!(roundtrip(input), input);
    }

    #[test]
    fn test_roundtrip_doubled_marker() {
        let input = "a literal @@ marker";
        assert_eq!(roundtrip(input), input);
    }

    #[test]
    fn test_roundtrip_email() {
        let input = "contact us at support@example.com today";
        assert_eq!(roundtrip(input), input);
    }

    #[test]
    fn test_roundtrip_everything_at_once() {
        let input = "x@@y plus `lit@eral` plus admin@host.org plus @directive";
        assert_eq!(roundtrip(input), input);
    }

    #[test]
    fn test_raw_literal_hides_marker() {
        let delims = DelimiterSet::default();
        let (guarded, _) = guard("`a @marker inside`", &delims).unwrap();
        assert!(!guarded.contains('@'));
        assert!(guarded.starts_with(SENTINEL_OPEN));
    }

    #[test]
    fn test_email_marker_is_hidden() {
        let delims = DelimiterSet::default();
        let (guarded, _) = guard("ping admin@host.org now", &delims).unwrap();
        assert!(!guarded.contains('@'));
    }

    #[test]
    fn test_directive_marker_survives_guarding() {
        let delims = DelimiterSet::default();
        let (guarded, _) = guard("hello @name", &delims).unwrap();
        assert!(guarded.contains("@name"));
    }

    #[test]
    fn test_unterminated_literal_is_fatal() {
        let delims = DelimiterSet::default();
        let err = guard("text with one ` backquote", &delims).unwrap_err();
        assert!(matches!(err, GuardError::UnterminatedLiteral { .. }));
    }

    #[test]
    fn test_unescape_kind_swap_restores_single_marker() {
        let delims = DelimiterSet::default();
        let (guarded, buffer) = guard("keep @@ here", &delims).unwrap();
        // The rewrite cascade swaps the kind code from 'e' to 'u'.
        let swapped = guarded.replace("\u{e000}e0\u{e001}", "\u{e000}u0\u{e001}");
        assert_eq!(restore(&swapped, &buffer), "keep @ here");
        // Without the swap the original doubled marker comes back.
        assert_eq!(restore(&guarded, &buffer), "keep @@ here");
    }

    #[test]
    fn test_foreign_sentinel_left_alone() {
        let mut buffer = ProtectedLiteralBuffer::new();
        buffer.protect(SentinelKind::StringLiteral, "\"hi\"".to_string());
        // Kind 'm' at index 0 belongs to some other cycle.
        let text = "x \u{e000}m0\u{e001} y";
        assert_eq!(buffer.restore_all(text), text);
    }

    #[test]
    fn test_indices_are_monotonic() {
        let mut buffer = ProtectedLiteralBuffer::new();
        let a = buffer.protect(SentinelKind::StringLiteral, "\"a\"".to_string());
        let b = buffer.protect(SentinelKind::StringLiteral, "\"b\"".to_string());
        assert!(a < b);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_alternate_marker_character() {
        let delims = DelimiterSet::new("[[", "]]", "%");
        let (guarded, buffer) = guard("50%% off for staff%corp.example", &delims).unwrap();
        assert_eq!(restore(&guarded, &buffer), "50%% off for staff%corp.example");
    }
}
