//! Delimiter configuration for one translation session
//!
//! A `DelimiterSet` names the three tokens that define both the shorthand
//! and canonical syntaxes: the directive-open token, the directive-close
//! token, and the shorthand marker character. The triple is immutable for
//! the lifetime of a translation session and doubles as the key under which
//! compiled rule sets are cached.

use std::fmt;

/// The `(open, close, marker)` token triple for one translation session.
///
/// The defaults mirror the conventional delimited action syntax: directives
/// are wrapped in `{{` / `}}` and shorthand directives begin with `@`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct DelimiterSet {
    /// Token that opens a canonical directive (e.g. `{{`)
    pub open: String,

    /// Token that closes a canonical directive (e.g. `}}`)
    pub close: String,

    /// Marker character that begins a shorthand directive (e.g. `@`)
    pub marker: String,
}

impl DelimiterSet {
    /// Create a delimiter set from explicit tokens
    pub fn new(open: &str, close: &str, marker: &str) -> Self {
        DelimiterSet {
            open: open.to_string(),
            close: close.to_string(),
            marker: marker.to_string(),
        }
    }

    /// The marker as a `char`.
    ///
    /// The marker is a single character by contract; a multi-character
    /// marker string keeps only its first character.
    pub fn marker_char(&self) -> char {
        self.marker.chars().next().unwrap_or('@')
    }

    /// The marker doubled, the escape spelling for a literal marker
    pub fn doubled_marker(&self) -> String {
        format!("{}{}", self.marker, self.marker)
    }
}

impl Default for DelimiterSet {
    fn default() -> Self {
        DelimiterSet::new("{{", "}}", "@")
    }
}

impl fmt::Display for DelimiterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.open, self.close, self.marker)
    }
}
