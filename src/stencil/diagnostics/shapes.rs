//! Diagnostic-shape matching
//!
//! The downstream engine reports failures as text in one of two shapes:
//!
//! ```text
//! template: <file>:<line>[:<col>]: executing "<name>" at <<code>>: <cause>
//! template: <file>:<line>[:<col>]: <cause>
//! ```
//!
//! The table here is ordered: the execution shape is tried before the parse
//! shape (which would also match execution diagnostics), and within each
//! shape the cause sub-table is tried top to bottom. A diagnostic matching
//! neither shape yields no record and is non-recoverable.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Classification of one engine-reported fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum FaultKind {
    /// A key lookup found no entry
    MissingKey,
    /// A user-raised assertion (`assert`/`raise`/`fail`)
    UserAssertion,
    /// Any other execution-phase failure
    ExecutionFault,
    /// A variable unknown at parse time
    UndefinedVariable,
    /// A directive opened but never closed
    UnclosedAction,
    /// Any other parse-phase failure
    GenericParseFault,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultKind::MissingKey => "missing key",
            FaultKind::UserAssertion => "user assertion",
            FaultKind::ExecutionFault => "execution fault",
            FaultKind::UndefinedVariable => "undefined variable",
            FaultKind::UnclosedAction => "unclosed action",
            FaultKind::GenericParseFault => "parse fault",
        };
        write!(f, "{}", name)
    }
}

/// Everything extracted from one diagnostic line
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ErrorRecord {
    pub file: String,
    pub line: usize,
    pub column: Option<usize>,
    pub kind: FaultKind,
    /// The missing or undefined key, when the cause names one
    pub key: Option<String>,
    /// The human message, for assertions and generic causes
    pub message: Option<String>,
    /// The code excerpt the engine was executing
    pub code: Option<String>,
    /// Snapshot of the offending source line, filled in by the retry loop
    pub actual_line: Option<String>,
}

/// `template: <file>:<line>[:<col>]: executing "<name>" at <<code>>: <cause>`
static EXECUTION_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"template: (?P<file>[^\r\n:]+):(?P<line>\d+)(?::(?P<column>\d+))?: executing "(?P<name>[^"]*)" at <(?P<code>.+?)>: (?P<cause>.+)"#,
    )
    .unwrap()
});

/// `template: <file>:<line>[:<col>]: <cause>`
static PARSE_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"template: (?P<file>[^\r\n:]+):(?P<line>\d+)(?::(?P<column>\d+))?: (?P<cause>.+)")
        .unwrap()
});

static MISSING_KEY_CAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"map has no entry for key "(?P<key>[^"]+)""#).unwrap());

static USER_ASSERTION_CAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"error calling (?:assert|raise|fail): (?P<msg>.+)").unwrap());

static UNDEFINED_VARIABLE_CAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"undefined variable[: ]+"?\$?(?P<key>[\p{L}\p{N}_]+)"?"#).unwrap());

static UNCLOSED_ACTION_CAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"unclosed action").unwrap());

/// Match a diagnostic against the shape table.
///
/// Returns `None` when the text matches neither shape; the caller treats
/// that as a non-recoverable fault.
pub fn diagnose(diagnostic: &str) -> Option<ErrorRecord> {
    if let Some(caps) = EXECUTION_SHAPE.captures(diagnostic) {
        let cause = &caps["cause"];
        let (kind, key, message) = if let Some(m) = MISSING_KEY_CAUSE.captures(cause) {
            (FaultKind::MissingKey, Some(m["key"].to_string()), None)
        } else if let Some(m) = USER_ASSERTION_CAUSE.captures(cause) {
            (FaultKind::UserAssertion, None, Some(m["msg"].to_string()))
        } else {
            (FaultKind::ExecutionFault, None, Some(cause.to_string()))
        };
        return Some(ErrorRecord {
            file: caps["file"].to_string(),
            line: caps["line"].parse().ok()?,
            column: caps.name("column").and_then(|c| c.as_str().parse().ok()),
            kind,
            key,
            message,
            code: Some(caps["code"].to_string()),
            actual_line: None,
        });
    }

    if let Some(caps) = PARSE_SHAPE.captures(diagnostic) {
        let cause = &caps["cause"];
        let (kind, key, message) = if let Some(m) = UNDEFINED_VARIABLE_CAUSE.captures(cause) {
            (
                FaultKind::UndefinedVariable,
                Some(m["key"].to_string()),
                None,
            )
        } else if UNCLOSED_ACTION_CAUSE.is_match(cause) {
            (FaultKind::UnclosedAction, None, Some(cause.to_string()))
        } else {
            (FaultKind::GenericParseFault, None, Some(cause.to_string()))
        };
        return Some(ErrorRecord {
            file: caps["file"].to_string(),
            line: caps["line"].parse().ok()?,
            column: caps.name("column").and_then(|c| c.as_str().parse().ok()),
            kind,
            key,
            message,
            code: None,
            actual_line: None,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_shape() {
        let record = diagnose(
            "template: main.tpl:12: executing \"main.tpl\" at <$.user.name>: map has no entry for key \"name\"",
        )
        .unwrap();
        assert_eq!(record.kind, FaultKind::MissingKey);
        assert_eq!(record.file, "main.tpl");
        assert_eq!(record.line, 12);
        assert_eq!(record.key.as_deref(), Some("name"));
        assert_eq!(record.code.as_deref(), Some("$.user.name"));
    }

    #[test]
    fn test_missing_key_with_column() {
        let record = diagnose(
            "template: main.tpl:3:17: executing \"main.tpl\" at <$.x>: map has no entry for key \"x\"",
        )
        .unwrap();
        assert_eq!(record.line, 3);
        assert_eq!(record.column, Some(17));
    }

    #[test]
    fn test_user_assertion_shape() {
        let record = diagnose(
            "template: f.tpl:4: executing \"f.tpl\" at <raise \"boom\">: error calling raise: boom",
        )
        .unwrap();
        assert_eq!(record.kind, FaultKind::UserAssertion);
        assert_eq!(record.message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_generic_execution_fault() {
        let record = diagnose(
            "template: f.tpl:9: executing \"f.tpl\" at <div $.a 0>: division by zero",
        )
        .unwrap();
        assert_eq!(record.kind, FaultKind::ExecutionFault);
        assert_eq!(record.message.as_deref(), Some("division by zero"));
        assert_eq!(record.code.as_deref(), Some("div $.a 0"));
    }

    #[test]
    fn test_undefined_variable_shape() {
        let record = diagnose("template: f.tpl:2: undefined variable \"$missing\"").unwrap();
        assert_eq!(record.kind, FaultKind::UndefinedVariable);
        assert_eq!(record.key.as_deref(), Some("missing"));
        assert!(record.code.is_none());
    }

    #[test]
    fn test_unclosed_action_shape() {
        let record = diagnose("template: f.tpl:7: unclosed action").unwrap();
        assert_eq!(record.kind, FaultKind::UnclosedAction);
    }

    #[test]
    fn test_generic_parse_fault() {
        let record = diagnose("template: f.tpl:5: function \"nope\" not defined").unwrap();
        assert_eq!(record.kind, FaultKind::GenericParseFault);
        assert_eq!(
            record.message.as_deref(),
            Some("function \"nope\" not defined")
        );
    }

    #[test]
    fn test_execution_shape_wins_over_parse_shape() {
        // The parse shape would also match this text; order decides.
        let record = diagnose(
            "template: f.tpl:1: executing \"f.tpl\" at <$.k>: map has no entry for key \"k\"",
        )
        .unwrap();
        assert_eq!(record.kind, FaultKind::MissingKey);
    }

    #[test]
    fn test_unrecognized_diagnostic() {
        assert!(diagnose("something completely different").is_none());
        assert!(diagnose("").is_none());
    }
}
