//! Minimal line repairs
//!
//! Each diagnosed fault gets the smallest textual edit that neutralizes it
//! on the offending line. A repair either *clears* the fault (a recognized
//! guard construct supplies the intended fallback, so nothing is reported)
//! or *neutralizes* it (the fault stays on the report and the line is
//! rewritten so the engine cannot trip over it again).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::stencil::delimiters::DelimiterSet;
use crate::stencil::diagnostics::shapes::{ErrorRecord, FaultKind};

/// Outcome of repairing one line
#[derive(Debug, Clone, PartialEq)]
pub struct Repair {
    /// The replacement line
    pub new_line: String,
    /// True when a guard construct absorbed the fault and nothing should be
    /// reported
    pub cleared: bool,
}

impl Repair {
    fn cleared(new_line: String) -> Self {
        Repair {
            new_line,
            cleared: true,
        }
    }

    fn kept(new_line: String) -> Self {
        Repair {
            new_line,
            cleared: false,
        }
    }
}

/// `default`/`undef`/`ifUndef` guard: collapses to its fallback argument
static DEFAULT_GUARD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?:default|undef|ifUndef)[ \t]+(?P<fallback>"[^"]*"|\([^)]*\)|[\w.$\-]+)[ \t]+[\w.$\[\]]+"#,
    )
    .unwrap()
});

/// Existence probes: collapse to the boolean reflecting non-existence
static EXISTENCE_GUARD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?P<probe>isSet|isNil|isZero|isEmpty)[ \t]+(?:\([^)]*\)|[\w.$\[\]]+)").unwrap()
});

/// Assertion guard: the tested expression becomes a literal `0`
static ASSERT_GUARD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\b(?P<afn>assertWarning|assert)[ \t]+(?:\([^)]*\)|"[^"]*"|[\w.$\[\]]+)"#)
        .unwrap()
});

/// Repair one line for one diagnosed fault
pub fn repair_line(record: &ErrorRecord, line: &str, delimiters: &DelimiterSet) -> Repair {
    match record.kind {
        FaultKind::MissingKey => repair_missing_key(record, line, delimiters),
        FaultKind::UserAssertion => {
            let message = record.message.as_deref().unwrap_or("assertion failed");
            Repair::kept(format!("ERROR: {}", message))
        }
        FaultKind::ExecutionFault => repair_execution_fault(record, line, delimiters),
        FaultKind::UndefinedVariable => repair_undefined_variable(record, line),
        FaultKind::UnclosedAction | FaultKind::GenericParseFault => {
            Repair::kept(sentinel(delimiters, "parse error"))
        }
    }
}

fn repair_missing_key(record: &ErrorRecord, line: &str, delimiters: &DelimiterSet) -> Repair {
    if DEFAULT_GUARD.is_match(line) {
        let repaired = DEFAULT_GUARD
            .replace(line, |caps: &regex::Captures| caps["fallback"].to_string())
            .into_owned();
        return Repair::cleared(repaired);
    }
    if let Some(caps) = EXISTENCE_GUARD.captures(line) {
        // The value does not exist: `isSet` answers false, the nil/zero/empty
        // probes answer true.
        let literal = if &caps["probe"] == "isSet" {
            "false"
        } else {
            "true"
        };
        let repaired = EXISTENCE_GUARD.replace(line, literal).into_owned();
        return Repair::cleared(repaired);
    }
    if ASSERT_GUARD.is_match(line) {
        let repaired = ASSERT_GUARD.replace(line, "${afn} 0").into_owned();
        return Repair::cleared(repaired);
    }
    let key = record.key.as_deref().unwrap_or("?");
    Repair::kept(sentinel(
        delimiters,
        &format!("undefined value \"{}\"", key),
    ))
}

fn repair_execution_fault(record: &ErrorRecord, line: &str, delimiters: &DelimiterSet) -> Repair {
    // Isolate the smallest directive on the line that contains the failing
    // code; if none does, the whole line is blanked.
    if let Some(code) = record.code.as_deref() {
        let pattern = format!(
            "{}[^{}]*?{}.*?{}",
            regex::escape(&delimiters.open),
            regex::escape(&delimiters.open),
            regex::escape(code),
            regex::escape(&delimiters.close)
        );
        if let Ok(directive) = Regex::new(&pattern) {
            if directive.is_match(line) {
                let replacement = sentinel(delimiters, "execution error");
                let repaired = directive.replace(line, replacement.as_str()).into_owned();
                return Repair::kept(repaired);
            }
        }
    }
    Repair::kept(sentinel(delimiters, "execution error"))
}

fn repair_undefined_variable(record: &ErrorRecord, line: &str) -> Repair {
    // Quote the offending token so it reads as an explicit placeholder value.
    if let Some(key) = record.key.as_deref() {
        let pattern = format!(r"\$?\b{}\b", regex::escape(key));
        if let Ok(token) = Regex::new(&pattern) {
            if token.is_match(line) {
                let quoted = format!("\"{}\"", key);
                return Repair::kept(token.replace(line, quoted.as_str()).into_owned());
            }
        }
    }
    Repair::kept(line.to_string())
}

/// An inert directive comment that the engine can never trip over
fn sentinel(delimiters: &DelimiterSet, note: &str) -> String {
    format!("{}/* {} */{}", delimiters.open, note, delimiters.close)
}
