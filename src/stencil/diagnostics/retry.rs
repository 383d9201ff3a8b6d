//! The bounded repair/resubmit loop
//!
//! Submits the current source to the engine; on failure, diagnoses the
//! reported fault, repairs the offending line, and resubmits — accumulating
//! every distinct fault along the way so a single call surfaces the full
//! defect list. Written as an explicit loop with a hard iteration ceiling
//! (line count plus a small constant) so termination is structural, not
//! emergent.
//!
//! Stops without retrying when the fault originated in another file (repair
//! is local-file only) or when the diagnostic matches no known shape; stops
//! after a repair that changes nothing (no progress).

use std::fmt;
use std::sync::Mutex;

use serde_json::Value;

use crate::stencil::delimiters::DelimiterSet;
use crate::stencil::diagnostics::repair::repair_line;
use crate::stencil::diagnostics::shapes::{diagnose, ErrorRecord, FaultKind};
use crate::stencil::engine::DirectiveEngine;

/// One fault discovered during the loop
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Fault {
    pub record: ErrorRecord,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.record.file, self.record.line, self.record.kind
        )?;
        if let Some(key) = &self.record.key {
            write!(f, ": \"{}\"", key)?;
        }
        if let Some(message) = &self.record.message {
            write!(f, ": {}", message)?;
        }
        if let Some(line) = &self.record.actual_line {
            write!(f, "\n    | {}", line)?;
        }
        Ok(())
    }
}

/// How the loop ended when it could not produce clean output
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum RetryOutcome {
    /// Every fault was neutralized and the final submission rendered
    Recovered,
    /// A repair changed nothing; the loop cannot improve further
    NoProgress,
    /// The fault originated in another file; repair is local-file only
    CrossFile,
    /// The diagnostic matched no known shape
    Unrecognized,
    /// The iteration ceiling tripped
    CeilingReached,
}

/// The loop's failure value: every distinct fault found, plus how it ended
#[derive(Debug)]
pub struct RetryFailure {
    pub faults: Vec<Fault>,
    pub outcome: RetryOutcome,
}

impl fmt::Display for RetryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} fault(s) found:", self.faults.len())?;
        for fault in &self.faults {
            writeln!(f, "  {}", fault)?;
        }
        match self.outcome {
            RetryOutcome::Recovered => Ok(()),
            RetryOutcome::NoProgress => write!(f, "stopped: repair made no progress"),
            RetryOutcome::CrossFile => write!(f, "stopped: fault in included file"),
            RetryOutcome::Unrecognized => write!(f, "stopped: unrecognized diagnostic"),
            RetryOutcome::CeilingReached => write!(f, "stopped: retry ceiling reached"),
        }
    }
}

impl std::error::Error for RetryFailure {}

/// Per-request retry state
struct RetrySession {
    filename: String,
    original_source: String,
    line_snapshot: Vec<String>,
    try_count: usize,
}

impl RetrySession {
    fn new(filename: &str, source: String) -> Self {
        let line_snapshot = source.split('\n').map(String::from).collect();
        RetrySession {
            filename: filename.to_string(),
            original_source: source,
            line_snapshot,
            try_count: 0,
        }
    }

    fn current_source(&self) -> String {
        self.line_snapshot.join("\n")
    }

    /// Each successful repair consumes at least one fault on a fixed line
    /// set, so line count plus a small constant bounds the loop.
    fn ceiling(&self) -> usize {
        self.original_source.lines().count() + 2
    }
}

/// Drive the engine until it renders cleanly or the loop gives up.
///
/// The engine's parse step is not reentrant; every call goes through the
/// supplied lock.
pub fn run_retry_loop(
    engine: &Mutex<Box<dyn DirectiveEngine + Send>>,
    filename: &str,
    source: String,
    context: &Value,
    delimiters: &DelimiterSet,
) -> Result<String, RetryFailure> {
    let mut session = RetrySession::new(filename, source);
    let ceiling = session.ceiling();
    let mut faults: Vec<Fault> = Vec::new();

    loop {
        let current = session.current_source();
        let result = engine
            .lock()
            .unwrap()
            .execute(&session.filename, &current, context);
        let diagnostic = match result {
            Ok(output) => {
                if faults.is_empty() {
                    return Ok(output);
                }
                return Err(RetryFailure {
                    faults,
                    outcome: RetryOutcome::Recovered,
                });
            }
            Err(diagnostic) => diagnostic,
        };

        let mut record = match diagnose(&diagnostic) {
            Some(record) => record,
            None => {
                faults.push(Fault {
                    record: unrecognized_record(&session.filename, &diagnostic),
                });
                return Err(RetryFailure {
                    faults,
                    outcome: RetryOutcome::Unrecognized,
                });
            }
        };

        if record.file != session.filename {
            faults.push(Fault { record });
            return Err(RetryFailure {
                faults,
                outcome: RetryOutcome::CrossFile,
            });
        }

        let index = record.line.saturating_sub(1);
        if record.line == 0 || index >= session.line_snapshot.len() {
            faults.push(Fault { record });
            return Err(RetryFailure {
                faults,
                outcome: RetryOutcome::Unrecognized,
            });
        }

        let old_line = session.line_snapshot[index].clone();
        record.actual_line = Some(old_line.clone());
        let repair = repair_line(&record, &old_line, delimiters);

        if repair.new_line == old_line {
            push_unique(&mut faults, Fault { record });
            return Err(RetryFailure {
                faults,
                outcome: RetryOutcome::NoProgress,
            });
        }

        if !repair.cleared {
            push_unique(&mut faults, Fault { record });
        }
        session.line_snapshot[index] = repair.new_line;
        session.try_count += 1;

        if session.try_count > ceiling {
            return Err(RetryFailure {
                faults,
                outcome: RetryOutcome::CeilingReached,
            });
        }
    }
}

fn unrecognized_record(filename: &str, diagnostic: &str) -> ErrorRecord {
    ErrorRecord {
        file: filename.to_string(),
        line: 0,
        column: None,
        kind: FaultKind::GenericParseFault,
        key: None,
        message: Some(diagnostic.to_string()),
        code: None,
        actual_line: None,
    }
}

/// Accumulate without re-reporting the same fault on a later retry
fn push_unique(faults: &mut Vec<Fault>, fault: Fault) {
    let duplicate = faults.iter().any(|existing| {
        existing.record.line == fault.record.line
            && existing.record.kind == fault.record.kind
            && existing.record.key == fault.record.key
    });
    if !duplicate {
        faults.push(fault);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Engine that reports a missing key for every line referencing a
    /// global whose name starts with `absent`
    struct MissingKeyEngine {
        calls: AtomicUsize,
    }

    impl MissingKeyEngine {
        fn new() -> Self {
            MissingKeyEngine {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl DirectiveEngine for MissingKeyEngine {
        fn execute(&self, filename: &str, source: &str, _context: &Value) -> Result<String, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            for (number, line) in source.lines().enumerate() {
                if let Some(pos) = line.find("$.absent") {
                    let key: String = line[pos + 2..]
                        .chars()
                        .take_while(|c| c.is_alphanumeric() || *c == '_')
                        .collect();
                    return Err(format!(
                        "template: {}:{}: executing \"{}\" at <$.{}>: map has no entry for key \"{}\"",
                        filename,
                        number + 1,
                        filename,
                        key,
                        key
                    ));
                }
            }
            Ok(source.to_string())
        }
    }

    fn boxed(engine: impl DirectiveEngine + 'static) -> Mutex<Box<dyn DirectiveEngine + Send>> {
        Mutex::new(Box::new(engine))
    }

    #[test]
    fn test_clean_source_passes_through() {
        let engine = boxed(MissingKeyEngine::new());
        let out = run_retry_loop(
            &engine,
            "main.tpl",
            "no faults\nanywhere".to_string(),
            &Value::Null,
            &DelimiterSet::default(),
        )
        .unwrap();
        assert_eq!(out, "no faults\nanywhere");
    }

    #[test]
    fn test_two_faults_found_in_three_tries() {
        let engine = boxed(MissingKeyEngine::new());
        let source = "a {{ $.absent_one }}\nplain\nb {{ $.absent_two }}".to_string();
        let failure = run_retry_loop(
            &engine,
            "main.tpl",
            source,
            &Value::Null,
            &DelimiterSet::default(),
        )
        .unwrap_err();
        assert_eq!(failure.outcome, RetryOutcome::Recovered);
        assert_eq!(failure.faults.len(), 2);
        assert_eq!(failure.faults[0].record.key.as_deref(), Some("absent_one"));
        assert_eq!(failure.faults[1].record.key.as_deref(), Some("absent_two"));
    }

    #[test]
    fn test_guarded_fault_clears_without_report() {
        let engine = boxed(MissingKeyEngine::new());
        let source = "{{ default \"guest\" $.absent_user }}".to_string();
        let out = run_retry_loop(
            &engine,
            "main.tpl",
            source,
            &Value::Null,
            &DelimiterSet::default(),
        )
        .unwrap();
        assert_eq!(out, "{{ \"guest\" }}");
    }

    #[test]
    fn test_no_progress_terminates_with_one_fault() {
        /// Always reports the same fault, no matter the source
        struct StuckEngine;
        impl DirectiveEngine for StuckEngine {
            fn execute(&self, f: &str, _s: &str, _c: &Value) -> Result<String, String> {
                Err(format!(
                    "template: {}:1: executing \"{}\" at <$.gone>: map has no entry for key \"gone\"",
                    f, f
                ))
            }
        }
        let engine = boxed(StuckEngine);
        let failure = run_retry_loop(
            &engine,
            "main.tpl",
            "{{ $.gone }}".to_string(),
            &Value::Null,
            &DelimiterSet::default(),
        )
        .unwrap_err();
        assert_eq!(failure.outcome, RetryOutcome::NoProgress);
        assert_eq!(failure.faults.len(), 1);
    }

    #[test]
    fn test_cross_file_fault_short_circuits() {
        struct IncludeEngine {
            calls: AtomicUsize,
        }
        impl DirectiveEngine for IncludeEngine {
            fn execute(&self, _f: &str, _s: &str, _c: &Value) -> Result<String, String> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Err(
                    "template: partial.tpl:3: executing \"partial.tpl\" at <$.x>: map has no entry for key \"x\""
                        .to_string(),
                )
            }
        }
        let engine_impl = IncludeEngine {
            calls: AtomicUsize::new(0),
        };
        let engine: Mutex<Box<dyn DirectiveEngine + Send>> = Mutex::new(Box::new(engine_impl));
        let failure = run_retry_loop(
            &engine,
            "main.tpl",
            "body".to_string(),
            &Value::Null,
            &DelimiterSet::default(),
        )
        .unwrap_err();
        assert_eq!(failure.outcome, RetryOutcome::CrossFile);
        assert_eq!(failure.faults.len(), 1);
        assert_eq!(failure.faults[0].record.file, "partial.tpl");
    }

    #[test]
    fn test_unrecognized_diagnostic_short_circuits() {
        struct WeirdEngine;
        impl DirectiveEngine for WeirdEngine {
            fn execute(&self, _f: &str, _s: &str, _c: &Value) -> Result<String, String> {
                Err("segfault in module 7".to_string())
            }
        }
        let engine = boxed(WeirdEngine);
        let failure = run_retry_loop(
            &engine,
            "main.tpl",
            "body".to_string(),
            &Value::Null,
            &DelimiterSet::default(),
        )
        .unwrap_err();
        assert_eq!(failure.outcome, RetryOutcome::Unrecognized);
        assert_eq!(
            failure.faults[0].record.message.as_deref(),
            Some("segfault in module 7")
        );
    }

    #[test]
    fn test_fault_display_includes_line_excerpt() {
        let fault = Fault {
            record: ErrorRecord {
                file: "main.tpl".to_string(),
                line: 4,
                column: None,
                kind: FaultKind::MissingKey,
                key: Some("name".to_string()),
                message: None,
                code: None,
                actual_line: Some("Hi {{ $.name }}".to_string()),
            },
        };
        let rendered = fault.to_string();
        assert!(rendered.contains("main.tpl:4"));
        assert!(rendered.contains("missing key"));
        assert!(rendered.contains("Hi {{ $.name }}"));
    }
}
