//! High-level pipeline API
//!
//! Two entry points, layered:
//! 1. `Translator` — guard, rewrite, restore: shorthand in, canonical
//!    directive source out, plus a flag telling whether anything changed
//! 2. `Processor` — adds engine execution and the diagnose/repair/resubmit
//!    loop, so one call returns either rendered output or one error value
//!    listing every discovered fault
//!
//! Compiled rules come from a cache handle; production callers share the
//! process-wide cache, tests inject isolated instances.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::stencil::delimiters::DelimiterSet;
use crate::stencil::diagnostics::retry::{run_retry_loop, Fault, RetryOutcome};
use crate::stencil::engine::{shared, DirectiveEngine, SharedEngine};
use crate::stencil::guard::{guard, restore, GuardError};
use crate::stencil::rewrite::rewrite;
use crate::stencil::rules::compiler::RuleCache;

/// Errors from the translation stage alone
#[derive(Debug, Clone, PartialEq)]
pub enum TranslateError {
    Guard(GuardError),
}

impl fmt::Display for TranslateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslateError::Guard(err) => write!(f, "guard error: {}", err),
        }
    }
}

impl std::error::Error for TranslateError {}

impl From<GuardError> for TranslateError {
    fn from(err: GuardError) -> Self {
        TranslateError::Guard(err)
    }
}

/// Shorthand-to-canonical translation for one delimiter set
pub struct Translator {
    delimiters: DelimiterSet,
    cache: Arc<RuleCache>,
}

impl Translator {
    /// A translator backed by the process-wide rule cache
    pub fn new(delimiters: DelimiterSet) -> Self {
        Translator::with_cache(delimiters, RuleCache::global())
    }

    /// A translator with an injected cache (isolated tests, embedders)
    pub fn with_cache(delimiters: DelimiterSet, cache: Arc<RuleCache>) -> Self {
        Translator { delimiters, cache }
    }

    pub fn delimiters(&self) -> &DelimiterSet {
        &self.delimiters
    }

    /// Translate shorthand source into canonical directive source.
    ///
    /// The flag is `false` when the input contained no shorthand at all:
    /// no marker character and no assignment operator means the text is
    /// returned untouched without compiling anything.
    pub fn translate(&self, raw: &str) -> Result<(String, bool), TranslateError> {
        if !raw.contains(self.delimiters.marker.as_str()) && !raw.contains(":=") {
            return Ok((raw.to_string(), false));
        }
        let (guarded, buffer) = guard(raw, &self.delimiters)?;
        let rules = self.cache.compile(&self.delimiters);
        let rewritten = rewrite(&guarded, &rules);
        let restored = restore(&rewritten, &buffer);
        debug_assert!(
            !buffer.has_unrestored(&restored),
            "unrestored sentinel in translator output"
        );
        let changed = restored != raw;
        Ok((restored, changed))
    }
}

impl Default for Translator {
    fn default() -> Self {
        Translator::new(DelimiterSet::default())
    }
}

/// Failure value of the full pipeline
#[derive(Debug)]
pub enum ProcessError {
    /// The source could not even be translated
    Translate(TranslateError),
    /// The engine reported faults; every distinct one is listed
    Faults {
        faults: Vec<Fault>,
        outcome: RetryOutcome,
    },
}

impl ProcessError {
    /// All faults carried by this error, if any
    pub fn faults(&self) -> &[Fault] {
        match self {
            ProcessError::Translate(_) => &[],
            ProcessError::Faults { faults, .. } => faults,
        }
    }

    pub fn outcome(&self) -> Option<RetryOutcome> {
        match self {
            ProcessError::Translate(_) => None,
            ProcessError::Faults { outcome, .. } => Some(*outcome),
        }
    }
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::Translate(err) => write!(f, "{}", err),
            ProcessError::Faults { faults, outcome } => {
                writeln!(f, "{} fault(s) found:", faults.len())?;
                for fault in faults {
                    writeln!(f, "  {}", fault)?;
                }
                match outcome {
                    RetryOutcome::Recovered => Ok(()),
                    RetryOutcome::NoProgress => write!(f, "stopped: repair made no progress"),
                    RetryOutcome::CrossFile => write!(f, "stopped: fault in included file"),
                    RetryOutcome::Unrecognized => write!(f, "stopped: unrecognized diagnostic"),
                    RetryOutcome::CeilingReached => write!(f, "stopped: retry ceiling reached"),
                }
            }
        }
    }
}

impl From<TranslateError> for ProcessError {
    fn from(err: TranslateError) -> Self {
        ProcessError::Translate(err)
    }
}

impl std::error::Error for ProcessError {}

/// The full pipeline: translate, execute, and on failure diagnose, repair,
/// and resubmit until no further progress can be made
pub struct Processor {
    translator: Translator,
    engine: SharedEngine,
}

impl Processor {
    /// A processor with default delimiters
    pub fn new(engine: Box<dyn DirectiveEngine + Send>) -> Self {
        Processor::with_delimiters(engine, DelimiterSet::default())
    }

    pub fn with_delimiters(engine: Box<dyn DirectiveEngine + Send>, delimiters: DelimiterSet) -> Self {
        Processor {
            translator: Translator::new(delimiters),
            engine: shared(engine),
        }
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    /// Translate `raw`, execute it, and recover from every repairable fault.
    ///
    /// Returns rendered output, or one error listing every distinct fault
    /// found across all retries.
    pub fn process(
        &self,
        raw: &str,
        filename: &str,
        context: &Value,
    ) -> Result<String, ProcessError> {
        let (canonical, _changed) = self.translator.translate(raw)?;
        run_retry_loop(
            &self.engine,
            filename,
            canonical,
            context,
            self.translator.delimiters(),
        )
        .map_err(|failure| ProcessError::Faults {
            faults: failure.faults,
            outcome: failure.outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoEngine;

    impl DirectiveEngine for EchoEngine {
        fn execute(&self, _f: &str, source: &str, _c: &Value) -> Result<String, String> {
            Ok(source.to_string())
        }
    }

    #[test]
    fn test_translate_fast_path_reports_unchanged() {
        let translator = Translator::default();
        let (out, changed) = translator.translate("plain text, no shorthand").unwrap();
        assert_eq!(out, "plain text, no shorthand");
        assert!(!changed);
    }

    #[test]
    fn test_translate_shorthand_reports_changed() {
        let translator = Translator::default();
        let (out, changed) = translator.translate("Hello @name").unwrap();
        assert_eq!(out, "Hello {{ $.name }}");
        assert!(changed);
    }

    #[test]
    fn test_translate_email_only_is_unchanged() {
        let translator = Translator::default();
        let (out, changed) = translator.translate("mail me at a@b.example").unwrap();
        assert_eq!(out, "mail me at a@b.example");
        assert!(!changed);
    }

    #[test]
    fn test_translate_surfaces_guard_error() {
        let translator = Translator::default();
        let err = translator.translate("@x and a stray ` tick").unwrap_err();
        assert!(matches!(err, TranslateError::Guard(_)));
    }

    #[test]
    fn test_process_happy_path() {
        let processor = Processor::new(Box::new(EchoEngine));
        let out = processor
            .process("value: @{a + 1}", "main.tpl", &json!({"a": 2}))
            .unwrap();
        assert_eq!(out, "value: {{ add $.a 1 }}");
    }

    #[test]
    fn test_process_uses_isolated_translator_delimiters() {
        let processor =
            Processor::with_delimiters(Box::new(EchoEngine), DelimiterSet::new("[[", "]]", "%"));
        let out = processor
            .process("%if (ok)", "main.tpl", &Value::Null)
            .unwrap();
        assert_eq!(out, "[[ if $.ok ]]");
    }
}
