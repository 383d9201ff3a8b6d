//! The shorthand-to-directive transpiler
//!
//! The forward pipeline runs strictly downward:
//! 1. `guard` protects fragile literal spans behind sentinel tokens
//! 2. `rules` compiles the declaration-ordered rule cascade for one
//!    delimiter set (cached process-wide)
//! 3. `rewrite` applies the cascade, calling into `expr` for every
//!    recognized expression fragment
//! 4. `guard::restore` reverses the protection
//!
//! When the downstream engine (behind `engine::DirectiveEngine`) rejects
//! the result, `diagnostics` parses the error, repairs the offending line,
//! and resubmits until every discoverable fault has been collected.
//! `pipeline` ties both halves together.

pub mod delimiters;
pub mod diagnostics;
pub mod engine;
pub mod expr;
pub mod guard;
pub mod pipeline;
pub mod rewrite;
pub mod rules;

pub use delimiters::DelimiterSet;
pub use diagnostics::{ErrorRecord, Fault, FaultKind, RetryOutcome};
pub use engine::DirectiveEngine;
pub use pipeline::{ProcessError, Processor, TranslateError, Translator};
