//! # stencil
//!
//! A transpiler for a compact shorthand template notation. Source written
//! with marker-prefixed directives (`@if (x > 3)`, `@name`, `@{a + b}`) is
//! rewritten into canonical delimited directive syntax (`{{ if gt $.x 3 }}`,
//! `{{ $.name }}`, `{{ add $.a $.b }}`) for a downstream execution engine.
//!
//! When that engine reports a failure, stencil parses the diagnostic,
//! applies a minimal repair to the offending line, and resubmits — so one
//! call surfaces every discoverable fault instead of stopping at the first.
//!
//! ## Testing
//!
//! Unit tests live next to the code they cover; integration tests under
//! `tests/` drive the public pipeline the way an embedder would.

pub mod stencil;

pub use stencil::{
    DelimiterSet, DirectiveEngine, ProcessError, Processor, TranslateError, Translator,
};
