//! The seam to the downstream directive-execution engine
//!
//! This core never executes directives itself; it hands canonical directive
//! source to an engine behind this trait and interprets the diagnostic text
//! the engine returns. The error string must follow the contracted shapes
//! (see `diagnostics::shapes`) for the repair loop to act on it; anything
//! else is surfaced as a single non-recoverable fault.
//!
//! The engine's parse step is assumed not safe for concurrent invocation,
//! so callers route every `execute` through one shared lock.

use std::sync::{Arc, Mutex};

use serde_json::Value;

/// A directive-execution engine
pub trait DirectiveEngine: Send {
    /// Render `source` against a hierarchical key-value context.
    ///
    /// On failure, returns the engine's diagnostic text verbatim.
    fn execute(&self, filename: &str, source: &str, context: &Value) -> Result<String, String>;
}

/// The locked handle the pipeline holds; one lock serializes every parse
pub type SharedEngine = Arc<Mutex<Box<dyn DirectiveEngine + Send>>>;

/// Wrap an engine in the shared, serialized handle
pub fn shared(engine: Box<dyn DirectiveEngine + Send>) -> SharedEngine {
    Arc::new(Mutex::new(engine))
}
