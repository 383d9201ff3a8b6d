//! Error diagnosis, repair, and the retry loop
//!
//! 1. `shapes` — the ordered diagnostic-shape table that turns engine error
//!    text into structured records
//! 2. `repair` — the per-kind minimal line repairs
//! 3. `retry` — the bounded resubmit loop that accumulates every distinct
//!    fault across retries

pub mod repair;
pub mod retry;
pub mod shapes;

pub use repair::{repair_line, Repair};
pub use retry::{run_retry_loop, Fault, RetryFailure, RetryOutcome};
pub use shapes::{diagnose, ErrorRecord, FaultKind};
