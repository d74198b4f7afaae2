//! Retrying execution of API calls
//!
//! Splits into two halves: `classify` decides what a failure *is* and
//! whether it is worth retrying; `executor` drives the attempt loop with
//! exponential backoff between retries.

mod classify;
mod executor;

pub use classify::{ClassifiedError, ErrorCategory};
pub use executor::{execute_with_retry, RetryConfig, RetryOutcome};
