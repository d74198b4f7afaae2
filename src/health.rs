//! Per-endpoint failure tracking
//!
//! A coarse circuit breaker layered above the per-call retry policy: once an
//! endpoint has failed enough times in a row within a short window, callers
//! can skip the whole retry sequence and go straight to their fallback path.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Consecutive failures within the window before an endpoint counts as unhealthy
const FAILURE_THRESHOLD: u32 = 5;

/// How long a failure streak stays relevant
const FAILURE_WINDOW: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct HealthRecord {
    consecutive_failures: u32,
    last_failure_at: Instant,
}

/// Tracks rolling failure counts per logical endpoint.
///
/// Records are created lazily on the first failure and removed again on any
/// success or once the failure window has passed. Constructed explicitly and
/// shared as `Arc<EndpointHealth>`; tests build isolated instances with tiny
/// windows via [`EndpointHealth::with_limits`].
pub struct EndpointHealth {
    records: Mutex<HashMap<String, HealthRecord>>,
    failure_threshold: u32,
    failure_window: Duration,
}

impl Default for EndpointHealth {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointHealth {
    /// Creates a tracker with the production threshold (5 failures / 5 minutes)
    pub fn new() -> Self {
        Self::with_limits(FAILURE_THRESHOLD, FAILURE_WINDOW)
    }

    /// Creates a tracker with custom limits
    pub fn with_limits(failure_threshold: u32, failure_window: Duration) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            failure_threshold,
            failure_window,
        }
    }

    fn locked(&self) -> MutexGuard<'_, HashMap<String, HealthRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns whether requests to `endpoint_key` are currently worth attempting.
    ///
    /// True when no failures are on record, or the last failure is older than
    /// the window (the stale record is discarded as a side effect), or the
    /// streak is still below the threshold.
    pub fn is_healthy(&self, endpoint_key: &str) -> bool {
        let mut records = self.locked();

        let Some(record) = records.get(endpoint_key) else {
            return true;
        };

        if record.last_failure_at.elapsed() > self.failure_window {
            debug!(endpoint_key, "failure window passed, clearing record");
            records.remove(endpoint_key);
            return true;
        }

        record.consecutive_failures < self.failure_threshold
    }

    /// Records one failure against `endpoint_key`
    pub fn record_failure(&self, endpoint_key: &str) {
        let mut records = self.locked();
        let record = records
            .entry(endpoint_key.to_string())
            .or_insert(HealthRecord {
                consecutive_failures: 0,
                last_failure_at: Instant::now(),
            });
        record.consecutive_failures += 1;
        record.last_failure_at = Instant::now();

        if record.consecutive_failures >= self.failure_threshold {
            warn!(
                endpoint_key,
                failures = record.consecutive_failures,
                "endpoint marked unhealthy"
            );
        } else {
            debug!(
                endpoint_key,
                failures = record.consecutive_failures,
                threshold = self.failure_threshold,
                "failure recorded"
            );
        }
    }

    /// Clears the failure record for `endpoint_key`; called after any success
    pub fn reset_failures(&self, endpoint_key: &str) {
        let mut records = self.locked();
        if records.remove(endpoint_key).is_some() {
            debug!(endpoint_key, "failure count reset");
        }
    }

    /// Current consecutive-failure count, for diagnostics
    #[allow(dead_code)]
    pub fn failure_count(&self, endpoint_key: &str) -> u32 {
        self.locked()
            .get(endpoint_key)
            .map(|record| record.consecutive_failures)
            .unwrap_or(0)
    }
}
