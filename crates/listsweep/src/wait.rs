//! Bounded polling and settle delays.
//!
//! Every wait in the automation is an explicit, bounded suspension on the
//! tokio timer. Nothing here blocks a thread: the host page keeps rendering
//! between polls.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

// =============================================================================
// POLL OPTIONS
// =============================================================================

/// Attempt budget and spacing for a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOptions {
    /// Maximum number of checks
    pub attempts: u32,
    /// Delay after each failed check, in milliseconds
    pub interval_ms: u64,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            attempts: 20,
            interval_ms: 100,
        }
    }
}

impl PollOptions {
    /// Create poll options
    #[must_use]
    pub const fn new(attempts: u32, interval_ms: u64) -> Self {
        Self {
            attempts,
            interval_ms,
        }
    }

    /// Interval as Duration
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Upper bound on the time spent polling
    #[must_use]
    pub const fn budget_ms(&self) -> u64 {
        self.attempts as u64 * self.interval_ms
    }
}

// =============================================================================
// WAIT RESULT
// =============================================================================

/// Result of a polling loop
#[derive(Debug, Clone)]
pub struct WaitResult<T> {
    /// The value produced by the successful check, if any
    pub value: Option<T>,
    /// Number of checks performed
    pub attempts: u32,
    /// Time spent waiting
    pub elapsed: Duration,
}

impl<T> WaitResult<T> {
    /// Whether the condition was met before the budget ran out
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.value.is_some()
    }

    /// Consume into the produced value
    pub fn into_value(self) -> Option<T> {
        self.value
    }
}

// =============================================================================
// POLLING
// =============================================================================

/// Run `check` until it yields a value or the attempt budget is exhausted.
///
/// The check runs first, then the loop sleeps `interval` after every miss,
/// so the worst case is `attempts * interval`.
pub async fn poll<T, F, Fut>(options: PollOptions, mut check: F) -> WaitResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let start = Instant::now();
    for attempt in 1..=options.attempts {
        if let Some(value) = check(attempt).await {
            return WaitResult {
                value: Some(value),
                attempts: attempt,
                elapsed: start.elapsed(),
            };
        }
        tokio::time::sleep(options.interval()).await;
    }

    WaitResult {
        value: None,
        attempts: options.attempts,
        elapsed: start.elapsed(),
    }
}

/// Fixed settle delay that lets the host page catch up
pub async fn settle(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
