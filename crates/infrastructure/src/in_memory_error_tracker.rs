//! In-process error tracker with a sliding rate window.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use timebank_application::{ErrorSummary, ErrorTracker};
use timebank_core::{AppError, AppResult};
use timebank_domain::ErrorReport;
use tokio::time::Instant;

/// Width of the window used for the errors-per-minute rate.
pub const ERROR_RATE_WINDOW: Duration = Duration::from_secs(60);

/// Number of recent error reports retained for summaries.
pub const RECENT_ERROR_CAPACITY: usize = 50;

#[derive(Debug, Default)]
struct TrackerState {
    total_errors: u64,
    occurrences: VecDeque<Instant>,
    recent: VecDeque<ErrorReport>,
}

impl TrackerState {
    fn prune(&mut self, now: Instant, window: Duration) {
        while self
            .occurrences
            .front()
            .is_some_and(|occurred_at| now.duration_since(*occurred_at) >= window)
        {
            self.occurrences.pop_front();
        }
    }
}

/// Error tracker keeping timestamps for the last window and a bounded report ring.
#[derive(Debug)]
pub struct InMemoryErrorTracker {
    state: Mutex<TrackerState>,
    window: Duration,
    recent_capacity: usize,
}

impl InMemoryErrorTracker {
    /// Creates a tracker with a one-minute window and 50 retained reports.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            window: ERROR_RATE_WINDOW,
            recent_capacity: RECENT_ERROR_CAPACITY,
        }
    }

    /// Creates a tracker with custom limits.
    pub fn with_limits(window: Duration, recent_capacity: usize) -> AppResult<Self> {
        if window.is_zero() {
            return Err(AppError::Validation(
                "error rate window must be greater than zero".to_owned(),
            ));
        }

        if recent_capacity == 0 {
            return Err(AppError::Validation(
                "recent error capacity must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            state: Mutex::new(TrackerState::default()),
            window,
            recent_capacity,
        })
    }
}

impl Default for InMemoryErrorTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorTracker for InMemoryErrorTracker {
    fn record_error(&self, report: ErrorReport) {
        let now = Instant::now();
        let mut state = self.state.lock();

        state.total_errors = state.total_errors.saturating_add(1);
        state.prune(now, self.window);
        state.occurrences.push_back(now);

        state.recent.push_back(report);
        while state.recent.len() > self.recent_capacity {
            state.recent.pop_front();
        }
    }

    fn errors_per_minute(&self) -> f64 {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.prune(now, self.window);

        let in_window = state.occurrences.len() as f64;
        in_window * 60.0 / self.window.as_secs_f64()
    }

    fn summary(&self, recent_limit: usize) -> ErrorSummary {
        let errors_per_minute = self.errors_per_minute();
        let state = self.state.lock();

        ErrorSummary {
            total_errors: state.total_errors,
            errors_per_minute,
            recent_errors: state.recent.iter().rev().take(recent_limit).cloned().collect(),
        }
    }
}
