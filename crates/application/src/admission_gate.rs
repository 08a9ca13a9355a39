//! Per-key admission control.
//!
//! Three independent policies share one shape: a map from [`AdmissionKey`] to
//! small mutable state behind a `parking_lot` mutex, with lazy expiry instead of
//! a dedicated timer task.
//!
//! - brute force: fixed threshold of failures imposes a fixed-length block and
//!   resets the count, so the next block needs a fresh run of failures; login
//!   attempts are reserved up front so in-flight guesses count too;
//! - connections: atomic check-and-increment against a per-key cap;
//! - request rate: fixed window budget, the same window shape as brute force.
//!
//! None of the operations fail: unknown keys are "not blocked" and "zero active
//! connections". Denials map to one error class through the `into_result`
//! helpers so callers never learn which policy rejected them.

mod config;
mod decisions;
mod permit;


use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use timebank_core::AppResult;
use timebank_domain::AdmissionKey;
use tokio::time::Instant;
use tracing::{debug, warn};

pub use config::{
    AdmissionGateConfig, BruteForcePolicy, ConnectionPolicy, MAX_POLICY_WINDOW, RequestRatePolicy,
};
pub use decisions::{
    ADMISSION_DENIED_MESSAGE, BruteForceStatus, ConnectionGrant, RequestRateDecision,
};
pub use permit::{ConnectionPermit, LoginAttempt};

use permit::AttemptOutcome;

#[derive(Debug, Clone, Copy, Default)]
struct FailureWindow {
    failure_count: u32,
    last_failure_at: Option<Instant>,
    blocked_until: Option<Instant>,
    attempts_in_flight: u32,
}

impl FailureWindow {
    fn active_block(&self, now: Instant) -> Option<Instant> {
        self.blocked_until.filter(|blocked_until| *blocked_until > now)
    }

    /// An unblocked run of failures older than one window counts as absent.
    fn has_recent_failures(&self, now: Instant, window: Duration) -> bool {
        self.failure_count > 0
            && self
                .last_failure_at
                .is_some_and(|last_failure_at| now.duration_since(last_failure_at) < window)
    }

    fn is_live(&self, now: Instant, window: Duration) -> bool {
        self.attempts_in_flight > 0
            || self.active_block(now).is_some()
            || self.has_recent_failures(now, window)
    }

    /// Drops an expired block or failure run, keeping reserved attempts.
    fn forget_stale(&mut self, now: Instant, window: Duration) {
        if self.active_block(now).is_none() && !self.has_recent_failures(now, window) {
            *self = Self {
                attempts_in_flight: self.attempts_in_flight,
                ..Self::default()
            };
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ConnectionCounter {
    active_count: u32,
}

#[derive(Debug, Clone, Copy)]
struct RequestWindow {
    window_started_at: Instant,
    request_count: u32,
}

/// Number of entries removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired failure windows removed.
    pub failure_windows: usize,
    /// Zero-valued connection counters removed.
    pub connection_counters: usize,
    /// Elapsed request windows removed.
    pub request_windows: usize,
}

/// Number of keys currently tracked per policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackedKeys {
    /// Keys with a failure window.
    pub failure_windows: usize,
    /// Keys holding at least one connection.
    pub connection_counters: usize,
    /// Keys with a request window.
    pub request_windows: usize,
}

/// Admission control component shared by request-handling middleware.
#[derive(Debug)]
pub struct AdmissionGate {
    config: AdmissionGateConfig,
    failures: Mutex<HashMap<AdmissionKey, FailureWindow>>,
    connections: Mutex<HashMap<AdmissionKey, ConnectionCounter>>,
    requests: Mutex<HashMap<AdmissionKey, RequestWindow>>,
    last_sweep: Mutex<Instant>,
}

impl AdmissionGate {
    /// Creates a gate after validating the policy configuration.
    pub fn new(config: AdmissionGateConfig) -> AppResult<Self> {
        config.validate()?;

        Ok(Self {
            config,
            failures: Mutex::new(HashMap::new()),
            connections: Mutex::new(HashMap::new()),
            requests: Mutex::new(HashMap::new()),
            last_sweep: Mutex::new(Instant::now()),
        })
    }

    /// Returns the active policy configuration.
    #[must_use]
    pub fn config(&self) -> &AdmissionGateConfig {
        &self.config
    }

    /// Reports whether the key is currently blocked. Never mutates state.
    #[must_use]
    pub fn check_brute_force(&self, key: &AdmissionKey) -> BruteForceStatus {
        let now = Instant::now();
        let failures = self.failures.lock();

        match failures
            .get(key)
            .and_then(|window| window.active_block(now))
        {
            Some(blocked_until) => BruteForceStatus::Blocked { blocked_until },
            None => BruteForceStatus::Allowed,
        }
    }

    /// Records one failed attempt for the key.
    ///
    /// Reaching `max_failures` blocks the key for one window and resets the
    /// count. Failures recorded while a block is active are ignored.
    pub fn record_failure(&self, key: &AdmissionKey) {
        self.register_failure(key, false);
    }

    /// Clears all failure history for the key.
    pub fn record_success(&self, key: &AdmissionKey) {
        self.clear_failures(key, false);
    }

    /// Reserves one login attempt for the key.
    ///
    /// Recorded failures and attempts still in flight both count against
    /// `max_failures`, so concurrent guesses cannot outrun the threshold.
    /// Returns `None` while the key is blocked or its budget is reserved.
    #[must_use]
    pub fn try_begin_attempt(self: &Arc<Self>, key: &AdmissionKey) -> Option<LoginAttempt> {
        let now = Instant::now();
        self.maybe_sweep(now);

        let policy = self.config.brute_force;
        {
            let mut failures = self.failures.lock();
            let window = failures.entry(key.clone()).or_default();

            if window.active_block(now).is_some() {
                return None;
            }

            window.forget_stale(now, policy.window);
            let committed = window
                .failure_count
                .saturating_add(window.attempts_in_flight);
            if committed >= policy.max_failures {
                return None;
            }

            window.attempts_in_flight += 1;
        }

        Some(LoginAttempt::new(Arc::clone(self), key.clone()))
    }

    fn settle_attempt(&self, key: &AdmissionKey, outcome: AttemptOutcome) {
        match outcome {
            AttemptOutcome::Succeeded => self.clear_failures(key, true),
            AttemptOutcome::Failed => self.register_failure(key, true),
            AttemptOutcome::Abandoned => self.release_attempt(key),
        }
    }

    fn register_failure(&self, key: &AdmissionKey, settles_attempt: bool) {
        let now = Instant::now();
        self.maybe_sweep(now);

        let policy = self.config.brute_force;
        let imposed_block = {
            let mut failures = self.failures.lock();
            let window = failures.entry(key.clone()).or_default();
            if settles_attempt {
                window.attempts_in_flight = window.attempts_in_flight.saturating_sub(1);
            }

            if window.active_block(now).is_some() {
                None
            } else {
                window.forget_stale(now, policy.window);
                window.failure_count = window.failure_count.saturating_add(1);
                window.last_failure_at = Some(now);

                if window.failure_count >= policy.max_failures {
                    let blocked_until = now + policy.window;
                    window.failure_count = 0;
                    window.blocked_until = Some(blocked_until);
                    Some(blocked_until)
                } else {
                    None
                }
            }
        };

        if imposed_block.is_some() {
            warn!(
                key = %key,
                max_failures = policy.max_failures,
                block_seconds = policy.window.as_secs(),
                "admission key blocked after repeated failures"
            );
        }
    }

    fn clear_failures(&self, key: &AdmissionKey, settles_attempt: bool) {
        let mut failures = self.failures.lock();

        if let Entry::Occupied(mut entry) = failures.entry(key.clone()) {
            let mut attempts_in_flight = entry.get().attempts_in_flight;
            if settles_attempt {
                attempts_in_flight = attempts_in_flight.saturating_sub(1);
            }

            if attempts_in_flight == 0 {
                entry.remove();
            } else {
                *entry.get_mut() = FailureWindow {
                    attempts_in_flight,
                    ..FailureWindow::default()
                };
            }
        }
    }

    fn release_attempt(&self, key: &AdmissionKey) {
        let now = Instant::now();
        let window_length = self.config.brute_force.window;
        let mut failures = self.failures.lock();

        if let Entry::Occupied(mut entry) = failures.entry(key.clone()) {
            let window = entry.get_mut();
            window.attempts_in_flight = window.attempts_in_flight.saturating_sub(1);
            if !window.is_live(now, window_length) {
                entry.remove();
            }
        }
    }

    /// Returns whether a connection would currently be admitted.
    ///
    /// Does not reserve anything; `add_connection` re-checks atomically.
    #[must_use]
    pub fn can_admit_connection(&self, key: &AdmissionKey) -> bool {
        let connections = self.connections.lock();
        let active = connections
            .get(key)
            .map_or(0, |counter| counter.active_count);

        active < self.config.connections.max_connections_per_key
    }

    /// Reserves one connection slot if the key is under its cap.
    pub fn add_connection(&self, key: &AdmissionKey) -> ConnectionGrant {
        let now = Instant::now();
        self.maybe_sweep(now);

        let mut connections = self.connections.lock();
        let active = connections
            .get(key)
            .map_or(0, |counter| counter.active_count);

        if active >= self.config.connections.max_connections_per_key {
            return ConnectionGrant::Denied;
        }

        let counter = connections.entry(key.clone()).or_default();
        counter.active_count = counter.active_count.saturating_add(1);
        ConnectionGrant::Granted
    }

    /// Releases one connection slot, removing the entry once it reaches zero.
    pub fn remove_connection(&self, key: &AdmissionKey) {
        let mut connections = self.connections.lock();

        if let Entry::Occupied(mut entry) = connections.entry(key.clone()) {
            let counter = entry.get_mut();
            counter.active_count = counter.active_count.saturating_sub(1);
            if counter.active_count == 0 {
                entry.remove();
            }
        }
    }

    /// Reserves a connection slot released automatically when the permit drops.
    #[must_use]
    pub fn try_acquire_connection(self: &Arc<Self>, key: &AdmissionKey) -> Option<ConnectionPermit> {
        match self.add_connection(key) {
            ConnectionGrant::Granted => Some(ConnectionPermit::new(Arc::clone(self), key.clone())),
            ConnectionGrant::Denied => None,
        }
    }

    /// Counts one request against the key's fixed window.
    pub fn check_request_rate(&self, key: &AdmissionKey) -> RequestRateDecision {
        let now = Instant::now();
        self.maybe_sweep(now);

        let policy = self.config.request_rate;
        let mut requests = self.requests.lock();
        let window = requests.entry(key.clone()).or_insert(RequestWindow {
            window_started_at: now,
            request_count: 0,
        });

        if now >= window.window_started_at + policy.window {
            window.window_started_at = now;
            window.request_count = 0;
        }

        window.request_count = window.request_count.saturating_add(1);

        if window.request_count > policy.max_requests {
            RequestRateDecision::Limited {
                window_resets_at: window.window_started_at + policy.window,
            }
        } else {
            RequestRateDecision::Allowed {
                remaining: policy.max_requests - window.request_count,
            }
        }
    }

    /// Removes idle entries from every policy map.
    pub fn sweep(&self) -> SweepReport {
        let now = Instant::now();
        *self.last_sweep.lock() = now;
        self.sweep_at(now)
    }

    /// Returns how many keys each policy currently tracks.
    #[must_use]
    pub fn tracked_keys(&self) -> TrackedKeys {
        TrackedKeys {
            failure_windows: self.failures.lock().len(),
            connection_counters: self.connections.lock().len(),
            request_windows: self.requests.lock().len(),
        }
    }

    fn maybe_sweep(&self, now: Instant) {
        {
            let mut last_sweep = self.last_sweep.lock();
            if now.duration_since(*last_sweep) < self.config.sweep_interval {
                return;
            }
            *last_sweep = now;
        }

        self.sweep_at(now);
    }

    fn sweep_at(&self, now: Instant) -> SweepReport {
        let failure_window = self.config.brute_force.window;
        let request_window = self.config.request_rate.window;

        let failure_windows = {
            let mut failures = self.failures.lock();
            let before = failures.len();
            failures.retain(|_, window| window.is_live(now, failure_window));
            before - failures.len()
        };

        let connection_counters = {
            let mut connections = self.connections.lock();
            let before = connections.len();
            connections.retain(|_, counter| counter.active_count > 0);
            before - connections.len()
        };

        let request_windows = {
            let mut requests = self.requests.lock();
            let before = requests.len();
            requests.retain(|_, window| now < window.window_started_at + request_window);
            before - requests.len()
        };

        let report = SweepReport {
            failure_windows,
            connection_counters,
            request_windows,
        };

        debug!(
            failure_windows = report.failure_windows,
            connection_counters = report.connection_counters,
            request_windows = report.request_windows,
            "admission gate sweep completed"
        );

        report
    }
}
