//! Thread-safe request telemetry aggregation.


use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::time::Instant;

/// Point-in-time copy of the aggregated request counters.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMetricsSnapshot {
    /// Requests recorded since start.
    pub total_requests: u64,
    /// Request count per HTTP method.
    pub requests_by_method: BTreeMap<String, u64>,
    /// Request count per response status code.
    pub requests_by_status: BTreeMap<u16, u64>,
    /// Sum of all recorded latencies.
    pub total_latency: Duration,
    /// `total_latency / total_requests`, zero before the first request.
    pub average_latency: Duration,
    /// Smallest recorded latency; `None` until the first request.
    pub min_latency: Option<Duration>,
    /// Largest recorded latency.
    pub max_latency: Duration,
    /// Time since the aggregator was created.
    pub uptime: Duration,
    /// Wall-clock time the snapshot was taken.
    pub captured_at: DateTime<Utc>,
}

impl RequestMetricsSnapshot {
    /// Returns the average latency in fractional milliseconds.
    #[must_use]
    pub fn average_latency_ms(&self) -> f64 {
        self.average_latency.as_secs_f64() * 1000.0
    }

    /// Returns whether the histograms and the average agree with the total.
    ///
    /// A snapshot failing this check means the aggregator's locking is broken;
    /// it is a bug, not a runtime condition.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let method_sum: u64 = self.requests_by_method.values().sum();
        let status_sum: u64 = self.requests_by_status.values().sum();

        if method_sum != self.total_requests || status_sum != self.total_requests {
            return false;
        }

        if self.total_requests == 0 {
            return self.total_latency.is_zero()
                && self.average_latency.is_zero()
                && self.min_latency.is_none();
        }

        let expected_average = self.total_latency.as_secs_f64() / self.total_requests as f64;
        (expected_average - self.average_latency.as_secs_f64()).abs() < 1e-6
            && self
                .min_latency
                .is_some_and(|min_latency| min_latency <= self.max_latency)
    }
}

#[derive(Debug, Default)]
struct MetricsState {
    total_requests: u64,
    requests_by_method: BTreeMap<String, u64>,
    requests_by_status: BTreeMap<u16, u64>,
    total_latency: Duration,
    average_latency: Duration,
    min_latency: Option<Duration>,
    max_latency: Duration,
}

/// Live request counters, owned by the request pipeline.
#[derive(Debug)]
pub struct RequestMetrics {
    started_at: Instant,
    state: RwLock<MetricsState>,
}

impl Default for RequestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestMetrics {
    /// Creates an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            state: RwLock::new(MetricsState::default()),
        }
    }

    /// Records one completed request.
    ///
    /// Every dependent field is updated inside one write section, so readers
    /// never see an average derived from a mismatched total.
    pub fn record(&self, method: &str, status_code: u16, latency: Duration) {
        let method = method.to_ascii_uppercase();
        let mut state = self.state.write();

        state.total_requests = state.total_requests.saturating_add(1);
        *state.requests_by_method.entry(method).or_insert(0) += 1;
        *state.requests_by_status.entry(status_code).or_insert(0) += 1;
        state.total_latency = state.total_latency.saturating_add(latency);
        state.average_latency = average(state.total_latency, state.total_requests);
        state.min_latency = Some(
            state
                .min_latency
                .map_or(latency, |min_latency| min_latency.min(latency)),
        );
        state.max_latency = state.max_latency.max(latency);
    }

    /// Returns an independent copy of the current counters.
    #[must_use]
    pub fn snapshot(&self) -> RequestMetricsSnapshot {
        let uptime = self.started_at.elapsed();
        let state = self.state.read();

        RequestMetricsSnapshot {
            total_requests: state.total_requests,
            requests_by_method: state.requests_by_method.clone(),
            requests_by_status: state.requests_by_status.clone(),
            total_latency: state.total_latency,
            average_latency: state.average_latency,
            min_latency: state.min_latency,
            max_latency: state.max_latency,
            uptime,
            captured_at: Utc::now(),
        }
    }
}

fn average(total: Duration, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }

    let nanos = total.as_nanos() / u128::from(count);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}
