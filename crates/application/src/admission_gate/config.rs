use std::time::Duration;

use timebank_core::{AppError, AppResult};

/// Longest accepted brute-force or request-rate window.
pub const MAX_POLICY_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Fixed-threshold, fixed-window login failure policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BruteForcePolicy {
    /// Failures that impose a block once reached.
    pub max_failures: u32,
    /// How long a block lasts, and how long an unblocked failure run is remembered.
    pub window: Duration,
}

/// Cap on simultaneously held connections per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionPolicy {
    /// Maximum active connections for one key.
    pub max_connections_per_key: u32,
}

/// Fixed-window request budget per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestRatePolicy {
    /// Requests admitted within one window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
}

/// Configuration for all admission policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionGateConfig {
    /// Login brute-force policy.
    pub brute_force: BruteForcePolicy,
    /// Per-key connection cap.
    pub connections: ConnectionPolicy,
    /// Per-key request budget.
    pub request_rate: RequestRatePolicy,
    /// Minimum time between opportunistic sweeps of idle entries.
    pub sweep_interval: Duration,
}

impl Default for AdmissionGateConfig {
    fn default() -> Self {
        Self {
            brute_force: BruteForcePolicy {
                max_failures: 5,
                window: Duration::from_secs(15 * 60),
            },
            connections: ConnectionPolicy {
                max_connections_per_key: 5,
            },
            request_rate: RequestRatePolicy {
                max_requests: 100,
                window: Duration::from_secs(60),
            },
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl AdmissionGateConfig {
    /// Rejects configurations that would deny or admit everything.
    pub fn validate(&self) -> AppResult<()> {
        if self.brute_force.max_failures == 0 {
            return Err(AppError::Validation(
                "brute-force max_failures must be greater than zero".to_owned(),
            ));
        }

        validate_window("brute-force window", self.brute_force.window)?;

        if self.connections.max_connections_per_key == 0 {
            return Err(AppError::Validation(
                "max_connections_per_key must be greater than zero".to_owned(),
            ));
        }

        if self.request_rate.max_requests == 0 {
            return Err(AppError::Validation(
                "request-rate max_requests must be greater than zero".to_owned(),
            ));
        }

        validate_window("request-rate window", self.request_rate.window)?;

        Ok(())
    }
}

// Windows are added to monotonic instants, so they need an upper bound too.
fn validate_window(name: &str, window: Duration) -> AppResult<()> {
    if window.is_zero() {
        return Err(AppError::Validation(format!("{name} must be greater than zero")));
    }

    if window > MAX_POLICY_WINDOW {
        return Err(AppError::Validation(format!(
            "{name} must not exceed {} seconds",
            MAX_POLICY_WINDOW.as_secs()
        )));
    }

    Ok(())
}
