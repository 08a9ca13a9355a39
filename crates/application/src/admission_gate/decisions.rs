use timebank_core::{AppError, AppResult};
use tokio::time::Instant;

/// Message returned for every admission denial, whatever policy fired.
pub const ADMISSION_DENIED_MESSAGE: &str = "too many requests, please try again later";

fn admission_denied() -> AppError {
    AppError::AdmissionDenied(ADMISSION_DENIED_MESSAGE.to_owned())
}

/// Brute-force policy verdict for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BruteForceStatus {
    /// No active block.
    Allowed,
    /// Blocked until the given instant.
    Blocked {
        /// First instant at which the key is admitted again.
        blocked_until: Instant,
    },
}

impl BruteForceStatus {
    /// Returns whether the key is currently blocked.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    /// Converts a block into the generic admission error.
    pub fn into_result(self) -> AppResult<()> {
        match self {
            Self::Allowed => Ok(()),
            Self::Blocked { .. } => Err(admission_denied()),
        }
    }
}

/// Outcome of reserving a connection slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionGrant {
    /// A slot was reserved and must be released with `remove_connection`.
    Granted,
    /// The key is at its cap; nothing was reserved.
    Denied,
}

impl ConnectionGrant {
    /// Returns whether a slot was reserved.
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    /// Converts a denial into the generic admission error.
    pub fn into_result(self) -> AppResult<()> {
        match self {
            Self::Granted => Ok(()),
            Self::Denied => Err(admission_denied()),
        }
    }
}

/// Request-rate policy verdict for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestRateDecision {
    /// The request fits in the current window.
    Allowed {
        /// Requests still admitted in this window.
        remaining: u32,
    },
    /// The window budget is spent.
    Limited {
        /// When the current window ends.
        window_resets_at: Instant,
    },
}

impl RequestRateDecision {
    /// Returns whether the request was admitted.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    /// Converts a limit into the generic admission error.
    pub fn into_result(self) -> AppResult<()> {
        match self {
            Self::Allowed { .. } => Ok(()),
            Self::Limited { .. } => Err(admission_denied()),
        }
    }
}
