use std::sync::Arc;

use timebank_domain::AdmissionKey;

use super::AdmissionGate;

/// A reserved connection slot, released exactly once when dropped.
#[derive(Debug)]
pub struct ConnectionPermit {
    gate: Arc<AdmissionGate>,
    key: AdmissionKey,
}

impl ConnectionPermit {
    pub(super) fn new(gate: Arc<AdmissionGate>, key: AdmissionKey) -> Self {
        Self { gate, key }
    }

    /// Returns the key holding this slot.
    #[must_use]
    pub fn key(&self) -> &AdmissionKey {
        &self.key
    }
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        self.gate.remove_connection(&self.key);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AttemptOutcome {
    Succeeded,
    Failed,
    Abandoned,
}

/// A reserved login attempt for one key.
///
/// Settle it with [`LoginAttempt::succeed`] or [`LoginAttempt::fail`]. Dropping
/// it unsettled, for example when verification errors out or the request is
/// cancelled, returns the reservation without counting a failure.
#[derive(Debug)]
pub struct LoginAttempt {
    gate: Arc<AdmissionGate>,
    key: AdmissionKey,
    settled: bool,
}

impl LoginAttempt {
    pub(super) fn new(gate: Arc<AdmissionGate>, key: AdmissionKey) -> Self {
        Self {
            gate,
            key,
            settled: false,
        }
    }

    /// Clears the key's failure history.
    pub fn succeed(mut self) {
        self.settle(AttemptOutcome::Succeeded);
    }

    /// Counts the attempt as a failure.
    pub fn fail(mut self) {
        self.settle(AttemptOutcome::Failed);
    }

    fn settle(&mut self, outcome: AttemptOutcome) {
        self.settled = true;
        self.gate.settle_attempt(&self.key, outcome);
    }
}

impl Drop for LoginAttempt {
    fn drop(&mut self) {
        if !self.settled {
            self.gate.settle_attempt(&self.key, AttemptOutcome::Abandoned);
        }
    }
}
