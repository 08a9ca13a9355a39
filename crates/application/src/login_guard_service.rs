//! Login flow guarded by the admission gate's brute-force policy.
//!
//! An attempt is reserved with the gate before credentials are verified, so a
//! blocked login identifier is rejected even when the submitted secret is
//! correct, and concurrent guesses share one failure budget. Failures are
//! counted per case-folded identifier; a successful login clears them.


use std::sync::Arc;

use async_trait::async_trait;
use timebank_core::{AppError, AppResult, UserIdentity};
use timebank_domain::AdmissionKey;
use tracing::info;

use crate::admission_gate::{ADMISSION_DENIED_MESSAGE, AdmissionGate};

/// Port that checks submitted credentials against the account store.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Returns the matching identity, or `None` for unknown accounts and wrong secrets.
    ///
    /// Implementations must not distinguish the two `None` cases in timing.
    async fn verify(&self, identifier: &str, secret: &str) -> AppResult<Option<UserIdentity>>;
}

/// Result of a login attempt that passed admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Credentials matched.
    Authenticated(UserIdentity),
    /// Credentials did not match. Deliberately carries no reason.
    Failed,
}

/// Application service for password login.
#[derive(Clone)]
pub struct LoginGuardService {
    gate: Arc<AdmissionGate>,
    verifier: Arc<dyn CredentialVerifier>,
}

impl LoginGuardService {
    /// Creates a new login guard.
    #[must_use]
    pub fn new(gate: Arc<AdmissionGate>, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { gate, verifier }
    }

    /// Attempts a login.
    ///
    /// Returns `AppError::AdmissionDenied` while the identifier is blocked or
    /// its remaining attempts are all in flight, and `AppError::Validation` for
    /// an empty identifier. Verifier errors propagate without counting as a
    /// failed attempt.
    pub async fn login(&self, identifier: &str, secret: &str) -> AppResult<LoginOutcome> {
        let key = AdmissionKey::for_login(identifier)?;
        let attempt = self
            .gate
            .try_begin_attempt(&key)
            .ok_or_else(|| AppError::AdmissionDenied(ADMISSION_DENIED_MESSAGE.to_owned()))?;

        match self.verifier.verify(identifier, secret).await? {
            Some(identity) => {
                attempt.succeed();
                info!(subject = %identity.subject(), "login succeeded");
                Ok(LoginOutcome::Authenticated(identity))
            }
            None => {
                attempt.fail();
                Ok(LoginOutcome::Failed)
            }
        }
    }
}
