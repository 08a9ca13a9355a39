use std::fmt::{Display, Formatter};
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use timebank_core::{AppResult, NonEmptyString};

/// Identifier scoping one admission-control decision.
///
/// Keys built through [`AdmissionKey::for_address`] and
/// [`AdmissionKey::for_user`] carry a family prefix so a user subject can never
/// collide with a client address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdmissionKey(String);

impl AdmissionKey {
    /// Creates a key from an arbitrary non-empty identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = NonEmptyString::new(value)?;
        Ok(Self(value.into()))
    }

    /// Creates a key scoped to one client network address.
    #[must_use]
    pub fn for_address(address: IpAddr) -> Self {
        Self(format!("addr:{address}"))
    }

    /// Creates a key scoped to one authenticated user subject.
    pub fn for_user(subject: &str) -> AppResult<Self> {
        let subject = NonEmptyString::new(subject.trim())?;
        Ok(Self(format!("user:{}", subject.as_str())))
    }

    /// Creates a key scoped to one login identifier (email or username).
    ///
    /// Identifiers are case-folded so `Alice@x.io` and `alice@x.io` share one
    /// failure history.
    pub fn for_login(identifier: &str) -> AppResult<Self> {
        let identifier = NonEmptyString::new(identifier.trim().to_lowercase())?;
        Ok(Self(format!("login:{}", identifier.as_str())))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for AdmissionKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}
