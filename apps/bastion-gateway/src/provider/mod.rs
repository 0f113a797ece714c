// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity provider abstraction.
//!
//! The gateway never owns user accounts. Everything it knows about a user
//! (access keys, MFA device, group membership) is read through the
//! [`IdentityProvider`] trait so that handlers and the group cache can be
//! exercised against an in-memory double.

pub mod aws;

#[cfg(test)]
pub mod testing;

use std::fmt;
use std::time::Duration;

pub use aws::AwsIdentityProvider;

/// Lifecycle status of an access key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Active,
    Inactive,
}

/// Access key metadata as listed by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKey {
    pub id: String,
    pub status: KeyStatus,
}

impl AccessKey {
    pub fn is_active(&self) -> bool {
        self.status == KeyStatus::Active
    }
}

/// Parameters of a one-shot session token exchange.
///
/// `Debug` never prints the secret or the MFA code.
pub struct CredentialExchange<'a> {
    pub access_key_id: &'a str,
    pub secret: &'a str,
    pub mfa_device_id: &'a str,
    pub mfa_code: &'a str,
    pub duration: Duration,
}

impl fmt::Debug for CredentialExchange<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialExchange")
            .field("access_key_id", &self.access_key_id)
            .field("secret", &"[redacted]")
            .field("mfa_device_id", &self.mfa_device_id)
            .field("mfa_code", &"[redacted]")
            .field("duration", &self.duration)
            .finish()
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider answered and refused the request.
    #[error("request rejected by identity provider: {0}")]
    Rejected(String),

    /// The provider could not be reached or failed internally.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Operations the gateway consumes from the identity provider.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Account identifier used to build MFA device identifiers.
    async fn current_account_id(&self) -> Result<String, ProviderError>;

    async fn list_access_keys(&self, username: &str) -> Result<Vec<AccessKey>, ProviderError>;

    /// Exchange long-lived credentials plus an MFA code for a session token.
    ///
    /// Only success matters to the caller; the returned credentials are
    /// dropped inside the implementation.
    async fn exchange_for_session_token(
        &self,
        exchange: CredentialExchange<'_>,
    ) -> Result<(), ProviderError>;

    async fn group_members(&self, group: &str) -> Result<Vec<String>, ProviderError>;
}
