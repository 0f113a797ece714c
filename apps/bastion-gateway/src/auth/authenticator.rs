// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Secret + MFA validation against the identity provider.
//!
//! ## Flow
//!
//! 1. Resolve the provider account id (memoised after the first success)
//! 2. List the user's access keys and take the first one, which must be active
//! 3. Derive the MFA device id from account id + username
//! 4. Exchange key id + secret + MFA code for a short-lived session token
//!
//! A successful exchange is the proof of identity. The exchanged credentials
//! never leave the provider call.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::debug;

use super::AuthError;
use crate::provider::{CredentialExchange, IdentityProvider, ProviderError};

/// Number of trailing password characters holding the MFA code.
pub const MFA_CODE_LEN: usize = 6;

/// A login password split into its secret and MFA code.
pub struct LoginPassword<'a> {
    pub secret: &'a str,
    pub mfa_code: &'a str,
}

impl fmt::Debug for LoginPassword<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LoginPassword([redacted])")
    }
}

/// Split `<secret><6 digit MFA code>`.
///
/// Anything shorter than one secret character plus the code is rejected
/// before the provider is contacted.
pub fn split_password(password: &str) -> Result<LoginPassword<'_>, AuthError> {
    let len = password.chars().count();
    if len <= MFA_CODE_LEN {
        return Err(AuthError::PasswordTooShort);
    }

    let boundary = password
        .char_indices()
        .nth(len - MFA_CODE_LEN)
        .map(|(idx, _)| idx)
        .ok_or(AuthError::PasswordTooShort)?;

    let (secret, mfa_code) = password.split_at(boundary);
    Ok(LoginPassword { secret, mfa_code })
}

/// MFA device identifier registered for `username`.
pub fn mfa_device_id(account_id: &str, username: &str) -> String {
    format!("arn:aws:iam::{account_id}:mfa/{username}")
}

pub struct SessionAuthenticator {
    provider: Arc<dyn IdentityProvider>,
    account_id: OnceCell<String>,
}

impl SessionAuthenticator {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            account_id: OnceCell::new(),
        }
    }

    /// Validate a packed login password.
    pub async fn authenticate_password(
        &self,
        username: &str,
        password: &str,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        let LoginPassword { secret, mfa_code } = split_password(password)?;
        self.authenticate(username, secret, mfa_code, ttl).await
    }

    /// Prove that the caller knows a valid secret and MFA code for `username`.
    ///
    /// `ttl` is the validity requested for the throwaway provider session.
    pub async fn authenticate(
        &self,
        username: &str,
        secret: &str,
        mfa_code: &str,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        let account_id = self
            .account_id
            .get_or_try_init(|| async { self.provider.current_account_id().await })
            .await
            .map_err(unavailable)?;

        let keys = self
            .provider
            .list_access_keys(username)
            .await
            .map_err(unavailable)?;

        // Only the first listed key is considered, even if a later one is active.
        let key = keys.first().ok_or(AuthError::NoAccessKey)?;
        if !key.is_active() {
            return Err(AuthError::InactiveKey);
        }

        let device = mfa_device_id(account_id, username);
        debug!(%username, access_key_id = %key.id, mfa_device = %device, "Exchanging credentials");

        self.provider
            .exchange_for_session_token(CredentialExchange {
                access_key_id: &key.id,
                secret,
                mfa_device_id: &device,
                mfa_code,
                duration: ttl,
            })
            .await
            .map_err(|e| match e {
                ProviderError::Rejected(_) => AuthError::InvalidMfa,
                ProviderError::Unavailable(msg) => AuthError::ProviderUnavailable(msg),
            })
    }
}

fn unavailable(err: ProviderError) -> AuthError {
    AuthError::ProviderUnavailable(err.to_string())
}
