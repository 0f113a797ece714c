// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::{ApiError, CHALLENGE_INVALID};

/// Why a login attempt was refused.
///
/// Every variant renders as the same generic 401 so that a caller cannot
/// tell a wrong secret from a wrong MFA code. The specific reason is for the
/// server log only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Password too short to hold a secret plus a 6 digit MFA code
    PasswordTooShort,
    /// User has no access keys
    NoAccessKey,
    /// User has keys but none of them is active
    InactiveKey,
    /// Provider refused the secret / MFA code pair
    InvalidMfa,
    /// Provider could not be reached or failed
    ProviderUnavailable(String),
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::PasswordTooShort => "password_too_short",
            AuthError::NoAccessKey => "no_access_key",
            AuthError::InactiveKey => "inactive_key",
            AuthError::InvalidMfa => "invalid_mfa",
            AuthError::ProviderUnavailable(_) => "provider_unavailable",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::PasswordTooShort => {
                write!(f, "Password must hold a secret followed by a 6 digit MFA code")
            }
            AuthError::NoAccessKey => write!(f, "No matching access key found"),
            AuthError::InactiveKey => write!(f, "No active access key found"),
            AuthError::InvalidMfa => write!(f, "Secret or MFA code rejected"),
            AuthError::ProviderUnavailable(msg) => {
                write!(f, "Identity provider unavailable: {msg}")
            }
        }
    }
}

impl std::error::Error for AuthError {}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError {
            status: err.status_code(),
            ..ApiError::unauthorized(CHALLENGE_INVALID)
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
