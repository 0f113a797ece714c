// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for login credentials and session cookies.
//!
//! ```rust,ignore
//! async fn login(credentials: BasicCredentials) -> impl IntoResponse { .. }
//! async fn proxied(Session(claim): Session) -> impl IntoResponse { .. }
//! ```

use std::fmt;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use base64ct::{Base64, Encoding};

use super::token::{SessionClaim, TokenError};
use crate::api::found;
use crate::error::{ApiError, CHALLENGE_PROVIDE};
use crate::state::AppState;

/// HTTP Basic credentials from the `Authorization` header.
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

impl BasicCredentials {
    /// Parse an `Authorization: Basic <base64(user:pass)>` header value.
    pub fn parse(header: &str) -> Option<Self> {
        let (scheme, encoded) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }

        let decoded = Base64::decode_vec(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;

        Some(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

impl<S> FromRequestParts<S> for BasicCredentials
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(BasicCredentials::parse)
            .ok_or_else(|| ApiError::unauthorized(CHALLENGE_PROVIDE))
    }
}

/// A verified session, read from the configured session cookie.
#[derive(Debug, Clone)]
pub struct Session(pub SessionClaim);

/// Why a request carried no usable session.
///
/// Both variants send the browser back to `/login`; only the query string
/// tells them apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRejection {
    /// No session cookie
    InvalidCookie,
    /// Cookie present but the token did not verify
    InvalidToken(TokenError),
}

impl SessionRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            SessionRejection::InvalidCookie => "invalid_cookie",
            SessionRejection::InvalidToken(_) => "invalid_token",
        }
    }

    pub fn login_location(&self) -> String {
        format!("/login?error={}", self.reason())
    }
}

impl IntoResponse for SessionRejection {
    fn into_response(self) -> Response {
        found(&self.login_location())
    }
}

impl FromRequestParts<AppState> for Session {
    type Rejection = SessionRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let cookie = jar
            .get(&state.config.session_cookie_name)
            .ok_or(SessionRejection::InvalidCookie)?;

        let claim = state
            .codec
            .verify(cookie.value())
            .map_err(SessionRejection::InvalidToken)?;

        Ok(Session(claim))
    }
}
