// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `/login` and `/logout`.
//!
//! Login failures all look the same to the caller (401 with a `Basic`
//! challenge); the specific reason only goes to the log.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::{error, info, warn};

use super::found;
use crate::auth::{AuthError, BasicCredentials};
use crate::config::{LOGIN_VALIDATION_WINDOW, SESSION_TTL};
use crate::error::ApiError;
use crate::metrics::LoginOutcome;
use crate::state::AppState;

fn session_cookie(name: String, value: String, max_age: time::Duration) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(true)
        .path("/")
        .max_age(max_age)
        .build()
}

/// Validate Basic credentials and hand out a session cookie.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    credentials: BasicCredentials,
) -> Response {
    let metrics = &state.metrics.metrics;
    let username = credentials.username.as_str();

    if let Err(e) = state
        .authenticator
        .authenticate_password(username, &credentials.password, LOGIN_VALIDATION_WINDOW)
        .await
    {
        warn!(%username, error_code = e.error_code(), error = %e, "Login rejected");
        metrics.record_login(match e {
            AuthError::ProviderUnavailable(_) => LoginOutcome::Error,
            _ => LoginOutcome::Unauthorized,
        });
        return e.into_response();
    }

    if !state.groups.is_authorized(username).await {
        warn!(%username, "Login refused, user is not in an allowed group");
        metrics.record_login(LoginOutcome::Forbidden);
        return ApiError::forbidden().into_response();
    }

    let token = match state.codec.issue(username, SESSION_TTL) {
        Ok(token) => token,
        Err(e) => {
            error!(%username, error = %e, "Failed to issue session token");
            metrics.record_login(LoginOutcome::Error);
            return ApiError::internal("Internal Server Error").into_response();
        }
    };

    let max_age = time::Duration::seconds(SESSION_TTL.as_secs() as i64);
    let jar = jar.add(session_cookie(
        state.config.session_cookie_name.clone(),
        token,
        max_age,
    ));

    info!(%username, "Login succeeded");
    metrics.record_login(LoginOutcome::Success);
    (jar, found(&state.config.upstream.path_prefix)).into_response()
}

/// Expire the session cookie and go back to `/`.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    let jar = jar.add(session_cookie(
        state.config.session_cookie_name.clone(),
        String::new(),
        time::Duration::seconds(-1),
    ));
    (jar, found("/")).into_response()
}
