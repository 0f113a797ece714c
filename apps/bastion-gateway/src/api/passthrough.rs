// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Catch-all route: session check, path check, then forward.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

use crate::auth::{Session, SessionRejection};
use crate::error::ApiError;
use crate::metrics::RejectionReason;
use crate::proxy::normalize_path;
use crate::state::AppState;

pub async fn passthrough(
    State(state): State<AppState>,
    session: Result<Session, SessionRejection>,
    request: Request,
) -> Response {
    let metrics = &state.metrics.metrics;

    let Session(claim) = match session {
        Ok(session) => session,
        Err(rejection) => {
            metrics.record_rejection(match rejection {
                SessionRejection::InvalidCookie => RejectionReason::InvalidCookie,
                SessionRejection::InvalidToken(_) => RejectionReason::InvalidToken,
            });
            return rejection.into_response();
        }
    };

    // Checked on the resolved path, which is what the upstream receives.
    let path = normalize_path(request.uri().path());
    if !state.config.upstream.allows_path(&path) {
        warn!(
            username = %claim.username,
            path = %request.uri().path(),
            resolved = %path,
            "Path outside upstream prefix"
        );
        metrics.record_rejection(RejectionReason::ForbiddenPath);
        return ApiError::forbidden().into_response();
    }

    info!(
        username = %claim.username,
        method = %request.method(),
        uri = %request.uri(),
        "Proxying request"
    );

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    metrics.proxied_requests.inc();
    match state.upstream.forward(request, peer).await {
        Ok(response) => response,
        Err(e) => {
            warn!(username = %claim.username, error = %e, "Upstream request failed");
            metrics.upstream_errors.inc();
            ApiError::bad_gateway().into_response()
        }
    }
}
