// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Reverse proxying to the upstream.
//!
//! [`direct`] rewrites an inbound request for the upstream: scheme and
//! authority are replaced, the path is kept as-is, the upstream's default
//! query is merged in, and the gateway's own session material
//! (`Authorization`, `Cookie`) is stripped. [`UpstreamClient`] then streams
//! the request out and the response back.

use std::net::IpAddr;

use axum::{
    body::{Body, HttpBody},
    http::{
        header::{AUTHORIZATION, CONNECTION, COOKIE, HOST, USER_AGENT},
        request::Parts,
        HeaderMap, HeaderName, HeaderValue, Request, Uri,
    },
    response::Response,
};
use tracing::debug;

use crate::config::UpstreamTarget;

/// Headers that only apply to a single hop and must not be forwarded.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("could not build upstream URI: {0}")]
    InvalidTarget(#[from] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

/// Join the upstream's query with the request's own.
///
/// `&` is only inserted when both sides are non-empty.
pub fn merge_query(upstream: &str, request: &str) -> String {
    if upstream.is_empty() || request.is_empty() {
        format!("{upstream}{request}")
    } else {
        format!("{upstream}&{request}")
    }
}

/// Resolve `.` and `..` segments, percent-encoded dots included.
///
/// The result is what URL parsing would turn the path into before it
/// leaves the gateway, so prefix checks must run on it. `..` never climbs
/// above the root.
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    let mut trailing_slash = false;

    for segment in path.split(['/', '\\']).skip(1) {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        trailing_slash = matches!(decoded.as_str(), "." | "..");
        match decoded.as_str() {
            "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    let mut normalized = String::with_capacity(path.len());
    for segment in &segments {
        normalized.push('/');
        normalized.push_str(segment);
    }
    if trailing_slash || normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

/// Rewrite `parts` so it targets the upstream.
pub fn direct(upstream: &UpstreamTarget, parts: &mut Parts) -> Result<(), axum::http::Error> {
    let path = normalize_path(parts.uri.path());
    let query = merge_query(&upstream.query, parts.uri.query().unwrap_or_default());
    let path_and_query = if query.is_empty() {
        path
    } else {
        format!("{path}?{query}")
    };

    parts.uri = Uri::builder()
        .scheme(upstream.scheme.as_str())
        .authority(upstream.authority.as_str())
        .path_and_query(path_and_query)
        .build()?;

    let headers = &mut parts.headers;
    headers.remove(AUTHORIZATION);
    headers.remove(COOKIE);
    headers.remove(HOST);
    if !headers.contains_key(USER_AGENT) {
        // Keep the client from filling in its own default.
        headers.insert(USER_AGENT, HeaderValue::from_static(""));
    }

    Ok(())
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, peer: IpAddr) {
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) if !prior.is_empty() => format!("{prior}, {peer}"),
        _ => peer.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

/// HTTP client bound to one upstream target.
pub struct UpstreamClient {
    target: UpstreamTarget,
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(target: UpstreamTarget) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { target, client })
    }

    /// Forward `request` and stream the upstream's answer back.
    pub async fn forward(
        &self,
        request: Request<Body>,
        peer: Option<IpAddr>,
    ) -> Result<Response, ProxyError> {
        let (mut parts, body) = request.into_parts();
        direct(&self.target, &mut parts)?;
        strip_hop_by_hop(&mut parts.headers);
        if let Some(peer) = peer {
            append_forwarded_for(&mut parts.headers, peer);
        }

        debug!(method = %parts.method, uri = %parts.uri, "Forwarding to upstream");

        let mut outbound = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers);
        if body.size_hint().exact() != Some(0) {
            outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let upstream = outbound.send().await?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}
