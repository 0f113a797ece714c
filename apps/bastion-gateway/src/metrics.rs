// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Prometheus metrics exposed at `/metrics`.

use std::sync::Arc;

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

// ---------------------------------------------------------------------------
// Label types
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct LoginLabels {
    pub outcome: LoginOutcome,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum LoginOutcome {
    Success,
    Unauthorized,
    Forbidden,
    Error,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RejectionLabels {
    pub reason: RejectionReason,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum RejectionReason {
    InvalidCookie,
    InvalidToken,
    ForbiddenPath,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct GroupLabels {
    pub group: String,
}

// ---------------------------------------------------------------------------
// Metrics struct
// ---------------------------------------------------------------------------

pub struct Metrics {
    pub login_attempts: Family<LoginLabels, Counter>,
    pub proxied_requests: Counter,
    pub upstream_errors: Counter,
    pub session_rejections: Family<RejectionLabels, Counter>,
    pub group_refresh: Counter,
    pub group_refresh_failures: Family<GroupLabels, Counter>,
    pub cached_group_members: Family<GroupLabels, Gauge>,
}

impl Metrics {
    /// Create every metric and register it with `registry`.
    pub fn new(registry: &mut Registry) -> Self {
        let login_attempts = Family::<LoginLabels, Counter>::default();
        registry.register(
            "bastion_login_attempts",
            "Login attempts by outcome",
            login_attempts.clone(),
        );

        let proxied_requests = Counter::default();
        registry.register(
            "bastion_proxied_requests",
            "Requests forwarded to the upstream",
            proxied_requests.clone(),
        );

        let upstream_errors = Counter::default();
        registry.register(
            "bastion_upstream_errors",
            "Forwarded requests that failed to reach the upstream",
            upstream_errors.clone(),
        );

        let session_rejections = Family::<RejectionLabels, Counter>::default();
        registry.register(
            "bastion_session_rejections",
            "Requests turned away before forwarding",
            session_rejections.clone(),
        );

        let group_refresh = Counter::default();
        registry.register(
            "bastion_group_refresh",
            "Completed group cache refresh ticks",
            group_refresh.clone(),
        );

        let group_refresh_failures = Family::<GroupLabels, Counter>::default();
        registry.register(
            "bastion_group_refresh_failures",
            "Group member fetches that failed during a refresh",
            group_refresh_failures.clone(),
        );

        let cached_group_members = Family::<GroupLabels, Gauge>::default();
        registry.register(
            "bastion_cached_group_members",
            "Members currently cached per allowed group",
            cached_group_members.clone(),
        );

        Self {
            login_attempts,
            proxied_requests,
            upstream_errors,
            session_rejections,
            group_refresh,
            group_refresh_failures,
            cached_group_members,
        }
    }

    pub fn record_login(&self, outcome: LoginOutcome) {
        self.login_attempts
            .get_or_create(&LoginLabels { outcome })
            .inc();
    }

    pub fn record_rejection(&self, reason: RejectionReason) {
        self.session_rejections
            .get_or_create(&RejectionLabels { reason })
            .inc();
    }

    pub fn record_refresh_failure(&self, group: &str) {
        self.group_refresh_failures
            .get_or_create(&GroupLabels {
                group: group.to_string(),
            })
            .inc();
    }

    pub fn set_cached_members(&self, group: &str, count: usize) {
        self.cached_group_members
            .get_or_create(&GroupLabels {
                group: group.to_string(),
            })
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }
}

// ---------------------------------------------------------------------------
// Shared handle
// ---------------------------------------------------------------------------

/// Cloneable handle to the registry and its metrics, held in [`crate::state::AppState`].
#[derive(Clone)]
pub struct MetricsRegistry {
    pub registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);
        Self {
            registry: Arc::new(registry),
            metrics: Arc::new(metrics),
        }
    }

    /// Render the registry in OpenMetrics text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();
        prometheus_client::encoding::text::encode(&mut buf, &self.registry)?;
        Ok(buf)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
