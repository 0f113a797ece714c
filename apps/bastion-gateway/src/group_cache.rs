// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Group Authorization Cache
//!
//! Background task that keeps an in-memory snapshot of which users belong to
//! each allowed group, plus the membership check used at login.
//!
//! ## Strategy
//!
//! Every `refresh_period` (default 5 min) the refresher:
//! 1. Fetches the member list of every allowed group from the provider,
//!    without holding the snapshot lock.
//! 2. Logs and skips groups whose fetch failed; their previous members stay.
//! 3. Takes the write lock once and swaps in every fetched group.
//!
//! Readers therefore see either the whole previous tick or the whole new one.
//! Staleness is bounded by one refresh period.
//!
//! An empty allowed-group list disables the cache: no task is spawned and
//! every user is authorized.
//!
//! Membership checks are a linear scan over all cached groups. Fine for a
//! few dozen users; a username → groups index would be the next step.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics::MetricsRegistry;
use crate::provider::IdentityProvider;

/// Group name → member usernames.
type GroupSnapshot = HashMap<String, HashSet<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheMode {
    /// No allowed groups configured; everyone is authorized.
    Disabled,
    Enabled,
}

/// Outcome of one refresh tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RefreshReport {
    pub(crate) refreshed: Vec<String>,
    pub(crate) failed: Vec<String>,
}

pub struct GroupCache {
    provider: Arc<dyn IdentityProvider>,
    allowed_groups: Vec<String>,
    refresh_period: Duration,
    mode: CacheMode,
    snapshot: RwLock<GroupSnapshot>,
    metrics: MetricsRegistry,
}

impl GroupCache {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        allowed_groups: Vec<String>,
        refresh_period: Duration,
        metrics: MetricsRegistry,
    ) -> Self {
        let mode = if allowed_groups.is_empty() {
            CacheMode::Disabled
        } else {
            CacheMode::Enabled
        };

        Self {
            provider,
            allowed_groups,
            refresh_period,
            mode,
            snapshot: RwLock::new(GroupSnapshot::new()),
            metrics,
        }
    }

    #[cfg(test)]
    fn mode(&self) -> CacheMode {
        self.mode
    }

    /// Spawn the refresher unless the cache is disabled.
    ///
    /// The task runs until `shutdown` is cancelled; nothing joins it.
    pub fn start(self: &Arc<Self>, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        if self.mode == CacheMode::Disabled {
            info!("Empty list of allowed groups, group cache disabled");
            return None;
        }

        Some(tokio::spawn(Arc::clone(self).run(shutdown)))
    }

    async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(
            groups = ?self.allowed_groups,
            interval_secs = self.refresh_period.as_secs(),
            "Group cache refresher starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Group cache refresher shutting down");
                return;
            }

            self.refresh().await;

            tokio::select! {
                _ = tokio::time::sleep(self.refresh_period) => {},
                _ = shutdown.cancelled() => {
                    info!("Group cache refresher shutting down");
                    return;
                }
            }
        }
    }

    /// Run one refresh tick. Never fails; per-group errors are logged.
    pub(crate) async fn refresh(&self) -> RefreshReport {
        debug!("Group cache sync started");

        let mut fetched = Vec::with_capacity(self.allowed_groups.len());
        let mut report = RefreshReport::default();

        for group in &self.allowed_groups {
            match self.provider.group_members(group).await {
                Ok(members) => {
                    fetched.push((group.clone(), members.into_iter().collect::<HashSet<_>>()));
                    report.refreshed.push(group.clone());
                }
                Err(e) => {
                    warn!(group = %group, error = %e, "Failed to sync group");
                    self.metrics.metrics.record_refresh_failure(group);
                    report.failed.push(group.clone());
                }
            }
        }

        {
            let mut snapshot = self.snapshot.write().await;
            for (group, members) in fetched {
                self.metrics.metrics.set_cached_members(&group, members.len());
                snapshot.insert(group, members);
            }
        }

        self.metrics.metrics.group_refresh.inc();
        debug!(
            refreshed = report.refreshed.len(),
            failed = report.failed.len(),
            "Group cache sync finished"
        );
        report
    }

    /// Whether `username` may use the gateway.
    pub async fn is_authorized(&self, username: &str) -> bool {
        if self.mode == CacheMode::Disabled {
            return true;
        }

        let snapshot = self.snapshot.read().await;
        snapshot.values().any(|members| members.contains(username))
    }

    #[cfg(test)]
    async fn snapshot(&self) -> GroupSnapshot {
        self.snapshot.read().await.clone()
    }
}
