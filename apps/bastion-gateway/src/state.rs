// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{SessionAuthenticator, SessionTokenCodec};
use crate::config::GatewayConfig;
use crate::group_cache::GroupCache;
use crate::metrics::MetricsRegistry;
use crate::provider::IdentityProvider;
use crate::proxy::UpstreamClient;

/// Shared handler state. Cloning is cheap; everything sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub codec: Arc<SessionTokenCodec>,
    pub authenticator: Arc<SessionAuthenticator>,
    pub groups: Arc<GroupCache>,
    pub upstream: Arc<UpstreamClient>,
    pub metrics: MetricsRegistry,
}

impl AppState {
    /// Wire every component around one identity provider.
    ///
    /// Fails only if the upstream HTTP client cannot be built.
    pub fn new(
        config: GatewayConfig,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<Self, reqwest::Error> {
        let metrics = MetricsRegistry::new();
        let codec = SessionTokenCodec::new(&config.secret_key);
        let groups = GroupCache::new(
            Arc::clone(&provider),
            config.allowed_groups.clone(),
            config.group_cache_period,
            metrics.clone(),
        );
        let upstream = UpstreamClient::new(config.upstream.clone())?;

        Ok(Self {
            config: Arc::new(config),
            codec: Arc::new(codec),
            authenticator: Arc::new(SessionAuthenticator::new(provider)),
            groups: Arc::new(groups),
            upstream: Arc::new(upstream),
            metrics,
        })
    }
}
