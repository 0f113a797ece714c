// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! immutable [`GatewayConfig`] shared by every request handler. Configuration
//! is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `BIND` | Address to listen for HTTP requests | `0.0.0.0:8080` |
//! | `SECRET_KEY` | Session token signing secret | Required |
//! | `SESSION_COOKIE_NAME` | Cookie carrying the session token | `sessionToken` |
//! | `UPSTREAM_URL` | Upstream URL, may include path and query | Required |
//! | `ALLOWED_GROUPS` | Comma separated IAM groups allowed through | empty (allow all) |
//! | `GROUP_CACHE_PERIOD` | Group cache refresh period in seconds | `300` |
//! | `DRAIN_GRACE_PERIOD` | Shutdown drain grace period in seconds | `30` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

pub const BIND_ENV: &str = "BIND";
pub const SECRET_KEY_ENV: &str = "SECRET_KEY";
pub const SESSION_COOKIE_NAME_ENV: &str = "SESSION_COOKIE_NAME";
pub const UPSTREAM_URL_ENV: &str = "UPSTREAM_URL";
pub const ALLOWED_GROUPS_ENV: &str = "ALLOWED_GROUPS";
pub const GROUP_CACHE_PERIOD_ENV: &str = "GROUP_CACHE_PERIOD";
pub const DRAIN_GRACE_PERIOD_ENV: &str = "DRAIN_GRACE_PERIOD";

/// Environment variable selecting the log output format.
///
/// `json` emits one JSON object per line, anything else the human format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_SESSION_COOKIE_NAME: &str = "sessionToken";
pub const DEFAULT_GROUP_CACHE_PERIOD: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_DRAIN_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Lifetime of the session cookie issued on a successful login.
pub const SESSION_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Validity requested from the identity provider when proving a login.
///
/// The exchanged credentials are discarded, so this is the shortest window
/// STS accepts for `GetSessionToken`.
pub const LOGIN_VALIDATION_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Fatal startup configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Secret key is required")]
    MissingSecretKey,

    #[error("Session cookie name can't be empty")]
    EmptyCookieName,

    #[error("Upstream URL is required")]
    MissingUpstream,

    #[error("Could not parse upstream: {0}")]
    InvalidUpstream(String),

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid duration for {var}: {value:?}")]
    InvalidDuration { var: &'static str, value: String },
}

/// Where authorized requests are forwarded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    /// `http` or `https`
    pub scheme: String,
    /// `host[:port]`
    pub authority: String,
    /// Every forwarded path must start with this prefix.
    pub path_prefix: String,
    /// Raw query merged into every forwarded request (may be empty).
    pub query: String,
}

impl UpstreamTarget {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Err(ConfigError::MissingUpstream);
        }

        let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUpstream(e.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUpstream(format!(
                "unsupported scheme {:?}",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| ConfigError::InvalidUpstream("missing host".to_string()))?;

        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(Self {
            scheme: url.scheme().to_string(),
            authority,
            path_prefix: url.path().to_string(),
            query: url.query().unwrap_or_default().to_string(),
        })
    }

    /// Whether `path` lies inside the upstream's path prefix.
    pub fn allows_path(&self, path: &str) -> bool {
        path.starts_with(&self.path_prefix)
    }
}

impl fmt::Display for UpstreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.authority, self.path_prefix)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        Ok(())
    }
}

/// Immutable gateway configuration, shared read-only by all handlers.
#[derive(Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub secret_key: Vec<u8>,
    pub session_cookie_name: String,
    pub allowed_groups: Vec<String>,
    pub group_cache_period: Duration,
    pub drain_grace_period: Duration,
    pub upstream: UpstreamTarget,
}

impl GatewayConfig {
    /// Build a configuration with defaults for everything but the secret
    /// and the upstream.
    pub fn new(secret_key: impl Into<Vec<u8>>, upstream_url: &str) -> Result<Self, ConfigError> {
        let secret_key = secret_key.into();
        if secret_key.is_empty() {
            return Err(ConfigError::MissingSecretKey);
        }

        let bind_addr = DEFAULT_BIND
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(DEFAULT_BIND.to_string()))?;

        Ok(Self {
            bind_addr,
            secret_key,
            session_cookie_name: DEFAULT_SESSION_COOKIE_NAME.to_string(),
            allowed_groups: Vec::new(),
            group_cache_period: DEFAULT_GROUP_CACHE_PERIOD,
            drain_grace_period: DEFAULT_DRAIN_GRACE_PERIOD,
            upstream: UpstreamTarget::parse(upstream_url)?,
        })
    }

    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret_key = lookup(SECRET_KEY_ENV).unwrap_or_default();
        let upstream_url = lookup(UPSTREAM_URL_ENV).ok_or(ConfigError::MissingUpstream)?;
        let mut config = Self::new(secret_key, &upstream_url)?;

        if let Some(bind) = lookup(BIND_ENV) {
            config.bind_addr = bind
                .parse()
                .map_err(|_| ConfigError::InvalidBindAddress(bind.clone()))?;
        }

        if let Some(name) = lookup(SESSION_COOKIE_NAME_ENV) {
            config = config.with_cookie_name(name)?;
        }

        if let Some(groups) = lookup(ALLOWED_GROUPS_ENV) {
            config.allowed_groups = parse_group_list(&groups);
        }

        if let Some(period) = lookup(GROUP_CACHE_PERIOD_ENV) {
            config.group_cache_period = parse_seconds(GROUP_CACHE_PERIOD_ENV, &period)?;
        }

        if let Some(grace) = lookup(DRAIN_GRACE_PERIOD_ENV) {
            config.drain_grace_period = parse_seconds(DRAIN_GRACE_PERIOD_ENV, &grace)?;
        }

        Ok(config)
    }

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyCookieName);
        }
        self.session_cookie_name = name;
        Ok(self)
    }

    pub fn with_allowed_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_group_cache_period(mut self, period: Duration) -> Self {
        self.group_cache_period = period;
        self
    }

    pub fn with_drain_grace_period(mut self, grace: Duration) -> Self {
        self.drain_grace_period = grace;
        self
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("bind_addr", &self.bind_addr)
            .field("secret_key", &"[redacted]")
            .field("session_cookie_name", &self.session_cookie_name)
            .field("allowed_groups", &self.allowed_groups)
            .field("group_cache_period", &self.group_cache_period)
            .field("drain_grace_period", &self.drain_grace_period)
            .field("upstream", &self.upstream)
            .finish()
    }
}

fn parse_group_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(String::from)
        .collect()
}

fn parse_seconds(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::InvalidDuration {
            var,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn upstream_parse_splits_components() {
        let target = UpstreamTarget::parse("https://grafana.internal:3000/dashboards?org=1").unwrap();
        assert_eq!(target.scheme, "https");
        assert_eq!(target.authority, "grafana.internal:3000");
        assert_eq!(target.path_prefix, "/dashboards");
        assert_eq!(target.query, "org=1");
        assert_eq!(
            target.to_string(),
            "https://grafana.internal:3000/dashboards?org=1"
        );
    }

    #[test]
    fn upstream_without_path_allows_everything() {
        let target = UpstreamTarget::parse("http://kibana").unwrap();
        assert_eq!(target.path_prefix, "/");
        assert!(target.allows_path("/"));
        assert!(target.allows_path("/app/discover"));
    }

    #[test]
    fn upstream_prefix_gates_paths() {
        let target = UpstreamTarget::parse("http://kibana/app").unwrap();
        assert!(target.allows_path("/app/discover"));
        assert!(!target.allows_path("/api/status"));
    }

    #[test]
    fn upstream_rejects_bad_input() {
        assert_eq!(UpstreamTarget::parse(""), Err(ConfigError::MissingUpstream));
        assert!(matches!(
            UpstreamTarget::parse("not a url"),
            Err(ConfigError::InvalidUpstream(_))
        ));
        assert!(matches!(
            UpstreamTarget::parse("ftp://files.internal"),
            Err(ConfigError::InvalidUpstream(_))
        ));
    }

    #[test]
    fn from_lookup_applies_defaults() {
        let config = GatewayConfig::from_lookup(lookup_from(&[
            (SECRET_KEY_ENV, "s3cr3t"),
            (UPSTREAM_URL_ENV, "http://localhost:9000"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND);
        assert_eq!(config.session_cookie_name, DEFAULT_SESSION_COOKIE_NAME);
        assert!(config.allowed_groups.is_empty());
        assert_eq!(config.group_cache_period, DEFAULT_GROUP_CACHE_PERIOD);
        assert_eq!(config.drain_grace_period, DEFAULT_DRAIN_GRACE_PERIOD);
    }

    #[test]
    fn from_lookup_reads_everything() {
        let config = GatewayConfig::from_lookup(lookup_from(&[
            (SECRET_KEY_ENV, "s3cr3t"),
            (UPSTREAM_URL_ENV, "http://localhost:9000/app"),
            (BIND_ENV, "127.0.0.1:9999"),
            (SESSION_COOKIE_NAME_ENV, "bastion"),
            (ALLOWED_GROUPS_ENV, "ops, sre,,"),
            (GROUP_CACHE_PERIOD_ENV, "60"),
            (DRAIN_GRACE_PERIOD_ENV, "5"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9999");
        assert_eq!(config.session_cookie_name, "bastion");
        assert_eq!(config.allowed_groups, vec!["ops", "sre"]);
        assert_eq!(config.group_cache_period, Duration::from_secs(60));
        assert_eq!(config.drain_grace_period, Duration::from_secs(5));
        assert_eq!(config.upstream.path_prefix, "/app");
    }

    #[test]
    fn from_lookup_rejects_missing_required_values() {
        let missing_secret =
            GatewayConfig::from_lookup(lookup_from(&[(UPSTREAM_URL_ENV, "http://up")]));
        assert_eq!(missing_secret.unwrap_err(), ConfigError::MissingSecretKey);

        let missing_upstream = GatewayConfig::from_lookup(lookup_from(&[(SECRET_KEY_ENV, "k")]));
        assert_eq!(missing_upstream.unwrap_err(), ConfigError::MissingUpstream);

        let empty_cookie = GatewayConfig::from_lookup(lookup_from(&[
            (SECRET_KEY_ENV, "k"),
            (UPSTREAM_URL_ENV, "http://up"),
            (SESSION_COOKIE_NAME_ENV, "  "),
        ]));
        assert_eq!(empty_cookie.unwrap_err(), ConfigError::EmptyCookieName);
    }

    #[test]
    fn from_lookup_rejects_bad_durations() {
        let result = GatewayConfig::from_lookup(lookup_from(&[
            (SECRET_KEY_ENV, "k"),
            (UPSTREAM_URL_ENV, "http://up"),
            (GROUP_CACHE_PERIOD_ENV, "5m"),
        ]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidDuration { var: GROUP_CACHE_PERIOD_ENV, .. })
        ));
    }

    #[test]
    fn debug_output_redacts_secret() {
        let config = GatewayConfig::new("super-secret-signing-key", "http://up").unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret-signing-key"));
        assert!(rendered.contains("[redacted]"));
    }
}
