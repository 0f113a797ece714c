// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory identity provider for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{AccessKey, CredentialExchange, IdentityProvider, KeyStatus, ProviderError};

pub const TEST_ACCOUNT: &str = "123456789012";

/// Registered user: access keys plus the secret/MFA pair STS would accept.
#[derive(Clone)]
struct MockUser {
    keys: Vec<AccessKey>,
    secret: String,
    mfa_code: String,
}

#[derive(Default)]
pub struct MockIdentityProvider {
    users: Mutex<HashMap<String, MockUser>>,
    groups: Mutex<HashMap<String, Vec<String>>>,
    failing_groups: Mutex<HashSet<String>>,
    unavailable: Mutex<bool>,
    group_fetch_delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
    account_lookups: AtomicUsize,
    exchanges: Mutex<Vec<(String, String, Duration)>>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user with one active key.
    pub fn with_user(self, username: &str, secret: &str, mfa_code: &str) -> Self {
        let key = AccessKey {
            id: format!("AKIA{}", username.to_uppercase()),
            status: KeyStatus::Active,
        };
        self.with_user_keys(username, secret, mfa_code, vec![key])
    }

    pub fn with_user_keys(
        self,
        username: &str,
        secret: &str,
        mfa_code: &str,
        keys: Vec<AccessKey>,
    ) -> Self {
        self.users.lock().unwrap().insert(
            username.to_string(),
            MockUser {
                keys,
                secret: secret.to_string(),
                mfa_code: mfa_code.to_string(),
            },
        );
        self
    }

    pub fn with_group(self, group: &str, members: &[&str]) -> Self {
        self.set_group(group, members);
        self
    }

    pub fn set_group(&self, group: &str, members: &[&str]) {
        self.groups.lock().unwrap().insert(
            group.to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        );
    }

    pub fn fail_group(&self, group: &str, failing: bool) {
        let mut failing_groups = self.failing_groups.lock().unwrap();
        if failing {
            failing_groups.insert(group.to_string());
        } else {
            failing_groups.remove(group);
        }
    }

    /// Make every call fail as if the provider were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    pub fn set_group_fetch_delay(&self, delay: Option<Duration>) {
        *self.group_fetch_delay.lock().unwrap() = delay;
    }

    /// Total number of provider calls of any kind.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn account_lookups(&self) -> usize {
        self.account_lookups.load(Ordering::SeqCst)
    }

    /// `(access_key_id, mfa_device_id, duration)` of every exchange attempt.
    pub fn exchanges(&self) -> Vec<(String, String, Duration)> {
        self.exchanges.lock().unwrap().clone()
    }

    fn record_call(&self) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.unavailable.lock().unwrap() {
            return Err(ProviderError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn current_account_id(&self) -> Result<String, ProviderError> {
        self.record_call()?;
        self.account_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(TEST_ACCOUNT.to_string())
    }

    async fn list_access_keys(&self, username: &str) -> Result<Vec<AccessKey>, ProviderError> {
        self.record_call()?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .get(username)
            .map(|u| u.keys.clone())
            .unwrap_or_default())
    }

    async fn exchange_for_session_token(
        &self,
        exchange: CredentialExchange<'_>,
    ) -> Result<(), ProviderError> {
        self.record_call()?;
        self.exchanges.lock().unwrap().push((
            exchange.access_key_id.to_string(),
            exchange.mfa_device_id.to_string(),
            exchange.duration,
        ));

        let users = self.users.lock().unwrap();
        let accepted = users.iter().any(|(username, user)| {
            user.keys.iter().any(|k| k.id == exchange.access_key_id)
                && exchange.mfa_device_id == format!("arn:aws:iam::{TEST_ACCOUNT}:mfa/{username}")
                && user.secret == exchange.secret
                && user.mfa_code == exchange.mfa_code
        });

        if accepted {
            Ok(())
        } else {
            Err(ProviderError::Rejected("MultiFactorAuthentication failed".into()))
        }
    }

    async fn group_members(&self, group: &str) -> Result<Vec<String>, ProviderError> {
        self.record_call()?;

        let delay = *self.group_fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_groups.lock().unwrap().contains(group) {
            return Err(ProviderError::Unavailable(format!("GetGroup {group} timed out")));
        }

        self.groups
            .lock()
            .unwrap()
            .get(group)
            .cloned()
            .ok_or_else(|| ProviderError::Rejected(format!("NoSuchEntity: {group}")))
    }
}
