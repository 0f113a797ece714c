// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! AWS IAM / STS backed identity provider.
//!
//! - Account id: `sts:GetCallerIdentity` with the gateway's own credentials
//! - Access keys: `iam:ListAccessKeys`
//! - Group members: `iam:GetGroup`, following `Marker` until exhausted
//! - Login proof: `sts:GetSessionToken` signed with the claimed user's key

use std::error::Error as StdError;

use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_iam::types::StatusType;
use aws_sdk_sts::config::Credentials;
use tracing::debug;

use super::{AccessKey, CredentialExchange, IdentityProvider, KeyStatus, ProviderError};

/// Provider name attached to the static credentials used for login proofs.
const LOGIN_CREDENTIALS_PROVIDER: &str = "bastion-login";

pub struct AwsIdentityProvider {
    config: SdkConfig,
    iam: aws_sdk_iam::Client,
    sts: aws_sdk_sts::Client,
}

impl AwsIdentityProvider {
    pub fn new(config: SdkConfig) -> Self {
        Self {
            iam: aws_sdk_iam::Client::new(&config),
            sts: aws_sdk_sts::Client::new(&config),
            config,
        }
    }

    /// Build from the default credential chain (env, profile, IMDS, ...).
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::new(config)
    }
}

#[async_trait::async_trait]
impl IdentityProvider for AwsIdentityProvider {
    async fn current_account_id(&self) -> Result<String, ProviderError> {
        let identity = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(describe(&e)))?;

        identity
            .account()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Unavailable("caller identity has no account".into()))
    }

    async fn list_access_keys(&self, username: &str) -> Result<Vec<AccessKey>, ProviderError> {
        let output = match self.iam.list_access_keys().user_name(username).send().await {
            Ok(output) => output,
            Err(e) => {
                let unknown_user = e
                    .as_service_error()
                    .map(|se| se.is_no_such_entity_exception())
                    .unwrap_or(false);
                if unknown_user {
                    return Ok(Vec::new());
                }
                return Err(ProviderError::Unavailable(describe(&e)));
            }
        };

        let keys = output
            .access_key_metadata()
            .iter()
            .filter_map(|meta| {
                let id = meta.access_key_id()?;
                let status = if matches!(meta.status(), Some(StatusType::Active)) {
                    KeyStatus::Active
                } else {
                    KeyStatus::Inactive
                };
                Some(AccessKey {
                    id: id.to_string(),
                    status,
                })
            })
            .collect();

        Ok(keys)
    }

    async fn exchange_for_session_token(
        &self,
        exchange: CredentialExchange<'_>,
    ) -> Result<(), ProviderError> {
        let credentials = Credentials::new(
            exchange.access_key_id,
            exchange.secret,
            None,
            None,
            LOGIN_CREDENTIALS_PROVIDER,
        );
        let user_config = aws_sdk_sts::config::Builder::from(&self.config)
            .credentials_provider(credentials)
            .build();
        let user_sts = aws_sdk_sts::Client::from_conf(user_config);

        let duration_seconds = i32::try_from(exchange.duration.as_secs()).unwrap_or(i32::MAX);

        match user_sts
            .get_session_token()
            .duration_seconds(duration_seconds)
            .serial_number(exchange.mfa_device_id)
            .token_code(exchange.mfa_code)
            .send()
            .await
        {
            Ok(_session) => {
                debug!(access_key_id = %exchange.access_key_id, "session token exchange accepted");
                Ok(())
            }
            Err(e @ aws_sdk_sts::error::SdkError::ServiceError(_)) => {
                Err(ProviderError::Rejected(describe(&e)))
            }
            Err(e) => Err(ProviderError::Unavailable(describe(&e))),
        }
    }

    async fn group_members(&self, group: &str) -> Result<Vec<String>, ProviderError> {
        let mut members = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let page = self
                .iam
                .get_group()
                .group_name(group)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| ProviderError::Unavailable(describe(&e)))?;

            members.extend(page.users().iter().map(|user| user.user_name().to_string()));

            match page.marker() {
                Some(next) if page.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(members)
    }
}

/// Flatten an error and its sources into one line.
fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Leaf;

    impl fmt::Display for Leaf {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "connection refused")
        }
    }

    impl StdError for Leaf {}

    #[derive(Debug)]
    struct Wrapper(Leaf);

    impl fmt::Display for Wrapper {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "dispatch failure")
        }
    }

    impl StdError for Wrapper {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn describe_walks_error_sources() {
        assert_eq!(
            describe(&Wrapper(Leaf)),
            "dispatch failure: connection refused"
        );
    }
}
