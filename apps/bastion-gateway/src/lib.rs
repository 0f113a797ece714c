// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bastion Gateway - MFA Authenticating Reverse Proxy
//!
//! Puts a single upstream HTTP service behind an IAM-backed login. Users sign
//! in with HTTP Basic credentials whose password is their secret access key
//! followed by a 6 digit MFA code; on success they get a short-lived signed
//! session cookie and their traffic is forwarded to the upstream.
//!
//! ## Modules
//!
//! - `api` - HTTP handlers (Axum): health, metrics, login/logout, passthrough
//! - `auth` - Credential validation and session tokens
//! - `gateway` - Serve/drain lifecycle
//! - `group_cache` - Background IAM group membership snapshot
//! - `provider` - Identity provider trait and the AWS implementation
//! - `proxy` - Request rewriting and upstream forwarding

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod group_cache;
pub mod logging;
pub mod metrics;
pub mod provider;
pub mod proxy;
pub mod state;
