// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Login and session handling for the gateway.
//!
//! ## Auth Flow
//!
//! 1. Browser hits `/login` with HTTP Basic credentials, the password being
//!    `<secret><6 digit MFA code>`
//! 2. Gateway proves the secret + code against the identity provider by
//!    exchanging them for a throwaway session token
//! 3. Gateway checks group membership against the cached snapshot
//! 4. Gateway issues its own signed session token as an HttpOnly cookie
//! 5. Every other request must carry that cookie
//!
//! ## Security
//!
//! - Only HS256 tokens are accepted, whatever the token header claims
//! - Failed logins all look the same to the caller
//! - Secrets, MFA codes and tokens are never logged

pub mod authenticator;
pub mod error;
pub mod extractor;
pub mod token;

pub use authenticator::{split_password, SessionAuthenticator};
pub use error::AuthError;
pub use extractor::{BasicCredentials, Session, SessionRejection};
pub use token::{SessionClaim, SessionTokenCodec, TokenError};
