// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signed session tokens.
//!
//! Tokens are HS256 JWTs carrying `{"username", "exp"}`. Nothing is stored
//! server-side: rotating the signing secret is the only way to revoke
//! sessions early.

use std::time::Duration;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

/// The only algorithm tokens are signed with or accepted under.
pub const SESSION_ALGORITHM: Algorithm = Algorithm::HS256;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaim {
    pub username: String,
    /// Absolute expiry, Unix seconds.
    pub exp: i64,
}

#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token algorithm is not accepted")]
    UnsupportedAlgorithm,

    #[error("token has expired")]
    Expired,
}

/// The `alg` member of a JOSE header, as text. Covers values with no
/// [`Algorithm`] variant such as `none`.
#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

fn header_algorithm(token: &str) -> Option<String> {
    let (header, _) = token.split_once('.')?;
    let json = Base64UrlUnpadded::decode_vec(header).ok()?;
    serde_json::from_slice::<RawHeader>(&json).ok().map(|h| h.alg)
}

pub struct SessionTokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionTokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(SESSION_ALGORITHM);
        // Expiry is checked by hand: a token exactly at `exp` is already dead.
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issue a token for `username` valid for `ttl` from now.
    pub fn issue(&self, username: &str, ttl: Duration) -> jsonwebtoken::errors::Result<String> {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        self.issue_with_expiry(username, Utc::now().timestamp().saturating_add(ttl))
    }

    pub(crate) fn issue_with_expiry(
        &self,
        username: &str,
        exp: i64,
    ) -> jsonwebtoken::errors::Result<String> {
        let claim = SessionClaim {
            username: username.to_string(),
            exp,
        };
        encode(&Header::new(SESSION_ALGORITHM), &claim, &self.encoding_key)
    }

    /// Verify signature, algorithm and expiry.
    pub fn verify(&self, token: &str) -> Result<SessionClaim, TokenError> {
        let alg = header_algorithm(token).ok_or(TokenError::Malformed)?;
        if !matches!(alg.parse::<Algorithm>(), Ok(a) if a == SESSION_ALGORITHM) {
            return Err(TokenError::UnsupportedAlgorithm);
        }

        let data = decode::<SessionClaim>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                ErrorKind::InvalidAlgorithm => TokenError::UnsupportedAlgorithm,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            },
        )?;

        if data.claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(2 * 60 * 60);

    #[test]
    fn issued_token_verifies() {
        let codec = SessionTokenCodec::new(b"k1");
        let before = Utc::now().timestamp();
        let token = codec.issue("alice", TTL).unwrap();
        let after = Utc::now().timestamp();

        let claim = codec.verify(&token).unwrap();
        assert_eq!(claim.username, "alice");
        assert!(claim.exp >= before + TTL.as_secs() as i64);
        assert!(claim.exp <= after + TTL.as_secs() as i64);
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let token = SessionTokenCodec::new(b"k1").issue("alice", TTL).unwrap();
        let result = SessionTokenCodec::new(b"k2").verify(&token);
        assert_eq!(result, Err(TokenError::BadSignature));
    }

    #[test]
    fn past_expiry_is_rejected_even_with_valid_signature() {
        let codec = SessionTokenCodec::new(b"k1");
        let token = codec
            .issue_with_expiry("alice", Utc::now().timestamp() - 60)
            .unwrap();
        assert_eq!(codec.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn token_exactly_at_expiry_is_rejected() {
        let codec = SessionTokenCodec::new(b"k1");
        let token = codec.issue("alice", Duration::ZERO).unwrap();
        assert_eq!(codec.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn other_algorithms_are_rejected_with_the_same_key() {
        let secret = b"k1";
        let claim = SessionClaim {
            username: "mallory".into(),
            exp: Utc::now().timestamp() + 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claim,
            &EncodingKey::from_secret(secret),
        )
        .unwrap();

        let result = SessionTokenCodec::new(secret).verify(&token);
        assert_eq!(result, Err(TokenError::UnsupportedAlgorithm));
    }

    fn unsigned_token(alg: &str) -> String {
        let header = format!(r#"{{"alg":"{alg}","typ":"JWT"}}"#);
        let claim = SessionClaim {
            username: "mallory".into(),
            exp: Utc::now().timestamp() + 3600,
        };
        format!(
            "{}.{}.",
            Base64UrlUnpadded::encode_string(header.as_bytes()),
            Base64UrlUnpadded::encode_string(&serde_json::to_vec(&claim).unwrap()),
        )
    }

    #[test]
    fn alg_none_is_an_unsupported_algorithm() {
        let codec = SessionTokenCodec::new(b"k1");
        assert_eq!(
            codec.verify(&unsigned_token("none")),
            Err(TokenError::UnsupportedAlgorithm)
        );
    }

    #[test]
    fn unknown_alg_is_an_unsupported_algorithm() {
        let codec = SessionTokenCodec::new(b"k1");
        assert_eq!(
            codec.verify(&unsigned_token("XYZ")),
            Err(TokenError::UnsupportedAlgorithm)
        );
        assert_eq!(
            codec.verify(&unsigned_token("hs256")),
            Err(TokenError::UnsupportedAlgorithm)
        );
    }

    #[test]
    fn header_without_alg_is_malformed() {
        let codec = SessionTokenCodec::new(b"k1");
        let header = Base64UrlUnpadded::encode_string(br#"{"typ":"JWT"}"#);
        assert_eq!(
            codec.verify(&format!("{header}.e30.")),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = SessionTokenCodec::new(b"k1");
        assert_eq!(codec.verify("not-a-token"), Err(TokenError::Malformed));
        assert_eq!(codec.verify(""), Err(TokenError::Malformed));
    }

    #[test]
    fn tampered_payload_fails_signature() {
        let codec = SessionTokenCodec::new(b"k1");
        let alice = codec.issue("alice", TTL).unwrap();
        let root = codec.issue("root", TTL).unwrap();

        // alice's header + signature around root's claims
        let alice_parts: Vec<&str> = alice.split('.').collect();
        let root_parts: Vec<&str> = root.split('.').collect();
        let forged = format!("{}.{}.{}", alice_parts[0], root_parts[1], alice_parts[2]);

        assert_eq!(codec.verify(&forged), Err(TokenError::BadSignature));
    }
}
