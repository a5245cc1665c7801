// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access token inspection for diagnostics.
//!
//! The payload is decoded WITHOUT signature verification. The result is only
//! used to report who a stored token belongs to and when it expires; the
//! backend remains the sole authority on whether a token is valid.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Claims carried by the identity service's JWTs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    #[serde(default)]
    pub sub: Option<String>,
    /// Expiration timestamp
    #[serde(default)]
    pub exp: Option<i64>,
    /// Token purpose (`access` or `refresh`)
    #[serde(default, rename = "type")]
    pub token_type: Option<String>,
}

impl TokenClaims {
    /// Decode a token's payload. Returns `None` for opaque or malformed tokens.
    pub fn peek(token: &str) -> Option<Self> {
        jsonwebtoken::dangerous::insecure_decode::<TokenClaims>(token)
            .ok()
            .map(|data| data.claims)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// Whether the token is past its expiry at `now`. Tokens without an
    /// `exp` claim never report as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expires_at| expires_at <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[cfg(test)]
pub(crate) fn unsigned_jwt(claims: &str) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    let header = r#"{"alg":"HS256","typ":"JWT"}"#;
    format!(
        "{}.{}.fake_signature",
        URL_SAFE_NO_PAD.encode(header.as_bytes()),
        URL_SAFE_NO_PAD.encode(claims.as_bytes())
    )
}
