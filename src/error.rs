// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client error taxonomy.
//!
//! | Variant | Class | Handling |
//! |---------|-------|----------|
//! | `Unauthorized` | authorization expired | one refresh-and-retry cycle |
//! | `RefreshRejected`, `MissingRefreshToken` | refresh rejected | session cleared |
//! | `Status`, `Transport`, `InvalidResponse` | transient | propagated unchanged |
//! | `ResolutionAborted` | identity resolution | propagated to every waiter |
//!
//! `ClientError` is `Clone` so a single failure can be handed to every caller
//! waiting on a shared in-flight operation.

use reqwest::StatusCode;

use crate::storage::StorageError;

/// Fallback message when an error response carries no usable body.
const DEFAULT_ERROR_MESSAGE: &str = "API request failed";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The server rejected the access token (401 or an invalid/expired token message).
    #[error("authorization expired: {0}")]
    Unauthorized(String),

    /// The refresh token was rejected or the refresh call failed outright.
    #[error("session refresh rejected: {0}")]
    RefreshRejected(String),

    /// No refresh token is stored, so no refresh can be attempted.
    #[error("no refresh token stored")]
    MissingRefreshToken,

    /// Non-success response that is not an authorization failure.
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    /// Connectivity, DNS, TLS or timeout failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A stored credential cannot be used as a header value.
    #[error("invalid credential header: {0}")]
    InvalidHeader(String),

    /// Credential storage failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// An in-flight shared operation ended without producing a result.
    #[error("identity resolution aborted")]
    ResolutionAborted,
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// Build the error for a non-success response.
    ///
    /// `authenticated` marks requests that carried (or should have carried)
    /// a bearer token; only those classify token-related messages as
    /// authorization failures.
    pub fn from_response(status: StatusCode, body: &str, authenticated: bool) -> Self {
        let message = extract_error_message(body).unwrap_or_else(|| {
            if body.trim().is_empty() {
                DEFAULT_ERROR_MESSAGE.to_string()
            } else {
                body.trim().to_string()
            }
        });

        if status == StatusCode::UNAUTHORIZED
            || (authenticated && signals_invalid_token(&message))
        {
            return ClientError::Unauthorized(message);
        }

        ClientError::Status {
            status: status.as_u16(),
            message,
        }
    }

    /// Whether this error means the access token was rejected.
    pub fn is_authorization_failure(&self) -> bool {
        match self {
            ClientError::Unauthorized(_) => true,
            ClientError::Status { status, .. } => *status == StatusCode::UNAUTHORIZED.as_u16(),
            _ => false,
        }
    }

    /// Whether this error invalidated the session.
    pub fn is_session_terminal(&self) -> bool {
        matches!(
            self,
            ClientError::RefreshRejected(_) | ClientError::MissingRefreshToken
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::InvalidResponse(e.to_string())
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::InvalidResponse(e.to_string())
    }
}

impl From<StorageError> for ClientError {
    fn from(e: StorageError) -> Self {
        ClientError::Storage(e.to_string())
    }
}

/// Pull the human-readable message out of an error body.
///
/// The identity, leads and calendar services answer `{"detail": "..."}`;
/// the outreach service answers `{"error": {"message": "..."}}`.
fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("detail")
        .and_then(serde_json::Value::as_str)
        .or_else(|| {
            value
                .pointer("/error/message")
                .and_then(serde_json::Value::as_str)
        })
        .or_else(|| value.get("message").and_then(serde_json::Value::as_str))
        .map(str::to_string)
}

fn signals_invalid_token(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("token") && (message.contains("invalid") || message.contains("expired"))
}
