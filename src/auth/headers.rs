// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outgoing request headers.
//!
//! Headers are derived from the credential store on every call, never
//! cached, so a token written by a refresh is picked up by the very next
//! attempt.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};
use crate::storage::CredentialStore;

/// Correlation header matched by the backend's request-id middleware.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// JSON headers plus `Authorization: Bearer <token>` iff an access token
/// is stored.
pub fn build_headers(credentials: &CredentialStore) -> ClientResult<HeaderMap> {
    let mut headers = build_auth_headers(credentials)?;
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

/// Same as [`build_headers`] without `Content-Type`, for multipart bodies
/// whose boundary the transport sets.
pub fn build_auth_headers(credentials: &CredentialStore) -> ClientResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(token) = credentials.access_token()? {
        headers.insert(AUTHORIZATION, bearer(&token)?);
    }
    headers.insert(REQUEST_ID_HEADER, request_id());
    Ok(headers)
}

/// `Bearer <token>` as a sensitive header value.
pub fn bearer(token: &str) -> ClientResult<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| ClientError::InvalidHeader(e.to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}

fn request_id() -> HeaderValue {
    // A hyphenated UUID is always a valid header value
    HeaderValue::from_str(&Uuid::new_v4().to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}
