// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token refresh against the identity service.
//!
//! ## Policy
//!
//! - No stored refresh token: fail without touching the network
//! - Success: store the new access token, and the new refresh token if the
//!   backend rotated it
//! - Any failure (non-2xx, transport error, malformed body): fail closed by
//!   clearing both tokens and the cached identity
//! - Credentials replaced or cleared while the exchange was in flight (login,
//!   logout): the exchanged tokens are discarded
//!
//! This type performs exactly one exchange per call; concurrent callers are
//! deduplicated by the [`RequestExecutor`](super::RequestExecutor).

use std::sync::Arc;

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use tracing::{debug, info, warn};

use super::client::Endpoint;
use crate::error::{ClientError, ClientResult};
use crate::models::{RefreshRequest, RefreshResponse};
use crate::state::SessionState;

/// Refresh endpoint path.
pub const REFRESH_PATH: &str = "/auth/refresh";

#[derive(Clone)]
pub struct TokenRefresher {
    endpoint: Endpoint,
    state: Arc<SessionState>,
}

impl TokenRefresher {
    pub fn new(endpoint: Endpoint, state: Arc<SessionState>) -> Self {
        Self { endpoint, state }
    }

    /// Exchange the stored refresh token for a new access token.
    pub async fn refresh(&self) -> ClientResult<()> {
        let generation = self.state.generation();
        let Some(refresh_token) = self.state.refresh_token()? else {
            warn!("Token refresh requested without a stored refresh token");
            self.fail_closed();
            return Err(ClientError::MissingRefreshToken);
        };

        match self.exchange(&refresh_token).await {
            Ok(response) => {
                let rotated = response.rotated_refresh_token();
                if !self.state.store_tokens_if_current(
                    generation,
                    &response.access_token,
                    rotated,
                )? {
                    return self.superseded();
                }
                info!(rotated = rotated.is_some(), "Access token refreshed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing session");
                self.fail_closed();
                Err(ClientError::RefreshRejected(e.to_string()))
            }
        }
    }

    async fn exchange(&self, refresh_token: &str) -> ClientResult<RefreshResponse> {
        let response = self
            .endpoint
            .http()
            .post(self.endpoint.url(REFRESH_PATH))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        let response: RefreshResponse = Endpoint::read_json(response, false).await?;
        if response.access_token.trim().is_empty() {
            return Err(ClientError::InvalidResponse(
                "refresh response did not include access_token".to_string(),
            ));
        }
        Ok(response)
    }

    /// The session changed under the exchange. A newer session counts as
    /// refreshed; a cleared one stays cleared.
    fn superseded(&self) -> ClientResult<()> {
        if self.state.has_access_token()? {
            debug!("Credentials replaced during refresh, keeping the newer ones");
            Ok(())
        } else {
            info!("Session ended during refresh, discarding refreshed tokens");
            Err(ClientError::RefreshRejected(
                "session ended during refresh".to_string(),
            ))
        }
    }

    fn fail_closed(&self) {
        if let Err(e) = self.state.invalidate() {
            warn!(error = %e, "Failed to clear credentials after refresh failure");
        }
    }
}
