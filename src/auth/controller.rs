// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session lifecycle.
//!
//! ```text
//! Loading ──restore()──┬──> Authenticated(user)
//!                      └──> Unauthenticated
//! Unauthenticated ──login()──> Authenticated(user)
//! Authenticated ──logout() / refresh failure──> Unauthenticated
//! ```
//!
//! Transient failures (network, 5xx) while checking the session never clear
//! the stored tokens; only an authorization failure that survives one
//! refresh does.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::api::AuthApi;
use super::claims::TokenClaims;
use super::executor::RequestExecutor;
use crate::error::{ClientError, ClientResult};
use crate::models::AuthenticatedUser;
use crate::state::{SessionState, SessionStatus};

#[derive(Clone, Debug)]
pub struct SessionController {
    state: Arc<SessionState>,
    auth: AuthApi,
    executor: RequestExecutor,
}

impl SessionController {
    pub fn new(state: Arc<SessionState>, auth: AuthApi, executor: RequestExecutor) -> Self {
        Self {
            state,
            auth,
            executor,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.state.subscribe()
    }

    pub fn user(&self) -> Option<AuthenticatedUser> {
        self.state.status().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.status().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state.status() == SessionStatus::Loading
    }

    /// Startup check of a stored session.
    pub async fn restore(&self) -> ClientResult<Option<AuthenticatedUser>> {
        debug!("Restoring stored session");
        self.refresh_user().await
    }

    /// Exchange credentials, store the new token pair and load the user.
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<AuthenticatedUser> {
        let tokens = match self.auth.login(email, password).await {
            Ok(tokens) => tokens,
            Err(e) => {
                if self.is_loading() {
                    self.state.set_status(SessionStatus::Unauthenticated);
                }
                return Err(e);
            }
        };
        self.state
            .begin_session(&tokens.access_token, &tokens.refresh_token)?;

        match self.refresh_user().await? {
            Some(user) => {
                info!(user_id = %user.id, "Logged in");
                Ok(user)
            }
            None => Err(ClientError::Unauthorized(
                "session rejected right after login".to_string(),
            )),
        }
    }

    /// End the session. The server is notified when possible; local
    /// credentials are cleared regardless.
    pub async fn logout(&self) -> ClientResult<()> {
        let access_token = self.state.access_token().ok().flatten();
        let refresh_token = self.state.refresh_token().ok().flatten();

        if let (Some(access_token), Some(refresh_token)) = (access_token, refresh_token) {
            if let Err(e) = self.auth.logout(&refresh_token, &access_token).await {
                warn!(error = %e, "Server-side logout failed, clearing local session anyway");
            }
        }

        self.state.invalidate()?;
        info!("Logged out");
        Ok(())
    }

    /// Reload the current user.
    ///
    /// - `Ok(Some(user))`: session valid, status `Authenticated`
    /// - `Ok(None)`: no usable session, status `Unauthenticated`
    /// - `Err(e)`: the session could not be checked; tokens are kept
    pub async fn refresh_user(&self) -> ClientResult<Option<AuthenticatedUser>> {
        let Some(access_token) = self.state.access_token()? else {
            debug!("No stored access token");
            self.state.set_status(SessionStatus::Unauthenticated);
            return Ok(None);
        };
        log_expiry(&access_token);

        let epoch = self.state.identity_epoch();
        let generation = self.state.generation();
        let outcome = match self.auth.fetch_current_user().await {
            Err(e) if e.is_authorization_failure() => {
                debug!(error = %e, "Current user rejected, refreshing access token");
                if !self.executor.refresh_after_rejection(generation).await {
                    self.end_session();
                    return Ok(None);
                }
                self.auth.fetch_current_user().await
            }
            other => other,
        };

        match outcome {
            Ok(user) => {
                if !self.state.publish_user(epoch, &user)? {
                    debug!("Session ended while loading the current user");
                    return Ok(None);
                }
                Ok(Some(user))
            }
            Err(e) if e.is_authorization_failure() => {
                warn!(error = %e, "Session rejected after refresh");
                self.end_session();
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "Could not verify session, keeping stored credentials");
                if self.is_loading() {
                    self.state.set_status(SessionStatus::Unauthenticated);
                }
                Err(e)
            }
        }
    }

    fn end_session(&self) {
        if let Err(e) = self.state.invalidate() {
            warn!(error = %e, "Failed to clear stored credentials");
        }
    }
}

fn log_expiry(access_token: &str) {
    if let Some(claims) = TokenClaims::peek(access_token) {
        debug!(
            expires_at = ?claims.expires_at(),
            expired = claims.is_expired(),
            "Stored access token"
        );
    }
}
