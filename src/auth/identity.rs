// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Current user id resolution with single-flight caching.
//!
//! The cache lives in [`SessionState`] as `Empty`, `Pending` or `Resolved`.
//! The first caller that finds it `Empty` spawns one `GET /auth/me` (through
//! the executor, so it benefits from refresh-and-retry) and parks a watch
//! receiver in the cache; every caller arriving before it settles awaits that
//! same receiver and gets the same id or the same error.
//!
//! A failed resolution leaves the cache `Empty` so the next call tries again.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use super::api::ME_PATH;
use super::client::AuthenticatedClient;
use crate::error::{ClientError, ClientResult};
use crate::models::AuthenticatedUser;
use crate::state::{CachedIdentity, IdentityOutcome, SessionState};

#[derive(Clone)]
pub struct IdentityResolver {
    state: Arc<SessionState>,
    client: AuthenticatedClient,
}

impl IdentityResolver {
    pub fn new(state: Arc<SessionState>, client: AuthenticatedClient) -> Self {
        Self { state, client }
    }

    /// The current user's id, resolving it at most once per session.
    pub async fn get_user_id(&self) -> ClientResult<String> {
        let mut outcome = {
            let mut slot = self.state.identity();
            match slot.cached.clone() {
                CachedIdentity::Resolved(user_id) => return Ok(user_id),
                CachedIdentity::Pending(rx) => {
                    debug!("Awaiting in-flight identity resolution");
                    rx
                }
                CachedIdentity::Empty => {
                    let rx = self.spawn_resolution(slot.epoch);
                    slot.cached = CachedIdentity::Pending(rx.clone());
                    rx
                }
            }
        };

        let settled = outcome
            .wait_for(Option::is_some)
            .await
            .map(|settled| (*settled).clone())
            .map_err(|_| ClientError::ResolutionAborted)?;
        settled.unwrap_or(Err(ClientError::ResolutionAborted))
    }

    /// The cached id, if resolved, without any I/O.
    pub fn cached_user_id(&self) -> Option<String> {
        self.state.cached_user_id()
    }

    fn spawn_resolution(&self, epoch: u64) -> watch::Receiver<IdentityOutcome> {
        let (tx, rx) = watch::channel(None);
        let state = Arc::clone(&self.state);
        let client = self.client.clone();

        tokio::spawn(async move {
            debug!("Resolving current user id");
            let outcome = client
                .get::<AuthenticatedUser>(ME_PATH)
                .await
                .map(|user| user.id);
            if let Err(e) = &outcome {
                warn!(error = %e, "Identity resolution failed");
            }
            state.settle_identity(epoch, &outcome);
            tx.send_replace(Some(outcome));
        });

        rx
    }
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("cached_user_id", &self.cached_user_id())
            .finish()
    }
}
