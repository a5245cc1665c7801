// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared session state.
//!
//! One `SessionState` per logical session, shared via `Arc` by every
//! component that reads or writes credentials. It owns:
//!
//! - the [`CredentialStore`] (access and refresh tokens)
//! - a credential generation, bumped on every token write or clear
//! - the cached user identity (`Empty`, `Pending`, `Resolved`)
//! - the lifecycle status broadcast to the rest of the application

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::ClientResult;
use crate::models::AuthenticatedUser;
use crate::storage::{CredentialStore, KeyValueStore, TokenKind};

/// Outcome shared by every caller awaiting one identity resolution.
pub(crate) type IdentityOutcome = Option<ClientResult<String>>;

/// Externally visible session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// Initial state while a stored session is being restored.
    Loading,
    Authenticated(AuthenticatedUser),
    Unauthenticated,
}

impl SessionStatus {
    pub fn user(&self) -> Option<&AuthenticatedUser> {
        match self {
            SessionStatus::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionStatus::Authenticated(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Loading => "loading",
            SessionStatus::Authenticated(_) => "authenticated",
            SessionStatus::Unauthenticated => "unauthenticated",
        }
    }
}

/// Cached identity of the current user.
///
/// At most one `Pending` resolution exists at a time; every concurrent
/// caller clones its receiver and observes the same outcome.
#[derive(Debug, Clone)]
pub(crate) enum CachedIdentity {
    Empty,
    Pending(watch::Receiver<IdentityOutcome>),
    Resolved(String),
}

/// Identity cache plus the epoch it belongs to.
///
/// The epoch advances on every invalidation, so a resolution started before
/// a logout cannot repopulate the cache after it.
#[derive(Debug)]
pub(crate) struct IdentitySlot {
    pub(crate) epoch: u64,
    pub(crate) cached: CachedIdentity,
}

pub struct SessionState {
    credentials: CredentialStore,
    /// Serializes token writes with the generation they bump.
    writes: Mutex<()>,
    generation: AtomicU64,
    identity: Mutex<IdentitySlot>,
    status: watch::Sender<SessionStatus>,
}

impl SessionState {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        let (status, _) = watch::channel(SessionStatus::Loading);
        Self {
            credentials: CredentialStore::new(backend),
            writes: Mutex::new(()),
            generation: AtomicU64::new(0),
            identity: Mutex::new(IdentitySlot {
                epoch: 0,
                cached: CachedIdentity::Empty,
            }),
            status,
        }
    }

    /// Read-only view of the stored credentials.
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Current credential generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn access_token(&self) -> ClientResult<Option<String>> {
        Ok(self.credentials.access_token()?)
    }

    pub fn refresh_token(&self) -> ClientResult<Option<String>> {
        Ok(self.credentials.refresh_token()?)
    }

    pub fn has_access_token(&self) -> ClientResult<bool> {
        Ok(self.access_token()?.is_some())
    }

    // ========== Credential Lifecycle ==========

    /// Store a fresh token pair from a credential exchange and forget any
    /// identity cached for a previous session.
    pub(crate) fn begin_session(&self, access_token: &str, refresh_token: &str) -> ClientResult<()> {
        self.store_tokens(access_token, Some(refresh_token))?;
        self.reset_identity();
        info!("New session stored");
        Ok(())
    }

    /// Overwrite the access token and, when given, the refresh token.
    pub(crate) fn store_tokens(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> ClientResult<()> {
        let _writes = self.write_lock();
        let result = self.write_tokens(access_token, refresh_token);
        self.generation.fetch_add(1, Ordering::SeqCst);
        result
    }

    /// Like [`store_tokens`](Self::store_tokens), but only while the
    /// credentials are still at `expected_generation`. Returns whether the
    /// tokens were written.
    pub(crate) fn store_tokens_if_current(
        &self,
        expected_generation: u64,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> ClientResult<bool> {
        let _writes = self.write_lock();
        if self.generation() != expected_generation {
            return Ok(false);
        }
        let result = self.write_tokens(access_token, refresh_token);
        self.generation.fetch_add(1, Ordering::SeqCst);
        result.map(|()| true)
    }

    fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_tokens(&self, access_token: &str, refresh_token: Option<&str>) -> ClientResult<()> {
        self.credentials.set(TokenKind::Access, access_token)?;
        if let Some(refresh_token) = refresh_token {
            self.credentials.set(TokenKind::Refresh, refresh_token)?;
        }
        Ok(())
    }

    /// Clear both tokens and the cached identity, then publish
    /// `Unauthenticated`.
    ///
    /// Identity and status are reset even when the storage clear fails; the
    /// storage error is still returned.
    pub(crate) fn invalidate(&self) -> ClientResult<()> {
        let cleared = {
            let _writes = self.write_lock();
            let cleared = self.credentials.clear(&TokenKind::ALL);
            self.generation.fetch_add(1, Ordering::SeqCst);
            cleared
        };
        self.reset_identity();
        self.set_status(SessionStatus::Unauthenticated);
        info!("Session invalidated");
        Ok(cleared?)
    }

    // ========== Status ==========

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Subscribe to lifecycle changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub(crate) fn set_status(&self, status: SessionStatus) {
        let label = status.label();
        let previous = self.status.send_replace(status);
        if previous.label() != label {
            debug!(from = previous.label(), to = label, "Session status changed");
        }
    }

    // ========== Identity ==========

    pub(crate) fn identity(&self) -> MutexGuard<'_, IdentitySlot> {
        self.identity.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cached user id, without any I/O.
    pub fn cached_user_id(&self) -> Option<String> {
        match &self.identity().cached {
            CachedIdentity::Resolved(id) => Some(id.clone()),
            _ => None,
        }
    }

    /// Record the outcome of a resolution started in `epoch`.
    ///
    /// Ignored when the cache was invalidated in the meantime.
    pub(crate) fn settle_identity(&self, epoch: u64, outcome: &ClientResult<String>) {
        let mut slot = self.identity();
        if slot.epoch != epoch || !matches!(slot.cached, CachedIdentity::Pending(_)) {
            debug!("Discarding identity resolved for an invalidated session");
            return;
        }
        slot.cached = match outcome {
            Ok(id) => CachedIdentity::Resolved(id.clone()),
            Err(_) => CachedIdentity::Empty,
        };
    }

    /// Seed the cache directly; never replaces a pending or resolved entry.
    #[cfg(test)]
    pub(crate) fn prime_identity(&self, user_id: &str) {
        let mut slot = self.identity();
        if matches!(slot.cached, CachedIdentity::Empty) {
            slot.cached = CachedIdentity::Resolved(user_id.to_string());
        }
    }

    /// Current identity epoch; advances on every login and invalidation.
    pub(crate) fn identity_epoch(&self) -> u64 {
        self.identity().epoch
    }

    /// Publish `user` as the authenticated user of the session that was
    /// current at `epoch`.
    ///
    /// Returns `false` without touching anything when that session has ended
    /// since (logout, failed refresh or a new login) or no access token is
    /// stored any more.
    pub(crate) fn publish_user(&self, epoch: u64, user: &AuthenticatedUser) -> ClientResult<bool> {
        let mut slot = self.identity();
        if slot.epoch != epoch || self.credentials.access_token()?.is_none() {
            return Ok(false);
        }
        if matches!(slot.cached, CachedIdentity::Empty) {
            slot.cached = CachedIdentity::Resolved(user.id.clone());
        }
        self.set_status(SessionStatus::Authenticated(user.clone()));
        Ok(true)
    }

    fn reset_identity(&self) {
        let mut slot = self.identity();
        slot.epoch += 1;
        slot.cached = CachedIdentity::Empty;
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("generation", &self.generation())
            .field("status", &self.status().label())
            .finish_non_exhaustive()
    }
}
