// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Resilient request execution.
//!
//! ## Retry policy
//!
//! 1. Run the request.
//! 2. Success, or a failure that is not an authorization failure: return it
//!    unchanged.
//! 3. Authorization failure: refresh the access token once. If the refresh
//!    succeeds, run the request exactly once more and return that outcome,
//!    whatever it is. If it fails, return the original error; the session
//!    has been cleared by then.
//!
//! ## Refresh deduplication
//!
//! At most one refresh is in flight. Callers rejected while it runs wait on
//! the same outcome. A caller whose request went out before the credentials
//! last changed does not refresh again: the token it was rejected with is
//! already gone, so it retries with whatever is stored now.
//!
//! The refresh itself runs on a spawned task, so a caller dropping its
//! future never leaves the credential store half updated.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::refresh::TokenRefresher;
use crate::error::ClientResult;
use crate::state::SessionState;

/// `None` while running, then whether the refresh succeeded.
type RefreshOutcome = Option<bool>;

#[derive(Clone)]
pub struct RequestExecutor {
    state: Arc<SessionState>,
    refresher: TokenRefresher,
    in_flight: Arc<Mutex<Option<watch::Receiver<RefreshOutcome>>>>,
}

impl RequestExecutor {
    pub fn new(state: Arc<SessionState>, refresher: TokenRefresher) -> Self {
        Self {
            state,
            refresher,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Run `request_fn`, refreshing and retrying once on an authorization
    /// failure.
    pub async fn execute<T, F, Fut>(&self, request_fn: F) -> ClientResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let generation = self.state.generation();
        let err = match request_fn().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_authorization_failure() {
            return Err(err);
        }

        debug!(error = %err, "Request rejected, refreshing access token");
        if !self.refresh_after_rejection(generation).await {
            return Err(err);
        }

        info!("Retrying request with refreshed access token");
        request_fn().await
    }

    /// Make sure a usable access token exists after a request sent under
    /// `observed_generation` was rejected. Returns whether a retry is
    /// worthwhile.
    pub async fn refresh_after_rejection(&self, observed_generation: u64) -> bool {
        let mut outcome = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match in_flight.clone() {
                Some(rx) => {
                    debug!("Joining in-flight token refresh");
                    rx
                }
                None if self.state.generation() != observed_generation => {
                    debug!("Credentials changed since the request was sent, skipping refresh");
                    return self.state.has_access_token().unwrap_or(false);
                }
                None => {
                    let rx = self.spawn_refresh();
                    *in_flight = Some(rx.clone());
                    rx
                }
            }
        };

        let refreshed = match outcome.wait_for(Option::is_some).await {
            Ok(settled) => *settled == Some(true),
            Err(_) => {
                warn!("Token refresh task ended without reporting an outcome");
                false
            }
        };
        refreshed
    }

    fn spawn_refresh(&self) -> watch::Receiver<RefreshOutcome> {
        let (tx, rx) = watch::channel(None);
        let refresher = self.refresher.clone();
        let slot = InFlightSlot(Arc::clone(&self.in_flight));

        tokio::spawn(async move {
            let refreshed = refresher.refresh().await.is_ok();
            drop(slot);
            tx.send_replace(Some(refreshed));
        });

        rx
    }
}

/// Releases the in-flight refresh slot when the refresh task finishes,
/// including when it panics, so later rejections can start a new refresh.
struct InFlightSlot(Arc<Mutex<Option<watch::Receiver<RefreshOutcome>>>>);

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::Value;
    use tokio::task::JoinSet;

    use crate::error::ClientError;
    use crate::test_support::{MockBackend, RefreshMode};

    #[tokio::test]
    async fn concurrent_rejections_share_one_refresh() {
        let backend = MockBackend::start().await;
        backend.set_refresh_delay_ms(100);
        let session = backend.session();
        session.state.store_tokens("stale", Some("r-1")).unwrap();

        let mut calls = JoinSet::new();
        for _ in 0..8 {
            let client = session.client.clone();
            calls.spawn(async move { client.get::<Value>("/echo").await });
        }
        while let Some(result) = calls.join_next().await {
            result.unwrap().unwrap();
        }

        assert_eq!(backend.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn retry_is_bounded_to_one() {
        let backend = MockBackend::start().await;
        let session = backend.session();
        session.state.store_tokens("stale", Some("r-1")).unwrap();
        let attempts = &AtomicUsize::new(0);

        let err = session
            .executor
            .execute(move || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ClientError::Unauthorized("Not authenticated".into()))
            })
            .await
            .unwrap_err();

        assert_eq!(err, ClientError::Unauthorized("Not authenticated".into()));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(backend.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn rejected_refresh_surfaces_original_error_and_clears_session() {
        let backend = MockBackend::start().await;
        backend.set_refresh_mode(RefreshMode::Reject);
        let session = backend.session();
        session.state.store_tokens("stale", Some("revoked")).unwrap();
        session.state.prime_identity("u-1");

        let err = session.client.get::<Value>("/echo").await.unwrap_err();

        assert!(matches!(err, ClientError::Unauthorized(_)));
        assert_eq!(backend.echo_calls(), 1);
        assert_eq!(session.state.access_token().unwrap(), None);
        assert_eq!(session.state.refresh_token().unwrap(), None);
        assert_eq!(session.state.cached_user_id(), None);
    }

    #[tokio::test]
    async fn non_authorization_errors_never_refresh() {
        let backend = MockBackend::start().await;
        let session = backend.session();
        session.state.store_tokens("a-1", Some("r-1")).unwrap();
        let attempts = &AtomicUsize::new(0);

        let err = session
            .executor
            .execute(move || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ClientError::Transport("connection refused".into()))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(backend.refresh_calls(), 0);
        assert_eq!(session.state.access_token().unwrap().as_deref(), Some("a-1"));
    }

    #[tokio::test]
    async fn late_rejection_after_refresh_retries_without_refreshing() {
        let backend = MockBackend::start().await;
        let session = backend.session();
        session.state.store_tokens("stale", Some("r-1")).unwrap();
        let observed = session.state.generation();

        assert!(session.executor.refresh_after_rejection(observed).await);
        assert!(session.executor.refresh_after_rejection(observed).await);

        assert_eq!(backend.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn late_rejection_after_failed_refresh_gives_up() {
        let backend = MockBackend::start().await;
        backend.set_refresh_mode(RefreshMode::Reject);
        let session = backend.session();
        session.state.store_tokens("stale", Some("revoked")).unwrap();
        let observed = session.state.generation();

        assert!(!session.executor.refresh_after_rejection(observed).await);
        assert!(!session.executor.refresh_after_rejection(observed).await);

        assert_eq!(backend.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn success_passes_through_untouched() {
        let backend = MockBackend::start().await;
        let session = backend.session();

        let value = session
            .executor
            .execute(|| async { Ok::<_, ClientError>(42) })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(backend.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn panicking_refresh_task_releases_the_slot() {
        let backend = MockBackend::start().await;
        backend.set_refresh_mode(RefreshMode::Reject);
        let session = backend.session();
        session.state.store_tokens("stale", Some("revoked")).unwrap();

        let (_tx, rx) = watch::channel(None);
        *session.executor.in_flight.lock().unwrap() = Some(rx);
        let slot = InFlightSlot(Arc::clone(&session.executor.in_flight));
        let task = tokio::spawn(async move {
            let _slot = slot;
            panic!("refresh task crashed");
        });
        assert!(task.await.unwrap_err().is_panic());
        assert!(session.executor.in_flight.lock().unwrap().is_none());

        // A later rejection starts a fresh refresh instead of joining a dead one
        let observed = session.state.generation();
        assert!(!session.executor.refresh_after_rejection(observed).await);
        assert_eq!(backend.refresh_calls(), 1);
    }
}
