// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Authentication
//!
//! Client-side credential lifecycle for the CRM backend.
//!
//! ## Request Flow
//!
//! 1. A domain client asks the [`IdentityResolver`] for the user id
//! 2. The [`AuthenticatedClient`] builds headers from the stored access token
//! 3. On `401` (or an invalid/expired token message) the [`RequestExecutor`]
//!    refreshes the token once through the [`TokenRefresher`] and retries once
//! 4. A rejected refresh clears the stored tokens and the cached identity;
//!    the [`SessionController`] then reports `Unauthenticated`
//!
//! ## Concurrency
//!
//! - At most one token refresh and one identity lookup are in flight
//! - Both run as spawned tasks; dropping a caller's future never cancels them
//! - No timeouts beyond the HTTP client's own (`CRM_HTTP_TIMEOUT_SECS`)

pub mod api;
pub mod claims;
pub mod client;
pub mod controller;
pub mod executor;
pub mod headers;
pub mod identity;
pub mod refresh;

pub use api::AuthApi;
pub use claims::TokenClaims;
pub use client::{AuthenticatedClient, Endpoint};
pub use controller::SessionController;
pub use executor::RequestExecutor;
pub use identity::IdentityResolver;
pub use refresh::TokenRefresher;
