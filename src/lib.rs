// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! CRM Session - client session management for the CRM backend
//!
//! Acquires, stores and refreshes credentials, recovers transparently from
//! expired access tokens and resolves the current user once per session.
//!
//! ## Modules
//!
//! - `api` - Domain clients (leads, calendar, files, outreach) and the `CrmClient` facade
//! - `auth` - Token refresh, retrying executor, identity resolver, session controller
//! - `storage` - Credential storage (redb on disk, in-memory for tests)
//! - `state` - Shared session state (tokens, cached identity, lifecycle status)

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod state;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use api::CrmClient;
pub use error::{ClientError, ClientResult};
pub use state::{SessionState, SessionStatus};
