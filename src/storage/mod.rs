// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Credential Storage Module
//!
//! Persistent key-value storage for the session's access and refresh tokens.
//!
//! ## Layers
//!
//! - [`KeyValueStore`]: the raw capability (get / set / remove by key)
//! - [`MemoryStore`]: process-local backend, lost on exit
//! - [`SessionDatabase`]: durable backend on an embedded redb file
//! - [`CredentialStore`]: the two fixed logical names on top of any backend
//!
//! ## Important Notes
//!
//! - Token contents are never inspected or validated here
//! - Storage failures are not retried; they propagate to the caller
//! - Only `SessionState` writes through a `CredentialStore`

pub mod database;
pub mod memory;

use std::sync::Arc;

pub use database::SessionDatabase;
pub use memory::MemoryStore;

/// Storage key of the short-lived bearer credential.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key of the long-lived refresh credential.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Raw string key-value capability backing the credential store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// The two logical credentials a session holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub const ALL: [TokenKind; 2] = [TokenKind::Access, TokenKind::Refresh];

    pub fn key(self) -> &'static str {
        match self {
            TokenKind::Access => ACCESS_TOKEN_KEY,
            TokenKind::Refresh => REFRESH_TOKEN_KEY,
        }
    }
}

/// Access/refresh token storage over a [`KeyValueStore`].
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Read a credential. Empty values read as absent.
    pub fn get(&self, kind: TokenKind) -> StorageResult<Option<String>> {
        Ok(self
            .backend
            .get(kind.key())?
            .filter(|value| !value.is_empty()))
    }

    pub fn set(&self, kind: TokenKind, value: &str) -> StorageResult<()> {
        self.backend.set(kind.key(), value)
    }

    pub fn clear(&self, kinds: &[TokenKind]) -> StorageResult<()> {
        for kind in kinds {
            self.backend.remove(kind.key())?;
        }
        Ok(())
    }

    pub fn access_token(&self) -> StorageResult<Option<String>> {
        self.get(TokenKind::Access)
    }

    pub fn refresh_token(&self) -> StorageResult<Option<String>> {
        self.get(TokenKind::Refresh)
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}
