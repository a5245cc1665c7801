// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable credential backend on an embedded redb file (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `credentials`: logical key (`access_token`, `refresh_token`) → value
//!
//! Each write commits its own transaction, so a crash never leaves a
//! half-written token behind.

use std::path::{Path, PathBuf};

use redb::{Database, ReadableDatabase, TableDefinition};

use super::{KeyValueStore, StorageResult};

/// Credential table: logical key → token string.
const CREDENTIALS: TableDefinition<&str, &str> = TableDefinition::new("credentials");

/// File name of the session database inside the data directory.
pub const SESSION_DB_FILE: &str = "session.redb";

/// Embedded credential database.
pub struct SessionDatabase {
    db: Database,
    path: PathBuf,
}

impl SessionDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::create(path)?;

        // Pre-create the table so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CREDENTIALS)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    /// Open `session.redb` inside `data_dir`.
    pub fn open_in(data_dir: &Path) -> StorageResult<Self> {
        Self::open(&data_dir.join(SESSION_DB_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for SessionDatabase {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CREDENTIALS)?;
        Ok(table.get(key)?.map(|value| value.value().to_string()))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CREDENTIALS)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CREDENTIALS)?;
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

impl std::fmt::Debug for SessionDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDatabase")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
