//! Local persistence for items and their tracking records.
//!
//! Everything lives in one `SQLite` database in WAL mode:
//!
//! ```text
//! items    # one row per item: name, owner, current state
//! records  # append-only arena of tracking records, indexed by (item_id, position)
//! ```
//!
//! Writes go through a single writer connection and commit a state change
//! together with its record. Reads use a separate connection, so they see a
//! committed snapshot and never wait for the writer.

mod history;
mod item;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

use crate::model::{ItemId, State};

pub use history::Verified;

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("storage/schema.sql");

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("item {item} cannot move from {from:?} to {to:?}")]
    IllegalTransition { item: ItemId, from: State, to: State },

    #[error("record chain of item {item} broken at position {position}: {details}")]
    Tampered {
        item: ItemId,
        position: u64,
        details: String,
    },

    #[error("corrupt data: {0}")]
    Corrupt(String),

    #[error("storage lock poisoned")]
    Poisoned,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// `SQLite`-backed ledger store.
pub struct Storage {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    path: PathBuf,
}

impl Storage {
    /// Opens the ledger at `path`, creating the file and schema if needed.
    ///
    /// The parent directory is created if it doesn't exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let writer = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        writer.busy_timeout(BUSY_TIMEOUT)?;
        writer.execute_batch(SCHEMA_SQL)?;

        // Opened after the schema so the reader sees WAL mode already in effect.
        let reader = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        reader.busy_timeout(BUSY_TIMEOUT)?;
        reader.execute_batch("PRAGMA query_only = ON;")?;

        tracing::debug!(path = %path.display(), "opened ledger");

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            path,
        })
    }

    /// Returns the default ledger path: `~/.farmtrace/ledger.sqlite`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".farmtrace").join("ledger.sqlite"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer.lock().map_err(|_| StorageError::Poisoned)
    }

    fn reader(&self) -> Result<MutexGuard<'_, Connection>> {
        self.reader.lock().map_err(|_| StorageError::Poisoned)
    }
}
