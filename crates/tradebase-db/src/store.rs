use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, ErrorCode};
use tracing::info;
use tradebase_common::{Error, Result};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the relational store that schema changes run against.
///
/// The store carries no migration bookkeeping of its own; callers pass it to
/// [`crate::MigrationRunner`] or hand its connection to a single
/// [`crate::Migration`].
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(db_path: &Path) -> Result<Self> {
        Self::open_with(db_path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with(db_path: &Path, busy_timeout: Duration) -> Result<Self> {
        info!("opening store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| store_error("failed to open database", e))?;
        conn.busy_timeout(busy_timeout)
            .map_err(|e| store_error("failed to set busy timeout", e))?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| store_error("failed to open in-memory database", e))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| store_error("failed to set pragmas", e))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::StoreUnavailable("store lock poisoned".into()))
    }

    /// Run `f` against the connection outside of any explicit transaction.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.connection()?;
        f(&conn)
    }

    /// Run `f` inside a transaction that commits when `f` returns `Ok` and
    /// rolls back otherwise. SQLite DDL is transactional, so a failed schema
    /// change leaves nothing behind.
    pub fn transaction<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.connection()?;
        let tx = conn
            .transaction()
            .map_err(|e| store_error("failed to begin transaction", e))?;
        let value = f(&tx)?;
        tx.commit()
            .map_err(|e| store_error("failed to commit transaction", e))?;
        Ok(value)
    }
}

/// Classify a rusqlite failure. Connectivity and permission problems become
/// [`Error::StoreUnavailable`]; anything else is a plain statement failure.
pub(crate) fn store_error(context: &str, e: rusqlite::Error) -> Error {
    if is_unavailable(&e) {
        Error::StoreUnavailable(format!("{context}: {e}"))
    } else {
        Error::Database(format!("{context}: {e}"))
    }
}

fn is_unavailable(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => matches!(
            err.code,
            ErrorCode::CannotOpen
                | ErrorCode::PermissionDenied
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::ReadOnly
                | ErrorCode::SystemIoFailure
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::AuthorizationForStatementDenied
        ),
        rusqlite::Error::InvalidPath(_) => true,
        _ => false,
    }
}
