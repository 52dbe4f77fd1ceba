use rusqlite::Connection;
use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::StoreError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// Thread-local connection slots, one per database file.
thread_local! {
    static DB_CONNS: RefCell<HashMap<PathBuf, Connection>> = RefCell::new(HashMap::new());
}

/// Handle to the listing database. Cheap to clone (path only); every thread
/// that uses it opens its own connection on first use.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Provides this thread's connection to the closure.
    ///
    /// Must not be nested: calling `with_conn` from inside `f` panics on the
    /// RefCell borrow.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError>,
    {
        DB_CONNS
            .try_with(|cell| {
                let mut conns = cell.borrow_mut();
                let conn = match conns.entry(self.path.clone()) {
                    Entry::Occupied(slot) => slot.into_mut(),
                    Entry::Vacant(slot) => slot.insert(open_connection(&self.path)?),
                };
                f(conn)
            })
            .map_err(|_| StoreError::ThreadLocal)?
    }
}

fn open_connection(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)
        .map_err(|e| StoreError::Open(format!("{}: {e}", path.display())))?;

    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(|e| StoreError::Open(format!("busy_timeout: {e}")))?;

    // WAL lets the notifier read while an ingest worker writes.
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
        .map_err(|e| StoreError::Open(format!("journal_mode: {e}")))?;

    Ok(conn)
}
