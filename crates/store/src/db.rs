use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use duckdb::Connection;
use hail_core::error::{HailError, Result};

use crate::schema::SCHEMA_SQL;

/// Shared handle to the people database. Cloned into every in-flight
/// request; the connection itself is serialized behind a mutex.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| HailError::Io(format!("failed to create db dir: {e}")))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| HailError::Storage(format!("failed to open duckdb: {e}")))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| HailError::Storage(format!("failed to initialize schema: {e}")))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| HailError::Storage(format!("failed to open in-memory db: {e}")))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| HailError::Storage(format!("failed to initialize schema: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Closes the underlying connection. Only the last live handle
    /// actually closes; with clones still outstanding this is a no-op and
    /// the connection is released when the final clone drops.
    pub fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.conn) {
            Ok(mutex) => {
                let conn = mutex
                    .into_inner()
                    .map_err(|_| HailError::Storage("store mutex poisoned".to_string()))?;
                conn.close()
                    .map_err(|(_, e)| HailError::Storage(format!("failed to close store: {e}")))
            }
            Err(_) => Ok(()),
        }
    }

    pub(crate) fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }
}
