use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tokio::task;

use crate::error::{RelgraphError, Result};

/// SQLite file handle; each call opens its own connection on the blocking pool.
#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
}

impl Db {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_connection(path: &Path) -> Result<Connection> {
        let conn = Connection::open(path)?;
        // WAL lets a CLI read saved runs while another process writes one
        conn.execute_batch(
            "PRAGMA journal_mode = WAL; \
             PRAGMA synchronous = NORMAL; \
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(conn)
    }

    /// Execute a closure with a database connection in a blocking task
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let mut conn = Self::open_connection(&path)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| RelgraphError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }
}
