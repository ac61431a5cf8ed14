//! # SQLite
//!
//! One connection behind a mutex. Queries run on the blocking pool.
use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use bank::rusqlite::Connection;
use tokio::task::spawn_blocking;

use crate::error::AppError;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        Ok(Self::from_connection(bank::open(path)?))
    }

    pub fn in_memory() -> Result<Self, AppError> {
        Ok(Self::from_connection(bank::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub async fn call<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Connection) -> bank::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| AppError::internal("database mutex poisoned"))?;

            f(&mut *guard).map_err(AppError::from)
        })
        .await
        .map_err(|e| AppError::InternalError(Box::new(e)))?
    }
}
