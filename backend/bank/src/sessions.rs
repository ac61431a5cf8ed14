//! Raw session rows. The payload is opaque text owned by the web layer.
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    pub token: String,
    pub user_id: Option<i64>,
    pub data: String,
    pub expires_at: i64,
}

pub fn save(conn: &Connection, row: &SessionRow) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (token, user_id, data, expires_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (token) DO UPDATE SET
             user_id = excluded.user_id,
             data = excluded.data,
             expires_at = excluded.expires_at",
        params![row.token, row.user_id, row.data, row.expires_at],
    )?;

    Ok(())
}

/// Loads a session that has not expired at `now`. Expired rows are deleted.
pub fn load(conn: &Connection, token: &str, now: i64) -> Result<Option<SessionRow>> {
    let row = conn
        .query_row(
            "SELECT token, user_id, data, expires_at FROM sessions WHERE token = ?1",
            [token],
            |row| {
                Ok(SessionRow {
                    token: row.get(0)?,
                    user_id: row.get(1)?,
                    data: row.get(2)?,
                    expires_at: row.get(3)?,
                })
            },
        )
        .optional()?;

    match row {
        Some(row) if row.expires_at <= now => {
            delete(conn, token)?;
            Ok(None)
        }
        row => Ok(row),
    }
}

pub fn delete(conn: &Connection, token: &str) -> Result<()> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", [token])?;

    Ok(())
}

pub fn purge_expired(conn: &Connection, now: i64) -> Result<usize> {
    Ok(conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [now])?)
}
