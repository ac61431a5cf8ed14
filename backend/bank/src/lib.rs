//! # Bank
//!
//! Relational store behind the shared cart.
//!
//! ## Tables
//! - users, profiles: accounts plus the university/address captured at signup. A profile is
//!   created in the same transaction as its user.
//! - supermarkets, products: the catalog. Prices are stored as integer cents.
//! - carts, cart_users: carts and the users sharing each one.
//! - cart_items: one row per (cart, product, contributing user).
//! - sessions: server-side web sessions, keyed by an opaque token.
//!
//! ## Notes
//! - Foreign keys are enforced and cascade on delete.
//! - The schema is applied with `CREATE TABLE IF NOT EXISTS` on every open.
use std::path::Path;

use rusqlite::Connection;
use tracing::debug;

pub mod carts;
pub mod catalog;
pub mod checkout;
pub mod error;
pub mod models;
pub mod sessions;
pub mod users;

pub use error::{BankError, Result};
pub use rusqlite;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL DEFAULT '',
        password_hash TEXT NOT NULL,
        date_joined INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS profiles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        address TEXT NOT NULL DEFAULT ''
    );

    CREATE TABLE IF NOT EXISTS supermarkets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        location TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        price_cents INTEGER NOT NULL,
        category TEXT NOT NULL,
        calories INTEGER NOT NULL DEFAULT 0,
        protein REAL NOT NULL,
        carbohydrates REAL NOT NULL,
        fat REAL NOT NULL,
        is_healthy INTEGER NOT NULL DEFAULT 0,
        health_score INTEGER NOT NULL DEFAULT 50,
        image TEXT NOT NULL DEFAULT 'images/products/AlmondMilk.jpeg',
        supermarket_id INTEGER NOT NULL REFERENCES supermarkets(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS products_supermarket ON products(supermarket_id);

    CREATE TABLE IF NOT EXISTS carts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS cart_users (
        cart_id INTEGER NOT NULL REFERENCES carts(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        PRIMARY KEY (cart_id, user_id)
    );

    CREATE TABLE IF NOT EXISTS cart_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        cart_id INTEGER NOT NULL REFERENCES carts(id) ON DELETE CASCADE,
        product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
        quantity INTEGER NOT NULL DEFAULT 1 CHECK (quantity BETWEEN 0 AND 2147483647),
        added_by INTEGER REFERENCES users(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS cart_items_cart ON cart_items(cart_id);

    CREATE TABLE IF NOT EXISTS sessions (
        token TEXT PRIMARY KEY,
        user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
        data TEXT NOT NULL DEFAULT '{}',
        expires_at INTEGER NOT NULL
    );
"#;

pub fn open(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();
    debug!("Opening database at {}", path.display());

    let conn = Connection::open(path)?;
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    debug!("Journal mode: {mode}");
    init(&conn)?;

    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init(&conn)?;

    Ok(conn)
}

fn init(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.execute_batch(SCHEMA)?;

    Ok(())
}

/// Escapes `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
