use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;

use crate::{
    error::{BankError, Result},
    models::{Profile, User},
};

const USER_COLUMNS: &str = "id, username, email, password_hash, date_joined";

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub address: &'a str,
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| BankError::PasswordHash(e.to_string()))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Inserts the user and its profile together.
pub fn create_user(conn: &mut Connection, new_user: &NewUser<'_>) -> Result<User> {
    let password_hash = hash_password(new_user.password)?;
    let now = Utc::now().timestamp();

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO users (username, email, password_hash, date_joined) VALUES (?1, ?2, ?3, ?4)",
        params![new_user.username, new_user.email, password_hash, now],
    )?;
    let user_id = tx.last_insert_rowid();
    tx.execute(
        "INSERT INTO profiles (user_id, address) VALUES (?1, ?2)",
        params![user_id, new_user.address],
    )?;
    tx.commit()?;

    info!("Created user {} ({user_id})", new_user.username);

    get_user(conn, user_id)
}

pub fn get_user(conn: &Connection, user_id: i64) -> Result<User> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        [user_id],
        user_from_row,
    )
    .optional()?
    .ok_or(BankError::NotFound("User"))
}

pub fn find_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            [username],
            user_from_row,
        )
        .optional()?)
}

pub fn username_exists(conn: &Connection, username: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM users WHERE username = ?1)",
        [username],
        |row| row.get(0),
    )?)
}

pub fn email_exists(conn: &Connection, email: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM users WHERE email = ?1)",
        [email],
        |row| row.get(0),
    )?)
}

/// Returns the user when the password matches.
pub fn authenticate(conn: &Connection, username: &str, password: &str) -> Result<Option<User>> {
    Ok(find_by_username(conn, username)?
        .filter(|user| verify_password(password, &user.password_hash)))
}

pub fn get_profile(conn: &Connection, user_id: i64) -> Result<Profile> {
    conn.query_row(
        "SELECT p.id, p.user_id, u.username, p.address
         FROM profiles p JOIN users u ON u.id = p.user_id
         WHERE p.user_id = ?1",
        [user_id],
        |row| {
            Ok(Profile {
                id: row.get(0)?,
                user_id: row.get(1)?,
                username: row.get(2)?,
                address: row.get(3)?,
            })
        },
    )
    .optional()?
    .ok_or(BankError::NotFound("Profile"))
}

pub fn set_address(conn: &Connection, user_id: i64, address: &str) -> Result<()> {
    let updated = conn.execute(
        "UPDATE profiles SET address = ?2 WHERE user_id = ?1",
        params![user_id, address],
    )?;

    if updated == 0 {
        return Err(BankError::NotFound("Profile"));
    }

    Ok(())
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let joined: i64 = row.get(4)?;

    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        date_joined: DateTime::from_timestamp(joined, 0).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_in_memory;

    fn new_user<'a>(username: &'a str, email: &'a str) -> NewUser<'a> {
        NewUser {
            username,
            email,
            password: "testpass",
            address: "Test University",
        }
    }

    #[test]
    fn test_create_user_with_profile() {
        let mut conn = open_in_memory().unwrap();
        let user = create_user(&mut conn, &new_user("testuser", "test@example.com")).unwrap();

        assert_eq!(user.username, "testuser");
        assert_ne!(user.password_hash, "testpass");

        let profile = get_profile(&conn, user.id).unwrap();
        assert_eq!(profile.address, "Test University");
        assert_eq!(profile.to_string(), "testuser");
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let mut conn = open_in_memory().unwrap();
        create_user(&mut conn, &new_user("testuser", "a@example.com")).unwrap();

        let result = create_user(&mut conn, &new_user("testuser", "b@example.com"));
        assert!(matches!(result, Err(BankError::Database(_))));

        let profiles: i64 = conn
            .query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))
            .unwrap();
        assert_eq!(profiles, 1);
    }

    #[test]
    fn test_exists_checks() {
        let mut conn = open_in_memory().unwrap();
        create_user(&mut conn, &new_user("testuser", "test@example.com")).unwrap();

        assert!(username_exists(&conn, "testuser").unwrap());
        assert!(!username_exists(&conn, "otheruser").unwrap());
        assert!(email_exists(&conn, "test@example.com").unwrap());
        assert!(!email_exists(&conn, "other@example.com").unwrap());
    }

    #[test]
    fn test_authenticate() {
        let mut conn = open_in_memory().unwrap();
        let user = create_user(&mut conn, &new_user("testuser", "test@example.com")).unwrap();

        let found = authenticate(&conn, "testuser", "testpass").unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));

        assert!(authenticate(&conn, "testuser", "wrong").unwrap().is_none());
        assert!(authenticate(&conn, "nobody", "testpass").unwrap().is_none());
    }

    #[test]
    fn test_set_address() {
        let mut conn = open_in_memory().unwrap();
        let user = create_user(&mut conn, &new_user("testuser", "test@example.com")).unwrap();

        set_address(&conn, user.id, "123 Test St").unwrap();
        assert_eq!(get_profile(&conn, user.id).unwrap().address, "123 Test St");

        assert!(matches!(
            set_address(&conn, user.id + 1, "x"),
            Err(BankError::NotFound(_))
        ));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(!verify_password("testpass", "not-a-hash"));
    }
}
