use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use tracing::{info, warn};

use crate::error::AppError;

pub const DEFAULT_SESSION_TTL_SECS: i64 = 60 * 60 * 24 * 14;

pub struct Config {
    pub port: u16,
    pub database_path: PathBuf,
    pub static_dir: PathBuf,
    pub session_ttl_secs: i64,
    pub shared_cart_name: String,
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        Ok(Self {
            port: try_load("RUST_PORT", "8000")?,
            database_path: try_load("DATABASE_PATH", "sharedcart.db")?,
            static_dir: try_load("STATIC_DIR", "static")?,
            session_ttl_secs: positive(
                "SESSION_TTL_SECS",
                try_load("SESSION_TTL_SECS", &DEFAULT_SESSION_TTL_SECS.to_string())?,
            )?,
            shared_cart_name: try_load("SHARED_CART_NAME", "Shared Cart")?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            database_path: PathBuf::from("sharedcart.db"),
            static_dir: PathBuf::from("static"),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            shared_cart_name: "Shared Cart".to_string(),
        }
    }
}

/// Reads `key` from the environment, or `default` when it is unset.
fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, AppError>
where
    T::Err: Display,
{
    let raw = match env::var(key) {
        Ok(raw) => raw,
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default.to_string()
        }
    };

    raw.trim().parse().map_err(|e| {
        warn!("Invalid {key} value {raw:?}: {e}");
        AppError::Config(format!("{key}: {e}"))
    })
}

fn positive(key: &str, value: i64) -> Result<i64, AppError> {
    if value <= 0 {
        return Err(AppError::Config(format!("{key}: must be positive, got {value}")));
    }

    Ok(value)
}
