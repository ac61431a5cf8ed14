use std::sync::Arc;

use super::{config::Config, database::Database, error::AppError};

pub struct State {
    pub config: Config,
    pub db: Database,
}

impl State {
    pub async fn new() -> Result<Arc<Self>, AppError> {
        let config = Config::load()?;
        let db = Database::open(&config.database_path)?;

        Ok(Self::with_database(config, db))
    }

    pub fn with_database(config: Config, db: Database) -> Arc<Self> {
        Arc::new(Self { config, db })
    }
}
