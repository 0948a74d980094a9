pub mod postgres;
pub mod sqlite;
pub mod trait_def;


pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{Storage, StorageError, StorageResult};

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::config::{DatabaseBackend, DatabaseConfig};

/// SQLite busy/locked (plain and extended) and PostgreSQL
/// serialization_failure / deadlock_detected.
const CONTENTION_CODES: &[&str] = &["5", "6", "261", "262", "517", "40001", "40P01"];

pub(crate) fn is_contention(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .is_some_and(|code| CONTENTION_CODES.iter().any(|c| *c == code)),
        _ => false,
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        if is_contention(&err) {
            StorageError::Contention(err.to_string())
        } else {
            StorageError::Other(err.into())
        }
    }
}

/// Open the configured backend. Tables are not created; call [`Storage::init`].
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.url);
            Arc::new(SqliteStorage::new(&config.url, config.max_connections).await?)
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage");
            Arc::new(PostgresStorage::new(&config.url, config.max_connections).await?)
        }
    };

    Ok(storage)
}
