use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

/// Read-write pool for ingestion and migrations. Creates the database file
/// on first use.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    pool(database_url, max_connections, timeout_secs, false).await
}

/// Pool for the query path. Writes are rejected at the connection level, so
/// a misrouted upsert fails instead of racing the ingestion batch.
pub async fn connect_read_only(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    pool(database_url, max_connections, timeout_secs, true).await
}

async fn pool(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
    read_only: bool,
) -> Result<DbPool, sqlx::Error> {
    let mut options = SqliteConnectOptions::from_str(database_url)?
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(5_000));
    options = if read_only {
        options.read_only(true)
    } else {
        // WAL keeps catalog reads open while ingestion writes.
        options.create_if_missing(true).journal_mode(SqliteJournalMode::Wal)
    };

    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .connect_with(options)
        .await
}
