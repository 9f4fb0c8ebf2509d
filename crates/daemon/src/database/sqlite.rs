use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use url::Url;

use super::DatabaseSetupError;

pub const MEMORY_URL: &str = "sqlite::memory:";

const MAX_CONNECTIONS: u32 = 8;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn connect_sqlite(url: &Url) -> Result<SqlitePool, DatabaseSetupError> {
    let options =
        SqliteConnectOptions::from_str(url.as_str()).map_err(DatabaseSetupError::Unavailable)?;
    open(options, url.as_str().contains(":memory:")).await
}

pub async fn connect_sqlite_file(path: &Path) -> Result<SqlitePool, DatabaseSetupError> {
    open(SqliteConnectOptions::new().filename(path), false).await
}

async fn open(
    options: SqliteConnectOptions,
    in_memory: bool,
) -> Result<SqlitePool, DatabaseSetupError> {
    let mut options = options
        .create_if_missing(true)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);

    // every connection to :memory: is its own database, so keep exactly one alive
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        options = options.journal_mode(SqliteJournalMode::Wal);
        SqlitePoolOptions::new().max_connections(MAX_CONNECTIONS)
    };

    pool_options
        .connect_with(options)
        .await
        .map_err(DatabaseSetupError::Unavailable)
}

pub async fn migrate_sqlite(pool: &SqlitePool) -> Result<(), DatabaseSetupError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(DatabaseSetupError::MigrationFailed)
}
