//! SQLite database connection management.
//!
//! Provides a connection pool to the SQLite database holding the task
//! tables and the task embedding index, with WAL mode enabled so the HTTP
//! server can answer queries while `recall index` writes embeddings. The
//! database file and its parent directories are created automatically.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::config::Config;

/// Pool size shared by the HTTP server and the indexer.
const MAX_CONNECTIONS: u32 = 5;

/// Open (creating if needed) the recall database at `[db].path`.
///
/// # Errors
///
/// Returns an error naming the database path if its directory cannot be
/// created or the database cannot be opened.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create directory for recall database: {}", parent.display())
        })?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open recall database: {}", db_path.display()))
}
