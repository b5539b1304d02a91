use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;
use tracing::instrument;

pub mod models;
pub mod repositories;

pub mod prelude {
    pub use crate::db::{DbError, DbResult, connect, ensure_schema};

    pub use crate::db::models::meta::MetaKey;
    pub use crate::db::models::score::{LeaderboardEntry, ScoreRow};
    pub use crate::db::models::{LeaderboardPage, Pagination};

    pub use crate::db::repositories::Repository;
    pub use crate::db::repositories::Tx;
    pub use crate::db::repositories::leaderboard::LeaderboardRepository;
    pub use crate::db::repositories::meta::MetaRepository;
}

const CREATE_TABLES: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS leaderboard (
        user TEXT PRIMARY KEY,
        tweets INTEGER DEFAULT 0,
        points REAL DEFAULT 0.0,
        rt_today INTEGER DEFAULT 0,
        orig_today INTEGER DEFAULT 0,
        quote_today INTEGER DEFAULT 0,
        reply_today INTEGER DEFAULT 0,
        last_ts INTEGER DEFAULT 0
    )
    "#,
    "CREATE TABLE IF NOT EXISTS seen (id TEXT PRIMARY KEY)",
    "CREATE TABLE IF NOT EXISTS meta (k TEXT PRIMARY KEY, v TEXT)",
];

/// Columns later versions added to `leaderboard`, with the definition used to backfill them
/// on databases created before they existed.
const LEADERBOARD_COLUMNS: [(&str, &str); 6] = [
    ("points", "REAL DEFAULT 0.0"),
    ("rt_today", "INTEGER DEFAULT 0"),
    ("orig_today", "INTEGER DEFAULT 0"),
    ("quote_today", "INTEGER DEFAULT 0"),
    ("reply_today", "INTEGER DEFAULT 0"),
    ("last_ts", "INTEGER DEFAULT 0"),
];

/// Opens (creating if needed) the campaign database file and brings its schema up to date.
#[instrument]
pub async fn connect(path: &str) -> DbResult<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    let added = ensure_schema(&pool).await?;
    tracing::info!(path, added_columns = ?added, "campaign database ready");

    Ok(pool)
}

/// Creates missing tables and adds any `leaderboard` columns an older file lacks. Returns the
/// names of the columns that had to be added.
#[instrument(skip(pool))]
pub async fn ensure_schema(pool: &SqlitePool) -> DbResult<Vec<&'static str>> {
    for stmt in CREATE_TABLES {
        sqlx::query(stmt).execute(pool).await?;
    }

    let existing: Vec<String> =
        sqlx::query_scalar("SELECT name FROM pragma_table_info('leaderboard')")
            .fetch_all(pool)
            .await?;

    let mut added = Vec::new();
    for (column, definition) in LEADERBOARD_COLUMNS {
        if existing.iter().any(|c| c == column) {
            continue;
        }

        tracing::warn!(column, "adding missing leaderboard column");
        sqlx::query(&format!(
            "ALTER TABLE leaderboard ADD COLUMN {column} {definition}"
        ))
        .execute(pool)
        .await?;
        added.push(column);
    }

    Ok(added)
}

pub type DbResult<T> = core::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),

    #[error("meta value for '{key}' is not a timestamp: '{value}'")]
    BadMetaValue { key: &'static str, value: String },
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    // a single connection, since every in-memory connection is its own database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    ensure_schema(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let pool = test_pool().await;
        assert!(ensure_schema(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backfills_legacy_leaderboard() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::query("CREATE TABLE leaderboard (user TEXT PRIMARY KEY, tweets INTEGER DEFAULT 0)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO leaderboard (user, tweets) VALUES ('old', 4)")
            .execute(&pool)
            .await
            .unwrap();

        let added = ensure_schema(&pool).await.unwrap();
        assert_eq!(
            added,
            vec!["points", "rt_today", "orig_today", "quote_today", "reply_today", "last_ts"]
        );

        let (tweets, points): (i64, f64) =
            sqlx::query_as("SELECT tweets, points FROM leaderboard WHERE user = 'old'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!((tweets, points), (4, 0.0));
    }
}
