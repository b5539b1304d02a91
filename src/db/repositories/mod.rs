use core::fmt;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Result as SqlxResult, Sqlite, SqlitePool, Transaction};
use tracing::instrument;

use crate::db::models::score::ScoreRow;

pub mod leaderboard;
pub mod meta;

/// A refresh-scoped transaction over the campaign tables.
pub struct Tx {
    inner: Option<Transaction<'static, Sqlite>>,
}

impl Tx {
    #[instrument(skip(pool))]
    pub async fn begin(pool: &SqlitePool) -> SqlxResult<Self> {
        let inner = pool.begin().await?;
        Ok(Self { inner: Some(inner) })
    }

    #[instrument(skip(self))]
    pub async fn commit(&mut self) -> SqlxResult<()> {
        if let Some(tx) = self.inner.take() {
            tx.commit().await
        } else {
            Err(sqlx::Error::Protocol(
                "Transaction already completed".into(),
            ))
        }
    }

    #[instrument(skip(self))]
    pub async fn rollback(&mut self) -> SqlxResult<()> {
        if let Some(tx) = self.inner.take() {
            tx.rollback().await
        } else {
            Err(sqlx::Error::Protocol(
                "Transaction already completed".into(),
            ))
        }
    }

    fn inner_mut(&mut self) -> SqlxResult<&mut Transaction<'static, Sqlite>> {
        self.inner
            .as_mut()
            .ok_or_else(|| sqlx::Error::Protocol("Transaction already completed".into()))
    }

    /// Zeroes the per-day counters of every row last active before `day_start_ms`, returning the
    /// number of rows touched.
    #[instrument(skip(self))]
    pub async fn reset_daily_counters(&mut self, day_start_ms: i64) -> SqlxResult<u64> {
        let res = sqlx::query(
            r#"
            UPDATE leaderboard
            SET rt_today = 0,
                orig_today = 0,
                quote_today = 0,
                reply_today = 0
            WHERE COALESCE(last_ts, 0) < ?1
            "#,
        )
        .bind(day_start_ms)
        .execute(&mut **self.inner_mut()?)
        .await?;

        Ok(res.rows_affected())
    }

    #[instrument(skip(self))]
    pub async fn is_seen(&mut self, post_id: &str) -> SqlxResult<bool> {
        let hits: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seen WHERE id = ?1")
            .bind(post_id)
            .fetch_one(&mut **self.inner_mut()?)
            .await?;

        Ok(hits > 0)
    }

    #[instrument(skip(self))]
    pub async fn mark_seen(&mut self, post_id: &str) -> SqlxResult<()> {
        sqlx::query("INSERT OR IGNORE INTO seen (id) VALUES (?1)")
            .bind(post_id)
            .execute(&mut **self.inner_mut()?)
            .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_score(&mut self, user: &str) -> SqlxResult<Option<ScoreRow>> {
        sqlx::query_as::<_, ScoreRow>(&format!(
            "SELECT {} FROM leaderboard WHERE user = ?1",
            sql_fragment::SCORE_FIELDS
        ))
        .bind(user)
        .fetch_optional(&mut **self.inner_mut()?)
        .await
    }

    /// Writes the full row, replacing whatever was stored for the handle.
    #[instrument(skip(self, row), fields(user = %row.user))]
    pub async fn upsert_score(&mut self, row: &ScoreRow) -> SqlxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO leaderboard (
                user,
                tweets,
                points,
                rt_today,
                orig_today,
                quote_today,
                reply_today,
                last_ts
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT (user)
            DO UPDATE SET
                tweets = excluded.tweets,
                points = excluded.points,
                rt_today = excluded.rt_today,
                orig_today = excluded.orig_today,
                quote_today = excluded.quote_today,
                reply_today = excluded.reply_today,
                last_ts = excluded.last_ts
            "#,
        )
        .bind(&row.user)
        .bind(row.tweets)
        .bind(row.points)
        .bind(row.rt_today)
        .bind(row.orig_today)
        .bind(row.quote_today)
        .bind(row.reply_today)
        .bind(row.last_ts)
        .execute(&mut **self.inner_mut()?)
        .await?;

        Ok(())
    }
}

pub mod sql_fragment {
    /// `leaderboard` columns with legacy NULLs folded to zero.
    pub const SCORE_FIELDS: &str = r#"
        user,
        COALESCE(tweets, 0) AS tweets,
        COALESCE(points, tweets * 1.0, 0.0) AS points,
        COALESCE(rt_today, 0) AS rt_today,
        COALESCE(orig_today, 0) AS orig_today,
        COALESCE(quote_today, 0) AS quote_today,
        COALESCE(reply_today, 0) AS reply_today,
        COALESCE(last_ts, 0) AS last_ts
    "#;

    pub const ENTRY_FIELDS: &str = r#"
        user,
        COALESCE(tweets, 0) AS tweets,
        COALESCE(points, tweets * 1.0, 0.0) AS points
    "#;
}

#[async_trait]
pub trait Repository: Send + Sync {
    type Ident: for<'q> sqlx::Encode<'q, Sqlite> + sqlx::Type<Sqlite> + Send + Sync + fmt::Debug;
    type Output: for<'r> sqlx::FromRow<'r, SqliteRow> + Sized + Unpin + Send + fmt::Debug;

    const BASE_FIELDS: &'static str;
    const TABLE_NAME: &'static str;
    const KEY_COLUMN: &'static str;

    fn new(pool: SqlitePool) -> Self
    where
        Self: Sized;

    fn pool(&self) -> &SqlitePool;

    #[instrument(skip(self))]
    async fn count(&self) -> SqlxResult<i64> {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", Self::TABLE_NAME))
            .fetch_one(self.pool())
            .await
    }

    #[instrument(skip(self, id))]
    async fn get_by_id(&self, id: &Self::Ident) -> SqlxResult<Option<Self::Output>> {
        sqlx::query_as::<_, Self::Output>(&format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            Self::BASE_FIELDS,
            Self::TABLE_NAME,
            Self::KEY_COLUMN
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
    }
}
