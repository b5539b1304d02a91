use sqlx::{Result as SqlxResult, SqlitePool};
use tracing::instrument;

use crate::db::models::score::{LeaderboardEntry, ScoreRow};
use crate::db::repositories::Repository;
use crate::db::repositories::sql_fragment::{ENTRY_FIELDS, SCORE_FIELDS};

pub struct LeaderboardRepository {
    pool: SqlitePool,
}

impl Repository for LeaderboardRepository {
    type Ident = String;
    type Output = ScoreRow;

    const BASE_FIELDS: &'static str = SCORE_FIELDS;
    const TABLE_NAME: &'static str = "leaderboard";
    const KEY_COLUMN: &'static str = "user";

    fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl LeaderboardRepository {
    /// One page of standings, best first. Ties fall back to post count, then handle.
    #[instrument(skip(self))]
    pub async fn page(&self, limit: i64, offset: i64) -> SqlxResult<Vec<LeaderboardEntry>> {
        sqlx::query_as::<_, LeaderboardEntry>(&format!(
            r#"
            SELECT {ENTRY_FIELDS}
            FROM leaderboard
            ORDER BY
                COALESCE(points, tweets * 1.0, 0.0) DESC,
                COALESCE(tweets, 0) DESC,
                user ASC
            LIMIT ?1 OFFSET ?2
            "#
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    /// Adds to a handle's running totals, creating the row when needed, and returns the result.
    #[instrument(skip(self))]
    pub async fn add_totals(&self, user: &str, tweets: i64, points: f64) -> SqlxResult<ScoreRow> {
        sqlx::query(
            r#"
            INSERT INTO leaderboard (user, tweets, points)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (user)
            DO UPDATE SET
                tweets = COALESCE(tweets, 0) + excluded.tweets,
                points = COALESCE(points, 0.0) + excluded.points
            "#,
        )
        .bind(user)
        .bind(tweets)
        .bind(points)
        .execute(&self.pool)
        .await?;

        let row = self.get_by_id(&user.to_owned()).await?;
        row.ok_or(sqlx::Error::RowNotFound)
    }
}
