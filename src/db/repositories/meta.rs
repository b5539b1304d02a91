use sqlx::SqlitePool;
use tracing::instrument;

use crate::db::models::meta::MetaKey;
use crate::db::{DbError, DbResult};

pub struct MetaRepository {
    pool: SqlitePool,
}

impl MetaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Reads a millisecond timestamp, 0 when the key was never written.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn get_ms(&self, key: MetaKey) -> DbResult<i64> {
        let value: Option<Option<String>> =
            sqlx::query_scalar("SELECT v FROM meta WHERE k = ?1")
                .bind(key.as_str())
                .fetch_optional(&self.pool)
                .await?;

        match value.flatten() {
            None => Ok(0),
            Some(v) if v.trim().is_empty() => Ok(0),
            Some(v) => v.trim().parse().map_err(|_| DbError::BadMetaValue {
                key: key.as_str(),
                value: v,
            }),
        }
    }

    #[instrument(skip(self), fields(key = %key))]
    pub async fn set(&self, key: MetaKey, value: i64) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO meta (k, v)
            VALUES (?1, ?2)
            ON CONFLICT (k)
            DO UPDATE SET v = excluded.v
            "#,
        )
        .bind(key.as_str())
        .bind(value.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
