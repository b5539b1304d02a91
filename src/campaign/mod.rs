pub mod query;
pub mod scoring;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::campaign::scoring::{Caps, Weights, day_start_ms};
use crate::constants::{PREVIEW_BATCH_SIZE, REFRESH_BATCH_SIZE};
use crate::db::prelude::*;
use crate::util::env::Env;
use crate::util::unix_ms;
use crate::util::x::{Post, PostKind, XApi, XApiErr};

/// The engagement campaign: pulls matching posts, scores them into the leaderboard and serves
/// the standings.
#[derive(Debug, Clone)]
pub struct Campaign {
    pool: SqlitePool,
    x: XApi,
    query: String,
    weights: Weights,
    caps: Caps,
    cooldown_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewPost {
    pub id: String,
    pub user: Option<String>,
    pub kind: PostKind,
    pub text: Option<String>,
    pub created_at: Option<String>,
}

impl From<Post> for PreviewPost {
    fn from(post: Post) -> Self {
        Self {
            user: post.username.or(post.author_id),
            id: post.id,
            kind: post.kind,
            text: post.text,
            created_at: post.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub ok: bool,
    pub query: String,
    pub count: usize,
    pub tweets: Vec<PreviewPost>,
}

impl Campaign {
    pub fn new(pool: SqlitePool, x: XApi, query: String, caps: Caps, cooldown: Duration) -> Self {
        Self {
            pool,
            x,
            query,
            weights: Weights::default(),
            caps,
            cooldown_ms: i64::try_from(cooldown.as_millis()).unwrap_or(i64::MAX),
        }
    }

    pub fn from_env(pool: SqlitePool, client: reqwest::Client, env: &Env) -> Self {
        let x = XApi::new(client, &env.x_api_url, env.x_bearer_token.clone());
        let caps = Caps {
            total: env.promo_daily_total_cap,
            retweet: env.promo_daily_retweet_cap,
        };

        Self::new(
            pool,
            x,
            query::build_query(&env.promo_hashtags, &env.promo_mention),
            caps,
            Duration::from_secs(env.campaign_cooldown_secs),
        )
    }

    /// Pulls the latest posts and credits every unseen one, returning how many were counted.
    #[instrument(skip(self))]
    pub async fn refresh(&self, now: DateTime<Utc>) -> CampaignResult<usize> {
        let meta = MetaRepository::new(self.pool.clone());
        let now_ms = unix_ms(now);

        let until = meta.get_ms(MetaKey::CooldownUntil).await?;
        if until > now_ms {
            let retry_after = (until - now_ms + 999) / 1000;
            return Err(CampaignErr::Cooldown { retry_after });
        }

        let posts = match self.x.search_recent(&self.query, REFRESH_BATCH_SIZE).await {
            Ok(posts) => posts,
            Err(e) => {
                meta.set(MetaKey::CooldownUntil, now_ms + self.cooldown_ms)
                    .await?;
                return Err(e.into());
            }
        };

        let mut tx = Tx::begin(&self.pool).await?;
        let added = match self.credit(&mut tx, &posts, now).await {
            Ok(added) => {
                tx.commit().await?;
                added
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    tracing::error!(error = ?rb, "refresh rollback failed");
                }
                return Err(e.into());
            }
        };

        meta.set(MetaKey::LastUpdate, now_ms).await?;
        meta.set(MetaKey::CooldownUntil, now_ms + self.cooldown_ms)
            .await?;

        tracing::info!(fetched = posts.len(), added, "campaign refreshed");
        Ok(added)
    }

    async fn credit(&self, tx: &mut Tx, posts: &[Post], now: DateTime<Utc>) -> sqlx::Result<usize> {
        let now_ms = unix_ms(now);
        let reset = tx.reset_daily_counters(day_start_ms(now)).await?;
        if reset > 0 {
            tracing::debug!(rows = reset, "reset daily counters");
        }

        let mut added = 0;
        for post in posts {
            if tx.is_seen(&post.id).await? {
                continue;
            }

            let user = post.handle();
            let mut row = tx
                .get_score(user)
                .await?
                .unwrap_or_else(|| ScoreRow::new(user));

            match row.apply(post.kind, now_ms, &self.weights, &self.caps) {
                Some(points) => {
                    tx.upsert_score(&row).await?;
                    tx.mark_seen(&post.id).await?;
                    added += 1;
                    tracing::debug!(post = %post.id, user, kind = ?post.kind, points, "credited post");
                }
                None => {
                    tracing::debug!(post = %post.id, user, kind = ?post.kind, "daily cap reached");
                }
            }
        }

        Ok(added)
    }

    /// Classified sample of what the search currently returns; nothing is written.
    #[instrument(skip(self))]
    pub async fn preview(&self) -> CampaignResult<Preview> {
        let posts = self.x.search_recent(&self.query, PREVIEW_BATCH_SIZE).await?;
        let tweets: Vec<PreviewPost> = posts.into_iter().map(PreviewPost::from).collect();

        Ok(Preview {
            ok: true,
            query: self.query.clone(),
            count: tweets.len(),
            tweets,
        })
    }

    #[instrument(skip(self))]
    pub async fn leaderboard(&self, page: &Pagination) -> CampaignResult<LeaderboardPage<LeaderboardEntry>> {
        let (limit, offset) = page.clamped();
        let repo = LeaderboardRepository::new(self.pool.clone());

        Ok(LeaderboardPage {
            last_update: MetaRepository::new(self.pool.clone())
                .get_ms(MetaKey::LastUpdate)
                .await?,
            total: repo.count().await.map_err(DbError::from)?,
            rows: repo.page(limit, offset).await.map_err(DbError::from)?,
        })
    }

    /// Manually credits a handle, bypassing weights and caps.
    #[instrument(skip(self))]
    pub async fn dev_add(
        &self,
        user: &str,
        tweets: i64,
        points: f64,
        now: DateTime<Utc>,
    ) -> CampaignResult<ScoreRow> {
        let row = LeaderboardRepository::new(self.pool.clone())
            .add_totals(user, tweets, points)
            .await
            .map_err(DbError::from)?;

        MetaRepository::new(self.pool.clone())
            .set(MetaKey::LastUpdate, unix_ms(now))
            .await?;

        tracing::info!(user, tweets, points, "manual credit applied");
        Ok(row)
    }

    /// Re-runs schema creation, returning the columns that had to be added.
    #[instrument(skip(self))]
    pub async fn migrate(&self) -> CampaignResult<Vec<&'static str>> {
        Ok(ensure_schema(&self.pool).await?)
    }

    /// Calls [`Campaign::refresh`] every `every`, for deployments without an external trigger.
    pub fn spawn_poller(self, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match self.refresh(Utc::now()).await {
                    Ok(added) => tracing::debug!(added, "scheduled refresh"),
                    Err(CampaignErr::Cooldown { retry_after }) => {
                        tracing::debug!(retry_after, "scheduled refresh skipped, cooling down")
                    }
                    Err(e) => tracing::warn!(error = %e, "scheduled refresh failed"),
                }
            }
        })
    }
}

pub type CampaignResult<T> = core::result::Result<T, CampaignErr>;

#[derive(Debug, Error)]
pub enum CampaignErr {
    #[error("cooldown")]
    Cooldown { retry_after: i64 },

    #[error(transparent)]
    Upstream(#[from] XApiErr),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for CampaignErr {
    fn from(e: sqlx::Error) -> Self {
        CampaignErr::Db(DbError::from(e))
    }
}
