use serde::{Deserialize, Serialize};

/// Base `leaderboard` table model: one row per credited handle.
#[derive(Debug, Clone, PartialEq, Default, sqlx::FromRow)]
pub struct ScoreRow {
    pub user: String,
    pub tweets: i64,
    pub points: f64,
    pub rt_today: i64,
    pub orig_today: i64,
    pub quote_today: i64,
    pub reply_today: i64,
    /// Unix ms of the last counted post.
    pub last_ts: i64,
}

impl ScoreRow {
    pub fn new(user: &str) -> Self {
        Self {
            user: user.to_owned(),
            ..Default::default()
        }
    }

    pub fn today_total(&self) -> i64 {
        self.rt_today + self.orig_today + self.quote_today + self.reply_today
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LeaderboardEntry {
    pub user: String,
    pub tweets: i64,
    pub points: f64,
}

impl From<ScoreRow> for LeaderboardEntry {
    fn from(row: ScoreRow) -> Self {
        Self {
            user: row.user,
            tweets: row.tweets,
            points: row.points,
        }
    }
}
