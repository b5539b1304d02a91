use chrono::{DateTime, Utc};

use crate::constants::{WEIGHT_ORIGINAL, WEIGHT_QUOTE, WEIGHT_REPLY, WEIGHT_RETWEET};
use crate::db::prelude::ScoreRow;
use crate::util::unix_ms;
use crate::util::x::PostKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub original: f64,
    pub quote: f64,
    pub reply: f64,
    pub retweet: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            original: WEIGHT_ORIGINAL,
            quote: WEIGHT_QUOTE,
            reply: WEIGHT_REPLY,
            retweet: WEIGHT_RETWEET,
        }
    }
}

impl Weights {
    pub fn of(&self, kind: PostKind) -> f64 {
        match kind {
            PostKind::Original => self.original,
            PostKind::Quote => self.quote,
            PostKind::Reply => self.reply,
            PostKind::Retweet => self.retweet,
        }
    }
}

/// Per-handle daily limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caps {
    pub total: i64,
    pub retweet: i64,
}

impl Default for Caps {
    fn default() -> Self {
        Self {
            total: 2,
            retweet: 3,
        }
    }
}

impl ScoreRow {
    /// Credits one post of `kind`, returning the points awarded, or `None` when a daily cap is
    /// already reached (the row is then left untouched).
    pub fn apply(&mut self, kind: PostKind, now_ms: i64, weights: &Weights, caps: &Caps) -> Option<f64> {
        if self.today_total() >= caps.total {
            return None;
        }

        let counter = match kind {
            PostKind::Retweet if self.rt_today >= caps.retweet => return None,
            PostKind::Retweet => &mut self.rt_today,
            PostKind::Original => &mut self.orig_today,
            PostKind::Quote => &mut self.quote_today,
            PostKind::Reply => &mut self.reply_today,
        };
        *counter += 1;

        let points = weights.of(kind);
        self.tweets += 1;
        self.points += points;
        self.last_ts = now_ms;

        Some(points)
    }
}

/// Unix ms of 00:00 UTC on the day containing `now`.
pub fn day_start_ms(now: DateTime<Utc>) -> i64 {
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|t| t.and_utc())
        .unwrap_or(now);

    unix_ms(midnight)
}
