use serde::{Deserialize, Serialize};

use crate::constants::{LEADERBOARD_DEFAULT_LIMIT, LEADERBOARD_MAX_LIMIT};

pub mod meta;
pub mod score;

#[inline]
const fn default_offset() -> i64 {
    0
}

#[inline]
const fn default_limit() -> i64 {
    LEADERBOARD_DEFAULT_LIMIT
}

/// `?limit=&offset=` query parameters; values outside the allowed window are clamped rather than
/// rejected.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default = "default_offset")]
    pub offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: default_offset(),
        }
    }
}

impl Pagination {
    pub fn clamped(&self) -> (i64, i64) {
        (
            self.limit.clamp(1, LEADERBOARD_MAX_LIMIT),
            self.offset.max(0),
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardPage<T> {
    /// Unix milliseconds of the last successful refresh, 0 if none has happened.
    pub last_update: i64,
    pub total: i64,
    pub rows: Vec<T>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pagination_clamps() {
        let p = Pagination {
            limit: 10_000,
            offset: -4,
        };
        assert_eq!(p.clamped(), (500, 0));

        let p = Pagination {
            limit: 0,
            offset: 20,
        };
        assert_eq!(p.clamped(), (1, 20));

        assert_eq!(Pagination::default().clamped(), (10, 0));
    }
}
