pub mod env;
pub mod helius;
pub mod telemetry;
pub mod upstream;
pub mod x;

use chrono::{DateTime, Utc};

/// Milliseconds since the unix epoch, the unit every timestamp in the campaign tables uses.
pub fn unix_ms(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Returns `true` for absolute `http://` or `https://` urls (case-insensitive scheme).
pub fn is_http_url(s: &str) -> bool {
    let lower = s.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
