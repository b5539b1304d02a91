use std::collections::HashMap;

use http::StatusCode;
use http::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::constants::X_SEARCH_RECENT_PATH;

/// How a post relates to other posts, which decides how many points it is worth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PostKind {
    Original,
    Quote,
    Reply,
    Retweet,
}

impl PostKind {
    /// Classifies a post by the type of the first post it references.
    pub fn classify(referenced: &[ReferencedPost]) -> Self {
        match referenced.first().map(|r| r.kind.as_str()) {
            Some("retweeted") => PostKind::Retweet,
            Some("quoted") => PostKind::Quote,
            Some("replied_to") => PostKind::Reply,
            _ => PostKind::Original,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: String,
    pub author_id: Option<String>,
    pub username: Option<String>,
    pub kind: PostKind,
    pub text: Option<String>,
    pub created_at: Option<String>,
}

impl Post {
    /// The handle scores are credited to.
    pub fn handle(&self) -> &str {
        self.username.as_deref().unwrap_or("unknown")
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<RawPost>,
    #[serde(default)]
    includes: Includes,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct RawPost {
    id: String,
    author_id: Option<String>,
    text: Option<String>,
    created_at: Option<String>,
    #[serde(default)]
    referenced_tweets: Vec<ReferencedPost>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferencedPost {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Minimal client for the X v2 recent-search endpoint.
#[derive(Debug, Clone)]
pub struct XApi {
    client: reqwest::Client,
    base_url: String,
    bearer: Option<String>,
}

impl XApi {
    pub fn new(client: reqwest::Client, base_url: &str, bearer: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            bearer,
        }
    }

    /// Fetches up to `max_results` recent posts matching `query`, classified and with author
    /// handles resolved from the `includes.users` expansion.
    #[instrument(skip(self))]
    pub async fn search_recent(&self, query: &str, max_results: u8) -> XApiResult<Vec<Post>> {
        let bearer = self.bearer.as_deref().ok_or(XApiErr::MissingToken)?;
        let uri = format!("{}{}", self.base_url, X_SEARCH_RECENT_PATH);
        let max_results = max_results.to_string();

        let res = self
            .client
            .get(uri)
            .header(AUTHORIZATION, format!("Bearer {bearer}"))
            .query(&[
                ("query", query),
                ("max_results", max_results.as_str()),
                (
                    "tweet.fields",
                    "created_at,public_metrics,author_id,referenced_tweets",
                ),
                ("expansions", "author_id"),
                ("user.fields", "username"),
            ])
            .send()
            .await?;

        let status = res.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!("search api rate limited");
            return Err(XApiErr::RateLimited);
        }

        if !status.is_success() {
            tracing::error!(code = %status, "non-success response from search api");
            return Err(XApiErr::Status(status));
        }

        let body = res.bytes().await?;
        let parsed: SearchResponse = serde_json::from_slice(&body)?;

        let users: HashMap<String, String> = parsed
            .includes
            .users
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();

        let posts: Vec<Post> = parsed
            .data
            .into_iter()
            .map(|p| Post {
                kind: PostKind::classify(&p.referenced_tweets),
                username: p.author_id.as_ref().and_then(|a| users.get(a).cloned()),
                id: p.id,
                author_id: p.author_id,
                text: p.text,
                created_at: p.created_at,
            })
            .collect();

        tracing::debug!(count = posts.len(), "fetched recent posts");
        Ok(posts)
    }
}

pub type XApiResult<T> = core::result::Result<T, XApiErr>;

#[derive(Debug, Error)]
pub enum XApiErr {
    #[error("Missing X_BEARER_TOKEN")]
    MissingToken,

    #[error("rate_limited")]
    RateLimited,

    #[error("HTTP {}", .0.as_u16())]
    Status(StatusCode),

    #[error("Invalid JSON from X: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),
}
