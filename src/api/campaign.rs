use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::server::{AppState, JsonResult, RouteError};
use crate::campaign::Preview;
use crate::db::prelude::{LeaderboardEntry, LeaderboardPage, Pagination, ScoreRow};

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub ok: bool,
    pub added: usize,
}

#[instrument(skip(state))]
pub async fn refresh(State(state): State<Arc<AppState>>) -> JsonResult<RefreshResponse> {
    let added = state.campaign.refresh(Utc::now()).await?;
    Ok(Json(RefreshResponse { ok: true, added }))
}

#[instrument(skip(state))]
pub async fn leaderboard(
    Query(param): Query<Pagination>,
    State(state): State<Arc<AppState>>,
) -> JsonResult<LeaderboardPage<LeaderboardEntry>> {
    Ok(Json(state.campaign.leaderboard(&param).await?))
}

#[instrument(skip(state))]
pub async fn preview(State(state): State<Arc<AppState>>) -> JsonResult<Preview> {
    Ok(Json(state.campaign.preview().await?))
}

#[derive(Debug, Deserialize)]
pub struct DevAddQuery {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub tweets: Option<i64>,
    #[serde(default)]
    pub points: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct DevAddResponse {
    pub ok: bool,
    pub row: LeaderboardEntry,
}

#[instrument(skip(state))]
pub async fn dev_add(
    Query(param): Query<DevAddQuery>,
    State(state): State<Arc<AppState>>,
) -> JsonResult<DevAddResponse> {
    let user = param
        .user
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| RouteError::BadRequest(String::from("Missing user")))?;

    let row: ScoreRow = state
        .campaign
        .dev_add(
            user,
            param.tweets.unwrap_or_default(),
            param.points.unwrap_or_default(),
            Utc::now(),
        )
        .await?;

    Ok(Json(DevAddResponse {
        ok: true,
        row: row.into(),
    }))
}

#[derive(Debug, Serialize)]
pub struct MigrateResponse {
    pub ok: bool,
    pub added: Vec<&'static str>,
}

#[instrument(skip(state))]
pub async fn migrate(State(state): State<Arc<AppState>>) -> JsonResult<MigrateResponse> {
    let added = state.campaign.migrate().await?;
    Ok(Json(MigrateResponse { ok: true, added }))
}

#[cfg(test)]
mod test {
    use crate::api::server::router;
    use crate::api::server::test::{body_json, test_state};
    use axum::body::Body;
    use http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_refresh_then_cooldown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2/tweets/search/recent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": "1", "author_id": "u1" }],
                "includes": { "users": [{ "id": "u1", "username": "alice" }] }
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(Some(&server.uri()), dir.path()).await, "*");

        let res = app.clone().oneshot(get("/api/campaign/refresh")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await, json!({ "ok": true, "added": 1 }));

        let res = app.clone().oneshot(get("/api/campaign/refresh")).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(res).await;
        assert_eq!(body["error"], "cooldown");
        assert!(body["retry_after"].as_i64().unwrap() > 0);

        let res = app
            .oneshot(get("/api/campaign/leaderboard?limit=0&offset=-3"))
            .await
            .unwrap();
        let body = body_json(res).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["rows"], json!([{ "user": "alice", "tweets": 1, "points": 2.0 }]));
        assert!(body["lastUpdate"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_rate_limited_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(Some(&server.uri()), dir.path()).await, "*");

        let res = app.oneshot(get("/api/campaign/refresh")).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body_json(res).await, json!({ "error": "rate_limited" }));
    }

    #[tokio::test]
    async fn test_preview() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": "5", "author_id": "u1", "text": "gm", "referenced_tweets": [{ "type": "quoted", "id": "1" }] }],
                "includes": { "users": [{ "id": "u1", "username": "alice" }] }
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(Some(&server.uri()), dir.path()).await, "*");

        let body = body_json(app.oneshot(get("/api/campaign/test")).await.unwrap()).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["count"], 1);
        assert_eq!(body["tweets"][0]["kind"], "QUOTE");
        assert_eq!(body["tweets"][0]["user"], "alice");
    }

    #[cfg(not(feature = "production"))]
    #[tokio::test]
    async fn test_dev_add_and_migrate() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(None, dir.path()).await, "*");

        let res = app.clone().oneshot(get("/api/campaign/dev-add")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = app
            .clone()
            .oneshot(get("/api/campaign/dev-add?user=neo&tweets=2&points=3.5"))
            .await
            .unwrap();
        assert_eq!(
            body_json(res).await,
            json!({ "ok": true, "row": { "user": "neo", "tweets": 2, "points": 3.5 } })
        );

        let res = app.oneshot(get("/api/campaign/migrate")).await.unwrap();
        assert_eq!(body_json(res).await, json!({ "ok": true, "added": [] }));
    }

    #[cfg(feature = "production")]
    #[tokio::test]
    async fn test_dev_add_is_forbidden() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(None, dir.path()).await, "*");

        let res = app.oneshot(get("/api/campaign/dev-add?user=neo")).await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(res).await, json!({ "error": "Disabled in production" }));
    }
}
