use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, MatchedPath, Request};
use axum::middleware::{Next, from_fn};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde_json::json;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::api::campaign as campaign_routes;
use crate::api::compose::compose;
use crate::api::handler::*;
use crate::api::middleware::cors_layer;
use crate::api::middleware::dev_only::dev_only;
use crate::campaign::{Campaign, CampaignErr};
use crate::compose::{ComposeError, Compositor};
use crate::constants::MAX_UPLOAD_BYTES;
use crate::db::prelude::DbError;
use crate::nft::HolderFilter;
use crate::util::env::Env;
use crate::util::helius::{Helius, HeliusErr};
use crate::util::upstream::{FetchErr, ImageFetcher, http_client};
use crate::util::x::XApiErr;

pub type JsonResult<T> = core::result::Result<Json<T>, RouteError>;

#[derive(Clone, Debug)]
pub struct AppState {
    pub campaign: Campaign,
    pub helius: Helius,
    pub holders: HolderFilter,
    pub fetcher: ImageFetcher,
    pub compositor: Compositor,
    pub site_url: String,
}

impl AppState {
    pub fn from_env(db_pool: SqlitePool, env: &Env) -> reqwest::Result<Self> {
        let client = http_client(Duration::from_secs(env.upstream_timeout_secs.max(1)))?;
        let fetcher = ImageFetcher::new(client.clone());

        Ok(Self {
            campaign: Campaign::from_env(db_pool, client.clone(), env),
            helius: Helius::from_env(client, env),
            holders: HolderFilter::new(env.collection_id.as_deref(), &env.creator_allowlist),
            compositor: Compositor::new(env.layers_dir.clone(), fetcher.clone()),
            fetcher,
            site_url: env.site_url.trim_end_matches('/').to_owned(),
        })
    }
}

pub fn router(state: Arc<AppState>, allow_origins: &str) -> Router {
    let campaign = Router::new()
        .route("/refresh", get(campaign_routes::refresh))
        .route("/leaderboard", get(campaign_routes::leaderboard))
        .route("/test", get(campaign_routes::preview))
        .route("/migrate", get(campaign_routes::migrate))
        .merge(
            Router::new()
                .route("/dev-add", get(campaign_routes::dev_add))
                .route_layer(from_fn(dev_only)),
        );

    Router::new()
        //
        // general
        .route("/", get(|| async { Response::new(Body::empty()) }))
        .route("/robots.txt", get(robots))
        .route("/sitemap.xml", get(sitemap))
        //
        // wallet holdings
        .route("/api/nfts", post(nfts))
        .route("/api/verify", post(verify))
        .route("/api/nft-by-mint", get(nft_by_mint))
        //
        // wallpapers
        .route("/api/img", get(image_proxy))
        .route("/api/presets", get(presets))
        .route(
            "/api/compose",
            post(compose).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        //
        // engagement campaign
        .nest("/api/campaign", campaign)
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method();
                let uri = req.uri();

                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|matched| matched.as_str());

                tracing::debug_span!("api_request", ?method, ?uri, ?matched_path)
            }),
        )
        .layer(cors_layer(allow_origins))
        .layer(from_fn(log_route_errors))
        .with_state(state)
}

/// Logs the server-side failures `RouteError` leaves in the response extensions.
#[instrument(skip(request, next), fields(uri = request.uri().to_string()))]
async fn log_route_errors(request: Request, next: Next) -> Response {
    let res = next.run(request).await;
    if let Some(err) = res.extensions().get::<Arc<RouteError>>() {
        tracing::error!(error = ?err, status = %res.status(), "error occurred inside route handler");
    }

    res
}

#[instrument(skip(state, allow_origins))]
pub async fn start_server(
    state: Arc<AppState>,
    port: u16,
    allow_origins: &str,
) -> Result<Vec<JoinHandle<()>>, RouteError> {
    tracing::info!("starting server");
    let app = router(state, allow_origins);

    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), port);
    let listener = tokio::net::TcpListener::bind(socket_addr).await?;

    let server_handle = tokio::task::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = ?e, "server exited");
        }
    });

    tracing::info!(
        server_url = &format!("http://127.0.0.1:{}", socket_addr.port()),
        "server ready"
    );

    Ok(vec![server_handle])
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Campaign(#[from] CampaignErr),

    #[error(transparent)]
    Helius(#[from] HeliusErr),

    #[error(transparent)]
    Proxy(#[from] FetchErr),

    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Missing ?u")]
    MissingProxyUrl,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(&'static str),
}

/// How an error is rendered: most routes answer `{ "error": .. }`, the image proxy answers with
/// plain text.
enum ErrorBody {
    Json(serde_json::Value),
    Text(String),
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let msg = self.to_string();

        let (status, body, log) = match &self {
            RouteError::Campaign(CampaignErr::Cooldown { retry_after }) => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorBody::Json(json!({ "error": "cooldown", "retry_after": retry_after })),
                false,
            ),
            RouteError::Campaign(CampaignErr::Upstream(x_err)) => match x_err {
                XApiErr::RateLimited => (StatusCode::TOO_MANY_REQUESTS, ErrorBody::Json(json!({ "error": msg })), false),
                XApiErr::MissingToken => (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::Json(json!({ "error": msg })), true),
                XApiErr::Status(_) | XApiErr::Decode(_) | XApiErr::ReqwestError(_) => {
                    (StatusCode::BAD_GATEWAY, ErrorBody::Json(json!({ "error": msg })), true)
                }
            },
            RouteError::Campaign(CampaignErr::Db(_)) | RouteError::Db(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::Json(json!({ "error": msg })),
                true,
            ),

            RouteError::Helius(helius_err) => {
                let status = match helius_err {
                    HeliusErr::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
                    HeliusErr::InvalidApiKey => StatusCode::UNAUTHORIZED,
                    HeliusErr::Status(_) | HeliusErr::SerdeError(_) => StatusCode::BAD_GATEWAY,
                    HeliusErr::ReqwestError(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, ErrorBody::Json(json!({ "error": msg })), true)
            }

            RouteError::Proxy(fetch_err) => match fetch_err {
                FetchErr::UnsupportedScheme(_) => (StatusCode::BAD_REQUEST, ErrorBody::Text(msg), false),
                // the upstream status is passed through as-is
                FetchErr::Status(code) => (*code, ErrorBody::Text(msg), false),
                FetchErr::TooLarge(_) => (StatusCode::BAD_GATEWAY, ErrorBody::Text(msg), false),
                FetchErr::ReqwestError(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::Text(String::from("Proxy fetch failed")),
                    true,
                ),
            },
            RouteError::MissingProxyUrl => (StatusCode::BAD_REQUEST, ErrorBody::Text(msg), false),

            RouteError::Compose(compose_err) => {
                let (status, log) = match compose_err {
                    ComposeError::UnknownPreset(_)
                    | ComposeError::BadSize { .. }
                    | ComposeError::BadColor(_)
                    | ComposeError::BadBackground(_) => (StatusCode::BAD_REQUEST, false),
                    ComposeError::Fetch(_) | ComposeError::BadArt(_) => (StatusCode::BAD_GATEWAY, true),
                    ComposeError::Encode(_) | ComposeError::Join(_) => (StatusCode::INTERNAL_SERVER_ERROR, true),
                };
                (status, ErrorBody::Json(json!({ "error": msg })), log)
            }

            RouteError::Multipart(_) | RouteError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, ErrorBody::Json(json!({ "error": msg })), false)
            }
            RouteError::Forbidden(_) => (StatusCode::FORBIDDEN, ErrorBody::Json(json!({ "error": msg })), false),
            RouteError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::Json(json!({ "error": msg })),
                true,
            ),
        };

        let mut response = match body {
            ErrorBody::Json(value) => (status, Json(value)).into_response(),
            ErrorBody::Text(text) => (status, text).into_response(),
        };

        if log {
            response.extensions_mut().insert(Arc::new(self));
        }

        response
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::db::test_pool;
    use crate::util::env::from_iter;
    use axum::body::to_bytes;

    /// State over an in-memory database; upstream urls point at `upstream` when given.
    pub(crate) async fn test_state(upstream: Option<&str>, layers_dir: &std::path::Path) -> Arc<AppState> {
        let base = upstream.unwrap_or("http://127.0.0.1:9").to_owned();
        let env: Env = from_iter([
            ("X_API_URL".to_string(), base.clone()),
            ("X_BEARER_TOKEN".to_string(), "token".to_string()),
            ("HELIUS_REST_URL".to_string(), base.clone()),
            ("HELIUS_API_KEY".to_string(), "key".to_string()),
            ("SOLANA_RPC".to_string(), format!("{base}/rpc")),
            ("LAYERS_DIR".to_string(), layers_dir.display().to_string()),
        ])
        .unwrap();

        Arc::new(AppState::from_env(test_pool().await, &env).unwrap())
    }

    pub(crate) async fn body_json(res: Response) -> serde_json::Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_cooldown_response() {
        let res = RouteError::from(CampaignErr::Cooldown { retry_after: 42 }).into_response();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(res.extensions().get::<Arc<RouteError>>().is_none());
        assert_eq!(
            body_json(res).await,
            json!({ "error": "cooldown", "retry_after": 42 })
        );
    }

    #[tokio::test]
    async fn test_server_errors_are_marked_for_logging() {
        let res = RouteError::from(CampaignErr::Upstream(XApiErr::MissingToken)).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res.extensions().get::<Arc<RouteError>>().is_some());
        assert_eq!(body_json(res).await, json!({ "error": "Missing X_BEARER_TOKEN" }));
    }

    #[tokio::test]
    async fn test_proxy_errors_are_text() {
        let res = RouteError::from(FetchErr::Status(StatusCode::NOT_FOUND)).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"Upstream error 404");

        let res = RouteError::from(FetchErr::TooLarge(16)).into_response();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"Upstream image exceeds 16 bytes");
    }
}
