use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::server::{AppState, JsonResult, RouteError};
use crate::compose::presets::{ExportPreset, PRESETS, preview_size};
use crate::constants::{PROXY_CACHE_CONTROL, SITEMAP_PAGES};
use crate::nft::{self, MintMetadata, OwnedNft, Verification};

#[derive(Debug, Deserialize)]
pub struct OwnerBody {
    #[serde(default)]
    pub owner: Option<String>,
}

impl OwnerBody {
    fn owner(&self) -> Option<&str> {
        self.owner.as_deref().map(str::trim).filter(|o| !o.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct NftsResponse {
    pub nfts: Vec<OwnedNft>,
}

#[instrument(skip(state))]
pub async fn nfts(
    State(state): State<Arc<AppState>>,
    Json(body): Json<OwnerBody>,
) -> JsonResult<NftsResponse> {
    let owner = body
        .owner()
        .ok_or_else(|| RouteError::BadRequest(String::from("Missing owner")))?;

    let nfts = nft::list_owned(&state.helius, &state.holders, owner).await?;
    Ok(Json(NftsResponse { nfts }))
}

#[instrument(skip(state))]
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Json(body): Json<OwnerBody>,
) -> JsonResult<Verification> {
    let owner = body
        .owner()
        .ok_or_else(|| RouteError::BadRequest(String::from("missing owner")))?;

    Ok(Json(
        nft::verify_holder(&state.helius, &state.holders, owner).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct MintQuery {
    #[serde(default)]
    pub mint: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

#[instrument(skip(state))]
pub async fn nft_by_mint(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MintQuery>,
) -> JsonResult<MintMetadata> {
    let uri = query
        .uri
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            RouteError::BadRequest(String::from(
                "Missing metadata URI. Pass ?uri=<metadata-json-url>.",
            ))
        })?;

    let mint = query.mint.as_deref().map(str::trim).unwrap_or_default();
    Ok(Json(nft::metadata_by_mint(&state.helius, mint, uri).await?))
}

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    #[serde(default)]
    pub u: Option<String>,
}

/// Same-origin passthrough for remote NFT art.
#[instrument(skip(state))]
pub async fn image_proxy(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProxyQuery>,
) -> Result<Response, RouteError> {
    let url = query
        .u
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or(RouteError::MissingProxyUrl)?;

    let img = state.fetcher.fetch(url).await?;
    let content_type = img.content_type.unwrap_or_else(|| String::from("image/png"));

    Ok((
        [
            (CONTENT_TYPE, content_type),
            (CACHE_CONTROL, String::from(PROXY_CACHE_CONTROL)),
            (ACCESS_CONTROL_ALLOW_ORIGIN, String::from("*")),
        ],
        img.bytes,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
pub struct PresetsResponse {
    pub presets: &'static [ExportPreset],
    pub preview: ExportPreset,
}

pub async fn presets() -> Json<PresetsResponse> {
    let (w, h) = preview_size();
    Json(PresetsResponse {
        presets: PRESETS,
        preview: ExportPreset {
            id: "preview",
            label: "Preview",
            w,
            h,
        },
    })
}

#[instrument(skip(state))]
pub async fn robots(State(state): State<Arc<AppState>>) -> String {
    let site = &state.site_url;
    format!("User-Agent: *\nAllow: /\n\nHost: {site}\nSitemap: {site}/sitemap.xml\n")
}

#[instrument(skip(state))]
pub async fn sitemap(State(state): State<Arc<AppState>>) -> Response {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for (path, freq, priority) in SITEMAP_PAGES {
        xml.push_str(&format!(
            "<url>\n<loc>{}{path}</loc>\n<lastmod>{now}</lastmod>\n<changefreq>{freq}</changefreq>\n<priority>{priority}</priority>\n</url>\n",
            state.site_url
        ));
    }
    xml.push_str("</urlset>\n");

    ([(CONTENT_TYPE, "application/xml")], xml).into_response()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::server::router;
    use crate::api::server::test::{body_json, test_state};
    use axum::body::{Body, to_bytes};
    use http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_root_and_site_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(None, dir.path()).await, "*");

        let res = app.clone().oneshot(get("/")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = app.clone().oneshot(get("/robots.txt")).await.unwrap();
        let text = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert!(std::str::from_utf8(&text)
            .unwrap()
            .contains("Sitemap: https://retrograve.tv/sitemap.xml"));

        let res = app.oneshot(get("/sitemap.xml")).await.unwrap();
        assert_eq!(res.headers()[CONTENT_TYPE], "application/xml");
        let xml = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert!(std::str::from_utf8(&xml)
            .unwrap()
            .contains("<loc>https://retrograve.tv/locker</loc>"));
    }

    #[tokio::test]
    async fn test_nfts_requires_owner() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(None, dir.path()).await, "*");

        let res = app.oneshot(post_json("/api/nfts", json!({ "owner": " " }))).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await, json!({ "error": "Missing owner" }));
    }

    #[tokio::test]
    async fn test_nfts_and_verify() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": { "items": [
                    { "id": "m1", "content": { "metadata": { "name": "Grave #1" }, "links": { "image": "https://img/1.png" } } }
                ]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v0/addresses/Owner1/nfts"))
            .and(query_param("api-key", "key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "mint": "m1", "name": "Grave #1", "image": "https://img/1.png" }
            ])))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(Some(&server.uri()), dir.path()).await, "*");

        let res = app
            .clone()
            .oneshot(post_json("/api/nfts", json!({ "owner": "Owner1" })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            body_json(res).await,
            json!({ "nfts": [{ "id": "m1", "name": "Grave #1", "image": "https://img/1.png", "uri": null }] })
        );

        // no collection or creator configured, so nobody verifies
        let res = app
            .oneshot(post_json("/api/verify", json!({ "owner": "Owner1" })))
            .await
            .unwrap();
        assert_eq!(body_json(res).await, json!({ "items": [], "verified": false }));
    }

    #[tokio::test]
    async fn test_nft_by_mint_needs_uri() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(None, dir.path()).await, "*");

        let res = app.oneshot(get("/api/nft-by-mint?mint=abc")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_nft_by_mint_upstream_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(Some(&server.uri()), dir.path()).await, "*");

        let uri = format!("/api/nft-by-mint?mint=abc&uri={}/meta.json", server.uri());
        let res = app.oneshot(get(&uri)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_image_proxy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.gif"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/gif")
                    .set_body_bytes(b"GIF89a".to_vec()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone.png"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(None, dir.path()).await, "*");

        let res = app
            .clone()
            .oneshot(get(&format!("/api/img?u={}/a.gif", server.uri())))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[CONTENT_TYPE], "image/gif");
        assert_eq!(res.headers()[CACHE_CONTROL], PROXY_CACHE_CONTROL);
        assert_eq!(res.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"GIF89a");

        let res = app
            .clone()
            .oneshot(get(&format!("/api/img?u={}/gone.png", server.uri())))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::GONE);

        let res = app.clone().oneshot(get("/api/img")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Missing ?u");

        let res = app.oneshot(get("/api/img?u=ftp://host/x.png")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_presets() {
        let body = serde_json::to_value(presets().await.0).unwrap();
        assert_eq!(body["presets"][0], json!({ "id": "master", "label": "Master 1440 × 3200", "width": 1440, "height": 3200 }));
        assert_eq!(body["preview"]["width"], 835);
        assert_eq!(body["preview"]["height"], 1856);
    }
}
