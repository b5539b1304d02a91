use http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::instrument;

use crate::constants::{DAS_MAX_PAGES, DAS_REQUEST_ID, HELIUS_RPC_URL};
use crate::nft::asset::{DasAsset, MetadataJson};
use crate::util::env::Env;

/// Client for the Helius DAS (JSON-RPC) and REST endpoints used to list a wallet's holdings.
#[derive(Debug, Clone)]
pub struct Helius {
    client: reqwest::Client,
    rpc_url: Option<String>,
    rest_url: String,
    api_key: Option<String>,
    page_limit: usize,
}

#[derive(Debug, Deserialize)]
struct DasEnvelope {
    #[serde(default)]
    result: Option<DasResultPage>,
}

#[derive(Debug, Deserialize)]
struct DasResultPage {
    #[serde(default)]
    items: Vec<DasAsset>,
}

/// Result of a single page request: either the items, or the status that ended the walk.
enum Page {
    Items(Vec<DasAsset>),
    Failed(StatusCode),
}

impl Helius {
    pub fn new(
        client: reqwest::Client,
        rpc_url: Option<String>,
        rest_url: &str,
        api_key: Option<String>,
        page_limit: usize,
    ) -> Self {
        Self {
            client,
            rpc_url,
            rest_url: rest_url.trim_end_matches('/').to_owned(),
            api_key,
            page_limit: page_limit.max(1),
        }
    }

    pub fn from_env(client: reqwest::Client, env: &Env) -> Self {
        Self::new(
            client,
            resolve_rpc(env.solana_rpc.as_deref(), env.helius_api_key.as_deref()),
            &env.helius_rest_url,
            env.helius_api_key.clone(),
            crate::constants::DAS_PAGE_LIMIT,
        )
    }

    pub fn has_rest(&self) -> bool {
        self.api_key.is_some()
    }

    /// Lists every asset owned by `owner`, walking DAS pages first and falling back to the REST
    /// listing when the RPC path produced nothing.
    #[instrument(skip(self))]
    pub async fn assets_by_owner(&self, owner: &str) -> HeliusResult<Vec<DasAsset>> {
        if self.rpc_url.is_none() && self.api_key.is_none() {
            return Err(HeliusErr::NotConfigured);
        }

        let mut assets = Vec::new();
        let mut last_status = StatusCode::OK;

        if let Some(endpoint) = self.rpc_url.as_deref() {
            last_status = self
                .walk_pages(&mut assets, |page| self.das_page(endpoint, owner, page))
                .await?;
        }

        if assets.is_empty() && self.has_rest() {
            last_status = self
                .walk_pages(&mut assets, |page| self.rest_page(owner, page))
                .await?;
        }

        if assets.is_empty() && self.rpc_url.is_some() && last_status == StatusCode::UNAUTHORIZED
        {
            return Err(HeliusErr::InvalidApiKey);
        }

        tracing::debug!(count = assets.len(), "listed owner assets");
        Ok(assets)
    }

    /// Lists assets through the REST endpoint only. A listing that fails before yielding anything
    /// is an error rather than an empty wallet.
    #[instrument(skip(self))]
    pub async fn rest_assets(&self, owner: &str) -> HeliusResult<Vec<DasAsset>> {
        if !self.has_rest() {
            return Err(HeliusErr::NotConfigured);
        }

        let mut assets = Vec::new();
        let status = self
            .walk_pages(&mut assets, |page| self.rest_page(owner, page))
            .await?;

        if assets.is_empty() && !status.is_success() {
            return Err(HeliusErr::Status(status));
        }

        Ok(assets)
    }

    /// Pulls pages starting at 1 until a short page, an empty page or an error status, and
    /// returns the status of the last request made.
    async fn walk_pages<F, Fut>(&self, out: &mut Vec<DasAsset>, fetch: F) -> HeliusResult<StatusCode>
    where
        F: Fn(u32) -> Fut,
        Fut: Future<Output = HeliusResult<Page>>,
    {
        for page in 1..DAS_MAX_PAGES {
            match fetch(page).await? {
                Page::Failed(status) => return Ok(status),
                Page::Items(items) => {
                    let len = items.len();
                    out.extend(items);
                    if len < self.page_limit {
                        return Ok(StatusCode::OK);
                    }
                }
            }
        }

        Ok(StatusCode::OK)
    }

    #[instrument(skip(self, endpoint))]
    async fn das_page(&self, endpoint: &str, owner: &str, page: u32) -> HeliusResult<Page> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": DAS_REQUEST_ID,
            "method": "getAssetsByOwner",
            "params": { "ownerAddress": owner, "page": page, "limit": self.page_limit },
        });

        let res = self.client.post(endpoint).json(&body).send().await?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            tracing::error!(page, code = %status, body = %text, "das rpc page error");
            return Ok(Page::Failed(status));
        }

        let envelope: DasEnvelope = serde_json::from_slice(&res.bytes().await?)?;
        Ok(Page::Items(
            envelope.result.map(|r| r.items).unwrap_or_default(),
        ))
    }

    #[instrument(skip(self))]
    async fn rest_page(&self, owner: &str, page: u32) -> HeliusResult<Page> {
        let api_key = self.api_key.as_deref().ok_or(HeliusErr::NotConfigured)?;
        let uri = format!("{}/v0/addresses/{owner}/nfts", self.rest_url);
        let page_number = page.to_string();
        let page_size = self.page_limit.to_string();

        let res = self
            .client
            .get(uri)
            .query(&[
                ("api-key", api_key),
                ("pageNumber", page_number.as_str()),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            tracing::error!(page, code = %status, body = %text, "rest page error");
            return Ok(Page::Failed(status));
        }

        // some listings come back wrapped as `{ "nfts": [...] }`
        let json: Value = serde_json::from_slice(&res.bytes().await?)?;
        let items = match &json {
            Value::Array(items) => items.as_slice(),
            Value::Object(map) => map
                .get("nfts")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default(),
            _ => &[],
        };

        Ok(Page::Items(items.iter().map(DasAsset::from_rest).collect()))
    }

    /// Fetches an off-chain metadata document.
    #[instrument(skip(self))]
    pub async fn metadata(&self, uri: &str) -> HeliusResult<MetadataJson> {
        let res = self.client.get(uri).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(HeliusErr::Status(status));
        }

        Ok(serde_json::from_slice(&res.bytes().await?)?)
    }
}

/// The RPC endpoint to use: an explicit url wins, otherwise the mainnet endpoint keyed by the API
/// key, otherwise none.
pub fn resolve_rpc(solana_rpc: Option<&str>, api_key: Option<&str>) -> Option<String> {
    if let Some(full) = solana_rpc.map(str::trim).filter(|s| !s.is_empty()) {
        return Some(full.to_owned());
    }

    api_key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(|k| format!("{HELIUS_RPC_URL}/?api-key={k}"))
}

pub type HeliusResult<T> = core::result::Result<T, HeliusErr>;

#[derive(Debug, Error)]
pub enum HeliusErr {
    #[error("RPC not configured. Set SOLANA_RPC or HELIUS_API_KEY.")]
    NotConfigured,

    #[error("Invalid Helius API key")]
    InvalidApiKey,

    #[error("upstream responded with {}", .0.as_u16())]
    Status(StatusCode),

    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),

    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),
}
