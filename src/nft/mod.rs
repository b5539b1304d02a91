pub mod asset;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::nft::asset::{DasAsset, MetaAttribute, non_empty};
use crate::util::helius::{Helius, HeliusResult};

/// Collection / creator allow-list applied to a wallet's assets.
#[derive(Debug, Clone, Default)]
pub struct HolderFilter {
    collection_id: Option<String>,
    creators: Vec<String>,
}

impl HolderFilter {
    pub fn new(collection_id: Option<&str>, creators: &[String]) -> Self {
        Self {
            collection_id: collection_id
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_owned),
            creators: creators
                .iter()
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.collection_id.is_some() || !self.creators.is_empty()
    }

    fn in_collection(&self, asset: &DasAsset) -> bool {
        let Some(collection_id) = self.collection_id.as_deref() else {
            return false;
        };

        asset
            .grouping
            .iter()
            .any(|g| g.group_key == "collection" && g.group_value.trim() == collection_id)
    }

    fn by_creator(&self, asset: &DasAsset) -> bool {
        !self.creators.is_empty()
            && asset
                .creators
                .iter()
                .any(|c| self.creators.contains(&c.address.trim().to_lowercase()))
    }

    /// Listing rule: everything passes when no filter is configured, otherwise an asset must be
    /// in the collection or carry an allowed creator.
    pub fn allows(&self, asset: &DasAsset) -> bool {
        !self.is_active() || self.in_collection(asset) || self.by_creator(asset)
    }

    /// Holder rule: the collection decides when one is configured, the creator list only applies
    /// without one, and an unconfigured filter verifies nobody.
    pub fn verifies(&self, asset: &DasAsset) -> bool {
        match self.collection_id {
            Some(_) => self.in_collection(asset),
            None => self.by_creator(asset),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedNft {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderItem {
    pub mint: String,
    pub name: String,
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub items: Vec<HolderItem>,
    pub verified: bool,
}

/// Metadata for a single mint, as consumed by the compositor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintMetadata {
    pub id: String,
    pub name: String,
    pub image: String,
    pub attributes: Vec<MetaAttribute>,
}

pub fn normalize_and_filter(assets: &[DasAsset], filter: &HolderFilter) -> Vec<OwnedNft> {
    let kept: Vec<OwnedNft> = assets
        .iter()
        .filter(|a| filter.allows(a))
        .map(|a| OwnedNft {
            id: a.id.clone(),
            name: a.display_name().unwrap_or_default().to_owned(),
            image: a.image_url().map(str::to_owned),
            uri: a.json_uri().map(str::to_owned),
        })
        .collect();

    tracing::debug!(input = assets.len(), kept = kept.len(), "filtered owner assets");
    kept
}

pub fn holder_items(assets: &[DasAsset], filter: &HolderFilter) -> Vec<HolderItem> {
    assets
        .iter()
        .filter(|a| filter.verifies(a))
        .filter_map(|a| {
            Some(HolderItem {
                mint: a.id.clone(),
                name: a.display_name().unwrap_or("NFT").to_owned(),
                image: a.image_url()?.to_owned(),
            })
        })
        .collect()
}

#[instrument(skip(helius, filter))]
pub async fn list_owned(
    helius: &Helius,
    filter: &HolderFilter,
    owner: &str,
) -> HeliusResult<Vec<OwnedNft>> {
    let assets = helius.assets_by_owner(owner).await?;
    Ok(normalize_and_filter(&assets, filter))
}

#[instrument(skip(helius, filter))]
pub async fn verify_holder(
    helius: &Helius,
    filter: &HolderFilter,
    owner: &str,
) -> HeliusResult<Verification> {
    let assets = helius.rest_assets(owner).await?;
    let items = holder_items(&assets, filter);

    Ok(Verification {
        verified: !items.is_empty(),
        items,
    })
}

#[instrument(skip(helius))]
pub async fn metadata_by_mint(helius: &Helius, mint: &str, uri: &str) -> HeliusResult<MintMetadata> {
    let meta = helius.metadata(uri).await?;
    let mint = Some(mint.to_owned()).filter(|m| !m.is_empty());

    Ok(MintMetadata {
        id: mint
            .clone()
            .or_else(|| non_empty(meta.name.as_ref()).map(str::to_owned))
            .unwrap_or_default(),
        name: non_empty(meta.name.as_ref())
            .map(str::to_owned)
            .or(mint)
            .unwrap_or_default(),
        image: meta.image.clone().unwrap_or_default(),
        attributes: meta.attribute_list(),
    })
}
