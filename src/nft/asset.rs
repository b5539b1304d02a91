use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The subset of a DAS `getAssetsByOwner` item this server reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DasAsset {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub grouping: Vec<Grouping>,
    #[serde(default)]
    pub creators: Vec<Creator>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub links: Option<Links>,
    #[serde(default)]
    pub files: Vec<AssetFile>,
    #[serde(default)]
    pub json_uri: Option<String>,
    #[serde(default)]
    pub metadata: Option<ContentMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetFile {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub mime: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Grouping {
    #[serde(default)]
    pub group_key: String,
    #[serde(default)]
    pub group_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Creator {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub verified: bool,
}

/// Treats empty strings the same as a missing value.
pub(crate) fn non_empty(s: Option<&String>) -> Option<&str> {
    s.map(String::as_str).filter(|s| !s.is_empty())
}

impl DasAsset {
    /// Display image: explicit image link, then the first attached file, then the metadata uri.
    pub fn image_url(&self) -> Option<&str> {
        let content = self.content.as_ref()?;
        non_empty(content.links.as_ref().and_then(|l| l.image.as_ref()))
            .or_else(|| non_empty(content.files.first().and_then(|f| f.uri.as_ref())))
            .or_else(|| non_empty(content.json_uri.as_ref()))
    }

    pub fn display_name(&self) -> Option<&str> {
        non_empty(self.name.as_ref()).or_else(|| {
            non_empty(
                self.content
                    .as_ref()
                    .and_then(|c| c.metadata.as_ref())
                    .and_then(|m| m.name.as_ref()),
            )
        })
    }

    pub fn json_uri(&self) -> Option<&str> {
        non_empty(self.content.as_ref().and_then(|c| c.json_uri.as_ref()))
    }

    /// Builds a DAS-shaped asset from a Helius REST (`/v0/addresses/{owner}/nfts`) item, whose
    /// layout differs between on-chain, off-chain and legacy variants.
    pub fn from_rest(item: &Value) -> Self {
        let image = first_str(
            item,
            &[
                "/offChainData/image",
                "/image",
                "/offChainMetadata/image",
                "/onChainMetadata/metadata/data/image",
            ],
        );

        let name = first_str(
            item,
            &[
                "/offChainData/name",
                "/name",
                "/onChainMetadata/metadata/data/name",
            ],
        );

        let creators = item
            .get("creators")
            .and_then(Value::as_array)
            .or_else(|| {
                item.pointer("/onChainMetadata/metadata/data/creators")
                    .and_then(Value::as_array)
            })
            .map(|list| {
                list.iter()
                    .filter_map(|c| {
                        let address = first_str(c, &["/address", "/creator"])?;
                        Some(Creator {
                            address,
                            verified: c.get("verified").and_then(Value::as_bool).unwrap_or(false),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let collection = first_str(
            item,
            &[
                "/collection/address",
                "/collection/key",
                "/onChainMetadata/collection/address",
                "/onChainMetadata/metadata/collection/key",
            ],
        );

        let files = item
            .get("files")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .map(|f| AssetFile {
                        uri: first_str(f, &["/uri", "/cdn_uri"]),
                        mime: first_str(f, &["/type"]),
                    })
                    .collect()
            })
            .unwrap_or_default();

        DasAsset {
            id: first_str(item, &["/mint", "/id"]).unwrap_or_default(),
            name: name.clone(),
            content: Some(Content {
                links: Some(Links { image }),
                files,
                json_uri: first_str(item, &["/offChainUrl", "/metadataUrl"]),
                metadata: Some(ContentMetadata { name, symbol: None }),
            }),
            grouping: collection
                .map(|c| {
                    vec![Grouping {
                        group_key: String::from("collection"),
                        group_value: c,
                    }]
                })
                .unwrap_or_default(),
            creators,
        }
    }
}

/// First non-empty string (or number, stringified) found at any of the JSON pointers.
fn first_str(v: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|p| match v.pointer(p)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// A `{ trait_type, value }` pair from Metaplex-style metadata; values show up as strings,
/// numbers or null depending on the minting tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaAttribute {
    #[serde(default)]
    pub trait_type: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
}

impl MetaAttribute {
    pub fn new(trait_type: &str, value: &str) -> Self {
        Self {
            trait_type: Some(trait_type.to_owned()),
            value: Some(Value::String(value.to_owned())),
        }
    }

    pub fn trait_name(&self) -> &str {
        self.trait_type.as_deref().map(str::trim).unwrap_or_default()
    }

    /// The value as trimmed text, `None` when it is null, empty or not a scalar.
    pub fn value_text(&self) -> Option<String> {
        let text = match self.value.as_ref()? {
            Value::String(s) => s.trim().to_owned(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };

        (!text.is_empty()).then_some(text)
    }
}

/// Off-chain metadata document referenced by an asset's `json_uri`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataJson {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub attributes: Option<Value>,
}

impl MetadataJson {
    /// Attributes when they are a well-formed array; anything else yields an empty list.
    pub fn attribute_list(&self) -> Vec<MetaAttribute> {
        match &self.attributes {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|a| serde_json::from_value(a.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_image_url_precedence() {
        let asset: DasAsset = serde_json::from_value(json!({
            "id": "a",
            "content": {
                "links": { "image": "" },
                "files": [{ "uri": "https://cdn/file.png", "mime": "image/png" }],
                "json_uri": "https://meta/a.json"
            }
        }))
        .unwrap();
        assert_eq!(asset.image_url(), Some("https://cdn/file.png"));

        let only_uri: DasAsset = serde_json::from_value(json!({
            "id": "b",
            "content": { "json_uri": "https://meta/b.json" }
        }))
        .unwrap();
        assert_eq!(only_uri.image_url(), Some("https://meta/b.json"));

        assert_eq!(DasAsset::default().image_url(), None);
    }

    #[test]
    fn test_display_name_falls_back_to_metadata() {
        let asset: DasAsset = serde_json::from_value(json!({
            "id": "a",
            "content": { "metadata": { "name": "RetroGrave #12" } }
        }))
        .unwrap();
        assert_eq!(asset.display_name(), Some("RetroGrave #12"));
    }

    #[test]
    fn test_from_rest_adapts_nested_layouts() {
        let item = json!({
            "mint": "Mint111",
            "onChainMetadata": {
                "metadata": {
                    "data": {
                        "name": "Grave #7",
                        "image": "https://img/7.png",
                        "creators": [{ "address": "Creator1", "verified": true }]
                    },
                    "collection": { "key": "Coll1" }
                }
            },
            "offChainUrl": "https://meta/7.json",
            "files": [{ "cdn_uri": "https://cdn/7.png", "type": "image/png" }]
        });

        let asset = DasAsset::from_rest(&item);
        assert_eq!(asset.id, "Mint111");
        assert_eq!(asset.display_name(), Some("Grave #7"));
        assert_eq!(asset.image_url(), Some("https://img/7.png"));
        assert_eq!(asset.json_uri(), Some("https://meta/7.json"));
        assert_eq!(asset.grouping[0].group_value, "Coll1");
        assert_eq!(asset.creators[0].address, "Creator1");
        assert!(asset.creators[0].verified);
        assert_eq!(
            asset.content.unwrap().files[0].uri.as_deref(),
            Some("https://cdn/7.png")
        );
    }

    #[test]
    fn test_attribute_values() {
        let attrs = MetadataJson {
            attributes: Some(json!([
                { "trait_type": " Head ", "value": " Red Cap " },
                { "trait_type": "Level", "value": 3 },
                { "trait_type": "Glasses", "value": null },
                "garbage"
            ])),
            ..Default::default()
        }
        .attribute_list();

        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs[0].trait_name(), "Head");
        assert_eq!(attrs[0].value_text().as_deref(), Some("Red Cap"));
        assert_eq!(attrs[1].value_text().as_deref(), Some("3"));
        assert_eq!(attrs[2].value_text(), None);

        let not_array = MetadataJson {
            attributes: Some(json!({ "Head": "cap" })),
            ..Default::default()
        };
        assert!(not_array.attribute_list().is_empty());
    }
}
