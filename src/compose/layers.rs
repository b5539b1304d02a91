use std::path::{Path, PathBuf};

use image::RgbaImage;
use tracing::instrument;

use crate::compose::decode::decode_rgba;
use crate::constants::{LAYER_EXTENSIONS, LAYER_ORDER};
use crate::nft::asset::MetaAttribute;

/// Trait name to directory/file segment: `"Red MAGA Hat"` -> `"red-maga-hat"`.
pub fn slugify(s: &str) -> String {
    let lowered = s
        .to_lowercase()
        .replace('&', " and ")
        .replace('+', " plus ");

    let mut out = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }

    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Candidate files for one trait, in the order they are tried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerCandidates {
    pub trait_type: &'static str,
    pub paths: Vec<PathBuf>,
}

/// Maps attributes to layer files, in draw order. Traits without a usable value are skipped.
pub fn layer_candidates(layers_dir: &Path, attrs: &[MetaAttribute]) -> Vec<LayerCandidates> {
    LAYER_ORDER
        .iter()
        .filter_map(|&trait_type| {
            let value = attrs
                .iter()
                .find(|a| a.trait_name() == trait_type)?
                .value_text()?;

            let dir = layers_dir.join(slugify(trait_type));
            let stem = slugify(&value);

            Some(LayerCandidates {
                trait_type,
                paths: LAYER_EXTENSIONS
                    .iter()
                    .map(|ext| dir.join(format!("{stem}.{ext}")))
                    .collect(),
            })
        })
        .collect()
}

/// Loads the first readable, decodable candidate of every trait; traits with none are left out.
#[instrument(skip(attrs))]
pub async fn load_layers(layers_dir: &Path, attrs: &[MetaAttribute]) -> Vec<RgbaImage> {
    let mut layers = Vec::new();

    for candidates in layer_candidates(layers_dir, attrs) {
        match load_first(&candidates.paths).await {
            Some(img) => layers.push(img),
            None => tracing::debug!(trait_type = candidates.trait_type, "no local layer"),
        }
    }

    layers
}

async fn load_first(paths: &[PathBuf]) -> Option<RgbaImage> {
    for path in paths {
        let Ok(bytes) = tokio::fs::read(path).await else {
            continue;
        };

        let decoded = tokio::task::spawn_blocking(move || decode_rgba(&bytes)).await;
        match decoded {
            Ok(Ok(img)) => return Some(img),
            Ok(Err(e)) => {
                tracing::warn!(path = %path.display(), error = %e, "undecodable layer file");
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = ?e, "layer decode task failed");
            }
        }
    }

    None
}
