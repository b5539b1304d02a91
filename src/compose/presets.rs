use serde::{Deserialize, Serialize};

use crate::compose::{ComposeError, ComposeResult};
use crate::constants::{MAX_EXPORT_DIMENSION, PREVIEW_SCALE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExportPreset {
    pub id: &'static str,
    pub label: &'static str,
    #[serde(rename = "width")]
    pub w: u32,
    #[serde(rename = "height")]
    pub h: u32,
}

const fn preset(id: &'static str, label: &'static str, w: u32, h: u32) -> ExportPreset {
    ExportPreset { id, label, w, h }
}

const MASTER: (u32, u32) = (1440, 3200);

pub static PRESETS: &[ExportPreset] = &[
    // export buttons
    preset("master", "Master 1440 × 3200", MASTER.0, MASTER.1),
    preset("iphone-15pmax", "iPhone 15 Pro Max 1290 × 2796", 1290, 2796),
    preset("iphone-15pro", "iPhone 15 Pro 1179 × 2556", 1179, 2556),
    preset("android-20-9", "Android 20:9 1080 × 2400", 1080, 2400),
    preset("android-qhd+", "Android QHD+ 1440 × 3040", 1440, 3040),
    preset("share", "Share 1080 × 1350", 1080, 1350),
    preset("preview", "Preview 835 × 1856", 835, 1856),
    // device table
    preset("FHD-1080x1920", "1080 × 1920 (Full HD)", 1080, 1920),
    preset("iph-x-1125x2436", "iPhone X / XS / 11 Pro 1125 × 2436", 1125, 2436),
    preset("iph-xr-828x1792", "iPhone XR / 11 828 × 1792", 828, 1792),
    preset("iph-12-1170x2532", "iPhone 12 / 13 / 14 1170 × 2532", 1170, 2532),
    preset("iph-12pm-1284x2778", "iPhone 12 / 13 / 14 Pro Max 1284 × 2778", 1284, 2778),
    preset("iph-15pro-1179x2556", "iPhone 15 Pro 1179 × 2556", 1179, 2556),
    preset("iph-15pm-1290x2796", "iPhone 15 Pro Max 1290 × 2796", 1290, 2796),
    preset("and-1080x2340", "Android 1080 × 2340", 1080, 2340),
    preset("and-1080x2400", "Android 1080 × 2400", 1080, 2400),
    preset("and-1200x2664", "Android 1200 × 2664", 1200, 2664),
    preset("and-1344x2992", "Android 1344 × 2992", 1344, 2992),
    preset("and-1440x3040", "Android 1440 × 3040", 1440, 3040),
    preset("and-1440x3088", "Android 1440 × 3088", 1440, 3088),
    preset("and-1440x3200", "Android 1440 × 3200", 1440, 3200),
    preset("QHD-1440x2560", "1440 × 2560 (QHD portrait)", 1440, 2560),
];

pub fn find_preset(id: &str) -> Option<&'static ExportPreset> {
    PRESETS.iter().find(|p| p.id == id)
}

/// Requested output size: a preset id or explicit dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExportSize {
    Preset(String),
    Explicit {
        w: u32,
        h: u32,
        #[serde(default)]
        label: Option<String>,
    },
}

impl Default for ExportSize {
    fn default() -> Self {
        ExportSize::Preset("master".into())
    }
}

impl ExportSize {
    /// Resolves to `(width, height)`, rejecting unknown presets and out-of-range dimensions.
    pub fn resolve(&self) -> ComposeResult<(u32, u32)> {
        match self {
            ExportSize::Preset(id) => find_preset(id)
                .map(|p| (p.w, p.h))
                .ok_or_else(|| ComposeError::UnknownPreset(id.clone())),
            ExportSize::Explicit { w, h, .. } => {
                let range = 1..=MAX_EXPORT_DIMENSION;
                if range.contains(w) && range.contains(h) {
                    Ok((*w, *h))
                } else {
                    Err(ComposeError::BadSize { w: *w, h: *h })
                }
            }
        }
    }
}

/// On-screen preview size derived from the master size.
pub fn preview_size() -> (u32, u32) {
    let scale = |v: u32| (f64::from(v) * PREVIEW_SCALE).round() as u32;
    (scale(MASTER.0), scale(MASTER.1))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_preview_matches_table() {
        let preview = find_preset("preview").unwrap();
        assert_eq!(preview_size(), (preview.w, preview.h));
    }

    #[test]
    fn test_ids_are_unique() {
        for (i, p) in PRESETS.iter().enumerate() {
            assert!(PRESETS[i + 1..].iter().all(|q| q.id != p.id), "{}", p.id);
        }
    }

    #[test]
    fn test_resolve() {
        let size: ExportSize = serde_json::from_str(r#""android-qhd+""#).unwrap();
        assert_eq!(size.resolve().unwrap(), (1440, 3040));

        let size: ExportSize = serde_json::from_str(r#"{ "w": 720, "h": 1600 }"#).unwrap();
        assert_eq!(size.resolve().unwrap(), (720, 1600));

        let too_big = ExportSize::Explicit { w: 4097, h: 10, label: None };
        assert!(matches!(too_big.resolve(), Err(ComposeError::BadSize { w: 4097, h: 10 })));

        let zero = ExportSize::Explicit { w: 0, h: 10, label: None };
        assert!(zero.resolve().is_err());

        assert!(matches!(
            ExportSize::Preset("custom".into()).resolve(),
            Err(ComposeError::UnknownPreset(_))
        ));
        assert_eq!(ExportSize::default().resolve().unwrap(), (1440, 3200));
    }
}
