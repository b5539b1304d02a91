//! Server-side wallpaper rendering: a background, then either the NFT's local trait layers or
//! its remote image, fitted to the bottom of a phone-sized canvas.

pub mod decode;
pub mod layers;
pub mod layout;
pub mod presets;

use std::io::Cursor;
use std::path::PathBuf;

use image::imageops::FilterType;
use image::{ImageFormat, Rgba, RgbaImage};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use crate::compose::decode::decode_rgba;
use crate::compose::layout::{draw_scaled, fit_bottom, parse_color};
use crate::compose::presets::ExportSize;
use crate::constants::{DEFAULT_BACKGROUND, EMPTY_BACKGROUND};
use crate::nft::asset::MetaAttribute;
use crate::util::is_http_url;
use crate::util::upstream::{FetchErr, ImageFetcher};

#[derive(Debug, Clone)]
pub enum Background {
    Color(String),
    Image(Vec<u8>),
}

/// The NFT as the client knows it, usually a `/api/nft-by-mint` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NftArt {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub attributes: Vec<MetaAttribute>,
}

/// JSON half of a compose request; an uploaded background travels as a separate part.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComposeRequest {
    #[serde(default)]
    pub nft: NftArt,
    /// Background color. Ignored when a background image is uploaded.
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub size: ExportSize,
}

#[derive(Debug, Clone)]
pub struct RenderedPng {
    pub filename: String,
    pub bytes: Vec<u8>,
}

enum Backdrop {
    Fill(Rgba<u8>),
    Encoded(Vec<u8>),
}

enum Art {
    Layers(Vec<RgbaImage>),
    Encoded(Vec<u8>),
    Nothing,
}

#[derive(Debug, Clone)]
pub struct Compositor {
    layers_dir: PathBuf,
    fetcher: ImageFetcher,
}

impl Compositor {
    pub fn new(layers_dir: PathBuf, fetcher: ImageFetcher) -> Self {
        Self {
            layers_dir,
            fetcher,
        }
    }

    /// Paints `nft` over `background` onto a `size` canvas.
    #[instrument(skip(self, nft, background), fields(nft = %nft.id))]
    pub async fn compose(
        &self,
        nft: &NftArt,
        background: Option<Background>,
        size: (u32, u32),
    ) -> ComposeResult<RgbaImage> {
        let backdrop = backdrop(background)?;

        let layers = layers::load_layers(&self.layers_dir, &nft.attributes).await;
        let art = if !layers.is_empty() {
            tracing::debug!(count = layers.len(), "drawing local layers");
            Art::Layers(layers)
        } else {
            match nft.image.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                Some(url) if is_http_url(url) => Art::Encoded(self.fetcher.fetch(url).await?.bytes),
                Some(other) => {
                    tracing::warn!(image = other, "not drawing non-http nft image");
                    Art::Nothing
                }
                None => Art::Nothing,
            }
        };

        tokio::task::spawn_blocking(move || paint(size, backdrop, art)).await?
    }

    /// Composes and encodes a PNG named after the NFT and the output size.
    #[instrument(skip(self, request, background))]
    pub async fn render_png(
        &self,
        request: &ComposeRequest,
        background: Option<Background>,
    ) -> ComposeResult<RenderedPng> {
        let size = request.size.resolve()?;
        let background = background.or_else(|| request.background.clone().map(Background::Color));

        let canvas = self.compose(&request.nft, background, size).await?;
        let bytes = tokio::task::spawn_blocking(move || encode_png(&canvas)).await??;

        tracing::info!(w = size.0, h = size.1, len = bytes.len(), "rendered wallpaper");
        Ok(RenderedPng {
            filename: export_filename(request.nft.name.as_deref(), size),
            bytes,
        })
    }
}

fn backdrop(background: Option<Background>) -> ComposeResult<Backdrop> {
    let color = match background {
        Some(Background::Image(bytes)) => return Ok(Backdrop::Encoded(bytes)),
        Some(Background::Color(c)) if c.trim().is_empty() => EMPTY_BACKGROUND.to_owned(),
        Some(Background::Color(c)) => c,
        None => DEFAULT_BACKGROUND.to_owned(),
    };

    parse_color(&color)
        .map(Backdrop::Fill)
        .ok_or(ComposeError::BadColor(color))
}

fn paint(size: (u32, u32), backdrop: Backdrop, art: Art) -> ComposeResult<RgbaImage> {
    let mut canvas = match backdrop {
        Backdrop::Fill(px) => RgbaImage::from_pixel(size.0, size.1, px),
        Backdrop::Encoded(bytes) => {
            let bg = decode_rgba(&bytes).map_err(ComposeError::BadBackground)?;

            let mut canvas = RgbaImage::new(size.0, size.1);
            let at = fit_bottom(bg.dimensions(), size);
            draw_scaled(&mut canvas, &bg, at, FilterType::CatmullRom);
            canvas
        }
    };

    match art {
        Art::Layers(layers) => {
            // every layer shares the first one's placement
            let at = fit_bottom(layers[0].dimensions(), size);
            for layer in &layers {
                draw_scaled(&mut canvas, layer, at, FilterType::Nearest);
            }
        }
        Art::Encoded(bytes) => {
            let img = decode_rgba(&bytes).map_err(ComposeError::BadArt)?;
            let at = fit_bottom(img.dimensions(), size);
            draw_scaled(&mut canvas, &img, at, FilterType::Nearest);
        }
        Art::Nothing => {}
    }

    Ok(canvas)
}

fn encode_png(canvas: &RgbaImage) -> ComposeResult<Vec<u8>> {
    let mut buf = Vec::new();
    canvas
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(ComposeError::Encode)?;
    Ok(buf)
}

/// `"Grave #7"` at 1440x3200 -> `Grave_#7_1440x3200.png`.
pub fn export_filename(name: Option<&str>, size: (u32, u32)) -> String {
    let name = name.map(str::trim).filter(|n| !n.is_empty()).unwrap_or("nft");
    let stem = name.split_whitespace().collect::<Vec<_>>().join("_");
    format!("{stem}_{}x{}.png", size.0, size.1)
}

pub type ComposeResult<T> = core::result::Result<T, ComposeError>;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("unknown export preset '{0}'")]
    UnknownPreset(String),

    #[error("export size {w}x{h} is out of range")]
    BadSize { w: u32, h: u32 },

    #[error("invalid background color '{0}'")]
    BadColor(String),

    #[error("background image could not be decoded: {0}")]
    BadBackground(#[source] image::ImageError),

    #[error("nft image could not be decoded: {0}")]
    BadArt(#[source] image::ImageError),

    #[error("failed to fetch nft image: {0}")]
    Fetch(#[from] FetchErr),

    #[error("png encoding failed: {0}")]
    Encode(#[source] image::ImageError),

    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compose::decode::test::png_bytes;
    use crate::compose::presets::ExportSize;
    use crate::constants::MAX_DECODE_DIMENSION;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn png(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
        encode_png(&RgbaImage::from_pixel(w, h, Rgba(px))).unwrap()
    }

    fn compositor(dir: &std::path::Path) -> Compositor {
        Compositor::new(dir.to_path_buf(), ImageFetcher::new(reqwest::Client::new()))
    }

    #[test]
    fn test_export_filename() {
        assert_eq!(export_filename(Some("Grave  #7"), (1440, 3200)), "Grave_#7_1440x3200.png");
        assert_eq!(export_filename(None, (835, 1856)), "nft_835x1856.png");
        assert_eq!(export_filename(Some("  "), (1, 1)), "nft_1x1.png");
    }

    #[tokio::test]
    async fn test_color_backgrounds() {
        let dir = tempfile::tempdir().unwrap();
        let c = compositor(dir.path());
        let nft = NftArt::default();

        let img = c.compose(&nft, None, (4, 4)).await.unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgba([0x3e, 0x2d, 0x75, 255]));

        let img = c
            .compose(&nft, Some(Background::Color(String::new())), (4, 4))
            .await
            .unwrap();
        assert_eq!(img.get_pixel(3, 3), &Rgba([0x2b, 0x21, 0x46, 255]));

        assert!(matches!(
            c.compose(&nft, Some(Background::Color("purple".into())), (4, 4))
                .await,
            Err(ComposeError::BadColor(_))
        ));
    }

    #[tokio::test]
    async fn test_layers_share_first_placement() {
        let dir = tempfile::tempdir().unwrap();
        for (trait_dir, file, w, h, px) in [
            ("skin", "pale.png", 2, 2, [10, 10, 10, 255]),
            ("hand", "phone.png", 1, 1, [200, 0, 0, 255]),
        ] {
            std::fs::create_dir_all(dir.path().join(trait_dir)).unwrap();
            std::fs::write(dir.path().join(trait_dir).join(file), png(w, h, px)).unwrap();
        }

        let nft = NftArt {
            image: Some("https://never.fetched/x.png".into()),
            attributes: vec![
                MetaAttribute::new("Hand", "Phone"),
                MetaAttribute::new("Skin", "Pale"),
            ],
            ..Default::default()
        };

        let img = compositor(dir.path())
            .compose(&nft, Some(Background::Color("#000".into())), (4, 8))
            .await
            .unwrap();

        // skin is 2x2 -> 4x4 at the bottom; the 1x1 hand is stretched over the same rectangle
        assert_eq!(img.get_pixel(0, 3), &Rgba([0, 0, 0, 255]));
        assert_eq!(img.get_pixel(0, 4), &Rgba([200, 0, 0, 255]));
        assert_eq!(img.get_pixel(3, 7), &Rgba([200, 0, 0, 255]));
    }

    #[tokio::test]
    async fn test_remote_fallback_and_png() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/art.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(png(1, 1, [0, 255, 0, 255]))
                    .insert_header("content-type", "image/png"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let request = ComposeRequest {
            nft: NftArt {
                name: Some("Grave 7".into()),
                image: Some(format!("{}/art.png", server.uri())),
                ..Default::default()
            },
            background: Some("#fff".into()),
            size: ExportSize::Explicit { w: 2, h: 4, label: None },
        };

        let out = compositor(dir.path()).render_png(&request, None).await.unwrap();
        assert_eq!(out.filename, "Grave_7_2x4.png");

        let decoded = image::load_from_memory(&out.bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (2, 4));
        assert_eq!(decoded.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(decoded.get_pixel(1, 3), &Rgba([0, 255, 0, 255]));
    }

    #[tokio::test]
    async fn test_uploaded_background_is_bottom_fitted() {
        let dir = tempfile::tempdir().unwrap();
        let bg = Background::Image(png(2, 1, [0, 0, 255, 255]));

        let img = compositor(dir.path())
            .compose(&NftArt::default(), Some(bg), (4, 4))
            .await
            .unwrap();

        assert_eq!(img.get_pixel(0, 0)[3], 0);
        let px = img.get_pixel(1, 3);
        assert!(px[0] < 5 && px[2] > 250 && px[3] > 250, "{px:?}");

        let broken = Background::Image(b"nope".to_vec());
        assert!(matches!(
            compositor(dir.path())
                .compose(&NftArt::default(), Some(broken), (4, 4))
                .await,
            Err(ComposeError::BadBackground(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_background_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let huge = Background::Image(png_bytes(MAX_DECODE_DIMENSION + 1, 2));

        assert!(matches!(
            compositor(dir.path())
                .compose(&NftArt::default(), Some(huge), (8, 8))
                .await,
            Err(ComposeError::BadBackground(image::ImageError::Limits(_)))
        ));
    }
}
