use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

/// Destination rectangle on the canvas. `x` may be negative only for images wider than the
/// canvas, which `fit_bottom` never produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
    pub w: u32,
    pub h: u32,
}

/// Uniformly scales `src` to fit inside `target`, centered horizontally and resting on the
/// bottom edge.
pub fn fit_bottom(src: (u32, u32), target: (u32, u32)) -> Placement {
    let (sw, sh) = (src.0.max(1) as f64, src.1.max(1) as f64);
    let (tw, th) = (target.0.max(1), target.1.max(1));

    let scale = (tw as f64 / sw).min(th as f64 / sh);
    let w = ((sw * scale).round() as u32).clamp(1, tw);
    let h = ((sh * scale).round() as u32).clamp(1, th);

    Placement {
        x: i64::from((tw - w) / 2),
        y: i64::from(th - h),
        w,
        h,
    }
}

/// Parses `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`.
pub fn parse_color(s: &str) -> Option<Rgba<u8>> {
    let hex = s.trim().strip_prefix('#')?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let nibble = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    match hex.len() {
        3 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, 255])),
        4 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?])),
        6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => None,
    }
}

/// Resizes `img` into `at` and alpha-blends it onto `canvas`.
pub fn draw_scaled(canvas: &mut RgbaImage, img: &RgbaImage, at: Placement, filter: FilterType) {
    if img.dimensions() == (at.w, at.h) {
        imageops::overlay(canvas, img, at.x, at.y);
        return;
    }

    let scaled = imageops::resize(img, at.w, at.h, filter);
    imageops::overlay(canvas, &scaled, at.x, at.y);
}
