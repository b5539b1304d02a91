use std::io::Cursor;

use image::{ImageReader, ImageResult, Limits, RgbaImage};

use crate::constants::{MAX_DECODE_ALLOC, MAX_DECODE_DIMENSION};

/// Decodes an encoded image to RGBA8, refusing anything whose header claims dimensions or an
/// allocation past the compositor's limits.
pub fn decode_rgba(bytes: &[u8]) -> ImageResult<RgbaImage> {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DECODE_DIMENSION);
    limits.max_image_height = Some(MAX_DECODE_DIMENSION);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);

    let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    reader.limits(limits);

    Ok(reader.decode()?.into_rgba8())
}
