//! PNG encoding and validated decoding of tile images.

use std::io::Cursor;

use anyhow::{Context, Result};
use image::{ImageFormat, RgbaImage};

use crate::TILE_SIZE;

/// The stored bytes are not a usable tile.
///
/// Decoding always runs on a blob that's already in memory, so even an
/// `ImageError::IoError` here (usually an unexpected EOF) means the data is
/// damaged rather than the disk or network misbehaving.
#[derive(Debug, thiserror::Error)]
#[error("corrupt tile data: {0}")]
pub struct CorruptTile(pub String);

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .context("Failed to encode tile as PNG")?;
    Ok(buf)
}

/// Decode a PNG blob into a tile, rejecting anything that isn't exactly
/// `TILE_SIZE` square.
pub fn decode_tile(blob: &[u8]) -> Result<RgbaImage, CorruptTile> {
    let image = image::load_from_memory_with_format(blob, ImageFormat::Png)
        .map_err(|e| CorruptTile(e.to_string()))?;

    let (width, height) = (image.width(), image.height());
    if width != TILE_SIZE || height != TILE_SIZE {
        return Err(CorruptTile(format!(
            "tile is {}x{}, expected {}x{}",
            width, height, TILE_SIZE, TILE_SIZE
        )));
    }
    Ok(image.into_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_decode_matches_encoded_pixels() {
        let mut tile = crate::blank_tile();
        tile.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        tile.put_pixel(511, 511, Rgba([0, 0, 255, 128]));

        let blob = encode_png(&tile).unwrap();
        assert_eq!(&blob[1..4], b"PNG");
        assert_eq!(decode_tile(&blob).unwrap(), tile);
    }

    #[test]
    fn test_garbage_is_corrupt() {
        assert!(decode_tile(b"definitely not a png").is_err());
    }

    #[test]
    fn test_truncated_png_is_corrupt() {
        let blob = encode_png(&crate::blank_tile()).unwrap();
        assert!(decode_tile(&blob[..blob.len() / 2]).is_err());
    }

    #[test]
    fn test_wrong_size_is_corrupt() {
        let small = RgbaImage::new(16, 16);
        let blob = encode_png(&small).unwrap();
        let err = decode_tile(&blob).unwrap_err();
        assert!(err.0.contains("16x16"), "got {}", err);
    }
}
