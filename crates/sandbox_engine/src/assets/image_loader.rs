//! Texture decode collaborator
//!
//! Decodes image files into tightly packed 8-bit RGBA pixel data. The GPU
//! side only ever sees `ImageData`; it never touches file formats.

use super::{AssetError, AssetResult};
use std::path::Path;

/// Decoded image pixels in 8-bit RGBA order, row-major, no padding
#[derive(Debug, Clone)]
pub struct ImageData {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ImageData {
    /// Byte size of the pixel payload (width * height * 4)
    pub fn byte_size(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * 4
    }

    /// Build image data from raw RGBA bytes. Callers are responsible for
    /// the bytes actually being `width * height * 4` long.
    pub fn from_rgba(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(pixels.len() as u64, u64::from(width) * u64::from(height) * 4);
        Self {
            pixels,
            width,
            height,
        }
    }

    /// A 1x1 opaque white image, used as the placeholder for missing
    /// material channels
    pub fn blank() -> Self {
        Self {
            pixels: vec![255, 255, 255, 255],
            width: 1,
            height: 1,
        }
    }
}

/// Decode an image file into RGBA8 pixels
pub fn load_image(path: impl AsRef<Path>) -> AssetResult<ImageData> {
    let path = path.as_ref();
    let decoded = image::open(path).map_err(|source| AssetError::ImageDecode {
        path: path.display().to_string(),
        source,
    })?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    log::debug!(
        "Loaded image {} ({}x{}, {} bytes)",
        path.display(),
        width,
        height,
        rgba.len()
    );
    Ok(ImageData {
        pixels: rgba.into_raw(),
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_is_single_white_pixel() {
        let blank = ImageData::blank();
        assert_eq!(blank.width, 1);
        assert_eq!(blank.height, 1);
        assert_eq!(blank.pixels, vec![255, 255, 255, 255]);
        assert_eq!(blank.byte_size(), 4);
    }

    #[test]
    fn test_byte_size_matches_dimensions() {
        let data = ImageData::from_rgba(vec![0; 4 * 4 * 4], 4, 4);
        assert_eq!(data.byte_size(), 64);
    }
}
