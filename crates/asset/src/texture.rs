//! Texture loading and data structures.
//! Images of any format `image` decodes are converted to RGBA8.

use std::path::Path;

use anyhow::{Context, Result, ensure};

/// Texture data in CPU-friendly format before GPU upload.
/// Rows are stored top to bottom.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

/// Supported texture formats.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TextureFormat {
    Rgba8,
}

impl TextureData {
    /// Create a new texture with given dimensions and RGBA8 format.
    pub fn new_rgba8(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        ensure!(
            data.len() == (width as usize) * (height as usize) * 4,
            "RGBA8 data size {} doesn't match {}x{}",
            data.len(),
            width,
            height
        );
        Ok(Self {
            data,
            width,
            height,
            format: TextureFormat::Rgba8,
        })
    }

    /// Load an image file and convert it to RGBA8.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading texture from {:?}", path);

        ensure!(path.exists(), "texture file not found: {}", path.display());
        let img = image::open(path)
            .with_context(|| format!("Failed to decode image {}", path.display()))?;

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let data = rgba.into_raw();

        log::info!("Loaded texture {}x{} with {} bytes", width, height, data.len());

        Self::new_rgba8(width, height, data)
    }

    /// Create a simple test texture (checkerboard pattern).
    pub fn create_test_texture(size: u32) -> Self {
        let size = size.max(1);
        let mut data = Vec::with_capacity((size * size * 4) as usize);

        for y in 0..size {
            for x in 0..size {
                let checker = ((x / 8) + (y / 8)) % 2;
                if checker == 0 {
                    data.extend_from_slice(&[255, 255, 255, 255]);
                } else {
                    data.extend_from_slice(&[128, 128, 128, 255]);
                }
            }
        }

        Self {
            data,
            width: size,
            height: size,
            format: TextureFormat::Rgba8,
        }
    }

    /// Get the number of bytes per pixel for the format.
    pub fn bytes_per_pixel(&self) -> u32 {
        match self.format {
            TextureFormat::Rgba8 => 4,
        }
    }

    /// Bytes in one row of pixels.
    pub fn bytes_per_row(&self) -> u32 {
        self.width * self.bytes_per_pixel()
    }

    /// Check if the texture data is valid.
    pub fn is_valid(&self) -> bool {
        let expected_size = (self.width * self.height * self.bytes_per_pixel()) as usize;
        self.data.len() == expected_size && self.width > 0 && self.height > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkerboard_is_valid() {
        let tex = TextureData::create_test_texture(16);
        assert!(tex.is_valid());
        assert_eq!(tex.bytes_per_row(), 64);
        assert_eq!(&tex.data[..4], &[255, 255, 255, 255]);
        // Pixel (8, 0) is in the second checker cell.
        assert_eq!(&tex.data[8 * 4..8 * 4 + 4], &[128, 128, 128, 255]);
    }

    #[test]
    fn mismatched_data_is_rejected() {
        assert!(TextureData::new_rgba8(2, 2, vec![0; 15]).is_err());
        assert!(TextureData::new_rgba8(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn missing_image_is_an_error() {
        let err = TextureData::load("definitely/missing/sun.jpg").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn png_round_trips_through_loader() {
        let path = std::env::temp_dir().join(format!("orrery-tex-{}.png", std::process::id()));
        let img =
            image::RgbImage::from_fn(3, 2, |x, y| image::Rgb([x as u8 * 10, y as u8 * 20, 7]));
        img.save(&path).unwrap();
        let tex = TextureData::load(&path);
        std::fs::remove_file(&path).ok();
        let tex = tex.unwrap();
        assert_eq!((tex.width, tex.height), (3, 2));
        // Second row, third pixel; alpha filled in by the RGBA conversion.
        let px = (3 + 2) * 4;
        assert_eq!(&tex.data[px..px + 4], &[20, 20, 7, 255]);
    }
}
