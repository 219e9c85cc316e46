//! Texture loading and caching.
//!
//! Images are decoded once into their native 8-bit channel layout and shared
//! by reference; the renderer only ever reads them through nearest-pixel
//! lookups, so no float conversion happens here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::DynamicImage;
use thiserror::Error;

/// Errors that can occur during texture loading.
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decoding error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Unsupported channel count: {0}")]
    UnsupportedChannels(u8),

    #[error("Pixel buffer holds {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

pub type TextureResult<T> = Result<T, TextureError>;

/// A decoded image: tightly packed 8-bit channels, row-major, top row first.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// 1 (gray), 2 (gray + alpha), 3 (RGB) or 4 (RGBA)
    pub channels: u8,
    pub bytes: Vec<u8>,
}

impl DecodedImage {
    /// Wrap an existing byte buffer, validating its size against the dimensions.
    pub fn new(width: u32, height: u32, channels: u8, bytes: Vec<u8>) -> TextureResult<Self> {
        if !(1..=4).contains(&channels) {
            return Err(TextureError::UnsupportedChannels(channels));
        }
        let expected = width as usize * height as usize * channels as usize;
        if bytes.len() != expected {
            return Err(TextureError::SizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            bytes,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Raw channel bytes of the pixel at (x, y), `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let stride = self.channels as usize;
        let start = (y as usize * self.width as usize + x as usize) * stride;
        self.bytes.get(start..start + stride)
    }
}

/// Load and decode an image file. The format is detected from the file contents.
pub fn load_image(path: impl AsRef<Path>) -> TextureResult<DecodedImage> {
    let data = std::fs::read(path.as_ref())?;
    let img = image::load_from_memory(&data)?;
    let (width, height) = (img.width(), img.height());

    let (bytes, channels) = match img {
        DynamicImage::ImageLuma8(buf) => (buf.into_raw(), 1),
        DynamicImage::ImageLumaA8(buf) => (buf.into_raw(), 2),
        DynamicImage::ImageRgb8(buf) => (buf.into_raw(), 3),
        DynamicImage::ImageRgba8(buf) => (buf.into_raw(), 4),
        // 16-bit and float images are narrowed to 8-bit RGBA
        other => (other.to_rgba8().into_raw(), 4),
    };

    DecodedImage::new(width, height, channels, bytes)
}

/// Cache for decoded images, keyed by the path they were requested with.
pub struct TextureCache {
    images: HashMap<String, Arc<DecodedImage>>,

    /// Base directory for resolving relative paths
    base_dir: Option<PathBuf>,
}

impl TextureCache {
    /// Create a new empty texture cache.
    pub fn new() -> Self {
        Self {
            images: HashMap::new(),
            base_dir: None,
        }
    }

    /// Create a texture cache with a base directory for relative paths.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            images: HashMap::new(),
            base_dir: Some(base_dir.into()),
        }
    }

    /// Load an image from file, using the cache if available.
    pub fn load(&mut self, path: &str) -> TextureResult<Arc<DecodedImage>> {
        if let Some(image) = self.images.get(path) {
            return Ok(Arc::clone(image));
        }

        let full_path = self.resolve_path(path);
        let image = Arc::new(load_image(&full_path)?);
        self.images.insert(path.to_string(), Arc::clone(&image));

        log::debug!(
            "Loaded texture: {} ({}x{}, {} channels)",
            path,
            image.width,
            image.height,
            image.channels
        );

        Ok(image)
    }

    /// Get a cached image without loading.
    pub fn get(&self, path: &str) -> Option<Arc<DecodedImage>> {
        self.images.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);

        match &self.base_dir {
            Some(base) if !path.is_absolute() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new()
    }
}
