//! Surface color lookups.

use std::sync::{Arc, LazyLock};

use lumen_core::{DecodedImage, TextureCache};
use lumen_math::{Color, Vec2};

use crate::error::RenderResult;

/// Color returned for lookups into an image with no pixels.
pub const NEUTRAL_GRAY: Color = Color::splat(0.5);

/// Maps surface coordinates to a base color.
pub trait Texture: Send + Sync {
    fn albedo(&self, uv: Vec2) -> Color;
}

/// Constant color regardless of coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticColor {
    color: Color,
}

impl StaticColor {
    pub fn new(color: Color) -> Self {
        Self { color }
    }

    pub fn color(&self) -> Color {
        self.color
    }
}

impl Texture for StaticColor {
    fn albedo(&self, _uv: Vec2) -> Color {
        self.color
    }
}

/// Nearest-pixel lookup into a decoded image.
///
/// `v = 0` addresses the bottom row of the image. Coordinates outside [0, 1]
/// are clamped to the border.
#[derive(Debug, Clone)]
pub struct ImageTexture {
    image: Arc<DecodedImage>,
}

impl ImageTexture {
    pub fn new(image: Arc<DecodedImage>) -> Self {
        Self { image }
    }

    /// Load through `cache`, so primitives sharing a file share its pixels.
    pub fn from_file(cache: &mut TextureCache, path: &str) -> RenderResult<Self> {
        Ok(Self::new(cache.load(path)?))
    }

    /// Like `from_file`, but a failed load yields a texture that samples gray.
    pub fn from_file_or_gray(cache: &mut TextureCache, path: &str) -> Self {
        Self::from_file(cache, path).unwrap_or_else(|e| {
            log::warn!("Failed to load texture '{}': {}", path, e);
            Self::new(Arc::new(DecodedImage {
                width: 0,
                height: 0,
                channels: 4,
                bytes: Vec::new(),
            }))
        })
    }

    pub fn image(&self) -> &DecodedImage {
        &self.image
    }
}

impl Texture for ImageTexture {
    fn albedo(&self, uv: Vec2) -> Color {
        let image = &*self.image;
        if image.is_empty() || image.width == 0 || image.height == 0 {
            return NEUTRAL_GRAY;
        }

        let u = uv.x.clamp(0.0, 1.0);
        let v = 1.0 - uv.y.clamp(0.0, 1.0);
        let x = ((u * image.width as f32) as u32).min(image.width - 1);
        let y = ((v * image.height as f32) as u32).min(image.height - 1);

        let Some(px) = image.pixel(x, y) else {
            return NEUTRAL_GRAY;
        };
        let channel = |i: usize| px[i] as f32 / 255.0;
        match px.len() {
            1 | 2 => Color::splat(channel(0)),
            _ => Color::new(channel(0), channel(1), channel(2)),
        }
    }
}

static DEFAULT_TEXTURE: LazyLock<Arc<dyn Texture>> =
    LazyLock::new(|| Arc::new(StaticColor::new(Color::ONE)));

/// Shared handle to the process-wide default (white) texture.
pub fn default_texture() -> Arc<dyn Texture> {
    Arc::clone(&DEFAULT_TEXTURE)
}
