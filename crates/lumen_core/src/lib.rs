//! Lumen Core - collaborators the ray tracing core consumes.
//!
//! This crate provides:
//!
//! - **Texture loading**: decoding image files into raw byte buffers
//!   (`DecodedImage`) and sharing them through a `TextureCache`.
//!
//! # Example
//!
//! ```ignore
//! use lumen_core::TextureCache;
//!
//! let mut cache = TextureCache::new();
//! let earth = cache.load("textures/earth.png")?;
//! println!("{}x{} with {} channels", earth.width, earth.height, earth.channels);
//! ```

pub mod texture;

pub use texture::{load_image, DecodedImage, TextureCache, TextureError, TextureResult};
