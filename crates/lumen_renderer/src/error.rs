//! Error types for the renderer.

use lumen_core::TextureError;
use thiserror::Error;

/// Errors surfaced by the renderer's fallible operations.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to spawn render worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Texture error: {0}")]
    Texture(#[from] TextureError),

    #[error("Render worker panicked")]
    WorkerPanicked,
}

pub type RenderResult<T> = Result<T, RenderError>;
