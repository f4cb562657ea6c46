//! Error types for entity capture

use thiserror::Error;

use crate::color::ColorError;
use crate::texture::TextureError;

/// Error while capturing a single entity.
///
/// Capture failures are isolated per entity: one failed capture warns the
/// user and the rest of the cell batch continues.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The entity has no resolvable texture
    #[error("found no texture for {0}")]
    NoTexture(String),
    /// Render target dimensions must both be positive
    #[error("render target must have positive dimensions, got {width}x{height}")]
    InvalidSize { width: i64, height: i64 },
    /// The adaptive-zoom loop ran out of attempts without a fitting render
    #[error("portrait for {label} still clipped after {attempts} fit attempts")]
    FitNotReached { label: String, attempts: u32 },
    /// A material tint or mask color string failed to parse
    #[error("invalid material color: {0}")]
    Color(#[from] ColorError),
    /// A mask or portrait layer texture could not be loaded
    #[error(transparent)]
    Texture(#[from] TextureError),
    /// IO error writing the export
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// PNG encoding error
    #[error(transparent)]
    Image(#[from] image::ImageError),
}
