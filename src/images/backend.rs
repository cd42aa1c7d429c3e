//! Image optimizer trait and shared types.
//!
//! The production implementation is
//! [`RustOptimizer`](super::rust_backend::RustOptimizer), built on the
//! `image` crate. Optimizers work on bytes: the image task owns all file
//! and cache handling.

use crate::config::ImagesConfig;
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptimizeError {
    #[error("Failed to decode {format}: {message}")]
    Decode {
        format: ImageFormat,
        message: String,
    },
    #[error("Failed to encode {format}: {message}")]
    Encode {
        format: ImageFormat,
        message: String,
    },
}

/// Formats the image task picks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Svg,
}

impl ImageFormat {
    /// Format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Gif => "GIF",
            Self::Svg => "SVG",
        })
    }
}

/// Optimization settings. Part of the cache key, so changing any of them
/// re-optimizes every image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizeParams {
    /// PNG effort, 0 (fastest) to 7 (smallest).
    pub level: u8,
    /// Progressive JPEG.
    pub progressive: bool,
    /// Adam7 PNG, interlaced GIF.
    pub interlaced: bool,
    pub jpeg_quality: u8,
}

impl Default for OptimizeParams {
    fn default() -> Self {
        Self::from(&ImagesConfig::default())
    }
}

impl From<&ImagesConfig> for OptimizeParams {
    fn from(config: &ImagesConfig) -> Self {
        Self {
            level: config.optimization_level,
            progressive: config.progressive,
            interlaced: config.interlaced,
            jpeg_quality: config.jpeg_quality,
        }
    }
}

/// Trait for image optimizers.
///
/// Returns the optimized encoding of `data`. The caller keeps whichever of
/// the original and the returned bytes is smaller.
pub trait ImageOptimizer: Send + Sync {
    fn optimize(
        &self,
        data: &[u8],
        format: ImageFormat,
        params: &OptimizeParams,
    ) -> Result<Vec<u8>, OptimizeError>;
}
