//! Resource loading boundary
//!
//! The engine core never performs file I/O of its own; everything comes
//! through the [`ResourceLoader`] trait. The shipped [`FileResourceLoader`]
//! resolves names under a base path and decodes images to RGBA8 with the
//! `image` crate. Loader calls run on the load pipeline's worker threads,
//! so implementations must be `Send + Sync`.

use crate::resources::material::MaterialConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors produced while loading resources
#[derive(Debug, Error)]
pub enum LoaderError {
    /// No candidate file exists for the requested name
    #[error("resource '{0}' not found")]
    NotFound(String),

    /// The file exists but could not be decoded
    #[error("failed to decode resource '{name}': {reason}")]
    DecodeFailed {
        /// Resource name as requested
        name: String,
        /// Decoder diagnostic
        reason: String,
    },

    /// Cube map faces disagree on resolution or channel count
    #[error(
        "cube map '{name}' face '{face}' is {face_width}x{face_height}x{face_channels}, \
         expected {width}x{height}x{channels}"
    )]
    CubeFaceMismatch {
        /// Cube map base name
        name: String,
        /// Offending face name
        face: String,
        /// Expected width
        width: u32,
        /// Expected height
        height: u32,
        /// Expected channel count
        channels: u8,
        /// Actual face width
        face_width: u32,
        /// Actual face height
        face_height: u32,
        /// Actual face channel count
        face_channels: u8,
    },
}

/// Loaded image data ready for GPU upload
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Raw RGBA pixel data
    pub data: Vec<u8>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Number of colour channels (always 4 after decode)
    pub channels: u8,
}

impl ImageData {
    /// Whether any pixel has an alpha value below fully opaque
    pub fn has_transparency(&self) -> bool {
        self.data.chunks_exact(4).any(|px| px[3] < 255)
    }
}

/// External resource loading contract
///
/// Name in, decoded in-memory resource out. Image loads are invoked from
/// worker threads; material configs are small and loaded synchronously on
/// the main thread.
pub trait ResourceLoader: Send + Sync {
    /// Load and decode an image by resource name
    fn load_image(&self, name: &str) -> Result<ImageData, LoaderError>;

    /// Load a material configuration by name
    fn load_material(&self, name: &str) -> Result<MaterialConfig, LoaderError>;
}

/// Filesystem-backed loader
///
/// Images resolve under `<base>/textures/<name>.<ext>` for a small set of
/// candidate extensions; material configs under
/// `<base>/materials/<name>.toml` or `.ron`.
pub struct FileResourceLoader {
    base_path: PathBuf,
}

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

impl FileResourceLoader {
    /// Create a loader rooted at `base_path`
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn find_candidate(&self, subdir: &str, name: &str, extensions: &[&str]) -> Option<PathBuf> {
        extensions.iter().find_map(|ext| {
            let candidate = self.base_path.join(subdir).join(format!("{name}.{ext}"));
            candidate.exists().then_some(candidate)
        })
    }

    fn decode_image(name: &str, path: &Path) -> Result<ImageData, LoaderError> {
        log::debug!("Loading image '{}' from {:?}", name, path);
        let img = image::open(path).map_err(|e| LoaderError::DecodeFailed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::info!("Loaded image '{}' ({}x{})", name, width, height);
        Ok(ImageData {
            data: rgba.into_raw(),
            width,
            height,
            channels: 4,
        })
    }
}

impl ResourceLoader for FileResourceLoader {
    fn load_image(&self, name: &str) -> Result<ImageData, LoaderError> {
        let path = self
            .find_candidate("textures", name, &IMAGE_EXTENSIONS)
            .ok_or_else(|| LoaderError::NotFound(name.to_string()))?;
        Self::decode_image(name, &path)
    }

    fn load_material(&self, name: &str) -> Result<MaterialConfig, LoaderError> {
        let path = self
            .find_candidate("materials", name, &["toml", "ron"])
            .ok_or_else(|| LoaderError::NotFound(name.to_string()))?;
        let text = std::fs::read_to_string(&path).map_err(|e| LoaderError::DecodeFailed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("ron") => ron::from_str(&text).map_err(|e| LoaderError::DecodeFailed {
                name: name.to_string(),
                reason: e.to_string(),
            })?,
            _ => toml::from_str(&text).map_err(|e| LoaderError::DecodeFailed {
                name: name.to_string(),
                reason: e.to_string(),
            })?,
        };
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_image_reports_not_found() {
        let loader = FileResourceLoader::new("/nonexistent/assets");
        let result = loader.load_image("no_such_texture");
        assert!(matches!(result, Err(LoaderError::NotFound(_))));
    }

    #[test]
    fn test_has_transparency_scans_alpha() {
        let opaque = ImageData {
            data: vec![10, 20, 30, 255, 40, 50, 60, 255],
            width: 2,
            height: 1,
            channels: 4,
        };
        assert!(!opaque.has_transparency());

        let translucent = ImageData {
            data: vec![10, 20, 30, 255, 40, 50, 60, 128],
            width: 2,
            height: 1,
            channels: 4,
        };
        assert!(translucent.has_transparency());
    }
}
