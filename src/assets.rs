use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};

use crate::block::AssetReference;

/// A decoded image together with the bytes it was read from.
#[derive(Clone, Debug)]
pub struct ImageAsset {
    pub path: PathBuf,
    pub data: Vec<u8>,
    pub format: ImageFormat,
    pub pixels: DynamicImage,
}

impl ImageAsset {
    pub fn pixel_width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn pixel_height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Outcome of looking up an asset. Absence is an expected result, not an error.
#[derive(Clone, Debug)]
pub enum AssetStatus {
    Present(ImageAsset),
    Missing,
    /// The path exists but could not be read or decoded.
    Corrupt(String),
}

/// Resolves asset paths against a base directory. Absolute paths are used as-is.
#[derive(Clone, Debug)]
pub struct AssetResolver {
    base_dir: PathBuf,
}

impl AssetResolver {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self { base_dir: base_dir.as_ref().to_path_buf() }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn locate(&self, asset: &AssetReference) -> PathBuf {
        if asset.path.is_absolute() {
            asset.path.clone()
        } else {
            self.base_dir.join(&asset.path)
        }
    }

    pub fn resolve(&self, asset: &AssetReference) -> AssetStatus {
        let path = self.locate(asset);
        if !path.exists() {
            log::debug!("Asset not found: {}", path.display());
            return AssetStatus::Missing;
        }

        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) => return AssetStatus::Corrupt(format!("unreadable: {e}")),
        };
        let format = match image::guess_format(&data) {
            Ok(format) => format,
            Err(e) => return AssetStatus::Corrupt(format!("unrecognised image data: {e}")),
        };
        match image::load_from_memory_with_format(&data, format) {
            Ok(pixels) => {
                log::debug!(
                    "Asset {} decoded as {format:?} {}x{}",
                    path.display(),
                    pixels.width(),
                    pixels.height()
                );
                AssetStatus::Present(ImageAsset { path, data, format, pixels })
            }
            Err(e) => AssetStatus::Corrupt(format!("decode failed: {e}")),
        }
    }
}

impl Default for AssetResolver {
    fn default() -> Self {
        Self::new(".")
    }
}
