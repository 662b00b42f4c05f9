//! Asset loading collaborators
//!
//! The renderer core consumes decoded pixel bytes and flattened vertex/index
//! lists; everything that touches file formats lives here.

pub mod height_map;
pub mod image_loader;
pub mod model_loader;

pub use height_map::build_height_map_mesh;
pub use image_loader::{load_image, ImageData};
pub use model_loader::{load_obj, MeshSource};

use thiserror::Error;

/// Errors raised while loading scene assets. All of these are fatal at load
/// time; there is no fallback scene.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("failed to read asset file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to decode image {path}: {source}")]
    ImageDecode {
        path: String,
        source: image::ImageError,
    },

    #[error("failed to load model {path}: {source}")]
    ModelLoad {
        path: String,
        source: tobj::LoadError,
    },
}

/// Result alias for asset loading operations
pub type AssetResult<T> = Result<T, AssetError>;
