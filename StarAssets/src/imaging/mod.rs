//! Image transform engine
//!
//! Base rasters are cached under their plain path; every distinct
//! path-with-operations is cached separately under the full string.
//! [`ImageCache`] only tracks state; fetching and decoding are driven by
//! [`AssetsManager`](crate::AssetsManager).

mod ops;
mod transform;

use std::collections::HashMap;
use std::sync::Arc;

use image::RgbaImage;

pub use ops::{parse_hex_color, ImageOpChain, ImageOperation, Rgb};
pub use transform::{apply_chain, flip_grid_x, hsv_to_rgb, rgb_to_hsv, TransformPlan};

/// State of one cached path.
#[derive(Debug, Clone)]
pub enum ImageSlot {
    /// The base raster is being fetched and decoded.
    Loading,
    /// Decoded (and possibly transformed) raster.
    Ready(Arc<RgbaImage>),
    /// Fetching or decoding failed; not retried.
    Failed,
}

/// What a lookup needs from its caller.
#[derive(Debug)]
pub enum ImageLookup {
    /// The image is available.
    Ready(Arc<RgbaImage>),
    /// Not available yet (or never will be).
    Pending,
    /// The base raster at this path must be loaded; it is now marked as loading.
    Load(String),
    /// The base raster is ready and `chain` must be applied to it.
    Transform {
        /// Decoded base raster.
        base: Arc<RgbaImage>,
        /// Parsed operations of the requested path.
        chain: ImageOpChain,
    },
}

/// Raster cache keyed by image path.
#[derive(Debug, Default)]
pub struct ImageCache {
    slots: HashMap<String, ImageSlot>,
}

impl ImageCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `path`, marking its base as loading if nobody asked for it yet.
    pub fn lookup(&mut self, path: &str) -> ImageLookup {
        if let Some(ImageSlot::Ready(image)) = self.slots.get(path) {
            return ImageLookup::Ready(image.clone());
        }

        // Operations are only parsed once the base is ready, so their warnings
        // are logged once per path rather than on every poll
        let base_path = path.split_once('?').map_or(path, |(base, _)| base);
        let base = match self.slots.get(base_path) {
            Some(ImageSlot::Ready(base)) => base.clone(),
            Some(ImageSlot::Loading | ImageSlot::Failed) => return ImageLookup::Pending,
            None => {
                self.slots.insert(base_path.to_string(), ImageSlot::Loading);
                return ImageLookup::Load(base_path.to_string());
            }
        };

        let chain = ImageOpChain::parse(path);
        if chain.is_empty() {
            // Every operation was dropped; serve the base under this path from now on
            self.slots
                .insert(path.to_string(), ImageSlot::Ready(base.clone()));
            return ImageLookup::Ready(base);
        }
        ImageLookup::Transform { base, chain }
    }

    /// Store a decoded or transformed raster.
    pub fn store(&mut self, path: &str, image: RgbaImage) -> Arc<RgbaImage> {
        let image = Arc::new(image);
        self.slots
            .insert(path.to_string(), ImageSlot::Ready(image.clone()));
        image
    }

    /// Mark `path` as permanently unavailable.
    pub fn fail(&mut self, path: &str) {
        self.slots.insert(path.to_string(), ImageSlot::Failed);
    }

    /// Current slot of `path` without side effects.
    pub fn slot(&self, path: &str) -> Option<&ImageSlot> {
        self.slots.get(path)
    }

    /// Number of cached paths, including loading and failed ones.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
