//! Caller-side asset access
//!
//! [`AssetsManager`] wraps an [`AssetsClient`] with the caches that live on
//! the caller's side: decoded and transformed images, frame documents and
//! per-extension [`ResourceLoader`]s. Lookups never block; when something is
//! not available yet they return `None` and an [`AssetEvent`] is published
//! once more data has arrived.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use parking_lot::Mutex;
use starfiles::package::PackageCodec;
use starfiles::world::WorldCodec;
use tokio::sync::broadcast;

use crate::config::AssetsConfig;
use crate::db::{BlobUrl, HostedFile, ResourceIndex, ResourceRecord};
use crate::error::{Error, Result};
use crate::imaging::{apply_chain, ImageCache, ImageLookup};
use crate::ingest::{FsDirectory, HostDirectory, IngestReport, Ingestor};
use crate::loader::ResourceLoader;
use crate::rpc::AssetsClient;

/// Notifications published by an [`AssetsManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetEvent {
    /// One or more images became available.
    Images,
    /// A resource index finished loading.
    Resources,
}

/// Cloneable handle to the caller-side asset state.
#[derive(Clone)]
pub struct AssetsManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    client: AssetsClient,
    config: AssetsConfig,
    images: Mutex<ImageCache>,
    frames: Mutex<HashMap<String, Option<ResourceRecord>>>,
    events: broadcast::Sender<AssetEvent>,
    emitting: Mutex<HashSet<AssetEvent>>,
}

impl AssetsManager {
    /// Wrap an existing client.
    pub fn new(client: AssetsClient, config: AssetsConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(ManagerInner {
                client,
                config,
                images: Mutex::new(ImageCache::new()),
                frames: Mutex::new(HashMap::new()),
                events,
                emitting: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Start replicas for `config` and wrap them.
    pub fn spawn(
        config: AssetsConfig,
        package_codec: Arc<dyn PackageCodec>,
        world_codec: Arc<dyn WorldCodec>,
    ) -> Result<Self> {
        let client = AssetsClient::spawn(&config, package_codec, world_codec)?;
        Ok(Self::new(client, config))
    }

    /// The underlying RPC client.
    pub fn client(&self) -> &AssetsClient {
        &self.inner.client
    }

    /// Configuration this manager was created with.
    pub fn config(&self) -> &AssetsConfig {
        &self.inner.config
    }

    /// Receive [`AssetEvent`]s published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<AssetEvent> {
        self.inner.events.subscribe()
    }

    // ==================== Indexing ====================

    /// Index every file below `dir`, prefixing virtual paths with `path`.
    ///
    /// `.pak`/`.modpak` files found along the way are opened and their
    /// entries indexed as well.
    pub async fn add_directory<D: HostDirectory>(
        &self,
        path: &str,
        dir: D,
    ) -> Result<IngestReport> {
        Ingestor::new(self.inner.client.clone(), self.inner.config.hidden_prefix)
            .ingest(path, dir)
            .await
    }

    /// Index `dir` as the root of the virtual filesystem.
    pub async fn add_root<D: HostDirectory>(&self, dir: D) -> Result<IngestReport> {
        self.add_directory("", dir).await
    }

    /// Index a local directory as the root, reading it in configured batches.
    pub async fn add_fs_root(&self, root: impl AsRef<Path>) -> Result<IngestReport> {
        let dir =
            FsDirectory::new(root.as_ref()).with_batch_size(self.inner.config.read_batch_size);
        self.add_root(dir).await
    }

    /// Index one file on every replica.
    pub async fn add_file(&self, path: &str, file: HostedFile) -> Result<()> {
        self.inner.client.add_file(path, file).await
    }

    /// Blob URL for `path`.
    pub async fn get_blob_url(&self, path: &str) -> Result<BlobUrl> {
        self.inner.client.get_blob_url(path).await
    }

    // ==================== Images ====================

    /// The image at `path`, with any operations in the path applied.
    ///
    /// Returns `None` while the base image is still loading (or if it failed
    /// to load); an [`AssetEvent::Images`] is published once it is ready.
    /// Must be called from within a Tokio runtime.
    pub fn get_image(&self, path: &str) -> Option<Arc<RgbaImage>> {
        let lookup = self.inner.images.lock().lookup(path);

        match lookup {
            ImageLookup::Ready(image) => Some(image),
            ImageLookup::Pending => None,
            ImageLookup::Load(base_path) => {
                self.spawn_image_load(base_path);
                None
            }
            ImageLookup::Transform { base, chain } => {
                let image = apply_chain(&base, &chain, path);
                Some(self.inner.images.lock().store(path, image))
            }
        }
    }

    /// Tile image stored in `field` of `record`, hue shifted by `hue_shift` / 255 of a turn.
    pub fn get_tile_image(
        &self,
        record: &ResourceRecord,
        field: &str,
        hue_shift: u8,
    ) -> Option<Arc<RgbaImage>> {
        let Some(value) = record.get_str(field) else {
            tracing::warn!("{} has no image field '{}'", record.path(), field);
            return None;
        };

        let mut path = self.resource_path(record, value);
        if hue_shift != 0 {
            path.push_str(&format!("?hueshift={}", f64::from(hue_shift) / 255.0 * 360.0));
        }
        self.get_image(&path)
    }

    /// Parsed `.frames` document next to `image_path`, if already fetched.
    ///
    /// The first request starts the fetch; failures are logged and the
    /// document stays unavailable.
    pub fn get_frames(&self, image_path: &str) -> Option<ResourceRecord> {
        let path = frames_path(image_path);

        {
            let mut frames = self.inner.frames.lock();
            if let Some(cached) = frames.get(&path) {
                return cached.clone();
            }
            frames.insert(path.clone(), None);
        }

        let manager = self.clone();
        tokio::spawn(async move {
            let result = manager.inner.client.get_json(&path).await;
            match result {
                Ok(record) => {
                    manager.inner.frames.lock().insert(path, Some(record));
                }
                Err(e) => tracing::error!("Failed to load frames {} ({})", path, e),
            }
        });
        None
    }

    fn spawn_image_load(&self, base_path: String) {
        let manager = self.clone();
        tokio::spawn(async move {
            match manager.load_base_image(&base_path).await {
                Ok(image) => {
                    manager.inner.images.lock().store(&base_path, image);
                    manager.emit_once_per_tick(AssetEvent::Images);
                }
                Err(e) => {
                    tracing::warn!("Failed to load {} ({})", base_path, e);
                    manager.inner.images.lock().fail(&base_path);
                }
            }
        });
    }

    async fn load_base_image(&self, path: &str) -> Result<RgbaImage> {
        let url = self.inner.client.get_blob_url(path).await?;
        let bytes = url.blob().bytes().clone();

        let decode_error = |message: String| Error::ImageDecodeFailed {
            path: path.to_string(),
            message,
        };

        tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes).map(|image| image.to_rgba8())
        })
        .await
        .map_err(|e| decode_error(e.to_string()))?
        .map_err(|e| decode_error(e.to_string()))
    }

    // ==================== Resources ====================

    /// Load every resource with `extension` from one replica.
    pub async fn load_resources(&self, extension: &str) -> Result<ResourceIndex> {
        let resources = self.inner.client.load_resources(extension).await?;
        self.emit_once_per_tick(AssetEvent::Resources);
        Ok(resources)
    }

    /// A lazily loading view of the resources with `extension`.
    pub fn get_resource_loader(&self, extension: &str) -> ResourceLoader {
        ResourceLoader::new(self.clone(), extension)
    }

    /// Resolve `path` relative to the file `record` was loaded from.
    ///
    /// Absolute paths are returned unchanged.
    pub fn resource_path(&self, record: &ResourceRecord, path: &str) -> String {
        if path.starts_with('/') {
            return path.to_string();
        }

        let base = record.path();
        let dir_end = base.rfind('/').map_or(0, |slash| slash + 1);
        format!("{}{}", &base[..dir_end], path)
    }

    // ==================== Events ====================

    /// Publish `event` at most once per scheduling turn.
    fn emit_once_per_tick(&self, event: AssetEvent) {
        if !self.inner.emitting.lock().insert(event) {
            return;
        }

        let manager = self.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            manager.inner.emitting.lock().remove(&event);
            // Nobody listening is fine
            let _ = manager.inner.events.send(event);
        });
    }
}

impl std::fmt::Debug for AssetsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetsManager")
            .field("client", &self.inner.client)
            .field("images", &self.inner.images.lock().len())
            .field("frames", &self.inner.frames.lock().len())
            .finish_non_exhaustive()
    }
}

/// `<stem>.frames` for an image path; operations are ignored.
fn frames_path(image_path: &str) -> String {
    let base = image_path.split('?').next().unwrap_or_default();
    let file_start = base.rfind('/').map_or(0, |slash| slash + 1);
    let stem = match base[file_start..].rfind('.') {
        Some(dot) => &base[..file_start + dot],
        None => base,
    };
    format!("{stem}.frames")
}
