//! Lazy per-extension resource loaders

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::db::{ResourceIndex, ResourceRecord};
use crate::manager::AssetsManager;

/// Suffix of the in-flight markers kept for requested image fields.
pub const IMAGE_FIELD_SUFFIX: &str = "__image";

/// Fields holding image paths, per resource extension.
pub fn image_fields(extension: &str) -> &'static [&'static str] {
    match extension {
        ".material" => &["frames", "platformImage", "stairImage"],
        ".matmod" => &["frames"],
        _ => &[],
    }
}

/// Resources of one extension, loaded on first use.
///
/// Cloning shares the same index.
#[derive(Clone)]
pub struct ResourceLoader {
    assets: AssetsManager,
    extension: String,
    state: Arc<Mutex<LoaderState>>,
}

#[derive(Default)]
struct LoaderState {
    index: Option<ResourceIndex>,
    loading: bool,
    queued: Vec<String>,
    requested: HashSet<(String, String)>,
}

impl ResourceLoader {
    /// Create a loader; nothing is fetched until it is used.
    pub fn new(assets: AssetsManager, extension: &str) -> Self {
        Self {
            assets,
            extension: extension.to_string(),
            state: Arc::new(Mutex::new(LoaderState::default())),
        }
    }

    /// Extension this loader covers.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Whether the index has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.state.lock().index.is_some()
    }

    /// Number of loaded resources.
    pub fn len(&self) -> usize {
        self.state.lock().index.as_ref().map_or(0, ResourceIndex::len)
    }

    /// Whether no resource is loaded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The resource with `id`.
    ///
    /// Before the index is loaded this starts loading it and returns `None`;
    /// an [`AssetEvent::Resources`](crate::AssetEvent::Resources) follows.
    pub fn get(&self, id: &str) -> Option<ResourceRecord> {
        if let Some(index) = &self.state.lock().index {
            return index.get(id).cloned();
        }
        self.load_index();
        None
    }

    /// Start loading every image referenced by the resources with `ids`.
    ///
    /// Requests made before the index is loaded are queued and replayed
    /// once it is. Every field is only requested once per id.
    pub fn load_images<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields = image_fields(&self.extension);
        if fields.is_empty() {
            return;
        }

        let mut paths = Vec::new();
        {
            let mut state = self.state.lock();
            let LoaderState {
                index,
                queued,
                requested,
                ..
            } = &mut *state;

            let Some(index) = index else {
                queued.extend(ids.into_iter().map(|id| id.as_ref().to_string()));
                drop(state);
                self.load_index();
                return;
            };

            for id in ids {
                let id = id.as_ref();
                let Some(record) = index.get(id) else {
                    tracing::warn!(
                        "Missing {} with id {}",
                        self.extension.trim_start_matches('.'),
                        id
                    );
                    continue;
                };

                for field in fields {
                    let Some(value) = record.get_str(field) else {
                        continue;
                    };
                    let marker = format!("{field}{IMAGE_FIELD_SUFFIX}");
                    if requested.insert((id.to_string(), marker)) {
                        paths.push(self.assets.resource_path(record, value));
                    }
                }
            }
        }

        for path in paths {
            self.assets.get_image(&path);
        }
    }

    /// Whether the image in `field` of resource `id` has been requested.
    pub fn is_requested(&self, id: &str, field: &str) -> bool {
        let marker = format!("{field}{IMAGE_FIELD_SUFFIX}");
        self.state
            .lock()
            .requested
            .contains(&(id.to_string(), marker))
    }

    /// Start loading the index unless it is loaded or already loading.
    pub fn load_index(&self) {
        {
            let mut state = self.state.lock();
            if state.index.is_some() || state.loading {
                return;
            }
            state.loading = true;
        }

        let loader = self.clone();
        tokio::spawn(async move {
            let index = match loader.assets.load_resources(&loader.extension).await {
                Ok(index) => index,
                Err(e) => {
                    tracing::warn!("Failed to load {} resources ({})", loader.extension, e);
                    ResourceIndex::new()
                }
            };

            let queued = {
                let mut state = loader.state.lock();
                state.loading = false;
                state.index = Some(index);
                std::mem::take(&mut state.queued)
            };

            if !queued.is_empty() {
                loader.load_images(queued);
            }
        });
    }
}

impl std::fmt::Debug for ResourceLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ResourceLoader")
            .field("extension", &self.extension)
            .field("loaded", &state.index.as_ref().map(ResourceIndex::len))
            .field("queued", &state.queued.len())
            .finish_non_exhaustive()
    }
}
