//! Virtual path index
//!
//! Maps every virtual path to exactly one [`SourceLocator`]. Paths whose
//! extension belongs to an [`ExtensionClass`] are also tracked in a
//! per-extension list so resource indices can be built without a full scan.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use bytes::Bytes;

use crate::error::Error;

/// Identifies a package registered in the [`super::ArchiveRegistry`].
pub type ArchiveId = usize;

/// Extensions whose files are merged into the index instead of being indexed themselves.
pub const ARCHIVE_EXTENSIONS: [&str; 2] = [".pak", ".modpak"];

/// A resource extension and the JSON field holding its primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionClass {
    /// File extension including the dot.
    pub extension: &'static str,
    /// Field whose value identifies the resource.
    pub id_field: &'static str,
}

/// Extensions that get their own secondary index.
pub const INDEXED_EXTENSIONS: [ExtensionClass; 3] = [
    ExtensionClass {
        extension: ".material",
        id_field: "materialId",
    },
    ExtensionClass {
        extension: ".matmod",
        id_field: "modId",
    },
    ExtensionClass {
        extension: ".object",
        id_field: "objectName",
    },
];

// Only used to label blobs; nothing depends on it for correctness.
const MIME_TYPES: [(&str, &str); 3] = [
    (".ogg", "audio/ogg"),
    (".png", "image/png"),
    (".wav", "audio/x-wav"),
];

/// Look up the extension class for `extension` (lowercase, with dot).
pub fn extension_class(extension: &str) -> Option<&'static ExtensionClass> {
    INDEXED_EXTENSIONS
        .iter()
        .find(|class| class.extension == extension)
}

/// MIME hint for an extension, if one is known.
pub fn mime_type(extension: &str) -> Option<&'static str> {
    MIME_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime)| *mime)
}

/// Whether files with this extension are packages.
pub fn is_archive_extension(extension: &str) -> bool {
    ARCHIVE_EXTENSIONS.contains(&extension)
}

/// Lowercased extension of the last path segment, including the dot.
///
/// Returns an empty string when the last segment has no dot.
///
/// ```
/// use starassets::db::get_extension;
///
/// assert_eq!(get_extension("/tiles/Dirt.MATERIAL"), ".material");
/// assert_eq!(get_extension("/dir.d/readme"), "");
/// ```
pub fn get_extension(path: &str) -> String {
    let slash = path.rfind('/');
    match path.rfind('.') {
        Some(dot) if slash.is_none_or(|slash| slash < dot) => path[dot..].to_lowercase(),
        _ => String::new(),
    }
}

/// Where the bytes behind a virtual path live.
#[derive(Debug, Clone)]
pub enum SourceLocator {
    /// A loose file held in memory.
    Inline {
        /// File content.
        bytes: Bytes,
        /// Declared file name (used for the MIME hint).
        name: String,
    },
    /// An entry inside a registered package.
    Archive {
        /// The owning package.
        archive: ArchiveId,
        /// Path of the entry inside the package.
        inner_path: String,
    },
}

/// Virtual path -> source table with a per-extension secondary index.
#[derive(Debug, Default)]
pub struct PathIndex {
    entries: HashMap<String, SourceLocator>,
    by_extension: HashMap<&'static str, Vec<String>>,
    duplicates: usize,
}

impl PathIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `path`. An existing entry is replaced and a duplicate warning logged.
    ///
    /// Returns the replaced locator, if any.
    pub fn insert(&mut self, path: &str, locator: SourceLocator) -> Option<SourceLocator> {
        match self.entries.entry(path.to_string()) {
            Entry::Occupied(mut occupied) => {
                // XXX: last writer wins; packages later in load order shadow earlier ones
                tracing::warn!("{}", Error::DuplicatePath(path.to_string()));
                self.duplicates += 1;
                Some(occupied.insert(locator))
            }
            Entry::Vacant(vacant) => {
                vacant.insert(locator);
                if let Some(class) = extension_class(&get_extension(path)) {
                    self.by_extension
                        .entry(class.extension)
                        .or_default()
                        .push(path.to_string());
                }
                None
            }
        }
    }

    /// Locator for `path`.
    pub fn get(&self, path: &str) -> Option<&SourceLocator> {
        self.entries.get(path)
    }

    /// Whether `path` is indexed.
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Paths with the given indexed extension, in insertion order.
    pub fn paths_with_extension(&self, extension: &str) -> &[String] {
        self.by_extension
            .get(extension)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of indexed paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of times an existing path was overwritten.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}
