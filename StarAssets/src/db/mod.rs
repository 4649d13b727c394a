//! Per-context asset database
//!
//! [`AssetsDb`] owns the path index, the package registry and the blob URL
//! cache for one execution context. Each replica holds its own instance.

mod blob;
mod index;
mod registry;
mod resources;

use std::sync::Arc;

use bytes::Bytes;
use starfiles::package::PackageCodec;

use crate::error::{Error, Result};

pub use blob::{Blob, BlobCache, BlobUrl, CacheEntry, CacheStats};
pub use index::{
    extension_class, get_extension, is_archive_extension, mime_type, ArchiveId, ExtensionClass,
    PathIndex, SourceLocator, ARCHIVE_EXTENSIONS, INDEXED_EXTENSIONS,
};
pub use registry::ArchiveRegistry;
pub use resources::{parse_record, strip_line_comments, ResourceIndex, ResourceRecord, PATH_FIELD};

/// A file handed over by the host: its declared name and content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedFile {
    /// Declared file name; its extension decides whether it is a package.
    pub name: String,
    /// File content.
    pub bytes: Bytes,
}

impl HostedFile {
    /// Create a hosted file.
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Path index, package registry and blob cache of one context.
#[derive(Debug)]
pub struct AssetsDb {
    index: PathIndex,
    registry: ArchiveRegistry,
    blobs: BlobCache,
}

impl AssetsDb {
    /// Create an empty database that opens packages with `codec`.
    pub fn new(codec: Arc<dyn PackageCodec>) -> Self {
        Self {
            index: PathIndex::new(),
            registry: ArchiveRegistry::new(codec),
            blobs: BlobCache::new(),
        }
    }

    /// Add a host file under `path`.
    ///
    /// Package files (`.pak`, `.modpak`, judged by the file's own name) are
    /// not indexed themselves; their entries are indexed under their inner paths.
    pub fn add_file(&mut self, path: &str, file: HostedFile) -> Result<()> {
        if is_archive_extension(&get_extension(&file.name)) {
            self.add_package(&file.name, file.bytes)?;
        } else {
            self.index.insert(
                path,
                SourceLocator::Inline {
                    bytes: file.bytes,
                    name: file.name,
                },
            );
        }
        Ok(())
    }

    /// Open a package and index all of its entries.
    pub fn add_package(&mut self, name: &str, bytes: Bytes) -> Result<ArchiveId> {
        let id = self.registry.open(name, bytes)?;

        for inner_path in self.registry.entries(id) {
            self.index.insert(
                inner_path,
                SourceLocator::Archive {
                    archive: id,
                    inner_path: inner_path.clone(),
                },
            );
        }

        Ok(id)
    }

    /// Resolve the bytes behind `path`.
    pub fn get_blob(&self, path: &str) -> Result<Blob> {
        let locator = self
            .index
            .get(path)
            .ok_or_else(|| Error::PathNotIndexed(path.to_string()))?;

        match locator {
            SourceLocator::Inline { bytes, name } => {
                Ok(Blob::new(bytes.clone(), mime_type(&get_extension(name))))
            }
            SourceLocator::Archive {
                archive,
                inner_path,
            } => {
                let bytes = self.registry.extract(*archive, inner_path)?;
                Ok(Blob::new(bytes, mime_type(&get_extension(path))))
            }
        }
    }

    /// Cached blob URL for `path`, created on first request.
    pub fn get_blob_url(&mut self, path: &str) -> Result<BlobUrl> {
        if let Some(url) = self.blobs.get(path) {
            return Ok(url);
        }

        let blob = self.get_blob(path)?;
        Ok(self.blobs.insert(path, blob))
    }

    /// Parse `path` as a resource document.
    pub fn get_json(&self, path: &str) -> Result<ResourceRecord> {
        let blob = self.get_blob(path)?;
        parse_record(path, blob.bytes())
    }

    /// Load every resource with `extension`, keyed by its id field.
    ///
    /// Records that fail to parse or lack an id are logged and skipped; one
    /// broken asset never hides the rest.
    pub fn load_resources(&self, extension: &str) -> ResourceIndex {
        let mut resources = ResourceIndex::new();
        let Some(class) = extension_class(extension) else {
            return resources;
        };

        for path in self.index.paths_with_extension(class.extension) {
            let record = self.get_json(path).and_then(|record| {
                record
                    .id(class.id_field)
                    .map(|id| (id, record))
                    .ok_or_else(|| Error::ResourceParseFailure {
                        path: path.clone(),
                        cause: format!("missing {}", class.id_field),
                    })
            });

            match record {
                Ok((id, record)) => {
                    resources.insert(id, record);
                }
                Err(e) => tracing::warn!("Skipping resource: {}", e),
            }
        }

        tracing::debug!("Loaded {} {} resources", resources.len(), extension);
        resources
    }

    /// The path index.
    pub fn index(&self) -> &PathIndex {
        &self.index
    }

    /// The package registry.
    pub fn registry(&self) -> &ArchiveRegistry {
        &self.registry
    }

    /// The blob URL cache.
    pub fn blob_cache(&self) -> &BlobCache {
        &self.blobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use starfiles::package::{SimplePackageBuilder, SimplePackageCodec};

    fn db() -> AssetsDb {
        AssetsDb::new(Arc::new(SimplePackageCodec))
    }

    fn object(name: &str) -> Vec<u8> {
        format!("{{\"objectName\": \"{name}\", \"image\": \"{name}.png\"}}").into_bytes()
    }

    #[test]
    fn test_add_loose_file() {
        let mut db = db();
        db.add_file("/sfx/hit.ogg", HostedFile::new("hit.ogg", b"OggS".to_vec()))
            .unwrap();

        let blob = db.get_blob("/sfx/hit.ogg").unwrap();
        assert_eq!(blob.bytes().as_ref(), b"OggS");
        assert_eq!(blob.mime(), Some("audio/ogg"));
    }

    #[test]
    fn test_add_package_indexes_inner_paths() {
        let pak = SimplePackageBuilder::new()
            .with_file("/objects/chest.object", object("chest"))
            .with_file("/objects/chest.png", vec![0x89, b'P'])
            .build()
            .unwrap();

        let mut db = db();
        // The virtual path of the package file itself is irrelevant
        db.add_file("/assets/packed.pak", HostedFile::new("packed.pak", pak))
            .unwrap();

        assert!(!db.index().contains("/assets/packed.pak"));
        assert_eq!(db.index().len(), 2);
        assert_eq!(db.registry().len(), 1);

        let blob = db.get_blob("/objects/chest.png").unwrap();
        assert_eq!(blob.bytes().as_ref(), &[0x89, b'P']);
        assert_eq!(blob.mime(), Some("image/png"));
    }

    #[test]
    fn test_modpak_extension_is_case_insensitive() {
        let pak = SimplePackageBuilder::new()
            .with_file("/mod.txt", b"hi".to_vec())
            .build()
            .unwrap();
        let mut db = db();
        db.add_file("/Mods/Cool.MODPAK", HostedFile::new("Cool.MODPAK", pak))
            .unwrap();
        assert!(db.index().contains("/mod.txt"));
    }

    #[test]
    fn test_broken_package_is_reported() {
        let mut db = db();
        let err = db
            .add_file("/bad.pak", HostedFile::new("bad.pak", b"junk".to_vec()))
            .unwrap_err();
        assert!(matches!(err, Error::ArchiveOpenFailure { .. }));
        assert!(db.index().is_empty());
    }

    #[test]
    fn test_path_not_indexed() {
        let mut db = db();
        assert!(matches!(
            db.get_blob_url("/missing.png"),
            Err(Error::PathNotIndexed(p)) if p == "/missing.png"
        ));
    }

    #[test]
    fn test_duplicate_path_last_writer_wins() {
        let mut db = db();
        db.add_file("/a.png", HostedFile::new("a.png", b"first".to_vec()))
            .unwrap();
        let pak = SimplePackageBuilder::new()
            .with_file("/a.png", b"second".to_vec())
            .build()
            .unwrap();
        db.add_file("/p.pak", HostedFile::new("p.pak", pak)).unwrap();

        assert_eq!(db.index().duplicates(), 1);
        assert_eq!(db.get_blob("/a.png").unwrap().bytes().as_ref(), b"second");
    }

    #[test]
    fn test_blob_url_is_memoized() {
        let mut db = db();
        db.add_file("/a.png", HostedFile::new("a.png", b"png".to_vec()))
            .unwrap();

        let first = db.get_blob_url("/a.png").unwrap();
        let accessed = db.blob_cache().peek("/a.png").unwrap().last_access;
        let second = db.get_blob_url("/a.png").unwrap();

        assert!(first.same_handle(&second));
        assert!(db.blob_cache().peek("/a.png").unwrap().last_access >= accessed);
        assert_eq!(db.blob_cache().stats().created, 1);
        assert_eq!(db.blob_cache().stats().hits, 1);
    }

    #[test]
    fn test_load_resources_skips_bad_records() {
        let mut db = db();
        for name in ["chest", "lamp", "door"] {
            db.add_file(
                &format!("/objects/{name}.object"),
                HostedFile::new(format!("{name}.object"), object(name)),
            )
            .unwrap();
        }
        db.add_file(
            "/objects/nameless.object",
            HostedFile::new("nameless.object", br#"{"image": "x.png"}"#.to_vec()),
        )
        .unwrap();
        db.add_file(
            "/objects/broken.object",
            HostedFile::new("broken.object", b"{ not json".to_vec()),
        )
        .unwrap();

        let resources = db.load_resources(".object");
        assert_eq!(
            resources.keys().collect::<Vec<_>>(),
            ["chest", "lamp", "door"]
        );
        assert_eq!(resources["lamp"].path(), "/objects/lamp.object");
    }

    #[test]
    fn test_load_resources_unknown_extension() {
        let mut db = db();
        db.add_file("/a.png", HostedFile::new("a.png", b"png".to_vec()))
            .unwrap();
        assert!(db.load_resources(".png").is_empty());
        assert!(db.load_resources(".material").is_empty());
    }
}
