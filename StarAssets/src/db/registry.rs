//! Registry of opened packages

use std::sync::Arc;

use bytes::Bytes;
use starfiles::package::{Package, PackageCodec};

use super::index::ArchiveId;
use crate::error::{Error, Result};

/// Owns every package opened in this context.
///
/// Packages are never removed, so an [`ArchiveId`] stays valid for the
/// lifetime of the registry.
pub struct ArchiveRegistry {
    codec: Arc<dyn PackageCodec>,
    packages: Vec<RegisteredPackage>,
}

struct RegisteredPackage {
    name: String,
    package: Box<dyn Package>,
}

impl ArchiveRegistry {
    /// Create an empty registry that opens packages with `codec`.
    pub fn new(codec: Arc<dyn PackageCodec>) -> Self {
        Self {
            codec,
            packages: Vec::new(),
        }
    }

    /// Open `bytes` as a package and register it.
    pub fn open(&mut self, name: &str, bytes: Bytes) -> Result<ArchiveId> {
        let package = self
            .codec
            .open(bytes)
            .map_err(|source| Error::ArchiveOpenFailure {
                name: name.to_string(),
                source,
            })?;

        tracing::debug!(
            "Registered package {} with {} entries",
            name,
            package.index().len()
        );

        self.packages.push(RegisteredPackage {
            name: name.to_string(),
            package,
        });
        Ok(self.packages.len() - 1)
    }

    /// Inner paths of a registered package.
    pub fn entries(&self, id: ArchiveId) -> &[String] {
        self.packages
            .get(id)
            .map(|registered| registered.package.index())
            .unwrap_or_default()
    }

    /// Name the package was registered under.
    pub fn name(&self, id: ArchiveId) -> Option<&str> {
        self.packages.get(id).map(|registered| registered.name.as_str())
    }

    /// Extract an entry from a registered package.
    pub fn extract(&self, id: ArchiveId, inner_path: &str) -> Result<Bytes> {
        let registered = self.packages.get(id).ok_or_else(|| Error::ExtractionFailure {
            path: inner_path.to_string(),
            source: starfiles::Error::InvalidFormat(format!("no package registered as {id}")),
        })?;

        registered
            .package
            .get(inner_path)
            .map_err(|source| Error::ExtractionFailure {
                path: inner_path.to_string(),
                source,
            })
    }

    /// Number of registered packages.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether no package has been registered.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl std::fmt::Debug for ArchiveRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveRegistry")
            .field(
                "packages",
                &self.packages.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}
