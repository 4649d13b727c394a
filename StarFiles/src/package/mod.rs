//! Package (archive) container contract
//!
//! A package bundles many named byte blobs into a single file. The core only
//! needs three things from one: open it from bytes, list its inner paths, and
//! extract the bytes behind one of those paths.

mod simple;

use bytes::Bytes;

use crate::error::Result;

pub use simple::{SimplePackage, SimplePackageBuilder, SimplePackageCodec, PACKAGE_MAGIC};

/// Opens packages from raw bytes.
pub trait PackageCodec: Send + Sync {
    /// Parse the package index from `bytes`.
    ///
    /// # Errors
    /// Returns an error if the bytes are not a package this codec understands.
    fn open(&self, bytes: Bytes) -> Result<Box<dyn Package>>;
}

/// An opened package.
pub trait Package: Send + Sync {
    /// Inner paths in index order.
    fn index(&self) -> &[String];

    /// Extract the bytes stored under `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileNotFoundInPackage`] if `path` is not in the index.
    fn get(&self, path: &str) -> Result<Bytes>;
}
