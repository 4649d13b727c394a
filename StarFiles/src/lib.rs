//! # StarFiles
//!
//! Container contracts consumed by `starassets`.
//!
//! - **Packages** - [`package::PackageCodec`] opens an archive from bytes into a
//!   [`package::Package`] that lists and extracts inner paths
//! - **Worlds** - [`world::WorldCodec`] opens a world from bytes into a
//!   [`world::World`] exposing metadata, region buffers and entities
//!
//! Both contracts ship with a minimal length-prefixed container (`SPAK` and
//! `SWLD`) so tooling and tests can build fixtures without a real game install.
//!
//! ```
//! use starfiles::prelude::*;
//!
//! let bytes = SimplePackageBuilder::new()
//!     .with_file("/items/apple.png", vec![0u8; 8])
//!     .build()?;
//! let package = SimplePackageCodec.open(bytes.into())?;
//! assert_eq!(package.get("/items/apple.png")?.len(), 8);
//! # Ok::<(), starfiles::Error>(())
//! ```

pub mod error;
pub mod package;
pub mod world;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::package::{
        Package, PackageCodec, SimplePackage, SimplePackageBuilder, SimplePackageCodec,
    };
    pub use crate::world::{SimpleWorld, SimpleWorldBuilder, SimpleWorldCodec, World, WorldCodec};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
