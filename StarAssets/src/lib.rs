//! # StarAssets
//!
//! A virtual filesystem over loose game assets and `.pak`/`.modpak` packages.
//!
//! ## Layers
//!
//! - **Index** - [`db::AssetsDb`] maps virtual paths to loose bytes or package
//!   entries, memoizes blob URLs and loads resource documents by extension
//! - **Replicas** - [`AssetsClient`] runs one or more databases on worker
//!   threads; writes are broadcast to all of them, reads go to one
//! - **Caller side** - [`AssetsManager`] ingests directory trees, decodes and
//!   transforms images (`hueshift`, `replace`, `flipgridx`) and hands out
//!   lazy [`ResourceLoader`]s
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use starassets::prelude::*;
//! use starfiles::package::SimplePackageCodec;
//! use starfiles::world::SimpleWorldCodec;
//!
//! # async fn run() -> starassets::Result<()> {
//! let config = AssetsConfig::from_toml_str("replicas = 2")?;
//! let assets = AssetsManager::spawn(
//!     config,
//!     Arc::new(SimplePackageCodec),
//!     Arc::new(SimpleWorldCodec),
//! )?;
//!
//! assets.add_fs_root("assets/").await?;
//! let materials = assets.load_resources(".material").await?;
//! println!("{} materials", materials.len());
//!
//! // `None` until decoded; an `AssetEvent::Images` follows
//! let _ = assets.get_image("/tiles/dirt.png?hueshift=90");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod imaging;
pub mod ingest;
pub mod loader;
pub mod manager;
pub mod rpc;
pub mod world;

// Re-exports for convenience
pub use config::AssetsConfig;
pub use error::{Error, Result};
pub use loader::ResourceLoader;
pub use manager::{AssetEvent, AssetsManager};
pub use rpc::AssetsClient;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::config::AssetsConfig;
    pub use crate::db::{AssetsDb, BlobUrl, HostedFile, ResourceIndex, ResourceRecord};
    pub use crate::error::{Error, Result};
    pub use crate::imaging::{ImageOpChain, ImageOperation};
    pub use crate::ingest::{FsDirectory, HostDirectory, HostEntry, HostFile, IngestReport};
    pub use crate::loader::ResourceLoader;
    pub use crate::manager::{AssetEvent, AssetsManager};
    pub use crate::rpc::AssetsClient;
    pub use crate::world::RegionData;
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
