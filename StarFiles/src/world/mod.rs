//! World container contract
//!
//! A world stores a metadata document, raw region buffers addressed by
//! `(layer, x, y)`, and per-region entity documents.

mod simple;

use bytes::Bytes;
use serde_json::Value;

use crate::error::Result;

pub use simple::{SimpleWorld, SimpleWorldBuilder, SimpleWorldCodec, WORLD_MAGIC};

/// Opens worlds from raw bytes.
pub trait WorldCodec: Send + Sync {
    /// Parse a world from `bytes`.
    ///
    /// # Errors
    /// Returns an error if the bytes are not a world this codec understands.
    fn open(&self, bytes: Bytes) -> Result<Box<dyn World>>;
}

/// An opened world.
pub trait World: Send {
    /// World metadata document.
    fn metadata(&self) -> Result<Value>;

    /// Raw region buffer. The returned buffer is owned by the caller.
    fn region_data(&self, layer: u8, x: i32, y: i32) -> Result<Vec<u8>>;

    /// Entity documents stored for the region at `(x, y)`.
    fn entities(&self, x: i32, y: i32) -> Result<Value>;
}
