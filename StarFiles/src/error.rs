//! Error types for `StarFiles`

use thiserror::Error;

/// The error type for package and world container operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error while reading a container.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== Package Errors ====================
    /// The bytes are not a package (missing SPAK magic).
    #[error("invalid package magic: expected SPAK, found {0:?}")]
    InvalidPackageMagic([u8; 4]),

    /// The requested inner path is not part of the package index.
    #[error("file not found in package: {0}")]
    FileNotFoundInPackage(String),

    /// An index entry points outside the package data.
    #[error("entry {path} out of bounds: {offset}+{size} > {len}")]
    EntryOutOfBounds {
        /// The inner path of the entry.
        path: String,
        /// Absolute offset of the entry data.
        offset: u64,
        /// Size of the entry data.
        size: u32,
        /// Total length of the package.
        len: usize,
    },

    // ==================== World Errors ====================
    /// The bytes are not a world (missing SWLD magic).
    #[error("invalid world magic: expected SWLD, found {0:?}")]
    InvalidWorldMagic([u8; 4]),

    /// The requested region is not stored in the world.
    #[error("region (layer {layer}, {x}, {y}) not found")]
    RegionNotFound {
        /// Region layer.
        layer: u8,
        /// Region x coordinate.
        x: i32,
        /// Region y coordinate.
        y: i32,
    },

    // ==================== Parsing Errors ====================
    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// UTF-8 conversion error.
    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    /// Invalid format error.
    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

/// A specialized Result type for `StarFiles` operations.
pub type Result<T> = std::result::Result<T, Error>;
