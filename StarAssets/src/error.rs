//! Error types for `StarAssets`

use thiserror::Error;

/// The error type for `StarAssets` operations.
///
/// Every variant is `Send + 'static` so a failed request can travel back
/// across the replica boundary as a value.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from host file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The root directory of an ingestion could not be read.
    #[error("failed to read directory '{path}': {source}")]
    DirectoryReadFailed {
        /// Virtual path of the directory.
        path: String,
        /// The host error.
        source: std::io::Error,
    },

    // ==================== Index Errors ====================
    /// The virtual path has not been indexed.
    #[error("path is not in index: {0}")]
    PathNotIndexed(String),

    /// The virtual path was already indexed; the new source replaced the old one.
    #[error("{0} already in index")]
    DuplicatePath(String),

    // ==================== Package Errors ====================
    /// A package file could not be opened by the package codec.
    #[error("failed to open package {name}: {source}")]
    ArchiveOpenFailure {
        /// Declared name of the package file.
        name: String,
        /// The codec error.
        source: starfiles::Error,
    },

    /// An entry could not be extracted from its package.
    #[error("failed to extract {path}: {source}")]
    ExtractionFailure {
        /// Inner path of the entry.
        path: String,
        /// The codec error.
        source: starfiles::Error,
    },

    // ==================== Resource Errors ====================
    /// A resource document could not be parsed or lacks its id field.
    #[error("could not parse {path} ({cause})")]
    ResourceParseFailure {
        /// Virtual path of the resource.
        path: String,
        /// What went wrong.
        cause: String,
    },

    // ==================== Image Errors ====================
    /// An image operation name is not recognized.
    #[error("unsupported image operation: {0}")]
    UnsupportedImageOperation(String),

    /// An image operation has a malformed argument.
    #[error("invalid argument for image operation {op}: {arg:?}")]
    InvalidImageArgument {
        /// Operation name.
        op: String,
        /// The offending argument.
        arg: String,
    },

    /// The image width is not a multiple of the flip tile width.
    #[error("{width} not divisible by {tile_width} ({path})")]
    TileDimensionMismatch {
        /// Image width in pixels.
        width: u32,
        /// Requested tile width.
        tile_width: u32,
        /// Full image path including operations.
        path: String,
    },

    /// Image bytes could not be decoded.
    #[error("failed to decode image {path}: {message}")]
    ImageDecodeFailed {
        /// Virtual path of the image.
        path: String,
        /// The decoder error message.
        message: String,
    },

    // ==================== World Errors ====================
    /// A world is already open in this replica.
    #[error("a world has already been opened")]
    WorldAlreadyOpen,

    /// No world has been opened in this replica.
    #[error("a world has to be opened before getting regions")]
    WorldNotOpen,

    /// The world codec failed.
    #[error("world error: {0}")]
    World(#[source] starfiles::Error),

    // ==================== Channel Errors ====================
    /// A replica or the reply dispatcher is gone.
    #[error("replica channel closed")]
    ChannelClosed,

    /// A replica answered with a response of the wrong kind.
    #[error("unexpected response to {operation}")]
    UnexpectedResponse {
        /// The operation that was called.
        operation: &'static str,
    },

    // ==================== Parsing Errors ====================
    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// UTF-8 conversion error.
    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    ConfigError(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

/// A specialized Result type for `StarAssets` operations.
pub type Result<T> = std::result::Result<T, Error>;
