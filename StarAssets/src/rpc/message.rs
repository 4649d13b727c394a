//! Messages exchanged with replicas

use bytes::Bytes;
use serde_json::Value;

use crate::db::{BlobUrl, HostedFile, ResourceIndex, ResourceRecord};
use crate::error::Result;
use crate::world::RegionData;

/// Correlates a reply with the call that produced it.
pub type CallId = u64;

/// How a request is routed across replicas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// Sent to one replica.
    Single,
    /// Sent identically to every replica so their state stays in sync.
    Broadcast,
}

/// A remote operation.
#[derive(Debug, Clone)]
pub enum Request {
    /// Index one file under a virtual path.
    AddFile { path: String, file: HostedFile },
    /// Index a list of files under a common directory path.
    AddFileList { path: String, files: Vec<HostedFile> },
    /// Blob URL for a path.
    GetBlobUrl { path: String },
    /// Parsed resource document for a path.
    GetJson { path: String },
    /// All resources of one extension.
    LoadResources { extension: String },
    /// Open a world container.
    OpenWorld { bytes: Bytes },
    /// Region buffer and entities of the open world.
    GetRegion { x: i32, y: i32 },
}

impl Request {
    /// Routing used for this operation.
    pub fn routing(&self) -> Routing {
        match self {
            Request::AddFile { .. } | Request::AddFileList { .. } | Request::OpenWorld { .. } => {
                Routing::Broadcast
            }
            Request::GetBlobUrl { .. }
            | Request::GetJson { .. }
            | Request::LoadResources { .. }
            | Request::GetRegion { .. } => Routing::Single,
        }
    }

    /// Operation name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Request::AddFile { .. } => "addFile",
            Request::AddFileList { .. } => "addFileList",
            Request::GetBlobUrl { .. } => "getBlobURL",
            Request::GetJson { .. } => "getJSON",
            Request::LoadResources { .. } => "loadResources",
            Request::OpenWorld { .. } => "openWorld",
            Request::GetRegion { .. } => "getRegion",
        }
    }
}

/// A successful result.
#[derive(Debug)]
pub enum Response {
    /// The write was applied.
    Ack,
    /// A blob URL handle.
    BlobUrl(BlobUrl),
    /// A parsed resource document.
    Json(ResourceRecord),
    /// A resource index.
    Resources(ResourceIndex),
    /// Metadata of the opened world.
    WorldMetadata(Value),
    /// A region; its buffer is moved, not copied.
    Region(RegionData),
}

/// A request tagged with its call id.
#[derive(Debug)]
pub struct Envelope {
    pub id: CallId,
    pub request: Request,
}

/// The outcome of one call, tagged with its call id.
#[derive(Debug)]
pub struct Reply {
    pub id: CallId,
    pub result: Result<Response>,
}
