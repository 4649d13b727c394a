//! Asynchronous RPC channel to replica worker threads
//!
//! ```text
//! AssetsClient ──Envelope{id}──▶ replica 0 ─┐
//!      │        ──Envelope{id}──▶ replica 1 ─┼──Reply{id}──▶ dispatcher ──oneshot──▶ caller
//!      │        ──Envelope{id}──▶ replica N ─┘
//!      └── pending: CallId → oneshot::Sender
//! ```
//!
//! Writes ([`Routing::Broadcast`]) go to every replica so each keeps a complete
//! index; reads ([`Routing::Single`]) go to one replica chosen round-robin.
//! Replies are matched to calls by [`CallId`], never by arrival order.

mod message;
mod replica;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use bytes::Bytes;
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use starfiles::package::PackageCodec;
use starfiles::world::WorldCodec;
use tokio::sync::oneshot;

use crate::config::AssetsConfig;
use crate::db::{BlobUrl, HostedFile, ResourceIndex, ResourceRecord};
use crate::error::{Error, Result};
use crate::world::RegionData;

pub use message::{CallId, Envelope, Reply, Request, Response, Routing};
pub use replica::Replica;

type PendingCalls = Arc<Mutex<HashMap<CallId, oneshot::Sender<Result<Response>>>>>;

/// Handle to a set of replicas. Cloning shares the same replicas.
///
/// Replica threads shut down once the last clone is dropped.
#[derive(Clone)]
pub struct AssetsClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    replicas: Vec<Sender<Envelope>>,
    pending: PendingCalls,
    next_id: AtomicU64,
    cursor: AtomicUsize,
    time_calls: bool,
}

impl AssetsClient {
    /// Start `config.replicas` replica threads plus a reply dispatcher.
    pub fn spawn(
        config: &AssetsConfig,
        package_codec: Arc<dyn PackageCodec>,
        world_codec: Arc<dyn WorldCodec>,
    ) -> Result<Self> {
        let (reply_tx, reply_rx) = mpsc::channel::<Reply>();
        let pending: PendingCalls = Arc::new(Mutex::new(HashMap::new()));

        let replicas = (0..config.replicas.max(1))
            .map(|index| {
                replica::spawn_replica(
                    index,
                    package_codec.clone(),
                    world_codec.clone(),
                    reply_tx.clone(),
                )
            })
            .collect::<std::io::Result<Vec<_>>>()?;

        // Only replicas hold reply senders, so the dispatcher stops with them
        drop(reply_tx);
        spawn_dispatcher(reply_rx, pending.clone())?;

        tracing::debug!("Started {} replicas", replicas.len());

        Ok(Self {
            inner: Arc::new(ClientInner {
                replicas,
                pending,
                next_id: AtomicU64::new(1),
                cursor: AtomicUsize::new(0),
                time_calls: config.time_calls,
            }),
        })
    }

    /// Number of replicas behind this client.
    pub fn replica_count(&self) -> usize {
        self.inner.replicas.len()
    }

    /// Issue `request` according to its [`Routing`].
    ///
    /// A broadcast succeeds only if every replica succeeds; the first error
    /// (in replica order) is returned otherwise.
    pub async fn call(&self, request: Request) -> Result<Response> {
        match request.routing() {
            Routing::Single => {
                let replica = self.inner.cursor.fetch_add(1, Ordering::Relaxed)
                    % self.inner.replicas.len();
                self.call_replica(replica, request).await
            }
            Routing::Broadcast => {
                let calls = (0..self.inner.replicas.len())
                    .map(|replica| self.call_replica(replica, request.clone()));

                let mut first = None;
                for result in join_all(calls).await {
                    let response = result?;
                    first.get_or_insert(response);
                }
                first.ok_or(Error::ChannelClosed)
            }
        }
    }

    /// Issue `request` to one specific replica.
    pub async fn call_replica(&self, replica: usize, request: Request) -> Result<Response> {
        let operation = request.name();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().insert(id, tx);

        let started = Instant::now();
        let sent = self
            .inner
            .replicas
            .get(replica)
            .ok_or(Error::ChannelClosed)
            .and_then(|sender| {
                sender
                    .send(Envelope { id, request })
                    .map_err(|_| Error::ChannelClosed)
            });
        if let Err(e) = sent {
            self.inner.pending.lock().remove(&id);
            return Err(e);
        }

        let result = rx.await.map_err(|_| Error::ChannelClosed)?;

        if self.inner.time_calls {
            tracing::debug!(
                "{} (call {}, replica {}) took {:?}",
                operation,
                id,
                replica,
                started.elapsed()
            );
        }
        result
    }

    /// Index one host file on every replica.
    pub async fn add_file(&self, path: &str, file: HostedFile) -> Result<()> {
        let request = Request::AddFile {
            path: path.to_string(),
            file,
        };
        expect_ack(self.call(request).await?, "addFile")
    }

    /// Index a list of host files under `path` on every replica.
    pub async fn add_file_list(&self, path: &str, files: Vec<HostedFile>) -> Result<()> {
        let request = Request::AddFileList {
            path: path.to_string(),
            files,
        };
        expect_ack(self.call(request).await?, "addFileList")
    }

    /// Blob URL for `path`.
    pub async fn get_blob_url(&self, path: &str) -> Result<BlobUrl> {
        match self
            .call(Request::GetBlobUrl {
                path: path.to_string(),
            })
            .await?
        {
            Response::BlobUrl(url) => Ok(url),
            _ => Err(Error::UnexpectedResponse {
                operation: "getBlobURL",
            }),
        }
    }

    /// Parsed resource document at `path`.
    pub async fn get_json(&self, path: &str) -> Result<ResourceRecord> {
        match self
            .call(Request::GetJson {
                path: path.to_string(),
            })
            .await?
        {
            Response::Json(record) => Ok(record),
            _ => Err(Error::UnexpectedResponse {
                operation: "getJSON",
            }),
        }
    }

    /// All resources with `extension`, keyed by id.
    pub async fn load_resources(&self, extension: &str) -> Result<ResourceIndex> {
        match self
            .call(Request::LoadResources {
                extension: extension.to_string(),
            })
            .await?
        {
            Response::Resources(resources) => Ok(resources),
            _ => Err(Error::UnexpectedResponse {
                operation: "loadResources",
            }),
        }
    }

    /// Open a world on every replica and return its metadata.
    pub async fn open_world(&self, bytes: Bytes) -> Result<Value> {
        match self.call(Request::OpenWorld { bytes }).await? {
            Response::WorldMetadata(metadata) => Ok(metadata),
            _ => Err(Error::UnexpectedResponse {
                operation: "openWorld",
            }),
        }
    }

    /// Region buffer and entities at `(x, y)`.
    pub async fn get_region(&self, x: i32, y: i32) -> Result<RegionData> {
        match self.call(Request::GetRegion { x, y }).await? {
            Response::Region(region) => Ok(region),
            _ => Err(Error::UnexpectedResponse {
                operation: "getRegion",
            }),
        }
    }
}

impl std::fmt::Debug for AssetsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetsClient")
            .field("replicas", &self.inner.replicas.len())
            .field("pending", &self.inner.pending.lock().len())
            .finish_non_exhaustive()
    }
}

fn expect_ack(response: Response, operation: &'static str) -> Result<()> {
    match response {
        Response::Ack => Ok(()),
        _ => Err(Error::UnexpectedResponse { operation }),
    }
}

/// Route replies to their waiting callers.
fn spawn_dispatcher(replies: Receiver<Reply>, pending: PendingCalls) -> std::io::Result<()> {
    thread::Builder::new()
        .name("starassets-dispatch".to_string())
        .spawn(move || {
            while let Ok(Reply { id, result }) = replies.recv() {
                let waiting = pending.lock().remove(&id);
                match waiting {
                    // The caller may have stopped waiting; that is not an error here
                    Some(tx) => {
                        let _ = tx.send(result);
                    }
                    None => tracing::warn!("Reply for unknown call {}", id),
                }
            }
            tracing::debug!("Reply dispatcher stopped");
        })?;
    Ok(())
}
