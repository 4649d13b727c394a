//! Replica worker threads
//!
//! A replica exclusively owns an [`AssetsDb`] and a [`WorldManager`] and
//! processes its requests one at a time. Failures are sent back as values; a
//! failed request never takes the replica down.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use starfiles::package::PackageCodec;
use starfiles::world::WorldCodec;

use super::message::{Envelope, Reply, Request, Response};
use crate::db::AssetsDb;
use crate::error::Result;
use crate::world::WorldManager;

/// State owned by one replica.
#[derive(Debug)]
pub struct Replica {
    db: AssetsDb,
    world: WorldManager,
}

impl Replica {
    /// Create a replica with empty state.
    pub fn new(package_codec: Arc<dyn PackageCodec>, world_codec: Arc<dyn WorldCodec>) -> Self {
        Self {
            db: AssetsDb::new(package_codec),
            world: WorldManager::new(world_codec),
        }
    }

    /// Execute one request against this replica's state.
    pub fn handle(&mut self, request: Request) -> Result<Response> {
        match request {
            Request::AddFile { path, file } => {
                self.db.add_file(&path, file)?;
                Ok(Response::Ack)
            }
            Request::AddFileList { path, files } => {
                let dir = path.trim_end_matches('/');
                for file in files {
                    let file_path = format!("{}/{}", dir, file.name);
                    self.db.add_file(&file_path, file)?;
                }
                Ok(Response::Ack)
            }
            Request::GetBlobUrl { path } => self.db.get_blob_url(&path).map(Response::BlobUrl),
            Request::GetJson { path } => self.db.get_json(&path).map(Response::Json),
            Request::LoadResources { extension } => {
                Ok(Response::Resources(self.db.load_resources(&extension)))
            }
            Request::OpenWorld { bytes } => self.world.open(bytes).map(Response::WorldMetadata),
            Request::GetRegion { x, y } => self.world.region(x, y).map(Response::Region),
        }
    }

    /// The replica's asset database.
    pub fn db(&self) -> &AssetsDb {
        &self.db
    }
}

/// Start replica `index` on its own thread.
///
/// The thread exits once every sender for its request channel is dropped or
/// the reply channel closes.
pub(crate) fn spawn_replica(
    index: usize,
    package_codec: Arc<dyn PackageCodec>,
    world_codec: Arc<dyn WorldCodec>,
    replies: Sender<Reply>,
) -> std::io::Result<Sender<Envelope>> {
    let (tx, rx) = mpsc::channel::<Envelope>();

    thread::Builder::new()
        .name(format!("starassets-replica-{index}"))
        .spawn(move || {
            let replica = Replica::new(package_codec, world_codec);
            run_replica(index, replica, &rx, &replies);
        })?;

    Ok(tx)
}

fn run_replica(
    index: usize,
    mut replica: Replica,
    requests: &Receiver<Envelope>,
    replies: &Sender<Reply>,
) {
    tracing::debug!("Replica {} started", index);

    while let Ok(Envelope { id, request }) = requests.recv() {
        let operation = request.name();
        let result = replica.handle(request);
        if let Err(e) = &result {
            tracing::debug!("Replica {} call {} ({}) failed: {}", index, id, operation, e);
        }
        if replies.send(Reply { id, result }).is_err() {
            break;
        }
    }

    tracing::debug!("Replica {} stopped", index);
}
