//! Recursive directory ingestion
//!
//! Walks a host directory tree and submits every non-hidden file to a
//! [`FileSink`] (normally the [`AssetsClient`]'s broadcast `addFile`).
//!
//! All directories and files of one walk share a pending counter. It starts
//! at 1 for the root directory's own enumeration; every discovered entry adds
//! 1 before its task is spawned, a directory gives its unit back once its
//! enumeration is exhausted, and a file once its submission completed. The
//! walk is complete when the counter drops to zero, which can happen once.

mod fs;

use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::db::HostedFile;
use crate::error::{Error, Result};
use crate::rpc::AssetsClient;

pub use fs::{FsDirectory, FsFile};

/// A directory the host lets us enumerate in batches.
pub trait HostDirectory: Send + Sized + 'static {
    /// File handle type of this host.
    type File: HostFile;

    /// Read the next batch of entries. An empty batch means the directory is exhausted.
    fn read_entries(&mut self) -> impl Future<Output = io::Result<Vec<HostEntry<Self>>>> + Send;
}

/// A file the host can read.
pub trait HostFile: Send + 'static {
    /// Read the whole file.
    fn read(self) -> impl Future<Output = io::Result<HostedFile>> + Send;
}

/// One directory entry.
pub enum HostEntry<D: HostDirectory> {
    /// A subdirectory.
    Directory {
        /// Entry name.
        name: String,
        /// Handle for enumerating it.
        dir: D,
    },
    /// A regular file.
    File {
        /// Entry name.
        name: String,
        /// Handle for reading it.
        file: D::File,
    },
}

impl<D: HostDirectory> HostEntry<D> {
    /// Entry name.
    pub fn name(&self) -> &str {
        match self {
            HostEntry::Directory { name, .. } | HostEntry::File { name, .. } => name,
        }
    }
}

/// Receiver of ingested files.
pub trait FileSink: Clone + Send + Sync + 'static {
    /// Submit one file under its virtual path.
    fn submit(&self, path: String, file: HostedFile) -> impl Future<Output = Result<()>> + Send;
}

impl FileSink for AssetsClient {
    fn submit(&self, path: String, file: HostedFile) -> impl Future<Output = Result<()>> + Send {
        let client = self.clone();
        async move { client.add_file(&path, file).await }
    }
}

/// Outcome of one walk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Files submitted successfully.
    pub files_added: usize,
    /// Files that could not be read or submitted.
    pub files_failed: usize,
    /// Subdirectories visited (the root is not counted).
    pub directories: usize,
    /// Directories whose enumeration failed after the walk started.
    pub directories_failed: usize,
}

/// Walks host directories into a sink.
#[derive(Debug, Clone)]
pub struct Ingestor<S> {
    sink: S,
    hidden_prefix: char,
}

impl<S: FileSink> Ingestor<S> {
    /// Create an ingestor that skips entries starting with `hidden_prefix`.
    pub fn new(sink: S, hidden_prefix: char) -> Self {
        Self {
            sink,
            hidden_prefix,
        }
    }

    /// Ingest `root` with `path` as the virtual prefix of its entries.
    ///
    /// Resolves once every file has been submitted and every directory fully
    /// read. Failures of single files and subdirectories are logged and
    /// counted, not returned.
    ///
    /// # Errors
    /// Returns [`Error::DirectoryReadFailed`] if the first batch of `root`
    /// cannot be read, e.g. because it does not exist.
    pub async fn ingest<D: HostDirectory>(&self, path: &str, mut root: D) -> Result<IngestReport> {
        let first = root
            .read_entries()
            .await
            .map_err(|source| Error::DirectoryReadFailed {
                path: path.to_string(),
                source,
            })?;

        let (done_tx, done_rx) = oneshot::channel();
        let walk = Arc::new(Walk {
            sink: self.sink.clone(),
            hidden_prefix: self.hidden_prefix,
            pending: AtomicUsize::new(1),
            done: Mutex::new(Some(done_tx)),
            files_added: AtomicUsize::new(0),
            files_failed: AtomicUsize::new(0),
            directories: AtomicUsize::new(0),
            directories_failed: AtomicUsize::new(0),
        });

        if first.is_empty() {
            walk.finish_one();
        } else {
            spawn_entries(&walk, path, first);
            spawn_directory(walk.clone(), path.to_string(), root);
        }
        done_rx.await.map_err(|_| Error::ChannelClosed)?;

        let report = walk.report();
        tracing::debug!(
            "Ingested {} files from {} directories under '{}' ({} failed)",
            report.files_added,
            report.directories + 1,
            path,
            report.files_failed
        );
        Ok(report)
    }
}

struct Walk<S> {
    sink: S,
    hidden_prefix: char,
    pending: AtomicUsize,
    done: Mutex<Option<oneshot::Sender<()>>>,
    files_added: AtomicUsize,
    files_failed: AtomicUsize,
    directories: AtomicUsize,
    directories_failed: AtomicUsize,
}

impl<S> Walk<S> {
    fn finish_one(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            if let Some(done) = self.done.lock().take() {
                let _ = done.send(());
            }
        }
    }

    fn report(&self) -> IngestReport {
        IngestReport {
            files_added: self.files_added.load(Ordering::Acquire),
            files_failed: self.files_failed.load(Ordering::Acquire),
            directories: self.directories.load(Ordering::Acquire),
            directories_failed: self.directories_failed.load(Ordering::Acquire),
        }
    }
}

fn spawn_directory<S: FileSink, D: HostDirectory>(walk: Arc<Walk<S>>, path: String, dir: D) {
    tokio::spawn(read_directory(walk, path, dir));
}

fn spawn_file<S: FileSink, F: HostFile>(walk: Arc<Walk<S>>, path: String, file: F) {
    tokio::spawn(async move {
        let result = match file.read().await {
            Ok(hosted) => walk.sink.submit(path.clone(), hosted).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(()) => {
                walk.files_added.fetch_add(1, Ordering::AcqRel);
            }
            Err(e) => {
                tracing::warn!("Failed to add {} ({})", path, e);
                walk.files_failed.fetch_add(1, Ordering::AcqRel);
            }
        }
        walk.finish_one();
    });
}

async fn read_directory<S: FileSink, D: HostDirectory>(
    walk: Arc<Walk<S>>,
    path: String,
    mut dir: D,
) {
    loop {
        match dir.read_entries().await {
            Ok(entries) if entries.is_empty() => break,
            Ok(entries) => spawn_entries(&walk, &path, entries),
            Err(e) => {
                tracing::warn!("Failed to read directory '{}' ({})", path, e);
                walk.directories_failed.fetch_add(1, Ordering::AcqRel);
                break;
            }
        }
    }

    walk.finish_one();
}

fn spawn_entries<S: FileSink, D: HostDirectory>(
    walk: &Arc<Walk<S>>,
    path: &str,
    entries: Vec<HostEntry<D>>,
) {
    for entry in entries {
        if entry.name().starts_with(walk.hidden_prefix) {
            continue;
        }

        let entry_path = format!("{}/{}", path, entry.name());
        walk.pending.fetch_add(1, Ordering::AcqRel);

        match entry {
            HostEntry::Directory { dir, .. } => {
                walk.directories.fetch_add(1, Ordering::AcqRel);
                spawn_directory(walk.clone(), entry_path, dir);
            }
            HostEntry::File { file, .. } => spawn_file(walk.clone(), entry_path, file),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    enum Node {
        Dir(&'static str, Vec<Node>),
        Broken(&'static str, usize, Vec<Node>),
        File(&'static str, &'static [u8]),
    }

    struct MemDir {
        nodes: std::vec::IntoIter<Node>,
        batch_size: usize,
        fail_after: Option<usize>,
    }

    struct MemFile {
        name: &'static str,
        bytes: &'static [u8],
    }

    impl MemDir {
        fn new(nodes: Vec<Node>) -> Self {
            Self {
                nodes: nodes.into_iter(),
                batch_size: 2,
                fail_after: None,
            }
        }

        /// A directory whose reads fail once `batches` batches were served.
        fn failing_after(nodes: Vec<Node>, batches: usize) -> Self {
            Self {
                fail_after: Some(batches),
                ..Self::new(nodes)
            }
        }
    }

    impl HostDirectory for MemDir {
        type File = MemFile;

        async fn read_entries(&mut self) -> io::Result<Vec<HostEntry<Self>>> {
            tokio::task::yield_now().await;
            if let Some(remaining) = self.fail_after.as_mut() {
                if *remaining == 0 {
                    return Err(io::Error::new(io::ErrorKind::NotFound, "gone"));
                }
                *remaining -= 1;
            }
            Ok(self
                .nodes
                .by_ref()
                .take(self.batch_size)
                .map(|node| match node {
                    Node::Dir(name, children) => HostEntry::Directory {
                        name: name.to_string(),
                        dir: MemDir::new(children),
                    },
                    Node::Broken(name, batches, children) => HostEntry::Directory {
                        name: name.to_string(),
                        dir: MemDir::failing_after(children, batches),
                    },
                    Node::File(name, bytes) => HostEntry::File {
                        name: name.to_string(),
                        file: MemFile { name, bytes },
                    },
                })
                .collect())
        }
    }

    impl HostFile for MemFile {
        async fn read(self) -> io::Result<HostedFile> {
            if self.name.starts_with("unreadable") {
                return Err(io::Error::other("permission denied"));
            }
            Ok(HostedFile::new(self.name, self.bytes))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        paths: Arc<Mutex<Vec<String>>>,
    }

    impl FileSink for RecordingSink {
        async fn submit(&self, path: String, _file: HostedFile) -> Result<()> {
            tokio::task::yield_now().await;
            if path.ends_with(".pak") {
                return Err(Error::ChannelClosed);
            }
            self.paths.lock().push(path);
            Ok(())
        }
    }

    fn tree() -> Vec<Node> {
        vec![
            Node::File("a.png", b"a"),
            Node::Dir(
                "tiles",
                vec![
                    Node::File("dirt.material", b"{}"),
                    Node::Dir("deep", vec![Node::Dir("deeper", vec![Node::File("x.ogg", b"x")])]),
                    Node::Dir("empty", vec![]),
                    Node::File("stone.material", b"{}"),
                ],
            ),
            Node::File(".hidden", b"h"),
            Node::Dir(".git", vec![Node::File("HEAD", b"ref")]),
            Node::File("b.png", b"b"),
        ]
    }

    #[tokio::test]
    async fn test_ingest_nested_tree() {
        let sink = RecordingSink::default();
        let report = Ingestor::new(sink.clone(), '.')
            .ingest("", MemDir::new(tree()))
            .await
            .unwrap();

        let mut paths = sink.paths.lock().clone();
        paths.sort();
        assert_eq!(
            paths,
            [
                "/a.png",
                "/b.png",
                "/tiles/deep/deeper/x.ogg",
                "/tiles/dirt.material",
                "/tiles/stone.material",
            ]
        );
        assert_eq!(
            report,
            IngestReport {
                files_added: 5,
                files_failed: 0,
                directories: 4,
                directories_failed: 0,
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_completion_waits_for_every_file() {
        let nodes = (0..50)
            .map(|_| Node::Dir("d", vec![Node::File("f1", b"1"), Node::File("f2", b"2")]))
            .collect();
        let sink = RecordingSink::default();
        let report = Ingestor::new(sink.clone(), '.')
            .ingest("/root", MemDir::new(nodes))
            .await
            .unwrap();

        assert_eq!(report.files_added, 100);
        assert_eq!(sink.paths.lock().len(), 100);
    }

    #[tokio::test]
    async fn test_failures_are_counted() {
        let nodes = vec![
            Node::File("ok.png", b"ok"),
            Node::File("unreadable.png", b""),
            Node::File("broken.pak", b"junk"),
        ];
        let sink = RecordingSink::default();
        let report = Ingestor::new(sink.clone(), '.')
            .ingest("", MemDir::new(nodes))
            .await
            .unwrap();

        assert_eq!(report.files_added, 1);
        assert_eq!(report.files_failed, 2);
        assert_eq!(*sink.paths.lock(), ["/ok.png"]);
    }

    #[tokio::test]
    async fn test_empty_root_completes() {
        let report = Ingestor::new(RecordingSink::default(), '.')
            .ingest("", MemDir::new(Vec::new()))
            .await
            .unwrap();
        assert_eq!(report, IngestReport::default());
    }

    #[tokio::test]
    async fn test_custom_hidden_prefix() {
        let nodes = vec![Node::File("_skip.png", b"s"), Node::File(".kept.png", b"k")];
        let sink = RecordingSink::default();
        Ingestor::new(sink.clone(), '_')
            .ingest("", MemDir::new(nodes))
            .await
            .unwrap();
        assert_eq!(*sink.paths.lock(), ["/.kept.png"]);
    }

    #[tokio::test]
    async fn test_unreadable_root_is_an_error() {
        let sink = RecordingSink::default();
        let result = Ingestor::new(sink.clone(), '.')
            .ingest("/mods", MemDir::failing_after(tree(), 0))
            .await;

        assert!(matches!(
            result,
            Err(Error::DirectoryReadFailed { ref path, .. }) if path == "/mods"
        ));
        assert!(sink.paths.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failed_subdirectories_are_counted() {
        let nodes = vec![
            Node::File("a.png", b"a"),
            Node::Broken(
                "half",
                1,
                vec![
                    Node::File("b.png", b"b"),
                    Node::File("c.png", b"c"),
                    Node::File("d.png", b"d"),
                ],
            ),
            Node::Broken("gone", 0, vec![Node::File("x.png", b"x")]),
        ];
        let sink = RecordingSink::default();
        let report = Ingestor::new(sink.clone(), '.')
            .ingest("", MemDir::new(nodes))
            .await
            .unwrap();

        assert_eq!(
            report,
            IngestReport {
                files_added: 3,
                files_failed: 0,
                directories: 2,
                directories_failed: 2,
            }
        );
    }
}
