//! Host directory adapter over the local filesystem

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::ReadDir;

use super::{HostDirectory, HostEntry, HostFile};
use crate::db::HostedFile;

const DEFAULT_BATCH_SIZE: usize = 64;

/// A filesystem directory enumerated lazily in batches.
#[derive(Debug)]
pub struct FsDirectory {
    path: PathBuf,
    reader: Option<ReadDir>,
    batch_size: usize,
}

impl FsDirectory {
    /// Open `path` for enumeration. Nothing is read until the first batch.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reader: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the maximum number of entries per batch.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Directory being enumerated.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HostDirectory for FsDirectory {
    type File = FsFile;

    async fn read_entries(&mut self) -> io::Result<Vec<HostEntry<Self>>> {
        if self.reader.is_none() {
            self.reader = Some(tokio::fs::read_dir(&self.path).await?);
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        while entries.len() < self.batch_size {
            let Some(entry) = reader.next_entry().await? else {
                break;
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry.file_type().await?;

            if file_type.is_dir() {
                entries.push(HostEntry::Directory {
                    name,
                    dir: FsDirectory::new(entry.path()).with_batch_size(self.batch_size),
                });
            } else if file_type.is_file() {
                entries.push(HostEntry::File {
                    file: FsFile {
                        path: entry.path(),
                        name: name.clone(),
                    },
                    name,
                });
            }
        }

        Ok(entries)
    }
}

/// A file on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsFile {
    path: PathBuf,
    name: String,
}

impl HostFile for FsFile {
    async fn read(self) -> io::Result<HostedFile> {
        let bytes = tokio::fs::read(&self.path).await?;
        Ok(HostedFile::new(self.name, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{FileSink, Ingestor};
    use crate::error::{Error, Result};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct CollectingSink {
        files: Arc<Mutex<Vec<(String, HostedFile)>>>,
    }

    impl FileSink for CollectingSink {
        async fn submit(&self, path: String, file: HostedFile) -> Result<()> {
            self.files.lock().push((path, file));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_batches_cover_whole_directory() {
        let temp = tempfile::tempdir().unwrap();
        for i in 0u8..5 {
            std::fs::write(temp.path().join(format!("{i}.txt")), [i]).unwrap();
        }

        let mut dir = FsDirectory::new(temp.path()).with_batch_size(2);
        let mut total = 0;
        loop {
            let batch = dir.read_entries().await.unwrap();
            if batch.is_empty() {
                break;
            }
            assert!(batch.len() <= 2);
            total += batch.len();
        }
        assert_eq!(total, 5);
    }

    #[tokio::test]
    async fn test_ingest_real_tree() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("music/battle")).unwrap();
        std::fs::create_dir_all(temp.path().join(".cache")).unwrap();
        std::fs::write(temp.path().join("music/battle/boss.ogg"), b"OggS").unwrap();
        std::fs::write(temp.path().join("readme.txt"), b"hi").unwrap();
        std::fs::write(temp.path().join(".cache/junk"), b"x").unwrap();

        let sink = CollectingSink::default();
        let report = Ingestor::new(sink.clone(), '.')
            .ingest("", FsDirectory::new(temp.path()).with_batch_size(1))
            .await
            .unwrap();

        assert_eq!(report.files_added, 2);
        let mut files = sink.files.lock().clone();
        files.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(files[0].0, "/music/battle/boss.ogg");
        assert_eq!(files[0].1.name, "boss.ogg");
        assert_eq!(files[0].1.bytes.as_ref(), b"OggS");
        assert_eq!(files[1].0, "/readme.txt");
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let mut dir = FsDirectory::new(temp.path().join("nope"));
        assert!(dir.read_entries().await.is_err());
    }

    #[tokio::test]
    async fn test_ingest_missing_root_fails() {
        let temp = tempfile::tempdir().unwrap();
        let sink = CollectingSink::default();
        let result = Ingestor::new(sink.clone(), '.')
            .ingest("", FsDirectory::new(temp.path().join("typo")))
            .await;

        assert!(matches!(result, Err(Error::DirectoryReadFailed { .. })));
        assert!(sink.files.lock().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_empty_root_succeeds() {
        let temp = tempfile::tempdir().unwrap();
        let report = Ingestor::new(CollectingSink::default(), '.')
            .ingest("", FsDirectory::new(temp.path()))
            .await
            .unwrap();
        assert_eq!(report.files_added, 0);
        assert_eq!(report.directories_failed, 0);
    }
}
