//! SPAK: a minimal length-prefixed package container
//!
//! ```text
//! "SPAK"                       magic
//! u32                          entry count
//! entry * count:
//!   u16 + [u8]                 inner path (UTF-8)
//!   u64                        absolute data offset
//!   u32                        data size
//! [u8]                         entry data
//! ```
//!
//! All integers are little-endian.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;

use super::{Package, PackageCodec};
use crate::error::{Error, Result};

/// Magic bytes at the start of every SPAK package.
pub const PACKAGE_MAGIC: [u8; 4] = *b"SPAK";

/// Size of the fixed part of an index entry (path length + offset + size).
const ENTRY_FIXED_SIZE: usize = 2 + 8 + 4;

/// Codec for SPAK packages.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimplePackageCodec;

impl PackageCodec for SimplePackageCodec {
    fn open(&self, bytes: Bytes) -> Result<Box<dyn Package>> {
        Ok(Box::new(SimplePackage::open(bytes)?))
    }
}

/// An opened SPAK package. Entry reads are zero-copy slices of the source bytes.
#[derive(Debug, Clone)]
pub struct SimplePackage {
    data: Bytes,
    index: Vec<String>,
    entries: HashMap<String, (usize, usize)>,
}

impl SimplePackage {
    /// Parse the package index.
    ///
    /// # Errors
    /// Returns an error if the magic is wrong, the index is truncated, or an
    /// entry points outside the data.
    pub fn open(data: Bytes) -> Result<Self> {
        let mut reader = Cursor::new(data.as_ref());

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != PACKAGE_MAGIC {
            return Err(Error::InvalidPackageMagic(magic));
        }

        let count = reader.read_u32::<LittleEndian>()? as usize;
        // The count is untrusted; never reserve more than the index could hold
        let remaining = data.len().saturating_sub(reader.position() as usize);
        let capacity = count.min(remaining / ENTRY_FIXED_SIZE);
        let mut index = Vec::with_capacity(capacity);
        let mut entries = HashMap::with_capacity(capacity);

        for _ in 0..count {
            let path_len = reader.read_u16::<LittleEndian>()? as usize;
            let mut path_bytes = vec![0u8; path_len];
            reader.read_exact(&mut path_bytes)?;
            let path = String::from_utf8(path_bytes)?;

            let offset = reader.read_u64::<LittleEndian>()?;
            let size = reader.read_u32::<LittleEndian>()?;

            let start = usize::try_from(offset).unwrap_or(usize::MAX);
            let end = start.checked_add(size as usize).filter(|end| *end <= data.len());
            let Some(end) = end else {
                return Err(Error::EntryOutOfBounds {
                    path,
                    offset,
                    size,
                    len: data.len(),
                });
            };

            if entries.insert(path.clone(), (start, end)).is_none() {
                index.push(path);
            }
        }

        tracing::debug!("Opened SPAK package with {} entries", index.len());

        Ok(Self {
            data,
            index,
            entries,
        })
    }
}

impl Package for SimplePackage {
    fn index(&self) -> &[String] {
        &self.index
    }

    fn get(&self, path: &str) -> Result<Bytes> {
        let (start, end) = self
            .entries
            .get(path)
            .ok_or_else(|| Error::FileNotFoundInPackage(path.to_string()))?;
        Ok(self.data.slice(*start..*end))
    }
}

/// Writes SPAK packages.
///
/// # Example
///
/// ```
/// use starfiles::package::{Package, SimplePackage, SimplePackageBuilder};
///
/// let bytes = SimplePackageBuilder::new()
///     .with_file("/tiles/dirt.material", br#"{"materialId": 1}"#.to_vec())
///     .build()?;
/// let package = SimplePackage::open(bytes.into())?;
/// assert_eq!(package.index(), ["/tiles/dirt.material"]);
/// # Ok::<(), starfiles::Error>(())
/// ```
#[derive(Debug, Default, Clone)]
pub struct SimplePackageBuilder {
    files: Vec<(String, Vec<u8>)>,
}

impl SimplePackageBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file and return the builder.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.add_file(path, data);
        self
    }

    /// Add a file.
    pub fn add_file(&mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.files.push((path.into(), data.into()));
    }

    /// Serialize the package.
    ///
    /// # Errors
    /// Returns an error if a path is longer than `u16::MAX` bytes or an entry
    /// is larger than `u32::MAX` bytes.
    pub fn build(&self) -> Result<Vec<u8>> {
        let header_size = 8 + self
            .files
            .iter()
            .map(|(path, _)| ENTRY_FIXED_SIZE + path.len())
            .sum::<usize>();
        let data_size: usize = self.files.iter().map(|(_, data)| data.len()).sum();

        let mut out = Vec::with_capacity(header_size + data_size);
        out.write_all(&PACKAGE_MAGIC)?;
        out.write_u32::<LittleEndian>(u32::try_from(self.files.len()).map_err(|_| {
            Error::InvalidFormat(format!("too many entries: {}", self.files.len()))
        })?)?;

        let mut offset = header_size as u64;
        for (path, data) in &self.files {
            let path_len = u16::try_from(path.len())
                .map_err(|_| Error::InvalidFormat(format!("path too long: {path}")))?;
            let size = u32::try_from(data.len())
                .map_err(|_| Error::InvalidFormat(format!("entry too large: {path}")))?;

            out.write_u16::<LittleEndian>(path_len)?;
            out.write_all(path.as_bytes())?;
            out.write_u64::<LittleEndian>(offset)?;
            out.write_u32::<LittleEndian>(size)?;
            offset += u64::from(size);
        }

        for (_, data) in &self.files {
            out.write_all(data)?;
        }

        Ok(out)
    }
}
