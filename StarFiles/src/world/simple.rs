//! SWLD: a minimal world container
//!
//! ```text
//! "SWLD"                       magic
//! u32 + [u8]                   metadata (JSON)
//! u32                          region count
//! region * count:
//!   u8 i32 i32                 layer, x, y
//!   u32 + [u8]                 region buffer
//! u32                          entity block count
//! block * count:
//!   i32 i32                    x, y
//!   u32 + [u8]                 entities (JSON)
//! ```
//!
//! All integers are little-endian.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use serde_json::Value;

use super::{World, WorldCodec};
use crate::error::{Error, Result};

/// Magic bytes at the start of every SWLD world.
pub const WORLD_MAGIC: [u8; 4] = *b"SWLD";

/// Codec for SWLD worlds.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleWorldCodec;

impl WorldCodec for SimpleWorldCodec {
    fn open(&self, bytes: Bytes) -> Result<Box<dyn World>> {
        Ok(Box::new(SimpleWorld::open(&bytes)?))
    }
}

/// An opened SWLD world.
#[derive(Debug, Clone)]
pub struct SimpleWorld {
    metadata: Value,
    regions: HashMap<(u8, i32, i32), Bytes>,
    entities: HashMap<(i32, i32), Value>,
}

impl SimpleWorld {
    /// Parse a world.
    ///
    /// # Errors
    /// Returns an error if the magic is wrong, the data is truncated, or a
    /// JSON section does not parse.
    pub fn open(data: &[u8]) -> Result<Self> {
        let mut reader = Cursor::new(data);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != WORLD_MAGIC {
            return Err(Error::InvalidWorldMagic(magic));
        }

        let metadata = serde_json::from_slice(&read_block(&mut reader)?)?;

        let region_count = reader.read_u32::<LittleEndian>()?;
        let mut regions = HashMap::new();
        for _ in 0..region_count {
            let layer = reader.read_u8()?;
            let x = reader.read_i32::<LittleEndian>()?;
            let y = reader.read_i32::<LittleEndian>()?;
            regions.insert((layer, x, y), Bytes::from(read_block(&mut reader)?));
        }

        let entity_count = reader.read_u32::<LittleEndian>()?;
        let mut entities = HashMap::new();
        for _ in 0..entity_count {
            let x = reader.read_i32::<LittleEndian>()?;
            let y = reader.read_i32::<LittleEndian>()?;
            entities.insert((x, y), serde_json::from_slice(&read_block(&mut reader)?)?);
        }

        Ok(Self {
            metadata,
            regions,
            entities,
        })
    }
}

impl World for SimpleWorld {
    fn metadata(&self) -> Result<Value> {
        Ok(self.metadata.clone())
    }

    fn region_data(&self, layer: u8, x: i32, y: i32) -> Result<Vec<u8>> {
        self.regions
            .get(&(layer, x, y))
            .map(|buffer| buffer.to_vec())
            .ok_or(Error::RegionNotFound { layer, x, y })
    }

    fn entities(&self, x: i32, y: i32) -> Result<Value> {
        // Regions without entities are common; they read as an empty list
        Ok(self
            .entities
            .get(&(x, y))
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new())))
    }
}

fn read_block(reader: &mut Cursor<&[u8]>) -> Result<Vec<u8>> {
    let len = reader.read_u32::<LittleEndian>()? as usize;
    let remaining = reader.get_ref().len().saturating_sub(reader.position() as usize);
    if len > remaining {
        return Err(Error::InvalidFormat(format!(
            "block of {len} bytes exceeds remaining {remaining}"
        )));
    }
    let mut block = vec![0u8; len];
    reader.read_exact(&mut block)?;
    Ok(block)
}

fn write_block(out: &mut Vec<u8>, block: &[u8]) -> Result<()> {
    let len = u32::try_from(block.len())
        .map_err(|_| Error::InvalidFormat(format!("block too large: {}", block.len())))?;
    out.write_u32::<LittleEndian>(len)?;
    out.write_all(block)?;
    Ok(())
}

/// Writes SWLD worlds.
#[derive(Debug, Clone)]
pub struct SimpleWorldBuilder {
    metadata: Value,
    regions: Vec<((u8, i32, i32), Vec<u8>)>,
    entities: Vec<((i32, i32), Value)>,
}

impl SimpleWorldBuilder {
    /// Create a builder with the given metadata document.
    #[must_use]
    pub fn new(metadata: Value) -> Self {
        Self {
            metadata,
            regions: Vec::new(),
            entities: Vec::new(),
        }
    }

    /// Add a region buffer.
    #[must_use]
    pub fn with_region(mut self, layer: u8, x: i32, y: i32, data: impl Into<Vec<u8>>) -> Self {
        self.regions.push(((layer, x, y), data.into()));
        self
    }

    /// Add the entity document for a region.
    #[must_use]
    pub fn with_entities(mut self, x: i32, y: i32, entities: Value) -> Self {
        self.entities.push(((x, y), entities));
        self
    }

    /// Serialize the world.
    ///
    /// # Errors
    /// Returns an error if a block exceeds `u32::MAX` bytes.
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.write_all(&WORLD_MAGIC)?;
        write_block(&mut out, &serde_json::to_vec(&self.metadata)?)?;

        out.write_u32::<LittleEndian>(self.regions.len() as u32)?;
        for ((layer, x, y), data) in &self.regions {
            out.write_u8(*layer)?;
            out.write_i32::<LittleEndian>(*x)?;
            out.write_i32::<LittleEndian>(*y)?;
            write_block(&mut out, data)?;
        }

        out.write_u32::<LittleEndian>(self.entities.len() as u32)?;
        for ((x, y), entities) in &self.entities {
            out.write_i32::<LittleEndian>(*x)?;
            out.write_i32::<LittleEndian>(*y)?;
            write_block(&mut out, &serde_json::to_vec(entities)?)?;
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> Vec<u8> {
        SimpleWorldBuilder::new(json!({"worldTemplate": {"size": [3000, 2000]}}))
            .with_region(1, 0, 0, vec![7; 16])
            .with_region(1, -1, 2, vec![9; 4])
            .with_entities(0, 0, json!([{"type": "ObjectEntity"}]))
            .build()
            .unwrap()
    }

    #[test]
    fn test_metadata() {
        let world = SimpleWorld::open(&sample()).unwrap();
        assert_eq!(
            world.metadata().unwrap(),
            json!({"worldTemplate": {"size": [3000, 2000]}})
        );
    }

    #[test]
    fn test_region_data() {
        let world = SimpleWorld::open(&sample()).unwrap();
        assert_eq!(world.region_data(1, -1, 2).unwrap(), vec![9; 4]);
        assert!(matches!(
            world.region_data(2, 0, 0),
            Err(Error::RegionNotFound { layer: 2, x: 0, y: 0 })
        ));
    }

    #[test]
    fn test_entities_default_to_empty() {
        let world = SimpleWorld::open(&sample()).unwrap();
        assert_eq!(world.entities(0, 0).unwrap(), json!([{"type": "ObjectEntity"}]));
        assert_eq!(world.entities(5, 5).unwrap(), json!([]));
    }

    #[test]
    fn test_invalid_magic() {
        assert!(matches!(
            SimpleWorld::open(b"SPAK"),
            Err(Error::InvalidWorldMagic(_))
        ));
    }
}
