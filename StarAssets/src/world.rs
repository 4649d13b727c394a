//! Open world state of one replica

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use starfiles::world::{World, WorldCodec};

use crate::error::{Error, Result};

/// Layer that holds tile data in a world container.
pub const TILE_LAYER: u8 = 1;

/// A region buffer and its entities.
///
/// `buffer` is moved out of the replica into the response; it is never copied
/// on the way back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionData {
    /// Raw region bytes.
    pub buffer: Vec<u8>,
    /// Entities stored in the region.
    pub entities: Value,
}

/// Holds at most one open world.
pub struct WorldManager {
    codec: Arc<dyn WorldCodec>,
    world: Option<Box<dyn World>>,
    metadata: Option<Value>,
}

impl WorldManager {
    /// Create a manager that opens worlds with `codec`.
    pub fn new(codec: Arc<dyn WorldCodec>) -> Self {
        Self {
            codec,
            world: None,
            metadata: None,
        }
    }

    /// Open a world and return its metadata.
    pub fn open(&mut self, bytes: Bytes) -> Result<Value> {
        if self.world.is_some() {
            return Err(Error::WorldAlreadyOpen);
        }

        let world = self.codec.open(bytes).map_err(Error::World)?;
        let metadata = world.metadata().map_err(Error::World)?;

        self.world = Some(world);
        self.metadata = Some(metadata.clone());
        Ok(metadata)
    }

    /// Metadata of the open world.
    pub fn metadata(&self) -> Option<&Value> {
        self.metadata.as_ref()
    }

    /// Whether a world is open.
    pub fn is_open(&self) -> bool {
        self.world.is_some()
    }

    /// Tile buffer and entities for the region at `(x, y)`.
    pub fn region(&self, x: i32, y: i32) -> Result<RegionData> {
        let world = self.world.as_ref().ok_or(Error::WorldNotOpen)?;

        // TODO: cache decoded regions once callers start revisiting them
        let buffer = world.region_data(TILE_LAYER, x, y).map_err(Error::World)?;
        let entities = world.entities(x, y).map_err(Error::World)?;
        Ok(RegionData { buffer, entities })
    }
}

impl std::fmt::Debug for WorldManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldManager")
            .field("open", &self.is_open())
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}
