//! Video tile binding table
//!
//! The meeting service delivers at most a fixed number of remote video
//! streams at once. Each vendor tile is bound to one of that many rendering
//! slots; a slot must be released before another tile can take it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{Result, SessionError};
use crate::types::{AttendeeId, TileId};

/// Simultaneous remote video tiles allowed by the meeting service
pub const DEFAULT_MAX_VIDEO_TILES: usize = 16;

/// Tile metadata reported by the meeting service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoTileState {
    pub tile_id: TileId,
    pub attendee_id: Option<AttendeeId>,
    pub local_tile: bool,
    pub is_content: bool,
    pub paused: bool,
}

/// A tile bound to a rendering slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileBinding {
    pub tile: VideoTileState,
    /// Index of the rendering surface, in `0..capacity`
    pub slot: usize,
}

/// Fixed-capacity tile to slot table
#[derive(Debug)]
pub struct VideoTileTable {
    slots: Vec<Option<TileId>>,
    bindings: HashMap<TileId, TileBinding>,
}

impl VideoTileTable {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_VIDEO_TILES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            bindings: HashMap::with_capacity(capacity),
        }
    }

    /// Bind a tile to the lowest free slot.
    ///
    /// A tile that is already bound keeps its slot and has its metadata
    /// refreshed. When every slot is taken this fails with
    /// [`SessionError::ResourceExhausted`] and the table is unchanged.
    pub fn bind(&mut self, tile: VideoTileState) -> Result<TileBinding> {
        if let Some(existing) = self.bindings.get_mut(&tile.tile_id) {
            existing.tile = tile;
            return Ok(existing.clone());
        }

        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or_else(|| SessionError::resource_exhausted("video tile", self.slots.len()))?;

        self.slots[slot] = Some(tile.tile_id);
        let binding = TileBinding { tile, slot };
        self.bindings.insert(binding.tile.tile_id, binding.clone());
        debug!(tile_id = %binding.tile.tile_id, slot, "Bound video tile");
        Ok(binding)
    }

    /// Release a tile's slot. Unknown tiles return `None`.
    pub fn release(&mut self, tile_id: TileId) -> Option<TileBinding> {
        let binding = self.bindings.remove(&tile_id)?;
        self.slots[binding.slot] = None;
        debug!(tile_id = %tile_id, slot = binding.slot, "Released video tile");
        Some(binding)
    }

    pub fn get(&self, tile_id: TileId) -> Option<&TileBinding> {
        self.bindings.get(&tile_id)
    }

    /// Tile currently rendered in `slot`
    pub fn tile_in_slot(&self, slot: usize) -> Option<TileId> {
        self.slots.get(slot).copied().flatten()
    }

    /// Tiles showing a given attendee
    pub fn tiles_for_attendee(&self, attendee_id: &AttendeeId) -> Vec<TileId> {
        let mut tiles: Vec<TileId> = self
            .bindings
            .values()
            .filter(|b| b.tile.attendee_id.as_ref() == Some(attendee_id))
            .map(|b| b.tile.tile_id)
            .collect();
        tiles.sort();
        tiles
    }

    pub fn bindings(&self) -> Vec<TileBinding> {
        let mut all: Vec<TileBinding> = self.bindings.values().cloned().collect();
        all.sort_by_key(|b| b.slot);
        all
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.bindings.len() >= self.slots.len()
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.bindings.clear();
    }
}

impl Default for VideoTileTable {
    fn default() -> Self {
        Self::new()
    }
}
