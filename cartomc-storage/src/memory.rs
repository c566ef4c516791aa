//! Tile backend that keeps encoded PNGs in process memory.
//!
//! Nothing survives the process; meant for tests and throwaway renders.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use anyhow::Result;
use async_trait::async_trait;
use image::RgbaImage;

use crate::codec::{decode_tile, encode_png};
use crate::{blank_tile, TileKey, TileStore};

/// In-memory tile storage using a thread-safe HashMap.
///
/// Tiles are kept as encoded PNG blobs, the same bytes the other backends
/// persist, so a blob that fails to decode behaves exactly like a corrupted
/// file: it is dropped and the tile reads back blank.
pub struct MemoryTileStore {
    tiles: RwLock<HashMap<TileKey, Vec<u8>>>,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self {
            tiles: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.tiles.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.tiles.read().unwrap_or_else(PoisonError::into_inner).contains_key(key)
    }

    /// Store raw bytes under `key` without encoding them.
    pub fn insert_blob(&self, key: TileKey, blob: Vec<u8>) {
        self.tiles.write().unwrap_or_else(PoisonError::into_inner).insert(key, blob);
    }
}

impl Default for MemoryTileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TileStore for MemoryTileStore {
    async fn save(&self, image: &RgbaImage, key: &TileKey) -> Result<()> {
        let blob = encode_png(image).inspect_err(|e| {
            log::error!("Unable to save tile {}: {:?}", key, e);
        })?;
        self.insert_blob(key.clone(), blob);
        Ok(())
    }

    async fn load(&self, key: &TileKey) -> RgbaImage {
        let blob = self.tiles.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned();
        let Some(blob) = blob else {
            return blank_tile();
        };
        match decode_tile(&blob) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("Dropping corrupted tile {}: {}", key, e);
                self.tiles.write().unwrap_or_else(PoisonError::into_inner).remove(key);
                blank_tile()
            }
        }
    }

    async fn shutdown(&self) {
        self.tiles.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
