use anyhow::Result;
use async_trait::async_trait;
use image::RgbaImage;

pub mod codec;
pub mod config;
pub mod database;
mod error;
pub mod file;
pub mod manager;
pub mod memory;
pub mod postgres;
pub mod realtime;

pub use error::SetupError;

/// Side length of every tile image, in pixels.
pub const TILE_SIZE: u32 = 512;

/// Identifies one rendered tile.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct TileKey {
    pub world: String,
    pub x: i32,
    pub z: i32,
    pub zoom: i32,
}

impl TileKey {
    pub fn new(world: impl Into<String>, x: i32, z: i32, zoom: i32) -> Self {
        Self { world: world.into(), x, z, zoom }
    }
}

impl std::fmt::Display for TileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {},{} @{}", self.world, self.x, self.z, self.zoom)
    }
}

/// A fully transparent `TILE_SIZE` x `TILE_SIZE` image.
/// Stands in for every tile that was never rendered or can't be read.
pub fn blank_tile() -> RgbaImage {
    RgbaImage::new(TILE_SIZE, TILE_SIZE)
}

/// Where rendered tiles are persisted.
///
/// Backends never report a missing or unreadable tile to the caller:
/// `load` hands back [`blank_tile`] instead, and `save` logs its own failures.
/// The returned error from `save` only tells the caller the tile will need
/// to be rendered again.
#[async_trait]
pub trait TileStore: Send + Sync {
    /// Persist `image` under `key`, replacing whatever was stored before.
    async fn save(&self, image: &RgbaImage, key: &TileKey) -> Result<()>;

    /// Load the tile for `key`, or a blank tile.
    async fn load(&self, key: &TileKey) -> RgbaImage;

    /// Release backend resources. Safe to call more than once.
    async fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_tile_is_transparent() {
        let tile = blank_tile();
        assert_eq!(tile.dimensions(), (TILE_SIZE, TILE_SIZE));
        assert!(tile.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn test_tile_key_display() {
        let key = TileKey::new("world_nether", -3, 7, 2);
        assert_eq!(key.to_string(), "world_nether -3,7 @2");
    }
}
