//! Lifecycle of the storage subsystem: pick a backend, bring it up, tear it down.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::database::Database;
use crate::file::FileTileStore;
use crate::memory::MemoryTileStore;
use crate::postgres::DatabaseTileStore;
use crate::realtime::RealtimeDataStore;
use crate::{SetupError, TileStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    /// PNG files under the tiles directory.
    File,
    /// Database blobs; also enables realtime data.
    Database,
    /// Nothing survives a restart.
    Memory,
}

impl FromStr for StorageMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "file" | "fs" => Ok(StorageMode::File),
            "database" | "db" | "postgres" => Ok(StorageMode::Database),
            "memory" | "mem" => Ok(StorageMode::Memory),
            other => anyhow::bail!("unknown storage mode {:?}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub mode: StorageMode,
    pub tiles_dir: PathBuf,
    /// Holds `database.properties`.
    pub data_dir: PathBuf,
    /// Takes precedence over the url in `database.properties`.
    pub database_url: Option<String>,
    /// Replaces the default corrupted-tile warning (file mode); may use `{png}`.
    pub corrupted_tile_message: Option<String>,
}

/// Owns whichever tile backend is active plus, in database mode, the pool and
/// the realtime store sharing it.
#[derive(Default)]
pub struct MapStorage {
    tiles: Option<Arc<dyn TileStore>>,
    database: Option<Arc<Database>>,
    realtime: Option<Arc<RealtimeDataStore>>,
}

impl MapStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring storage up for `settings`, shutting down anything set up before.
    /// On error the subsystem is left down.
    pub async fn setup(&mut self, settings: &StorageSettings) -> Result<(), SetupError> {
        self.shutdown().await;

        match settings.mode {
            StorageMode::File => {
                std::fs::create_dir_all(&settings.tiles_dir).map_err(|source| SetupError::TileDir {
                    path: settings.tiles_dir.clone(),
                    source,
                })?;
                log::info!("Storing tiles as files under {}", settings.tiles_dir.display());
                let mut store = FileTileStore::new(&settings.tiles_dir);
                if let Some(message) = &settings.corrupted_tile_message {
                    store = store.with_corrupted_message(message.as_str());
                }
                self.tiles = Some(Arc::new(store));
            }
            StorageMode::Memory => {
                log::warn!("Using in-memory tile storage (tiles will be lost on exit!)");
                self.tiles = Some(Arc::new(MemoryTileStore::new()));
            }
            StorageMode::Database => {
                let config = DatabaseConfig::load(&settings.data_dir)?
                    .with_url_override(settings.database_url.clone());
                let db = Arc::new(Database::connect(&config).await?);
                self.tiles = Some(Arc::new(DatabaseTileStore::new(db.clone())));
                self.realtime = Some(Arc::new(RealtimeDataStore::new(db.clone())));
                self.database = Some(db);
            }
        }
        Ok(())
    }

    /// `None` until [`MapStorage::setup`] succeeds, and again after shutdown.
    pub fn tiles(&self) -> Option<Arc<dyn TileStore>> {
        self.tiles.clone()
    }

    /// Only available in database mode.
    pub fn realtime(&self) -> Option<Arc<RealtimeDataStore>> {
        self.realtime.clone()
    }

    pub fn database(&self) -> Option<&Arc<Database>> {
        self.database.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.tiles.is_some()
    }

    /// Tear everything down. A no-op when never set up or already shut down.
    pub async fn shutdown(&mut self) {
        self.realtime = None;
        if let Some(tiles) = self.tiles.take() {
            tiles.shutdown().await;
        }
        if let Some(db) = self.database.take() {
            db.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{blank_tile, TileKey};

    fn settings(mode: StorageMode, root: &std::path::Path) -> StorageSettings {
        StorageSettings {
            mode,
            tiles_dir: root.join("tiles"),
            data_dir: root.join("data"),
            database_url: None,
            corrupted_tile_message: None,
        }
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("file".parse::<StorageMode>().unwrap(), StorageMode::File);
        assert_eq!("Postgres".parse::<StorageMode>().unwrap(), StorageMode::Database);
        assert_eq!("memory".parse::<StorageMode>().unwrap(), StorageMode::Memory);
        assert!("redis".parse::<StorageMode>().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_without_setup() {
        let mut storage = MapStorage::new();
        storage.shutdown().await;
        storage.shutdown().await;
        assert!(!storage.is_running());
    }

    #[tokio::test]
    async fn test_setup_is_reentrant() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = MapStorage::new();

        storage.setup(&settings(StorageMode::Memory, dir.path())).await.unwrap();
        let key = TileKey::new("world", 0, 0, 0);
        let mut tile = blank_tile();
        tile.put_pixel(1, 1, image::Rgba([9, 9, 9, 255]));
        storage.tiles().unwrap().save(&tile, &key).await.unwrap();

        // Switching backends drops the old one.
        storage.setup(&settings(StorageMode::File, dir.path())).await.unwrap();
        assert!(dir.path().join("tiles").is_dir());
        assert_eq!(storage.tiles().unwrap().load(&key).await, blank_tile());
        assert!(storage.realtime().is_none());

        storage.shutdown().await;
        assert!(storage.tiles().is_none());
    }
}
