use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::RgbaImage;

use crate::codec::{decode_tile, encode_png};
use crate::database::Database;
use crate::{blank_tile, TileKey, TileStore};

/// Tiles as PNG blobs in a table keyed by (world, x, z, zoom).
pub struct DatabaseTileStore {
    db: Arc<Database>,
}

impl DatabaseTileStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn upsert(&self, blob: &[u8], key: &TileKey) -> Result<()> {
        let client = self.db.client().await?;
        let query = &self.db.queries().upsert_tile;
        let stmt = client.prepare_cached(query).await.context("Failed to prepare tile upsert")?;
        client
            .execute(&stmt, &[&key.world, &key.x, &key.z, &key.zoom, &blob])
            .await
            .with_context(|| format!("Failed to execute `{}`", query))?;
        Ok(())
    }

    async fn fetch(&self, key: &TileKey) -> Result<Option<Vec<u8>>> {
        let client = self.db.client().await?;
        let query = &self.db.queries().select_tile;
        let stmt = client.prepare_cached(query).await.context("Failed to prepare tile select")?;
        let row = client
            .query_opt(&stmt, &[&key.world, &key.x, &key.z, &key.zoom])
            .await
            .with_context(|| format!("Failed to execute `{}`", query))?;
        match row {
            Some(row) => Ok(Some(row.try_get(0)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TileStore for DatabaseTileStore {
    async fn save(&self, image: &RgbaImage, key: &TileKey) -> Result<()> {
        let result = match encode_png(image) {
            Ok(blob) => self.upsert(&blob, key).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            log::error!("Unable to update or insert tile {}: {:?}", key, e);
        } else {
            log::debug!("Tile {} saved to DB", key);
        }
        result
    }

    async fn load(&self, key: &TileKey) -> RgbaImage {
        match self.fetch(key).await {
            Ok(Some(blob)) => decode_tile(&blob).unwrap_or_else(|e| {
                log::warn!("Stored tile {} can't be decoded, using a blank tile: {}", key, e);
                blank_tile()
            }),
            Ok(None) => blank_tile(),
            Err(e) => {
                log::error!("Unable to load tile {}: {:?}", key, e);
                blank_tile()
            }
        }
    }

    async fn shutdown(&self) {
        self.db.shutdown();
    }
}
