//! Filesystem tile backend: one PNG per tile at `<root>/<world>/<zoom>/<x>_<z>.png`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::RgbaImage;

use crate::codec::{decode_tile, encode_png};
use crate::{blank_tile, TileKey, TileStore};

/// Warning logged when a corrupted tile is thrown away. `{png}` is the file name.
pub const DEFAULT_CORRUPTED_TILE_MESSAGE: &str =
    "Found corrupted tile {png}; it was deleted and will be rendered again";

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

pub struct FileTileStore {
    root: PathBuf,
    corrupted_message: String,
}

impl FileTileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            corrupted_message: DEFAULT_CORRUPTED_TILE_MESSAGE.to_string(),
        }
    }

    /// Override the corrupted-tile warning. The template may use `{png}`.
    pub fn with_corrupted_message(mut self, template: impl Into<String>) -> Self {
        self.corrupted_message = template.into();
        self
    }

    pub fn tile_dir(&self, world: &str, zoom: i32) -> PathBuf {
        self.root.join(world).join(zoom.to_string())
    }

    pub fn tile_path(&self, key: &TileKey) -> PathBuf {
        self.tile_dir(&key.world, key.zoom).join(file_name(key))
    }

    /// The corrupted-tile warning for `key`, with `{png}` filled in.
    pub fn corrupted_warning(&self, key: &TileKey) -> String {
        self.corrupted_message.replace("{png}", &file_name(key))
    }
}

fn file_name(key: &TileKey) -> String {
    format!("{}_{}.png", key.x, key.z)
}

#[async_trait]
impl TileStore for FileTileStore {
    async fn save(&self, image: &RgbaImage, key: &TileKey) -> Result<()> {
        let path = self.tile_path(key);
        let result: Result<()> = async {
            let blob = encode_png(image)?;
            let dir = self.tile_dir(&key.world, key.zoom);
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create tile directory {}", dir.display()))?;

            // Write next to the target and swap it in, so readers never see half a PNG.
            let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
            let tmp = path.with_extension(format!("png.{}.tmp", seq));
            let written = match tokio::fs::write(&tmp, &blob).await {
                Ok(()) => tokio::fs::rename(&tmp, &path)
                    .await
                    .with_context(|| format!("Failed to move tile into place at {}", path.display())),
                Err(e) => Err(e).with_context(|| format!("Failed to write {}", tmp.display())),
            };
            if written.is_err() {
                if let Err(e) = tokio::fs::remove_file(&tmp).await {
                    log::debug!("Unable to remove {}: {}", tmp.display(), e);
                }
            }
            written
        }
        .await;

        if let Err(e) = &result {
            log::error!("Unable to save tile {}: {:?}", file_name(key), e);
        }
        result
    }

    async fn load(&self, key: &TileKey) -> RgbaImage {
        let path = self.tile_path(key);

        // Missing is the normal case for anything not rendered yet.
        match tokio::fs::try_exists(&path).await {
            Ok(true) => {}
            Ok(false) => return blank_tile(),
            Err(e) => {
                log::error!("Unable to check tile {}: {}", path.display(), e);
                return blank_tile();
            }
        }

        let blob = match tokio::fs::read(&path).await {
            Ok(blob) => blob,
            Err(e) => {
                log::error!("Unable to read tile {}: {}", path.display(), e);
                return blank_tile();
            }
        };

        match decode_tile(&blob) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("{} ({})", self.corrupted_warning(key), e);
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    log::error!("Unable to delete corrupted tile {}: {}", path.display(), e);
                }
                blank_tile()
            }
        }
    }
}
