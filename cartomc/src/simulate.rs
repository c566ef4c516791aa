//! Synthetic render: workers walk regions chunk by chunk, write one tile per
//! region and bump the counters the progress timer samples.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Args;
use image::{Rgba, RgbaImage};

use cartomc_progress::{ProgressMessages, ProgressTimer, RenderCounters};
use cartomc_storage::{TileKey, TileStore, TILE_SIZE};

/// Chunks along one side of a region.
const REGION_CHUNKS: u64 = 32;

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    #[arg(long, default_value = "world")]
    pub world: String,

    /// Regions to render, laid out in a square around 0,0
    #[arg(long, default_value = "16")]
    pub regions: u64,

    /// Concurrent render workers
    #[arg(long, default_value = "4")]
    pub workers: usize,

    /// Seconds between progress lines; 0 disables them
    #[arg(long, env = "PROGRESS_INTERVAL", default_value = "1")]
    pub interval: i64,

    /// Simulated work per row of 32 chunks
    #[arg(long, default_value = "5")]
    pub row_delay_ms: u64,

    #[arg(long, default_value = "0")]
    pub zoom: i32,
}

#[derive(Debug, Default)]
pub struct SimulationSummary {
    pub saved: u64,
    pub failed: u64,
}

pub async fn run(args: &SimulateArgs, tiles: Arc<dyn TileStore>) -> Result<()> {
    let started = Instant::now();
    let summary = render(args, tiles, ProgressMessages::default()).await;
    println!(
        "Rendered {} regions of {} in {:.2?}: {} tiles saved, {} failed",
        args.regions,
        args.world,
        started.elapsed(),
        summary.saved,
        summary.failed
    );
    Ok(())
}

pub async fn render(args: &SimulateArgs, tiles: Arc<dyn TileStore>, messages: ProgressMessages) -> SimulationSummary {
    let counters = Arc::new(RenderCounters::new(
        args.world.clone(),
        args.regions * REGION_CHUNKS * REGION_CHUNKS,
        args.regions,
    ));
    let mut timer = ProgressTimer::start(counters.clone(), args.interval, messages);

    let next_region = Arc::new(AtomicU64::new(0));
    let saved = Arc::new(AtomicU64::new(0));
    let failed = Arc::new(AtomicU64::new(0));
    let side = (args.regions as f64).sqrt().ceil().max(1.0) as u64;

    let mut handles = Vec::with_capacity(args.workers);
    for _ in 0..args.workers.max(1) {
        let args = args.clone();
        let tiles = tiles.clone();
        let counters = counters.clone();
        let next_region = next_region.clone();
        let saved = saved.clone();
        let failed = failed.clone();

        handles.push(tokio::spawn(async move {
            loop {
                let index = next_region.fetch_add(1, Ordering::Relaxed);
                if index >= args.regions {
                    break;
                }
                let half = (side / 2) as i32;
                let rx = (index % side) as i32 - half;
                let rz = (index / side) as i32 - half;

                for _ in 0..REGION_CHUNKS {
                    tokio::time::sleep(Duration::from_millis(args.row_delay_ms)).await;
                    counters.record_chunks(REGION_CHUNKS);
                }

                let key = TileKey::new(args.world.as_str(), rx, rz, args.zoom);
                // Failed saves are logged by the store; the tile just gets rendered next time.
                match tiles.save(&region_tile(rx, rz), &key).await {
                    Ok(()) => saved.fetch_add(1, Ordering::Relaxed),
                    Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                };
                counters.record_region();
            }
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            log::error!("Render worker stopped unexpectedly: {}", e);
        }
    }
    timer.cancel();

    SimulationSummary {
        saved: saved.load(Ordering::Relaxed),
        failed: failed.load(Ordering::Relaxed),
    }
}

/// Stand-in for the real compositor: a gradient tinted by region position.
fn region_tile(rx: i32, rz: i32) -> RgbaImage {
    let tint_r = (rx.rem_euclid(8) * 32) as u8;
    let tint_b = (rz.rem_euclid(8) * 32) as u8;
    RgbaImage::from_fn(TILE_SIZE, TILE_SIZE, |px, pz| {
        let shade = ((px + pz) * 255 / (2 * TILE_SIZE)) as u8;
        Rgba([tint_r, shade, tint_b, 255])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartomc_storage::memory::MemoryTileStore;

    #[tokio::test]
    async fn test_render_saves_one_tile_per_region() {
        let store = Arc::new(MemoryTileStore::new());
        let args = SimulateArgs {
            world: "world".to_string(),
            regions: 9,
            workers: 3,
            interval: 0,
            row_delay_ms: 0,
            zoom: 0,
        };

        let summary = render(&args, store.clone(), ProgressMessages::default()).await;
        assert_eq!(summary.saved, 9);
        assert_eq!(summary.failed, 0);
        assert_eq!(store.len(), 9);
        assert!(store.contains(&TileKey::new("world", -1, -1, 0)));
        assert!(store.contains(&TileKey::new("world", 1, 1, 0)));

        let tile = store.load(&TileKey::new("world", 1, 1, 0)).await;
        assert_eq!(tile, region_tile(1, 1));
    }
}
