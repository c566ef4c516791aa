//! Render progress: counters a render job exposes, and the estimator that
//! turns them into periodic "x% done, ETA hh:mm:ss" lines.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub mod estimator;
pub mod format;
pub mod timer;

pub use estimator::{ProgressEstimator, ProgressReport};
pub use format::ProgressMessages;
pub use timer::{ProgressTimer, TimerState};

/// What the estimator needs to know about a running render.
///
/// Counters are read from the timer thread while workers update them, so
/// implementations only need eventually-consistent values.
pub trait RenderJob: Send + Sync {
    fn world_name(&self) -> &str;
    fn processed_chunks(&self) -> u64;
    fn total_chunks(&self) -> u64;
    /// 0 when the job doesn't work region by region.
    fn processed_regions(&self) -> u64;
    /// 0 when the job doesn't work region by region.
    fn total_regions(&self) -> u64;
    fn is_paused(&self) -> bool;
}

/// Lock-free counters shared between render workers and the progress timer.
#[derive(Debug, Default)]
pub struct RenderCounters {
    world: String,
    pub total_chunks: AtomicU64,
    pub processed_chunks: AtomicU64,
    pub total_regions: AtomicU64,
    pub processed_regions: AtomicU64,
    paused: AtomicBool,
}

impl RenderCounters {
    pub fn new(world: impl Into<String>, total_chunks: u64, total_regions: u64) -> Self {
        Self {
            world: world.into(),
            total_chunks: AtomicU64::new(total_chunks),
            total_regions: AtomicU64::new(total_regions),
            ..Default::default()
        }
    }

    pub fn record_chunks(&self, count: u64) {
        self.processed_chunks.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_region(&self) {
        self.processed_regions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }
}

impl RenderJob for RenderCounters {
    fn world_name(&self) -> &str {
        &self.world
    }

    fn processed_chunks(&self) -> u64 {
        self.processed_chunks.load(Ordering::Relaxed)
    }

    fn total_chunks(&self) -> u64 {
        self.total_chunks.load(Ordering::Relaxed)
    }

    fn processed_regions(&self) -> u64 {
        self.processed_regions.load(Ordering::Relaxed)
    }

    fn total_regions(&self) -> u64 {
        self.total_regions.load(Ordering::Relaxed)
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }
}
