use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::format::{fill, format_eta, format_hms, ProgressMessages};
use crate::RenderJob;

/// Number of recent ticks behind the short-term rate.
pub const ROLLING_WINDOW: usize = 15;

/// Throughput and ETA bookkeeping for one render job.
///
/// Pure state: something else decides when to call [`ProgressEstimator::tick`]
/// (see [`crate::ProgressTimer`]), which keeps it usable with any clock.
pub struct ProgressEstimator {
    job: Arc<dyn RenderJob>,
    started: Instant,
    previous: u64,
    rolling: [i64; ROLLING_WINDOW],
    index: usize,
    history: Vec<i64>,
}

/// Snapshot produced by one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub world: String,
    pub current_regions: u64,
    pub total_regions: u64,
    pub current_chunks: u64,
    pub total_chunks: u64,
    /// 0.0..=1.0 normally; 0.0 when the job has no chunks.
    pub percent: f64,
    pub elapsed: Duration,
    /// `None` until some progress has been observed.
    pub eta: Option<Duration>,
    /// Chunks per tick over the rolling window.
    pub rate: f64,
}

impl ProgressEstimator {
    pub fn new(job: Arc<dyn RenderJob>, started: Instant) -> Self {
        let previous = job.processed_chunks();
        Self {
            job,
            started,
            previous,
            rolling: [0; ROLLING_WINDOW],
            index: 0,
            history: Vec::new(),
        }
    }

    /// Sample the job. Returns `None` (and changes nothing) while it is paused.
    pub fn tick(&mut self, now: Instant) -> Option<ProgressReport> {
        if self.job.is_paused() {
            return None;
        }

        let current = self.job.processed_chunks();
        let delta = current as i64 - self.previous as i64;
        self.previous = current;

        self.rolling[self.index] = delta;
        self.index = (self.index + 1) % ROLLING_WINDOW;
        self.history.push(delta);

        let total = self.job.total_chunks();
        let percent = if total == 0 { 0.0 } else { current as f64 / total as f64 };

        Some(ProgressReport {
            world: self.job.world_name().to_string(),
            current_regions: self.job.processed_regions(),
            total_regions: self.job.total_regions(),
            current_chunks: current,
            total_chunks: total,
            percent,
            elapsed: now.saturating_duration_since(self.started),
            eta: if total == 0 { None } else { self.eta(total.saturating_sub(current)) },
            rate: self.short_term_rate(),
        })
    }

    /// Mean of the non-zero deltas in the rolling window.
    /// Stalled ticks are skipped so a pause in output doesn't drag it to zero.
    pub fn short_term_rate(&self) -> f64 {
        mean_non_zero(&self.rolling)
    }

    /// Mean non-zero delta over the whole run, in chunks per millisecond.
    pub fn long_term_rate_per_ms(&self) -> f64 {
        mean_non_zero(&self.history) / 1000.0
    }

    pub fn history(&self) -> &[i64] {
        &self.history
    }

    fn eta(&self, chunks_left: u64) -> Option<Duration> {
        let rate = self.long_term_rate_per_ms();
        if rate <= 0.0 {
            return None;
        }
        let millis = chunks_left as f64 / rate;
        millis.is_finite().then(|| Duration::from_millis(millis as u64))
    }
}

fn mean_non_zero(values: &[i64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|&&v| v != 0)
        .fold((0i64, 0u64), |(sum, count), &v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum as f64 / count as f64 }
}

impl ProgressReport {
    pub fn tracks_regions(&self) -> bool {
        self.total_regions > 0
    }

    pub fn render(&self, messages: &ProgressMessages) -> String {
        let template = if self.tracks_regions() {
            &messages.progress_with_regions
        } else {
            &messages.progress
        };
        let current_regions = self.current_regions.to_string();
        let total_regions = self.total_regions.to_string();
        let current_chunks = self.current_chunks.to_string();
        let total_chunks = self.total_chunks.to_string();
        let percent = format!("{:.2}%", self.percent * 100.0);
        let elapsed = format_hms(self.elapsed);
        let eta = format_eta(self.eta);
        let rate = format!("{:.1}", self.rate);
        fill(
            template,
            &[
                ("world", self.world.as_str()),
                ("current_regions", &current_regions),
                ("total_regions", &total_regions),
                ("current_chunks", &current_chunks),
                ("total_chunks", &total_chunks),
                ("percent", &percent),
                ("elapsed", &elapsed),
                ("eta", &eta),
                ("rate", &rate),
            ],
        )
    }
}
