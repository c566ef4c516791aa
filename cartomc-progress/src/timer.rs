use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::estimator::{ProgressEstimator, ProgressReport};
use crate::format::ProgressMessages;
use crate::RenderJob;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Constructed but not ticking. Covers the idle state before scheduling and a
    /// timer whose interval disabled reporting.
    Armed,
    Running,
    /// Stopped for good.
    Cancelled,
}

/// Drives a [`ProgressEstimator`] for one render job on a tokio interval.
///
/// Ticks run one after another on their own task, so a slow log sink or a
/// busy worker pool never overlaps two samples. Dropping the timer cancels it.
pub struct ProgressTimer {
    state: TimerState,
    task: Option<JoinHandle<()>>,
}

impl ProgressTimer {
    /// Start reporting every `interval_secs` seconds through `log::info!`.
    /// An interval of zero or less leaves the timer armed but idle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(job: Arc<dyn RenderJob>, interval_secs: i64, messages: ProgressMessages) -> Self {
        Self::start_with(job, interval_secs, move |report| {
            log::info!("{}", report.render(&messages));
        })
    }

    /// Like [`ProgressTimer::start`] but hands every report to `on_report`.
    pub fn start_with<F>(job: Arc<dyn RenderJob>, interval_secs: i64, mut on_report: F) -> Self
    where
        F: FnMut(ProgressReport) + Send + 'static,
    {
        if interval_secs <= 0 {
            log::debug!("Progress reporting disabled for {}", job.world_name());
            return Self { state: TimerState::Armed, task: None };
        }

        let period = Duration::from_secs(interval_secs as u64);
        let start = Instant::now();
        let mut estimator = ProgressEstimator::new(job, start.into_std());

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(start + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Some(report) = estimator.tick(Instant::now().into_std()) {
                    on_report(report);
                }
            }
        });

        Self { state: TimerState::Running, task: Some(task) }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Stop ticking. There is no way back to `Running`.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.state = TimerState::Cancelled;
    }
}

impl Drop for ProgressTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RenderCounters;
    use std::sync::Mutex;

    fn collector() -> (Arc<Mutex<Vec<ProgressReport>>>, impl FnMut(ProgressReport) + Send + 'static) {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();
        (reports, move |r| sink.lock().unwrap().push(r))
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_until_cancelled() {
        let job = Arc::new(RenderCounters::new("world", 100, 0));
        let (reports, sink) = collector();
        let mut timer = ProgressTimer::start_with(job.clone(), 1, sink);
        assert_eq!(timer.state(), TimerState::Running);

        job.record_chunks(20);
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(reports.lock().unwrap().len(), 3);
        assert_eq!(reports.lock().unwrap()[0].current_chunks, 20);

        timer.cancel();
        assert_eq!(timer.state(), TimerState::Cancelled);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(reports.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_interval_stays_armed() {
        let job = Arc::new(RenderCounters::new("world", 100, 0));
        let (reports, sink) = collector();
        let timer = ProgressTimer::start_with(job, 0, sink);
        assert_eq!(timer.state(), TimerState::Armed);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(reports.lock().unwrap().is_empty());
        assert_eq!(timer.state(), TimerState::Armed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_job_reports_nothing() {
        let job = Arc::new(RenderCounters::new("world", 100, 0));
        job.pause();
        let (reports, sink) = collector();
        let _timer = ProgressTimer::start_with(job.clone(), 2, sink);

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert!(reports.lock().unwrap().is_empty());

        job.resume();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(reports.lock().unwrap().len(), 1);
    }
}
