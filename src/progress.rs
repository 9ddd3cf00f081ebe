//! Progress reporting and cancellation support.
//!
//! Keyframe extraction runs in two phases. Progress for the sampling phase
//! occupies 0–50% of the overall range and the refinement phase 50–100%, so a
//! single integer percentage is enough for a progress bar.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use crowdsight::{KeyframeOptions, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("[{:?}] {}%", info.phase, info.percentage);
//!     }
//! }
//!
//! let options = KeyframeOptions::new().with_progress(Arc::new(PrintProgress));
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// The extraction phase a progress report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPhase {
    /// Low-resolution scan scoring every sample (0–50%).
    Sampling,
    /// Full-resolution render and encode of the bucket winners (50–100%).
    Refining,
}

impl ExtractionPhase {
    fn offset(self) -> f64 {
        match self {
            ExtractionPhase::Sampling => 0.0,
            ExtractionPhase::Refining => 50.0,
        }
    }
}

/// A snapshot of extraction progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Which phase produced this report.
    pub phase: ExtractionPhase,
    /// Items (samples or candidates) processed so far in this phase.
    pub current: u64,
    /// Items expected in this phase.
    pub total: u64,
    /// Overall completion, 0–100. Never decreases within one call.
    pub percentage: u8,
    /// Wall-clock time elapsed since extraction started.
    pub elapsed: Duration,
    /// Source position of the item just processed.
    pub current_timestamp: Option<Duration>,
}

/// Trait for receiving progress updates during extraction.
///
/// Progress callbacks are **infallible** and run synchronously between seeks,
/// so they should return quickly. Use [`CancellationToken`] to stop an
/// extraction early.
pub trait ProgressCallback: Send + Sync {
    /// Called after every sample and every candidate.
    fn on_progress(&self, info: &ProgressInfo);
}

impl<F> ProgressCallback for F
where
    F: Fn(&ProgressInfo) + Send + Sync,
{
    fn on_progress(&self, info: &ProgressInfo) {
        self(info)
    }
}

/// Discards all progress notifications. Default when no callback is set.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call
/// [`cancel`](CancellationToken::cancel) from any thread to stop the
/// associated extraction before its next seek.
///
/// # Example
///
/// ```
/// use crowdsight::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps per-phase completion onto the overall 0–100 range and emits reports.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    start_time: Instant,
    last_percentage: u8,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>) -> Self {
        Self {
            callback,
            start_time: Instant::now(),
            last_percentage: 0,
        }
    }

    /// Report that `completed` of `total` items in `phase` are done.
    pub(crate) fn advance(
        &mut self,
        phase: ExtractionPhase,
        completed: u64,
        total: u64,
        timestamp: Option<Duration>,
    ) {
        let percentage = phase_percentage(phase, completed, total).max(self.last_percentage);
        self.last_percentage = percentage;

        let info = ProgressInfo {
            phase,
            current: completed,
            total,
            percentage,
            elapsed: self.start_time.elapsed(),
            current_timestamp: timestamp,
        };
        self.callback.on_progress(&info);
    }
}

/// Overall percentage for `completed / total` items of one phase.
pub(crate) fn phase_percentage(phase: ExtractionPhase, completed: u64, total: u64) -> u8 {
    if total == 0 {
        return phase.offset() as u8;
    }
    let fraction = (completed.min(total) as f64) / (total as f64);
    (phase.offset() + (fraction * 50.0).round()) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_occupies_first_half() {
        assert_eq!(phase_percentage(ExtractionPhase::Sampling, 1, 4), 13);
        assert_eq!(phase_percentage(ExtractionPhase::Sampling, 4, 4), 50);
    }

    #[test]
    fn refining_occupies_second_half() {
        assert_eq!(phase_percentage(ExtractionPhase::Refining, 1, 2), 75);
        assert_eq!(phase_percentage(ExtractionPhase::Refining, 2, 2), 100);
    }

    #[test]
    fn tracker_never_goes_backwards() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut tracker = ProgressTracker::new(Arc::new(move |info: &ProgressInfo| {
            sink.lock().unwrap().push(info.percentage);
        }));

        tracker.advance(ExtractionPhase::Sampling, 3, 3, None);
        tracker.advance(ExtractionPhase::Sampling, 1, 3, None);

        assert_eq!(*seen.lock().unwrap(), vec![50, 50]);
    }
}
