//! The seekable video abstraction the extractor drives.
//!
//! [`VideoSource`] decouples the keyframe algorithm from any particular media
//! stack. An implementation owns a single playback cursor; the extractor moves
//! it with [`seek`](VideoSource::seek) and then asks for a raster of the frame
//! under the cursor with [`render`](VideoSource::render).
//!
//! Backends that learn about seek completion through an external event (a
//! decoder thread, a platform callback) can build a blocking `seek` on top of
//! [`SeekSignal`].

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use image::RgbaImage;

use crate::error::CrowdsightError;

/// A seekable, renderable video owned by the caller.
///
/// The extractor borrows the source exclusively for the whole call, seeks it
/// strictly sequentially and restores its original position before returning.
pub trait VideoSource {
    /// Total duration of the clip. [`Duration::ZERO`] when unknown.
    fn duration(&self) -> Duration;

    /// Intrinsic `(width, height)` of the video in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Current playback position.
    fn position(&self) -> Duration;

    /// Stop playback so the cursor only moves when seeked.
    fn pause(&mut self) {}

    /// Move the cursor to `timestamp` and block until the frame there is ready.
    ///
    /// # Errors
    ///
    /// Implementations must give up once `timeout` has elapsed and return
    /// [`CrowdsightError::SeekTimeout`]. Any other failure aborts the
    /// extraction.
    fn seek(&mut self, timestamp: Duration, timeout: Duration) -> Result<(), CrowdsightError>;

    /// Render the frame under the cursor, scaled to exactly `width × height`.
    ///
    /// # Errors
    ///
    /// [`CrowdsightError::RenderUnavailable`] skips just this frame; any
    /// other error aborts the extraction.
    fn render(&mut self, width: u32, height: u32) -> Result<RgbaImage, CrowdsightError>;
}

/// A readiness latch for event-driven seek completion.
///
/// The seeking side calls [`arm`](SeekSignal::arm) before issuing the seek,
/// then [`wait`](SeekSignal::wait) with the returned ticket. The backend calls
/// [`notify`](SeekSignal::notify) from whatever thread observes completion.
/// Waiting parks the thread on a condition variable; nothing polls.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
/// use std::time::Duration;
///
/// use crowdsight::SeekSignal;
///
/// let signal = Arc::new(SeekSignal::new());
/// let ticket = signal.arm();
///
/// let backend = signal.clone();
/// thread::spawn(move || backend.notify());
///
/// signal
///     .wait(ticket, Duration::from_secs(1), Duration::from_secs(3))
///     .unwrap();
/// ```
#[derive(Debug, Default)]
pub struct SeekSignal {
    completed: Mutex<u64>,
    ready: Condvar,
}

/// Identifies one pending seek on a [`SeekSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekTicket(u64);

impl SeekSignal {
    /// Create a signal with no pending seek.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending seek. Completions signalled before this call do not
    /// satisfy the returned ticket.
    pub fn arm(&self) -> SeekTicket {
        let completed = self
            .completed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        SeekTicket(*completed)
    }

    /// Signal that the most recent seek has completed.
    pub fn notify(&self) {
        let mut completed = self
            .completed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *completed += 1;
        self.ready.notify_all();
    }

    /// Block until a completion newer than `ticket` arrives.
    ///
    /// `timestamp` is only used to describe the timeout.
    ///
    /// # Errors
    ///
    /// Returns [`CrowdsightError::SeekTimeout`] if no completion arrives
    /// within `timeout`.
    pub fn wait(
        &self,
        ticket: SeekTicket,
        timestamp: Duration,
        timeout: Duration,
    ) -> Result<(), CrowdsightError> {
        let guard = self
            .completed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let (_guard, result) = self
            .ready
            .wait_timeout_while(guard, timeout, |completed| *completed <= ticket.0)
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if result.timed_out() {
            log::warn!("Seek to {timestamp:?} timed out after {timeout:?}");
            return Err(CrowdsightError::SeekTimeout { timestamp, timeout });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn earlier_completion_does_not_satisfy_new_ticket() {
        let signal = SeekSignal::new();
        signal.notify();
        let ticket = signal.arm();

        let result = signal.wait(ticket, Duration::from_secs(1), Duration::from_millis(20));
        assert!(matches!(result, Err(CrowdsightError::SeekTimeout { .. })));
    }

    #[test]
    fn completion_from_another_thread_wakes_waiter() {
        let signal = Arc::new(SeekSignal::new());
        let ticket = signal.arm();

        let backend = signal.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            backend.notify();
        });

        signal
            .wait(ticket, Duration::ZERO, Duration::from_secs(5))
            .expect("seek should complete");
        handle.join().unwrap();
    }
}
