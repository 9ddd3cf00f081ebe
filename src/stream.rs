//! Async keyframe extraction.
//!
//! Media backends that report seek completion as an event fit an async
//! interface better than a blocking one: [`AsyncVideoSource::seek`] returns a
//! future that resolves once the frame under the cursor is ready. The driver
//! runs the same two passes as
//! [`extract_smart_keyframes`](crate::extract_smart_keyframes) and bounds
//! every seek with [`tokio::time::timeout`].
//!
//! This module is available when the `async` feature is enabled.
//!
//! # Example
//!
//! ```no_run
//! use crowdsight::{AsyncVideoSource, CrowdsightError, KeyframeOptions};
//!
//! # async fn example<S: AsyncVideoSource>(mut player: S) -> Result<(), CrowdsightError> {
//! let frames =
//!     crowdsight::extract_smart_keyframes_async(&mut player, &KeyframeOptions::new()).await?;
//! println!("Got {} keyframes", frames.len());
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use image::RgbaImage;

use crate::configuration::KeyframeOptions;
use crate::error::CrowdsightError;
use crate::frame::ExtractedFrame;
use crate::keyframes::{absorb_candidate, absorb_sample, finish_sampling, plan_candidate, settle};
use crate::progress::{ExtractionPhase, ProgressTracker};
use crate::sampler::Sampler;

/// A seekable video whose seeks complete asynchronously.
///
/// Same contract as [`VideoSource`](crate::VideoSource), except that the
/// deadline is enforced by the driver rather than the implementation.
pub trait AsyncVideoSource {
    /// Total duration of the clip. [`Duration::ZERO`] when unknown.
    fn duration(&self) -> Duration;

    /// Intrinsic `(width, height)` of the video in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Current playback position.
    fn position(&self) -> Duration;

    /// Stop playback so the cursor only moves when seeked.
    fn pause(&mut self) {}

    /// Move the cursor; the future resolves when the frame there is ready.
    fn seek(&mut self, timestamp: Duration) -> impl Future<Output = Result<(), CrowdsightError>>;

    /// Render the frame under the cursor, scaled to exactly `width × height`.
    fn render(&mut self, width: u32, height: u32) -> Result<RgbaImage, CrowdsightError>;
}

/// Seek and wait for completion, failing once `timeout` elapses.
async fn seek_with_deadline<S: AsyncVideoSource>(
    source: &mut S,
    timestamp: Duration,
    timeout: Duration,
) -> Result<(), CrowdsightError> {
    match tokio::time::timeout(timeout, source.seek(timestamp)).await {
        Ok(result) => result,
        Err(_) => {
            log::warn!("Seek to {timestamp:?} timed out after {timeout:?}");
            Err(CrowdsightError::SeekTimeout { timestamp, timeout })
        }
    }
}

/// Async counterpart of [`extract_smart_keyframes`](crate::extract_smart_keyframes).
///
/// # Errors
///
/// Same as the blocking driver.
pub async fn extract_smart_keyframes_async<S: AsyncVideoSource>(
    source: &mut S,
    options: &KeyframeOptions,
) -> Result<Vec<ExtractedFrame>, CrowdsightError> {
    options.validate()?;

    source.pause();
    let original_position = source.position();
    log::debug!(
        "Extracting keyframes asynchronously (duration={:?}, max_frames={}, sample_rate={}, size={}, rotation={})",
        source.duration(),
        options.max_frames,
        options.sample_rate,
        options.default_size,
        options.rotation_degrees,
    );

    let result = run_extraction(source, options).await;
    let restored = if source.position() == original_position {
        Ok(())
    } else {
        seek_with_deadline(source, original_position, options.seek_timeout).await
    };

    settle(result, restored, original_position)
}

async fn run_extraction<S: AsyncVideoSource>(
    source: &mut S,
    options: &KeyframeOptions,
) -> Result<Vec<ExtractedFrame>, CrowdsightError> {
    let mut progress = ProgressTracker::new(options.progress.clone());

    let mut sampler = Sampler::new(
        source.duration().as_secs_f64(),
        options.sample_rate,
        options.max_frames,
        options.diff_threshold,
    );
    let total_samples = sampler.sample_count();
    let edge = options.scoring_size;

    for index in 0..total_samples {
        if options.is_cancelled() {
            return Err(CrowdsightError::Cancelled);
        }

        let time = sampler.sample_time(index);
        let timestamp = Duration::from_secs_f64(time);
        seek_with_deadline(source, timestamp, options.seek_timeout).await?;

        absorb_sample(&mut sampler, index, time, source.render(edge, edge))?;

        progress.advance(
            ExtractionPhase::Sampling,
            index + 1,
            total_samples,
            Some(timestamp),
        );
    }

    let candidates = finish_sampling(sampler);
    let rotation = options.rotation()?;
    let total_candidates = candidates.len() as u64;
    let mut frames = Vec::with_capacity(candidates.len());

    for (index, timestamp) in candidates.into_iter().enumerate() {
        if options.is_cancelled() {
            return Err(CrowdsightError::Cancelled);
        }

        seek_with_deadline(source, timestamp, options.seek_timeout).await?;

        if let Some(geometry) = plan_candidate(source.dimensions(), options, rotation, timestamp) {
            let rendered = source.render(geometry.render_width, geometry.render_height);
            absorb_candidate(&mut frames, timestamp, &geometry, rendered, options.jpeg_quality)?;
        }

        progress.advance(
            ExtractionPhase::Refining,
            index as u64 + 1,
            total_candidates,
            Some(timestamp),
        );
    }

    Ok(frames)
}
