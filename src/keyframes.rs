//! Smart keyframe extraction.
//!
//! [`extract_smart_keyframes`] picks a bounded, evenly distributed set of
//! informative frames from a clip in two passes:
//!
//! 1. **Sampling.** Walk the timeline at the configured sample rate, render
//!    each sample into a small square raster and score it for motion and
//!    focus. The clip is split into equal time buckets and each bucket keeps
//!    only its best sample.
//! 2. **Refining.** Revisit only the bucket winners, render them at the output
//!    size, rotate and encode them as JPEG.
//!
//! The source's playback position is restored before returning, whether the
//! extraction succeeded or not.
//!
//! # Example
//!
//! ```no_run
//! # use std::time::Duration;
//! # use crowdsight::{CrowdsightError, VideoSource};
//! # use image::RgbaImage;
//! # struct Player;
//! # impl VideoSource for Player {
//! #     fn duration(&self) -> Duration { Duration::from_secs(30) }
//! #     fn dimensions(&self) -> (u32, u32) { (1920, 1080) }
//! #     fn position(&self) -> Duration { Duration::ZERO }
//! #     fn seek(&mut self, _: Duration, _: Duration) -> Result<(), CrowdsightError> { Ok(()) }
//! #     fn render(&mut self, w: u32, h: u32) -> Result<RgbaImage, CrowdsightError> { Ok(RgbaImage::new(w, h)) }
//! # }
//! use crowdsight::{KeyframeOptions, extract_smart_keyframes};
//!
//! let mut player = Player;
//! let options = KeyframeOptions::new().with_max_frames(10);
//! let frames = extract_smart_keyframes(&mut player, &options)?;
//! for frame in &frames {
//!     frame.save(format!("keyframe_{:06}.jpg", frame.timestamp.as_millis()))?;
//! }
//! # Ok::<(), CrowdsightError>(())
//! ```

use std::time::Duration;

use image::RgbaImage;

use crate::configuration::{KeyframeOptions, Rotation};
use crate::error::CrowdsightError;
use crate::frame::ExtractedFrame;
use crate::progress::{ExtractionPhase, ProgressTracker};
use crate::refine::{OutputGeometry, finish_frame};
use crate::sampler::Sampler;
use crate::source::VideoSource;

/// Extract up to `options.max_frames` keyframes from `source`.
///
/// Frames are returned in chronological order. An empty vector is a valid
/// result: zero-length or unreadable clips, and clips shorter than one sample
/// interval, produce no frames.
///
/// # Errors
///
/// - [`CrowdsightError::InvalidOption`] if the options fail validation
///   (nothing is seeked in that case).
/// - [`CrowdsightError::SeekTimeout`] if a seek stalls past the deadline.
/// - [`CrowdsightError::Cancelled`] if the cancellation token fires.
/// - Any non-recoverable error from the source or the encoder.
///
/// Frames that fail with [`CrowdsightError::RenderUnavailable`] are skipped
/// rather than reported.
pub fn extract_smart_keyframes<S: VideoSource + ?Sized>(
    source: &mut S,
    options: &KeyframeOptions,
) -> Result<Vec<ExtractedFrame>, CrowdsightError> {
    options.validate()?;

    source.pause();
    let original_position = source.position();

    log::debug!(
        "Extracting keyframes (duration={:?}, max_frames={}, sample_rate={}, size={}, rotation={})",
        source.duration(),
        options.max_frames,
        options.sample_rate,
        options.default_size,
        options.rotation_degrees,
    );

    let result = run_extraction(source, options);
    let restored = if source.position() == original_position {
        Ok(())
    } else {
        source.seek(original_position, options.seek_timeout)
    };

    settle(result, restored, original_position)
}

fn run_extraction<S: VideoSource + ?Sized>(
    source: &mut S,
    options: &KeyframeOptions,
) -> Result<Vec<ExtractedFrame>, CrowdsightError> {
    let mut progress = ProgressTracker::new(options.progress.clone());
    let candidates = sample_candidates(source, options, &mut progress)?;
    refine_candidates(source, &candidates, options, &mut progress)
}

/// Phase 1: scan the clip and return one winning timestamp per bucket.
fn sample_candidates<S: VideoSource + ?Sized>(
    source: &mut S,
    options: &KeyframeOptions,
    progress: &mut ProgressTracker,
) -> Result<Vec<Duration>, CrowdsightError> {
    let mut sampler = Sampler::new(
        source.duration().as_secs_f64(),
        options.sample_rate,
        options.max_frames,
        options.diff_threshold,
    );
    let total = sampler.sample_count();
    let edge = options.scoring_size;

    for index in 0..total {
        if options.is_cancelled() {
            return Err(CrowdsightError::Cancelled);
        }

        let time = sampler.sample_time(index);
        let timestamp = Duration::from_secs_f64(time);
        source.seek(timestamp, options.seek_timeout)?;

        absorb_sample(&mut sampler, index, time, source.render(edge, edge))?;

        progress.advance(ExtractionPhase::Sampling, index + 1, total, Some(timestamp));
    }

    Ok(finish_sampling(sampler))
}

/// Phase 2: render and encode each candidate at output resolution.
fn refine_candidates<S: VideoSource + ?Sized>(
    source: &mut S,
    candidates: &[Duration],
    options: &KeyframeOptions,
    progress: &mut ProgressTracker,
) -> Result<Vec<ExtractedFrame>, CrowdsightError> {
    let rotation = options.rotation()?;
    let total = candidates.len() as u64;
    let mut frames = Vec::with_capacity(candidates.len());

    for (index, &timestamp) in candidates.iter().enumerate() {
        if options.is_cancelled() {
            return Err(CrowdsightError::Cancelled);
        }

        source.seek(timestamp, options.seek_timeout)?;

        if let Some(geometry) = plan_candidate(source.dimensions(), options, rotation, timestamp) {
            let rendered = source.render(geometry.render_width, geometry.render_height);
            absorb_candidate(&mut frames, timestamp, &geometry, rendered, options.jpeg_quality)?;
        }

        progress.advance(
            ExtractionPhase::Refining,
            index as u64 + 1,
            total,
            Some(timestamp),
        );
    }

    Ok(frames)
}

/// Fold the result of restoring the playback position into the outcome.
///
/// A failed restore after a successful run is the error; after a failed run
/// it is only logged and the original error wins.
pub(crate) fn settle(
    result: Result<Vec<ExtractedFrame>, CrowdsightError>,
    restored: Result<(), CrowdsightError>,
    original_position: Duration,
) -> Result<Vec<ExtractedFrame>, CrowdsightError> {
    match (result, restored) {
        (Ok(frames), Ok(())) => {
            log::debug!("Extracted {} keyframe(s)", frames.len());
            Ok(frames)
        }
        (Ok(_), Err(error)) => {
            log::warn!("Could not restore playback position {original_position:?}: {error}");
            Err(error)
        }
        (Err(error), restored) => {
            if let Err(restore_error) = restored {
                log::warn!(
                    "Could not restore playback position {original_position:?} after failure: {restore_error}"
                );
            }
            Err(error)
        }
    }
}

/// Score one phase-1 render. Recoverable render failures skip the sample.
pub(crate) fn absorb_sample(
    sampler: &mut Sampler,
    index: u64,
    time: f64,
    rendered: Result<RgbaImage, CrowdsightError>,
) -> Result<(), CrowdsightError> {
    match rendered {
        Ok(raster) => {
            let score = sampler.observe(time, raster);
            log::trace!(
                "Sample {index} at {time:.2}s: diff={:.2} focus={:.2} bucket={} selected={}",
                score.difference,
                score.focus,
                score.bucket,
                score.selected,
            );
            Ok(())
        }
        Err(error) if error.is_recoverable() => {
            log::warn!("Skipping sample at {time:.2}s: {error}");
            Ok(())
        }
        Err(error) => Err(error),
    }
}

pub(crate) fn finish_sampling(sampler: Sampler) -> Vec<Duration> {
    let total = sampler.sample_count();
    let candidates = sampler.into_candidates();
    log::debug!(
        "Sampled {total} position(s), {} candidate(s) selected",
        candidates.len()
    );
    candidates
}

/// Output geometry for a candidate, or `None` (logged) when the source has
/// no size yet.
pub(crate) fn plan_candidate(
    dimensions: (u32, u32),
    options: &KeyframeOptions,
    rotation: Rotation,
    timestamp: Duration,
) -> Option<OutputGeometry> {
    let geometry = OutputGeometry::plan(dimensions, options.default_size, rotation);
    if geometry.is_none() {
        log::warn!("Skipping keyframe at {timestamp:?}: source reports no dimensions");
    }
    geometry
}

/// Encode one phase-2 render. Recoverable render failures drop the frame.
pub(crate) fn absorb_candidate(
    frames: &mut Vec<ExtractedFrame>,
    timestamp: Duration,
    geometry: &OutputGeometry,
    rendered: Result<RgbaImage, CrowdsightError>,
    quality: u8,
) -> Result<(), CrowdsightError> {
    match rendered {
        Ok(rendered) => {
            frames.push(finish_frame(timestamp, rendered, geometry, quality)?);
            Ok(())
        }
        Err(error) if error.is_recoverable() => {
            log::warn!("Skipping keyframe at {timestamp:?}: {error}");
            Ok(())
        }
        Err(error) => Err(error),
    }
}
