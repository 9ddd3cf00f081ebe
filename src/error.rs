//! Error types for the `crowdsight` crate.
//!
//! This module defines [`CrowdsightError`], the unified error type returned by
//! all fallible operations in the crate. Errors carry enough context (the
//! offending option, the timestamp of a stalled seek) to diagnose a failure
//! without additional logging at the call site.

use std::{io::Error as IoError, time::Duration};

#[cfg(feature = "ffmpeg")]
use std::path::PathBuf;

#[cfg(feature = "ffmpeg")]
use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `crowdsight` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CrowdsightError {
    /// An extraction option is out of its accepted range.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// The video source did not confirm a seek before the deadline.
    #[error("Seek to {timestamp:?} did not complete within {timeout:?}")]
    SeekTimeout {
        /// The position that was requested.
        timestamp: Duration,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// The source could not render its current frame.
    ///
    /// This is a local failure: the affected sample or candidate is skipped
    /// and extraction continues.
    #[error("Frame could not be rendered: {0}")]
    RenderUnavailable(String),

    /// The video source became unusable (revoked, closed, corrupt).
    #[error("Video source unavailable: {0}")]
    SourceUnavailable(String),

    /// An error from the `image` crate while transforming or encoding a frame.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// An I/O error occurred while writing output.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// The media file could not be opened.
    #[cfg(feature = "ffmpeg")]
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path passed to [`FfmpegVideoSource::open`](crate::FfmpegVideoSource::open).
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[cfg(feature = "ffmpeg")]
    #[error("No video stream found in file")]
    NoVideoStream,

    /// An error originating from the FFmpeg libraries.
    #[cfg(feature = "ffmpeg")]
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),
}

impl CrowdsightError {
    /// Returns `true` for failures that only invalidate the current sample or
    /// candidate rather than the whole extraction.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CrowdsightError::RenderUnavailable(_))
    }
}

#[cfg(feature = "ffmpeg")]
impl From<FfmpegError> for CrowdsightError {
    fn from(error: FfmpegError) -> Self {
        CrowdsightError::FfmpegError(error.to_string())
    }
}
