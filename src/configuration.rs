//! Extraction configuration.
//!
//! [`KeyframeOptions`] is a builder that threads the sampling parameters,
//! output settings, progress callback, cancellation token and seek deadline
//! through the extraction drivers without polluting every function signature.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use crowdsight::{CancellationToken, KeyframeOptions, ProgressInfo};
//!
//! let token = CancellationToken::new();
//! let options = KeyframeOptions::new()
//!     .with_max_frames(12)
//!     .with_sample_rate(4.0)
//!     .with_rotation(90)
//!     .with_seek_timeout(Duration::from_secs(5))
//!     .with_progress(Arc::new(|info: &ProgressInfo| println!("{}%", info.percentage)))
//!     .with_cancellation(token.clone());
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;

use crate::error::CrowdsightError;
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};

/// Default cap on the number of buckets and output frames.
pub const DEFAULT_MAX_FRAMES: u32 = 20;
/// Default phase-1 samples per second.
pub const DEFAULT_SAMPLE_RATE: f64 = 2.0;
/// Default longest output edge, in pixels.
pub const DEFAULT_OUTPUT_SIZE: u32 = 800;
/// Default edge of the square phase-1 working raster.
pub const DEFAULT_SCORING_SIZE: u32 = 100;
/// Default JPEG quality (the 0.8 quality factor of a browser canvas).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;
/// Default deadline for a single seek.
pub const DEFAULT_SEEK_TIMEOUT: Duration = Duration::from_secs(10);

/// Clockwise rotation applied to output frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    /// No rotation. This is the default.
    #[default]
    None,
    /// 90° clockwise.
    Clockwise90,
    /// 180°.
    Half,
    /// 270° clockwise (90° counter-clockwise).
    Clockwise270,
}

impl Rotation {
    /// Convert a rotation in degrees. Negative values and values of 360 or
    /// more are normalised.
    ///
    /// # Errors
    ///
    /// Returns [`CrowdsightError::InvalidOption`] if `degrees` is not a
    /// multiple of 90.
    pub fn from_degrees(degrees: i32) -> Result<Self, CrowdsightError> {
        match degrees.rem_euclid(360) {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Clockwise90),
            180 => Ok(Rotation::Half),
            270 => Ok(Rotation::Clockwise270),
            _ => Err(CrowdsightError::InvalidOption(format!(
                "rotation must be a multiple of 90 degrees, got {degrees}"
            ))),
        }
    }

    /// The rotation in degrees, 0–270.
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Clockwise90 => 90,
            Rotation::Half => 180,
            Rotation::Clockwise270 => 270,
        }
    }

    /// Returns `true` when the rotation swaps width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Rotation::Clockwise90 | Rotation::Clockwise270)
    }
}

/// Configuration for keyframe extraction.
///
/// All fields have defaults matching the auditor's upload flow: 20 frames at
/// most, two samples per second, 800 px output, JPEG quality 80.
#[derive(Clone)]
pub struct KeyframeOptions {
    pub(crate) max_frames: u32,
    pub(crate) sample_rate: f64,
    pub(crate) diff_threshold: Option<f64>,
    pub(crate) default_size: u32,
    pub(crate) rotation_degrees: i32,
    pub(crate) scoring_size: u32,
    pub(crate) jpeg_quality: u8,
    pub(crate) seek_timeout: Duration,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
}

impl Debug for KeyframeOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("KeyframeOptions")
            .field("max_frames", &self.max_frames)
            .field("sample_rate", &self.sample_rate)
            .field("diff_threshold", &self.diff_threshold)
            .field("default_size", &self.default_size)
            .field("rotation_degrees", &self.rotation_degrees)
            .field("scoring_size", &self.scoring_size)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("seek_timeout", &self.seek_timeout)
            .field("has_cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl Default for KeyframeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyframeOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            max_frames: DEFAULT_MAX_FRAMES,
            sample_rate: DEFAULT_SAMPLE_RATE,
            diff_threshold: None,
            default_size: DEFAULT_OUTPUT_SIZE,
            rotation_degrees: 0,
            scoring_size: DEFAULT_SCORING_SIZE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            seek_timeout: DEFAULT_SEEK_TIMEOUT,
            progress: Arc::new(NoOpProgress),
            cancellation: None,
        }
    }

    /// Cap the number of time buckets, and therefore output frames.
    #[must_use]
    pub fn with_max_frames(mut self, max_frames: u32) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Set how many samples per second the scoring pass takes.
    #[must_use]
    pub fn with_sample_rate(mut self, samples_per_second: f64) -> Self {
        self.sample_rate = samples_per_second;
        self
    }

    /// Enable the minimum-motion gate.
    ///
    /// A sample whose difference score is below `threshold` can still fill an
    /// empty bucket, but never replaces a bucket's current winner.
    #[must_use]
    pub fn with_diff_threshold(mut self, threshold: f64) -> Self {
        self.diff_threshold = Some(threshold);
        self
    }

    /// Set the longest edge of output frames, in pixels.
    ///
    /// Frames already smaller are not upscaled.
    #[must_use]
    pub fn with_default_size(mut self, max_edge: u32) -> Self {
        self.default_size = max_edge;
        self
    }

    /// Rotate output frames clockwise by `degrees` (a multiple of 90).
    #[must_use]
    pub fn with_rotation(mut self, degrees: i32) -> Self {
        self.rotation_degrees = degrees;
        self
    }

    /// Set the edge of the square raster used for scoring.
    #[must_use]
    pub fn with_scoring_size(mut self, edge: u32) -> Self {
        self.scoring_size = edge;
        self
    }

    /// Set the JPEG quality (1–100) of output frames.
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Set the deadline for each seek.
    #[must_use]
    pub fn with_seek_timeout(mut self, timeout: Duration) -> Self {
        self.seek_timeout = timeout;
        self
    }

    /// Attach a progress callback, invoked after every sample and candidate.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled, extraction stops before its next seek,
    /// restores the playback position and returns
    /// [`CrowdsightError::Cancelled`].
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// The configured frame cap.
    pub fn max_frames(&self) -> u32 {
        self.max_frames
    }

    /// The configured sample rate.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// The configured minimum-motion gate, if any.
    pub fn diff_threshold(&self) -> Option<f64> {
        self.diff_threshold
    }

    /// The configured longest output edge.
    pub fn default_size(&self) -> u32 {
        self.default_size
    }

    /// The configured deadline for each seek.
    pub fn seek_timeout(&self) -> Duration {
        self.seek_timeout
    }

    /// The configured output rotation.
    ///
    /// # Errors
    ///
    /// Returns [`CrowdsightError::InvalidOption`] if the rotation is not a
    /// multiple of 90 degrees.
    pub fn rotation(&self) -> Result<Rotation, CrowdsightError> {
        Rotation::from_degrees(self.rotation_degrees)
    }

    /// Check every option and return the first problem found.
    ///
    /// # Errors
    ///
    /// Returns [`CrowdsightError::InvalidOption`] describing the offending
    /// option.
    pub fn validate(&self) -> Result<(), CrowdsightError> {
        if self.max_frames == 0 {
            return Err(CrowdsightError::InvalidOption(
                "max_frames must be at least 1".to_string(),
            ));
        }
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(CrowdsightError::InvalidOption(format!(
                "sample_rate must be a positive number, got {}",
                self.sample_rate
            )));
        }
        if let Some(threshold) = self.diff_threshold
            && !threshold.is_finite()
        {
            return Err(CrowdsightError::InvalidOption(format!(
                "diff_threshold must be finite, got {threshold}"
            )));
        }
        if self.default_size == 0 {
            return Err(CrowdsightError::InvalidOption(
                "default_size must be at least 1 pixel".to_string(),
            ));
        }
        if self.scoring_size < 3 {
            return Err(CrowdsightError::InvalidOption(format!(
                "scoring_size must be at least 3 pixels, got {}",
                self.scoring_size
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(CrowdsightError::InvalidOption(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        self.rotation()?;
        Ok(())
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
