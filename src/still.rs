//! Single-still helpers.
//!
//! The auditor also analyses one-off stills: a snapshot of a live camera at
//! its current position, or an uploaded photo. Both go through the same
//! scale-to-fit and JPEG settings as extracted keyframes so the analysis
//! service sees uniform input.

use std::time::Duration;

use image::{DynamicImage, imageops::FilterType};

use crate::configuration::{DEFAULT_JPEG_QUALITY, DEFAULT_OUTPUT_SIZE, Rotation};
use crate::error::CrowdsightError;
use crate::frame::ExtractedFrame;
use crate::refine::{OutputGeometry, finish_frame, fit_within};
use crate::source::VideoSource;

/// Output settings for single stills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct StillOptions {
    /// Longest output edge in pixels. Smaller inputs are not upscaled.
    pub max_size: u32,
    /// JPEG quality, 1–100.
    pub jpeg_quality: u8,
    /// Clockwise rotation applied after scaling.
    pub rotation: Rotation,
}

impl Default for StillOptions {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_OUTPUT_SIZE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            rotation: Rotation::None,
        }
    }
}

impl StillOptions {
    /// Create options with the keyframe defaults (800 px, quality 80).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the longest output edge.
    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the JPEG quality.
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Set the rotation.
    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    fn validate(&self) -> Result<(), CrowdsightError> {
        if self.max_size == 0 {
            return Err(CrowdsightError::InvalidOption(
                "max_size must be at least 1 pixel".to_string(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(CrowdsightError::InvalidOption(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

/// Snapshot the frame under the source's cursor without moving it.
///
/// # Errors
///
/// Returns [`CrowdsightError::RenderUnavailable`] if the source has no
/// dimensions yet or cannot render, [`CrowdsightError::InvalidOption`] for
/// bad options, or encoding errors.
pub fn capture_still<S: VideoSource + ?Sized>(
    source: &mut S,
    options: &StillOptions,
) -> Result<ExtractedFrame, CrowdsightError> {
    options.validate()?;
    let timestamp = source.position();
    log::debug!(
        "Capturing still at {:?} (max_size={})",
        timestamp,
        options.max_size
    );

    let geometry = OutputGeometry::plan(source.dimensions(), options.max_size, options.rotation)
        .ok_or_else(|| {
            CrowdsightError::RenderUnavailable("source reports no dimensions".to_string())
        })?;
    let rendered = source.render(geometry.render_width, geometry.render_height)?;
    finish_frame(timestamp, rendered, &geometry, options.jpeg_quality)
}

/// Scale and encode an uploaded image like an extracted keyframe.
///
/// The returned frame's timestamp is zero.
///
/// # Errors
///
/// Returns [`CrowdsightError::InvalidOption`] for bad options or an empty
/// image, or encoding errors.
pub fn encode_still(
    image: &DynamicImage,
    options: &StillOptions,
) -> Result<ExtractedFrame, CrowdsightError> {
    options.validate()?;
    let (width, height) = (image.width(), image.height());
    let geometry = OutputGeometry::plan((width, height), options.max_size, options.rotation)
        .ok_or_else(|| CrowdsightError::InvalidOption("image has no pixels".to_string()))?;

    let (target_width, target_height) = fit_within(width, height, options.max_size);
    let scaled = if (target_width, target_height) == (width, height) {
        image.to_rgba8()
    } else {
        image
            .resize_exact(target_width, target_height, FilterType::Triangle)
            .into_rgba8()
    };

    finish_frame(Duration::ZERO, scaled, &geometry, options.jpeg_quality)
}
