//! Phase 2: full-resolution render, rotation and encoding of candidates.
//!
//! The geometry and encoding steps are pure so that the blocking and the
//! async drivers share them; only the seek/render calls differ.

use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage, imageops};

use crate::configuration::Rotation;
use crate::error::CrowdsightError;
use crate::frame::ExtractedFrame;

/// Scale `(width, height)` so the longer edge is at most `max_edge`,
/// preserving aspect ratio. Never upscales.
///
/// Fractional results truncate, as assigning them to a raster canvas does,
/// and are clamped to at least one pixel.
///
/// ```
/// use crowdsight::fit_within;
///
/// assert_eq!(fit_within(1920, 1080, 800), (800, 450));
/// assert_eq!(fit_within(1080, 1920, 800), (450, 800));
/// assert_eq!(fit_within(640, 480, 800), (640, 480));
/// ```
pub fn fit_within(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let (mut scaled_width, mut scaled_height) = (f64::from(width), f64::from(height));
    let limit = f64::from(max_edge);

    if scaled_width > scaled_height {
        if scaled_width > limit {
            scaled_height *= limit / scaled_width;
            scaled_width = limit;
        }
    } else if scaled_height > limit {
        scaled_width *= limit / scaled_height;
        scaled_height = limit;
    }

    (
        (scaled_width as u32).max(1),
        (scaled_height as u32).max(1),
    )
}

/// Size to render a candidate at and how to orient it afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputGeometry {
    /// Render width before rotation.
    pub render_width: u32,
    /// Render height before rotation.
    pub render_height: u32,
    /// Rotation applied to the rendered frame.
    pub rotation: Rotation,
}

impl OutputGeometry {
    /// Plan the output for a source of `dimensions`.
    ///
    /// Returns `None` when the source reports no usable size.
    pub fn plan(dimensions: (u32, u32), max_edge: u32, rotation: Rotation) -> Option<Self> {
        let (width, height) = dimensions;
        if width == 0 || height == 0 {
            return None;
        }
        let (render_width, render_height) = fit_within(width, height, max_edge);
        Some(Self {
            render_width,
            render_height,
            rotation,
        })
    }

    /// Dimensions of the encoded frame, after rotation.
    pub fn output_dimensions(&self) -> (u32, u32) {
        if self.rotation.swaps_dimensions() {
            (self.render_height, self.render_width)
        } else {
            (self.render_width, self.render_height)
        }
    }
}

/// Rotate a rendered frame clockwise.
pub fn orient(image: RgbaImage, rotation: Rotation) -> RgbaImage {
    match rotation {
        Rotation::None => image,
        Rotation::Clockwise90 => imageops::rotate90(&image),
        Rotation::Half => imageops::rotate180(&image),
        Rotation::Clockwise270 => imageops::rotate270(&image),
    }
}

/// Encode a raster as JPEG. Alpha is discarded.
///
/// # Errors
///
/// Returns [`CrowdsightError::ImageError`] if encoding fails.
pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>, CrowdsightError> {
    let rgb = DynamicImage::ImageRgba8(image.clone()).into_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality).encode_image(&rgb)?;
    Ok(bytes)
}

/// Orient and encode a candidate rendered at `geometry`'s render size.
pub(crate) fn finish_frame(
    timestamp: Duration,
    rendered: RgbaImage,
    geometry: &OutputGeometry,
    quality: u8,
) -> Result<ExtractedFrame, CrowdsightError> {
    let oriented = orient(rendered, geometry.rotation);
    let (width, height) = oriented.dimensions();
    let data = encode_jpeg(&oriented, quality)?;
    Ok(ExtractedFrame {
        timestamp,
        width,
        height,
        data,
    })
}
