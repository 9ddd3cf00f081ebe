//! Encoded output frames.

use std::fs;
use std::path::Path;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::CrowdsightError;

/// MIME type of every frame produced by this crate.
pub const FRAME_MIME_TYPE: &str = "image/jpeg";

/// A keyframe encoded as a JPEG still.
///
/// Frames are returned in chronological order and own their encoded bytes,
/// ready to be stored or sent to an analysis service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFrame {
    /// Position in the source video the frame was taken from.
    pub timestamp: Duration,
    /// Encoded width in pixels (after rotation).
    pub width: u32,
    /// Encoded height in pixels (after rotation).
    pub height: u32,
    /// JPEG bytes.
    pub data: Vec<u8>,
}

impl ExtractedFrame {
    /// Encode the frame as a `data:` URL, the form analysis requests embed.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use crowdsight::ExtractedFrame;
    ///
    /// let frame = ExtractedFrame {
    ///     timestamp: Duration::ZERO,
    ///     width: 1,
    ///     height: 1,
    ///     data: vec![0xFF, 0xD8, 0xFF],
    /// };
    /// assert_eq!(frame.to_data_url(), "data:image/jpeg;base64,/9j/");
    /// ```
    pub fn to_data_url(&self) -> String {
        format!("data:{FRAME_MIME_TYPE};base64,{}", STANDARD.encode(&self.data))
    }

    /// Write the encoded bytes to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CrowdsightError::IoError`] if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CrowdsightError> {
        fs::write(path, &self.data)?;
        Ok(())
    }

    /// Decode the frame back into an image.
    ///
    /// # Errors
    ///
    /// Returns [`CrowdsightError::ImageError`] if the bytes are not a valid
    /// JPEG.
    pub fn decode(&self) -> Result<image::DynamicImage, CrowdsightError> {
        Ok(image::load_from_memory_with_format(
            &self.data,
            image::ImageFormat::Jpeg,
        )?)
    }
}
