//! FFmpeg-backed [`VideoSource`].
//!
//! [`FfmpegVideoSource`] drives a media file through `ffmpeg-next`: a seek
//! jumps to the nearest keyframe at or before the target and decodes forward
//! until the frame covering the target is reached; rendering converts that
//! frame to RGBA with FFmpeg's software scaler.
//!
//! This module is available when the `ffmpeg` feature is enabled. FFmpeg
//! development libraries must be installed on the system.
//!
//! # Example
//!
//! ```no_run
//! use crowdsight::{CrowdsightError, FfmpegVideoSource, KeyframeOptions, extract_smart_keyframes};
//!
//! crowdsight::set_ffmpeg_log_level(crowdsight::FfmpegLogLevel::Error);
//!
//! let mut source = FfmpegVideoSource::open("concourse.mp4")?;
//! let frames = extract_smart_keyframes(&mut source, &KeyframeOptions::new())?;
//! # Ok::<(), CrowdsightError>(())
//! ```

use std::mem;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};

use ffmpeg_next::{
    Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::log::Level,
};
use image::RgbaImage;

use crate::error::CrowdsightError;
use crate::source::VideoSource;

/// Decoded frames this close before the target still count as reaching it.
const TIMESTAMP_TOLERANCE_SECONDS: f64 = 0.001;

/// FFmpeg's own console verbosity.
///
/// This controls what FFmpeg prints to stderr, not the crate's `log` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// Print nothing.
    Quiet,
    /// Only unrecoverable errors.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings (FFmpeg's default).
    Warning,
    /// Informational messages.
    Info,
    /// Debugging output.
    Debug,
}

impl FfmpegLogLevel {
    fn to_ffmpeg_level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Debug => Level::Debug,
        }
    }
}

impl FromStr for FfmpegLogLevel {
    type Err = CrowdsightError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "quiet" => Ok(FfmpegLogLevel::Quiet),
            "fatal" => Ok(FfmpegLogLevel::Fatal),
            "error" => Ok(FfmpegLogLevel::Error),
            "warning" | "warn" => Ok(FfmpegLogLevel::Warning),
            "info" => Ok(FfmpegLogLevel::Info),
            "debug" => Ok(FfmpegLogLevel::Debug),
            other => Err(CrowdsightError::InvalidOption(format!(
                "unknown FFmpeg log level: {other}"
            ))),
        }
    }
}

/// Set FFmpeg's internal log verbosity.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// A media file opened for keyframe extraction.
pub struct FfmpegVideoSource {
    path: PathBuf,
    input: Input,
    decoder: VideoDecoder,
    stream_index: usize,
    time_base: Rational,
    duration: Duration,
    width: u32,
    height: u32,
    position: Duration,
    current: VideoFrame,
    has_frame: bool,
}

impl FfmpegVideoSource {
    /// Open a media file and prepare a decoder for its best video stream.
    ///
    /// The cursor starts at zero with no frame decoded.
    ///
    /// # Errors
    ///
    /// Returns [`CrowdsightError::FileOpen`] if FFmpeg cannot open the file,
    /// [`CrowdsightError::NoVideoStream`] if it has no video, or FFmpeg
    /// errors while creating the decoder.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CrowdsightError> {
        let path = path.as_ref().to_path_buf();
        log::debug!("Opening media file: {}", path.display());

        ffmpeg_next::init().map_err(|error| CrowdsightError::FileOpen {
            path: path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input = ffmpeg_next::format::input(&path).map_err(|error| {
            CrowdsightError::FileOpen {
                path: path.clone(),
                reason: error.to_string(),
            }
        })?;

        let (stream_index, time_base, decoder) = {
            let stream = input
                .streams()
                .best(Type::Video)
                .ok_or(CrowdsightError::NoVideoStream)?;
            let decoder = CodecContext::from_parameters(stream.parameters())?
                .decoder()
                .video()?;
            (stream.index(), stream.time_base(), decoder)
        };

        let duration_microseconds = input.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };
        let (width, height) = (decoder.width(), decoder.height());

        log::debug!(
            "Opened {} ({}x{}, {:?}, stream {})",
            path.display(),
            width,
            height,
            duration,
            stream_index
        );

        Ok(Self {
            path,
            input,
            decoder,
            stream_index,
            time_base,
            duration,
            width,
            height,
            position: Duration::ZERO,
            current: VideoFrame::empty(),
            has_frame: false,
        })
    }

    /// Path the source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VideoSource for FfmpegVideoSource {
    fn duration(&self) -> Duration {
        self.duration
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn position(&self) -> Duration {
        self.position
    }

    fn seek(&mut self, timestamp: Duration, timeout: Duration) -> Result<(), CrowdsightError> {
        let deadline = Instant::now() + timeout;
        let target_seconds = timestamp.as_secs_f64() - TIMESTAMP_TOLERANCE_SECONDS;
        let seek_timestamp = timestamp.as_micros() as i64;

        self.input.seek(seek_timestamp, ..seek_timestamp)?;
        self.decoder.flush();
        self.has_frame = false;
        self.position = timestamp;

        let mut decoded = VideoFrame::empty();

        for (stream, packet) in self.input.packets() {
            if Instant::now() >= deadline {
                return Err(CrowdsightError::SeekTimeout { timestamp, timeout });
            }
            if stream.index() != self.stream_index {
                continue;
            }

            self.decoder
                .send_packet(&packet)
                .map_err(|error| CrowdsightError::FfmpegError(error.to_string()))?;

            while self.decoder.receive_frame(&mut decoded).is_ok() {
                mem::swap(&mut self.current, &mut decoded);
                self.has_frame = true;
                if frame_seconds(&self.current, self.time_base) >= target_seconds {
                    return Ok(());
                }
            }
        }

        // Target lies in the decoder's reorder buffer or past the last frame.
        accept_eof(self.decoder.send_eof())?;
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            mem::swap(&mut self.current, &mut decoded);
            self.has_frame = true;
            if frame_seconds(&self.current, self.time_base) >= target_seconds {
                break;
            }
        }

        if !self.has_frame {
            log::warn!("No frame decoded at {timestamp:?} in {}", self.path.display());
        }
        Ok(())
    }

    fn render(&mut self, width: u32, height: u32) -> Result<RgbaImage, CrowdsightError> {
        if !self.has_frame {
            return Err(CrowdsightError::RenderUnavailable(format!(
                "no decoded frame at {:?}",
                self.position
            )));
        }

        let unavailable = |error: ffmpeg_next::Error| {
            CrowdsightError::RenderUnavailable(format!("scaling failed: {error}"))
        };
        let mut scaler = ScalingContext::get(
            self.current.format(),
            self.current.width(),
            self.current.height(),
            Pixel::RGBA,
            width,
            height,
            ScalingFlags::BILINEAR,
        )
        .map_err(unavailable)?;

        let mut rgba_frame = VideoFrame::empty();
        scaler.run(&self.current, &mut rgba_frame).map_err(unavailable)?;

        let buffer = frame_to_buffer(&rgba_frame, width, height);
        RgbaImage::from_raw(width, height, buffer).ok_or_else(|| {
            CrowdsightError::RenderUnavailable("scaled frame has unexpected size".to_string())
        })
    }
}

/// A decoder that already saw end of stream is fine to drain; anything else
/// is a decoder failure.
fn accept_eof(result: Result<(), ffmpeg_next::Error>) -> Result<(), CrowdsightError> {
    match result {
        Ok(()) | Err(ffmpeg_next::Error::Eof) => Ok(()),
        Err(error) => Err(CrowdsightError::FfmpegError(error.to_string())),
    }
}

/// Presentation time of a decoded frame in seconds, or 0 without one.
fn frame_seconds(frame: &VideoFrame, time_base: Rational) -> f64 {
    frame
        .timestamp()
        .or_else(|| frame.pts())
        .map_or(0.0, |pts| {
            pts as f64 * f64::from(time_base.numerator()) / f64::from(time_base.denominator())
        })
}

/// Copy a packed RGBA frame into a tightly-packed buffer, dropping row
/// padding.
fn frame_to_buffer(frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = frame.stride(0);
    let row_bytes = width as usize * 4;
    let data = frame.data(0);

    if stride == row_bytes {
        data[..row_bytes * height as usize].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            buffer.extend_from_slice(&data[start..start + row_bytes]);
        }
        buffer
    }
}
