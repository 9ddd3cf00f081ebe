//! # crowdsight
//!
//! Smart keyframe extraction for crowd-safety video audits.
//!
//! A venue clip is usually far too long to send frame by frame to a
//! multimodal risk-scoring service. `crowdsight` picks a bounded set of
//! informative stills instead: sharp frames, spread evenly over the clip,
//! favouring moments right after visible movement, where crowd surges and
//! newly revealed bottlenecks show up.
//!
//! Extraction runs in two passes over a caller-owned [`VideoSource`]:
//!
//! 1. a cheap scan that scores every sample on a 100×100 raster for motion
//!    ([`difference_score`]) and sharpness ([`focus_score`]) and keeps the
//!    best sample of each time bucket ([`Sampler`]);
//! 2. a full-resolution pass that renders, rotates and JPEG-encodes only the
//!    bucket winners.
//!
//! ## Quick Start
//!
//! ```no_run
//! # #[cfg(feature = "ffmpeg")]
//! # fn main() -> Result<(), crowdsight::CrowdsightError> {
//! use crowdsight::{FfmpegVideoSource, KeyframeOptions, extract_smart_keyframes};
//!
//! let mut source = FfmpegVideoSource::open("gate_b.mp4")?;
//! let options = KeyframeOptions::new().with_max_frames(12).with_rotation(90);
//! let frames = extract_smart_keyframes(&mut source, &options)?;
//!
//! for frame in &frames {
//!     println!("{:?}: {}x{}", frame.timestamp, frame.width, frame.height);
//!     let _payload = frame.to_data_url();
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "ffmpeg"))]
//! # fn main() {}
//! ```
//!
//! ## Guarantees
//!
//! - At most `min(max_frames, max(1, floor(duration)))` frames, in
//!   chronological order. An empty result is valid.
//! - The source's playback position is restored when the call returns, on
//!   success and on failure.
//! - Progress reports are non-decreasing and reach 100 when at least one
//!   candidate was found.
//! - Every seek is bounded by a deadline ([`KeyframeOptions::with_seek_timeout`]).
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ffmpeg` | [`FfmpegVideoSource`] over media files, and the `crowdsight` CLI |
//! | `async` | [`extract_smart_keyframes_async`] for sources with async seeks |
//! | `full` | Enables all of the above |

pub mod configuration;
pub mod error;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod frame;
pub mod keyframes;
pub mod progress;
pub mod refine;
pub mod sampler;
pub mod scoring;
pub mod source;
pub mod still;
#[cfg(feature = "async")]
pub mod stream;

pub use configuration::{KeyframeOptions, Rotation};
pub use error::CrowdsightError;
#[cfg(feature = "ffmpeg")]
pub use ffmpeg::{FfmpegLogLevel, FfmpegVideoSource, set_ffmpeg_log_level};
pub use frame::ExtractedFrame;
pub use keyframes::extract_smart_keyframes;
pub use progress::{CancellationToken, ExtractionPhase, ProgressCallback, ProgressInfo};
pub use refine::{OutputGeometry, fit_within};
pub use sampler::{Bucket, SampleScore, Sampler, bucket_count};
pub use scoring::{combined_score, difference_score, focus_score};
pub use source::{SeekSignal, SeekTicket, VideoSource};
pub use still::{StillOptions, capture_still, encode_still};
#[cfg(feature = "async")]
pub use stream::{AsyncVideoSource, extract_smart_keyframes_async};
