//! Phase 1: timeline sampling and per-bucket selection.
//!
//! [`Sampler`] holds no reference to the video. A driver feeds it one working
//! raster per sample time, and at the end it yields the winning timestamp of
//! every bucket that saw at least one sample.

use std::time::Duration;

use image::RgbaImage;

use crate::scoring::{combined_score, difference_score, focus_score};

/// Number of buckets for a clip: never more than `max_frames`, never more
/// than the whole seconds in the clip, and at least one.
pub fn bucket_count(duration_seconds: f64, max_frames: u32) -> usize {
    let whole_seconds = if duration_seconds.is_finite() {
        duration_seconds.floor().max(1.0)
    } else {
        1.0
    };
    (max_frames as f64).min(whole_seconds) as usize
}

/// Best sample seen so far in one time interval.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bucket {
    best: Option<(f64, f64)>,
}

impl Bucket {
    /// Timestamp (seconds) of the winning sample, if any.
    pub fn best_time(&self) -> Option<f64> {
        self.best.map(|(time, _)| time)
    }

    /// Score of the winning sample, if any.
    pub fn best_score(&self) -> Option<f64> {
        self.best.map(|(_, score)| score)
    }

    /// Offer a sample. An empty bucket always accepts; otherwise the sample
    /// must be allowed to compete and score strictly higher.
    fn offer(&mut self, time: f64, score: f64, may_replace: bool) -> bool {
        let accept = match self.best {
            None => true,
            Some((_, best_score)) => may_replace && score > best_score,
        };
        if accept {
            self.best = Some((time, score));
        }
        accept
    }
}

/// One scored sample, as reported by [`Sampler::observe`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleScore {
    /// Motion against the previous rendered sample.
    pub difference: f64,
    /// Laplacian-variance sharpness.
    pub focus: f64,
    /// `10 × difference + focus`.
    pub combined: f64,
    /// Bucket the sample fell into.
    pub bucket: usize,
    /// Whether the sample became its bucket's winner.
    pub selected: bool,
}

/// Scores samples and keeps the best one per time bucket.
///
/// # Example
///
/// ```
/// use crowdsight::Sampler;
/// use image::{Rgba, RgbaImage};
///
/// let mut sampler = Sampler::new(3.0, 2.0, 20, None);
/// assert_eq!(sampler.sample_count(), 6);
/// assert_eq!(sampler.buckets().len(), 3);
///
/// let frame = RgbaImage::from_pixel(100, 100, Rgba([10, 20, 30, 255]));
/// for index in 0..sampler.sample_count() {
///     let time = sampler.sample_time(index);
///     sampler.observe(time, frame.clone());
/// }
/// assert_eq!(sampler.into_candidates().len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct Sampler {
    sample_rate: f64,
    sample_count: u64,
    bucket_width: f64,
    diff_threshold: Option<f64>,
    buckets: Vec<Bucket>,
    previous: Option<RgbaImage>,
}

impl Sampler {
    /// Plan the scan of a clip of `duration_seconds`.
    ///
    /// Non-finite or non-positive durations plan zero samples.
    pub fn new(
        duration_seconds: f64,
        sample_rate: f64,
        max_frames: u32,
        diff_threshold: Option<f64>,
    ) -> Self {
        let usable = duration_seconds.is_finite() && duration_seconds > 0.0;
        let sample_count = if usable && sample_rate.is_finite() && sample_rate > 0.0 {
            (duration_seconds * sample_rate).floor() as u64
        } else {
            0
        };
        let count = bucket_count(duration_seconds, max_frames.max(1));

        Self {
            sample_rate,
            sample_count,
            bucket_width: if usable {
                duration_seconds / count as f64
            } else {
                1.0
            },
            diff_threshold,
            buckets: vec![Bucket::default(); count],
            previous: None,
        }
    }

    /// Total number of samples the scan will take.
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Time of sample `index`, in seconds.
    pub fn sample_time(&self, index: u64) -> f64 {
        index as f64 / self.sample_rate
    }

    /// Current bucket states, in chronological order.
    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Bucket that `time` falls into, clamped to the last bucket.
    pub fn bucket_index(&self, time: f64) -> usize {
        let index = (time / self.bucket_width).floor();
        if index <= 0.0 {
            0
        } else {
            (index as usize).min(self.buckets.len() - 1)
        }
    }

    /// Score the working raster rendered at `time` and update its bucket.
    ///
    /// The raster is kept as the reference for the next sample's difference
    /// score.
    pub fn observe(&mut self, time: f64, raster: RgbaImage) -> SampleScore {
        let difference = self
            .previous
            .as_ref()
            .map_or(0.0, |previous| difference_score(previous, &raster));
        let focus = focus_score(&raster);
        let combined = combined_score(difference, focus);

        let may_replace = self
            .diff_threshold
            .is_none_or(|threshold| difference >= threshold);
        let bucket = self.bucket_index(time);
        let selected = self.buckets[bucket].offer(time, combined, may_replace);

        self.previous = Some(raster);

        SampleScore {
            difference,
            focus,
            combined,
            bucket,
            selected,
        }
    }

    /// Winning timestamps of all non-empty buckets, chronologically.
    pub fn into_candidates(self) -> Vec<Duration> {
        self.buckets
            .iter()
            .filter_map(Bucket::best_time)
            .map(Duration::from_secs_f64)
            .collect()
    }
}
