//! Per-sample scoring signals.
//!
//! Both signals run on the small phase-1 working raster, never on the
//! full-resolution frame:
//!
//! - [`difference_score`] is a coarse motion proxy: the average absolute RGB
//!   delta against the previous sample, read from every fourth pixel.
//! - [`focus_score`] is a sharpness proxy: the variance of a 4-neighbour
//!   Laplacian over the green channel.
//!
//! [`combined_score`] weights motion ten times heavier than focus, so frames
//! right after visible movement or a newly revealed area beat frames that are
//! merely sharp.

use image::RgbaImage;

/// Weight of the difference score in [`combined_score`].
pub const MOTION_WEIGHT: f64 = 10.0;

/// Distance in bytes between pixels read by [`difference_score`]
/// (every fourth RGBA pixel).
const DIFFERENCE_STRIDE: usize = 16;

/// Coarse motion between two working rasters, roughly 0–191.
///
/// Sums `|ΔR| + |ΔG| + |ΔB|` over every fourth pixel and divides by the
/// raster's total pixel count. Rasters of different sizes are compared over
/// their common prefix.
pub fn difference_score(previous: &RgbaImage, current: &RgbaImage) -> f64 {
    let previous = previous.as_raw();
    let current = current.as_raw();
    let length = previous.len().min(current.len());
    let pixel_count = length / 4;
    if pixel_count == 0 {
        return 0.0;
    }

    let total: u64 = (0..length.saturating_sub(2))
        .step_by(DIFFERENCE_STRIDE)
        .map(|index| {
            (0..3)
                .map(|channel| {
                    u64::from(previous[index + channel].abs_diff(current[index + channel]))
                })
                .sum::<u64>()
        })
        .sum();

    total as f64 / pixel_count as f64
}

/// Variance of the green-channel Laplacian over interior pixels.
///
/// Higher means sharper; flat or blurred content scores near zero. Rasters
/// without interior pixels (narrower or shorter than 3) score 0.
pub fn focus_score(image: &RgbaImage) -> f64 {
    let (width, height) = image.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let green = |x: u32, y: u32| f64::from(image.get_pixel(x, y)[1]);

    let mut sum = 0.0;
    let mut sum_of_squares = 0.0;
    let mut count = 0u64;

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let laplacian = green(x, y - 1) + green(x, y + 1) + green(x - 1, y)
                + green(x + 1, y)
                - 4.0 * green(x, y);
            sum += laplacian;
            sum_of_squares += laplacian * laplacian;
            count += 1;
        }
    }

    let count = count as f64;
    let mean = sum / count;
    sum_of_squares / count - mean * mean
}

/// Score used to rank samples within a bucket.
pub fn combined_score(difference: f64, focus: f64) -> f64 {
    MOTION_WEIGHT * difference + focus
}
