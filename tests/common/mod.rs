//! Scripted in-memory video sources shared by the integration tests.

#![allow(dead_code)]

use std::time::Duration;

use crowdsight::{CrowdsightError, VideoSource};
use image::{Rgba, RgbaImage};

/// Produces the picture shown at a given time, rendered at a given size.
pub type Scene = Box<dyn Fn(f64, u32, u32) -> RgbaImage + Send>;

/// A flat mid-grey picture: no focus, no motion.
pub fn still_scene() -> Scene {
    Box::new(|_, width, height| flat(width, height, 128))
}

/// Flat grey everywhere except at `flash`, where the picture turns white.
pub fn flash_scene(flash: f64) -> Scene {
    Box::new(move |time, width, height| {
        if (time - flash).abs() < 1e-6 {
            flat(width, height, 255)
        } else {
            flat(width, height, 128)
        }
    })
}

/// Flat grey everywhere except at `sharp`, where a fine checkerboard shows.
pub fn sharp_scene(sharp: f64) -> Scene {
    Box::new(move |time, width, height| {
        if (time - sharp).abs() < 1e-6 {
            checkerboard(width, height)
        } else {
            flat(width, height, 128)
        }
    })
}

/// A faintly textured picture that cuts to white at `cut` and stays there.
pub fn cut_scene(cut: f64) -> Scene {
    Box::new(move |time, width, height| {
        if time + 1e-6 >= cut {
            flat(width, height, 255)
        } else {
            fine_texture(width, height)
        }
    })
}

pub fn flat(width: u32, height: u32, value: u8) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]))
}

pub fn checkerboard(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let value = if (x + y) % 2 == 0 { 0 } else { 255 };
        Rgba([value, value, value, 255])
    })
}

/// Low-contrast checkerboard (125/131): visibly sharp, but far from a flash.
pub fn fine_texture(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let value = if (x + y) % 2 == 0 { 125 } else { 131 };
        Rgba([value, value, value, 255])
    })
}

fn at(position: Duration, time: f64) -> bool {
    (position.as_secs_f64() - time).abs() < 1e-6
}

/// A deterministic [`VideoSource`] whose behaviour is scripted per timestamp.
pub struct ScriptedVideo {
    pub duration: Duration,
    pub dimensions: (u32, u32),
    pub position: Duration,
    pub scene: Scene,
    /// Renders at these times fail with `RenderUnavailable` in both passes.
    pub unrenderable_at: Vec<f64>,
    /// Full-size renders at these times fail with `RenderUnavailable`.
    pub unrefinable_at: Vec<f64>,
    /// Seeks to this time stall past their deadline.
    pub stall_at: Option<f64>,
    /// Renders at or after this time report the source as gone.
    pub revoked_from: Option<f64>,
    pub paused: bool,
    pub seeks: Vec<Duration>,
    pub renders: Vec<(u32, u32)>,
}

impl ScriptedVideo {
    pub fn new(duration_seconds: f64, dimensions: (u32, u32), scene: Scene) -> Self {
        Self {
            duration: Duration::from_secs_f64(duration_seconds),
            dimensions,
            position: Duration::ZERO,
            scene,
            unrenderable_at: Vec::new(),
            unrefinable_at: Vec::new(),
            stall_at: None,
            revoked_from: None,
            paused: false,
            seeks: Vec::new(),
            renders: Vec::new(),
        }
    }

    pub fn starting_at(mut self, seconds: f64) -> Self {
        self.position = Duration::from_secs_f64(seconds);
        self
    }
}

impl VideoSource for ScriptedVideo {
    fn duration(&self) -> Duration {
        self.duration
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn position(&self) -> Duration {
        self.position
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn seek(&mut self, timestamp: Duration, timeout: Duration) -> Result<(), CrowdsightError> {
        self.seeks.push(timestamp);
        if self.stall_at.is_some_and(|time| at(timestamp, time)) {
            return Err(CrowdsightError::SeekTimeout { timestamp, timeout });
        }
        self.position = timestamp;
        Ok(())
    }

    fn render(&mut self, width: u32, height: u32) -> Result<RgbaImage, CrowdsightError> {
        self.renders.push((width, height));
        let time = self.position.as_secs_f64();

        if self.revoked_from.is_some_and(|from| time >= from) {
            return Err(CrowdsightError::SourceUnavailable(
                "media element was removed".to_string(),
            ));
        }
        if self.unrenderable_at.iter().any(|&t| at(self.position, t)) {
            return Err(CrowdsightError::RenderUnavailable(format!(
                "no frame at {time:.2}s"
            )));
        }
        let full_size = (width, height) != (100, 100);
        if full_size && self.unrefinable_at.iter().any(|&t| at(self.position, t)) {
            return Err(CrowdsightError::RenderUnavailable(format!(
                "decoder dropped frame at {time:.2}s"
            )));
        }

        Ok((self.scene)(time, width, height))
    }
}

/// Timestamps of extracted frames, in seconds.
pub fn seconds(frames: &[crowdsight::ExtractedFrame]) -> Vec<f64> {
    frames
        .iter()
        .map(|frame| frame.timestamp.as_secs_f64())
        .collect()
}
