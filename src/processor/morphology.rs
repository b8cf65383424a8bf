use anyhow::Result;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask};

use super::Processor;

const MAX_ITERATIONS: u8 = 50;

/// Run a gray-level operator on each color plane separately.
fn per_channel(frame: &RgbImage, op: impl Fn(&GrayImage) -> GrayImage) -> RgbImage {
    let (width, height) = frame.dimensions();
    let planes: Vec<GrayImage> = (0..3)
        .map(|c| op(&GrayImage::from_fn(width, height, |x, y| Luma([frame.get_pixel(x, y)[c]]))))
        .collect();
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            planes[0].get_pixel(x, y)[0],
            planes[1].get_pixel(x, y)[0],
            planes[2].get_pixel(x, y)[0],
        ])
    })
}

/// Gray-level dilation: each pixel takes the channel-wise maximum of its
/// square neighborhood. `n` iterations equal one pass with a
/// `(2n + 1)`-wide square.
#[derive(Debug, Clone, Copy)]
pub struct Dilate {
    iterations: u8,
}

impl Default for Dilate {
    fn default() -> Self {
        Self { iterations: 1 }
    }
}

impl Dilate {
    pub fn new(iterations: u8) -> Self {
        Self {
            iterations: iterations.clamp(1, MAX_ITERATIONS),
        }
    }

    pub fn iterations(&self) -> u8 {
        self.iterations
    }

    pub fn set_iterations(&mut self, iterations: u8) {
        self.iterations = iterations.clamp(1, MAX_ITERATIONS);
    }
}

impl Processor for Dilate {
    fn name(&self) -> &'static str {
        "Dilate"
    }

    fn process(&self, frame: RgbImage) -> Result<RgbImage> {
        let mask = Mask::square(self.iterations);
        Ok(per_channel(&frame, |plane| grayscale_dilate(plane, &mask)))
    }
}

/// Gray-level erosion, the channel-wise minimum; the dual of [`Dilate`].
#[derive(Debug, Clone, Copy)]
pub struct Erode {
    iterations: u8,
}

impl Default for Erode {
    fn default() -> Self {
        Self { iterations: 1 }
    }
}

impl Erode {
    pub fn new(iterations: u8) -> Self {
        Self {
            iterations: iterations.clamp(1, MAX_ITERATIONS),
        }
    }

    pub fn iterations(&self) -> u8 {
        self.iterations
    }

    pub fn set_iterations(&mut self, iterations: u8) {
        self.iterations = iterations.clamp(1, MAX_ITERATIONS);
    }
}

impl Processor for Erode {
    fn name(&self) -> &'static str {
        "Erode"
    }

    fn process(&self, frame: RgbImage) -> Result<RgbImage> {
        let mask = Mask::square(self.iterations);
        Ok(per_channel(&frame, |plane| grayscale_erode(plane, &mask)))
    }
}
