use anyhow::Result;
use image::{GrayImage, Luma, RgbImage};
use imageproc::edges::canny;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use super::{from_gray, to_gray, Processor};

/// Canny edge detector on the luminance.
#[derive(Debug, Clone, Copy)]
pub struct Canny {
    low_threshold: f32,
    high_threshold: f32,
}

impl Default for Canny {
    fn default() -> Self {
        Self {
            low_threshold: 50.0,
            high_threshold: 100.0,
        }
    }
}

impl Canny {
    pub fn new(low_threshold: f32, high_threshold: f32) -> Self {
        let mut canny = Self::default();
        canny.set_thresholds(low_threshold, high_threshold);
        canny
    }

    pub fn thresholds(&self) -> (f32, f32) {
        (self.low_threshold, self.high_threshold)
    }

    /// Thresholds are clamped to `[0, 1000]` and ordered so that
    /// `low <= high`.
    pub fn set_thresholds(&mut self, low: f32, high: f32) {
        let low = low.clamp(0.0, 1000.0);
        let high = high.clamp(0.0, 1000.0);
        self.low_threshold = low.min(high);
        self.high_threshold = low.max(high);
    }
}

impl Processor for Canny {
    fn name(&self) -> &'static str {
        "Canny"
    }

    fn process(&self, frame: RgbImage) -> Result<RgbImage> {
        let gray = to_gray(&frame);
        Ok(from_gray(canny(&gray, self.low_threshold, self.high_threshold)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SobelOrder {
    #[default]
    X,
    Y,
}

/// First derivative along one axis, absolute value saturated to 8 bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sobel {
    pub order: SobelOrder,
}

impl Processor for Sobel {
    fn name(&self) -> &'static str {
        "Sobel"
    }

    fn process(&self, frame: RgbImage) -> Result<RgbImage> {
        let gray = to_gray(&frame);
        let gradient = match self.order {
            SobelOrder::X => horizontal_sobel(&gray),
            SobelOrder::Y => vertical_sobel(&gray),
        };
        let magnitude = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            Luma([gradient.get_pixel(x, y)[0].unsigned_abs().min(255) as u8])
        });
        Ok(from_gray(magnitude))
    }
}
