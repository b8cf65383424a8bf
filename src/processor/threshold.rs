use anyhow::Result;
use image::RgbImage;

use super::{from_gray, to_gray, Processor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThresholdMode {
    /// `max_value` above the threshold, 0 otherwise.
    #[default]
    Binary,
    /// 0 above the threshold, `max_value` otherwise.
    BinaryInverted,
    /// Source value above the threshold, 0 otherwise.
    ToZero,
    /// Threshold value above the threshold, source value otherwise.
    Truncate,
}

/// Fixed-level threshold on the grayscale frame.
#[derive(Debug, Clone)]
pub struct Threshold {
    threshold: u8,
    max_value: u8,
    mode: ThresholdMode,
}

impl Default for Threshold {
    fn default() -> Self {
        Self {
            threshold: 127,
            max_value: 255,
            mode: ThresholdMode::Binary,
        }
    }
}

impl Threshold {
    pub fn new(threshold: u8, mode: ThresholdMode) -> Self {
        Self {
            threshold,
            mode,
            ..Self::default()
        }
    }

    pub fn with_max_value(mut self, max_value: u8) -> Self {
        self.max_value = max_value;
        self
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: u8) {
        self.threshold = threshold;
    }

    pub fn max_value(&self) -> u8 {
        self.max_value
    }

    pub fn set_max_value(&mut self, max_value: u8) {
        self.max_value = max_value;
    }

    pub fn mode(&self) -> ThresholdMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ThresholdMode) {
        self.mode = mode;
    }

    fn apply(&self, value: u8) -> u8 {
        let above = value > self.threshold;
        match self.mode {
            ThresholdMode::Binary if above => self.max_value,
            ThresholdMode::Binary => 0,
            ThresholdMode::BinaryInverted if above => 0,
            ThresholdMode::BinaryInverted => self.max_value,
            ThresholdMode::ToZero if above => value,
            ThresholdMode::ToZero => 0,
            ThresholdMode::Truncate if above => self.threshold,
            ThresholdMode::Truncate => value,
        }
    }
}

impl Processor for Threshold {
    fn name(&self) -> &'static str {
        "Threshold"
    }

    fn process(&self, frame: RgbImage) -> Result<RgbImage> {
        let mut gray = to_gray(&frame);
        for pixel in gray.pixels_mut() {
            pixel[0] = self.apply(pixel[0]);
        }
        Ok(from_gray(gray))
    }
}
