use anyhow::Result;
use image::{imageops, Rgb, RgbImage};
use imageproc::contrast::equalize_histogram;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

use super::{from_gray, to_gray, Processor};
use crate::error::WorkbenchError;

/// Luminance conversion; the result stays three-channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrayScale;

impl Processor for GrayScale {
    fn name(&self) -> &'static str {
        "Gray Scale"
    }

    fn process(&self, frame: RgbImage) -> Result<RgbImage> {
        Ok(from_gray(to_gray(&frame)))
    }
}

/// Per-channel bitwise not.
#[derive(Debug, Clone, Copy, Default)]
pub struct Invert;

impl Processor for Invert {
    fn name(&self) -> &'static str {
        "Invert"
    }

    fn process(&self, mut frame: RgbImage) -> Result<RgbImage> {
        imageops::invert(&mut frame);
        Ok(frame)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlipMode {
    #[default]
    Horizontal,
    Vertical,
    Both,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Flip {
    pub mode: FlipMode,
}

impl Processor for Flip {
    fn name(&self) -> &'static str {
        "Flip"
    }

    fn process(&self, frame: RgbImage) -> Result<RgbImage> {
        Ok(match self.mode {
            FlipMode::Horizontal => imageops::flip_horizontal(&frame),
            FlipMode::Vertical => imageops::flip_vertical(&frame),
            FlipMode::Both => imageops::rotate180(&frame),
        })
    }
}

/// Rotation about the frame center. Quarter turns are exact and change the
/// frame dimensions; other angles keep the size and fill exposed corners
/// with black.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rotate {
    angle: f32,
}

impl Rotate {
    pub fn new(angle: f32) -> Self {
        let mut rotate = Self::default();
        rotate.set_angle(angle);
        rotate
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Normalized into `[0, 360)`.
    pub fn set_angle(&mut self, angle: f32) {
        self.angle = if angle.is_finite() {
            angle.rem_euclid(360.0)
        } else {
            0.0
        };
    }
}

impl Processor for Rotate {
    fn name(&self) -> &'static str {
        "Rotate"
    }

    fn process(&self, frame: RgbImage) -> Result<RgbImage> {
        Ok(match self.angle {
            a if a == 0.0 => frame,
            a if a == 90.0 => imageops::rotate90(&frame),
            a if a == 180.0 => imageops::rotate180(&frame),
            a if a == 270.0 => imageops::rotate270(&frame),
            a => rotate_about_center(
                &frame,
                a.to_radians(),
                Interpolation::Bilinear,
                Rgb([0, 0, 0]),
            ),
        })
    }
}

/// Histogram equalization of the luminance.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualizeHist;

impl Processor for EqualizeHist {
    fn name(&self) -> &'static str {
        "Equalize Hist"
    }

    fn process(&self, frame: RgbImage) -> Result<RgbImage> {
        Ok(from_gray(equalize_histogram(&to_gray(&frame))))
    }
}

/// Crop to a fixed rectangle. Fails when the rectangle leaves the frame.
#[derive(Debug, Clone, Copy)]
pub struct RegionOfInterest {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl Default for RegionOfInterest {
    fn default() -> Self {
        Self::new(0, 0, 320, 240)
    }
}

impl RegionOfInterest {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn set_origin(&mut self, x: u32, y: u32) {
        self.x = x;
        self.y = y;
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }
}

impl Processor for RegionOfInterest {
    fn name(&self) -> &'static str {
        "Region Of Interest"
    }

    fn process(&self, frame: RgbImage) -> Result<RgbImage> {
        let (frame_width, frame_height) = frame.dimensions();
        let fits = |start: u32, len: u32, limit: u32| {
            start.checked_add(len).is_some_and(|end| end <= limit)
        };
        if !fits(self.x, self.width, frame_width) || !fits(self.y, self.height, frame_height) {
            return Err(WorkbenchError::RegionOutOfBounds {
                x: self.x,
                y: self.y,
                width: self.width,
                height: self.height,
                frame_width,
                frame_height,
            }
            .into());
        }
        Ok(imageops::crop_imm(&frame, self.x, self.y, self.width, self.height).to_image())
    }
}
