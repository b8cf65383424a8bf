//! Conversions between frames and model tensors.

use anyhow::{bail, Result};
use image::{imageops, GrayImage, Luma, Rgb, RgbImage};
use ndarray::Array4;

use crate::records::BoxRecord;

/// Resize `frame` to the model input and lay it out as NCHW floats in [0, 1].
pub fn frame_to_nchw(frame: &RgbImage, width: u32, height: u32) -> Array4<f32> {
    let _span = tracing::debug_span!("to_nchw").entered();

    let resized;
    let source = if frame.dimensions() == (width, height) {
        frame
    } else {
        resized = imageops::resize(frame, width, height, imageops::FilterType::Triangle);
        &resized
    };

    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in source.enumerate_pixels() {
        for channel in 0..3 {
            tensor[[0, channel, y as usize, x as usize]] = pixel[channel] as f32 / 255.0;
        }
    }
    tensor
}

/// Per-pixel foreground alpha at frame resolution, 0.0 background to
/// 1.0 foreground.
#[derive(Debug, Clone, PartialEq)]
pub struct Matte {
    width: u32,
    height: u32,
    alpha: Vec<f32>,
}

impl Matte {
    pub fn new(width: u32, height: u32, alpha: Vec<f32>) -> Result<Self> {
        if alpha.len() != (width * height) as usize {
            bail!(
                "matte has {} values, expected {}x{}",
                alpha.len(),
                width,
                height
            );
        }
        Ok(Self {
            width,
            height,
            alpha,
        })
    }

    /// Build from a `[1, 1, H, W]` model output, resized to the frame.
    pub fn from_model_output(
        shape: &[usize],
        data: &[f32],
        frame_width: u32,
        frame_height: u32,
    ) -> Result<Self> {
        let &[.., h, w] = shape else {
            bail!("matte output has shape {:?}", shape);
        };
        let (w, h) = (w as u32, h as u32);
        let matte = Self::new(w, h, data.to_vec())?;
        if (w, h) == (frame_width, frame_height) {
            return Ok(matte);
        }

        let resized = imageops::resize(
            &matte.to_gray(),
            frame_width,
            frame_height,
            imageops::FilterType::Triangle,
        );
        Self::new(
            frame_width,
            frame_height,
            resized.pixels().map(|p| p[0] as f32 / 255.0).collect(),
        )
    }

    pub fn alpha(&self, x: u32, y: u32) -> f32 {
        self.alpha[(y * self.width + x) as usize]
    }

    fn to_gray(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([(self.alpha(x, y) * 255.0).round().clamp(0.0, 255.0) as u8])
        })
    }

    /// Gray-scale silhouette.
    pub fn to_rgb(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let v = (self.alpha(x, y) * 255.0).round().clamp(0.0, 255.0) as u8;
            Rgb([v, v, v])
        })
    }

    /// Blend `frame` over a solid `background` using the matte as alpha.
    pub fn composite(&self, frame: &RgbImage, background: Rgb<u8>) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let a = self.alpha(x, y).clamp(0.0, 1.0);
            let fg = frame.get_pixel(x, y);
            Rgb(std::array::from_fn(|c| {
                (fg[c] as f32 * a + background[c] as f32 * (1.0 - a)).round() as u8
            }))
        })
    }

    /// Box around every pixel whose alpha exceeds `threshold`.
    pub fn foreground_box(&self, threshold: f32) -> Option<BoxRecord> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for y in 0..self.height {
            for x in 0..self.width {
                if self.alpha(x, y) <= threshold {
                    continue;
                }
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
        bounds.map(|(x0, y0, x1, y1)| {
            BoxRecord::new(x0 as i32, y0 as i32, x1 - x0 + 1, y1 - y0 + 1)
        })
    }
}
