use anyhow::Result;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::filter::{box_filter, gaussian_blur_f32, median_filter};

use super::{clamp_odd, Processor};

const MIN_KERNEL: u32 = 1;
const MAX_KERNEL: u32 = 99;

/// Normalized box blur with an odd square kernel.
#[derive(Debug, Clone, Copy)]
pub struct SmoothBlur {
    kernel_size: u32,
}

impl Default for SmoothBlur {
    fn default() -> Self {
        Self { kernel_size: 3 }
    }
}

impl SmoothBlur {
    pub fn new(kernel_size: u32) -> Self {
        let mut blur = Self::default();
        blur.set_kernel_size(kernel_size);
        blur
    }

    pub fn kernel_size(&self) -> u32 {
        self.kernel_size
    }

    pub fn set_kernel_size(&mut self, size: u32) {
        self.kernel_size = clamp_odd(size, self.kernel_size, MIN_KERNEL, MAX_KERNEL);
    }
}

impl Processor for SmoothBlur {
    fn name(&self) -> &'static str {
        "Smooth Blur"
    }

    fn process(&self, frame: RgbImage) -> Result<RgbImage> {
        let radius = self.kernel_size / 2;
        Ok(per_channel(&frame, |plane| box_filter(plane, radius, radius)))
    }
}

/// Gaussian blur; sigma is derived from the odd kernel size the way
/// OpenCV derives it when sigma is left at zero.
#[derive(Debug, Clone, Copy)]
pub struct SmoothGaussian {
    kernel_size: u32,
}

impl Default for SmoothGaussian {
    fn default() -> Self {
        Self { kernel_size: 5 }
    }
}

impl SmoothGaussian {
    pub fn new(kernel_size: u32) -> Self {
        let mut blur = Self::default();
        blur.set_kernel_size(kernel_size);
        blur
    }

    pub fn kernel_size(&self) -> u32 {
        self.kernel_size
    }

    pub fn set_kernel_size(&mut self, size: u32) {
        self.kernel_size = clamp_odd(size, self.kernel_size, 3, MAX_KERNEL);
    }

    pub fn sigma(&self) -> f32 {
        0.3 * ((self.kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
    }
}

impl Processor for SmoothGaussian {
    fn name(&self) -> &'static str {
        "Smooth Gaussian"
    }

    fn process(&self, frame: RgbImage) -> Result<RgbImage> {
        Ok(gaussian_blur_f32(&frame, self.sigma()))
    }
}

/// Median filter with an odd square kernel.
#[derive(Debug, Clone, Copy)]
pub struct SmoothMedian {
    kernel_size: u32,
}

impl Default for SmoothMedian {
    fn default() -> Self {
        Self { kernel_size: 3 }
    }
}

impl SmoothMedian {
    pub fn new(kernel_size: u32) -> Self {
        let mut median = Self::default();
        median.set_kernel_size(kernel_size);
        median
    }

    pub fn kernel_size(&self) -> u32 {
        self.kernel_size
    }

    pub fn set_kernel_size(&mut self, size: u32) {
        self.kernel_size = clamp_odd(size, self.kernel_size, MIN_KERNEL, MAX_KERNEL);
    }
}

impl Processor for SmoothMedian {
    fn name(&self) -> &'static str {
        "Smooth Median"
    }

    fn process(&self, frame: RgbImage) -> Result<RgbImage> {
        let radius = self.kernel_size / 2;
        Ok(median_filter(&frame, radius, radius))
    }
}

/// Run a single-channel filter over each color plane.
fn per_channel<F>(frame: &RgbImage, filter: F) -> RgbImage
where
    F: Fn(&GrayImage) -> GrayImage,
{
    let (width, height) = frame.dimensions();
    let planes: Vec<GrayImage> = (0..3)
        .map(|c| {
            let plane = GrayImage::from_fn(width, height, |x, y| Luma([frame.get_pixel(x, y)[c]]));
            filter(&plane)
        })
        .collect();

    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            planes[0].get_pixel(x, y)[0],
            planes[1].get_pixel(x, y)[0],
            planes[2].get_pixel(x, y)[0],
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speck() -> RgbImage {
        let mut frame = RgbImage::new(9, 9);
        frame.put_pixel(4, 4, Rgb([255, 90, 0]));
        frame
    }

    #[test]
    fn kernel_sizes_stay_odd() {
        let mut blur = SmoothBlur::new(4);
        assert_eq!(blur.kernel_size(), 5);
        blur.set_kernel_size(4);
        assert_eq!(blur.kernel_size(), 3);
        assert_eq!(SmoothGaussian::new(1).kernel_size(), 3);
        assert_eq!(SmoothMedian::new(500).kernel_size(), 99);
    }

    #[test]
    fn median_removes_isolated_speck() {
        let out = SmoothMedian::new(3).process(speck()).unwrap();
        assert!(out.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn box_blur_spreads_each_channel() {
        let out = SmoothBlur::new(3).process(speck()).unwrap();
        let center = out.get_pixel(4, 4);
        let neighbour = out.get_pixel(3, 3);
        assert!(center[0] > 0 && center[0] < 255);
        assert!(neighbour[0] > 0);
        assert!(neighbour[1] > 0);
        assert_eq!(neighbour[2], 0);
        assert_eq!(out.get_pixel(0, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn gaussian_sigma_matches_kernel() {
        assert!((SmoothGaussian::new(5).sigma() - 1.1).abs() < 1e-6);
        let out = SmoothGaussian::new(5).process(speck()).unwrap();
        assert!(out.get_pixel(4, 4)[0] < 255);
    }
}
