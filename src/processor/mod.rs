//! Stateless per-frame image processors and the ordered chain that runs them.

mod basic;
mod catalog;
mod edges;
mod filters;
mod morphology;
mod threshold;
mod undistort;

pub use basic::{EqualizeHist, Flip, FlipMode, GrayScale, Invert, RegionOfInterest, Rotate};
pub use catalog::{create, names};
pub(crate) use catalog::catalog_key;
pub use edges::{Canny, Sobel, SobelOrder};
pub use filters::{SmoothBlur, SmoothGaussian, SmoothMedian};
pub use morphology::{Dilate, Erode};
pub use threshold::{Threshold, ThresholdMode};
pub use undistort::Undistort;

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use image::{imageops, DynamicImage, GrayImage, RgbImage};

/// A unary frame transform.
///
/// Implementations must be pure functions of the input frame and their own
/// configuration. Parameter validation happens in setters; `process` only
/// fails for conditions that depend on the frame itself.
pub trait Processor: Send + Sync {
    fn name(&self) -> &'static str;

    fn process(&self, frame: RgbImage) -> Result<RgbImage>;
}

/// Ordered list of processors; insertion order is execution order.
///
/// Processors are shared behind `Arc`, so cloning a chain is cheap. The
/// engine clones the live chain once per frame and runs the copy outside
/// the lock.
#[derive(Clone, Default)]
pub struct ProcessorChain {
    processors: Vec<Arc<dyn Processor>>,
}

impl ProcessorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the frame through every processor, left to right.
    pub fn apply(&self, frame: RgbImage) -> Result<RgbImage> {
        self.processors
            .iter()
            .try_fold(frame, |frame, processor| {
                let _span = tracing::debug_span!("processor", name = processor.name()).entered();
                processor
                    .process(frame)
                    .with_context(|| format!("{} failed", processor.name()))
            })
    }

    pub fn push<P: Processor + 'static>(&mut self, processor: P) {
        self.processors.push(Arc::new(processor));
    }

    /// Instantiate a processor from the catalog and append it.
    pub fn add(&mut self, name: &str) -> Result<()> {
        self.processors.push(create(name)?);
        Ok(())
    }

    /// Insert at `index`, shifting later processors back. Fails past the end.
    pub fn insert<P: Processor + 'static>(&mut self, index: usize, processor: P) -> bool {
        if index > self.processors.len() {
            return false;
        }
        self.processors.insert(index, Arc::new(processor));
        true
    }

    /// Replace the processor at `index` and return the previous one.
    ///
    /// Chain entries are shared with in-flight frames, so reconfiguring one
    /// means building a new instance and swapping it in here.
    pub fn replace<P: Processor + 'static>(
        &mut self,
        index: usize,
        processor: P,
    ) -> Option<Arc<dyn Processor>> {
        let slot = self.processors.get_mut(index)?;
        Some(std::mem::replace(slot, Arc::new(processor)))
    }

    pub fn remove(&mut self, index: usize) -> Option<Arc<dyn Processor>> {
        (index < self.processors.len()).then(|| self.processors.remove(index))
    }

    /// Swap the processor at `index` with its predecessor.
    pub fn move_up(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.processors.len() {
            return false;
        }
        self.processors.swap(index, index - 1);
        true
    }

    /// Swap the processor at `index` with its successor.
    pub fn move_down(&mut self, index: usize) -> bool {
        if index + 1 >= self.processors.len() {
            return false;
        }
        self.processors.swap(index, index + 1);
        true
    }

    pub fn clear(&mut self) {
        self.processors.clear();
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }
}

impl fmt::Debug for ProcessorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Clamp to an odd value in `[min, max]`. Even values step away from
/// `last`, so dragging a slider up or down skips over even sizes in the
/// direction of travel.
pub fn clamp_odd(value: u32, last: u32, min: u32, max: u32) -> u32 {
    let odd = if value % 2 == 0 {
        if value > last {
            value + 1
        } else {
            value.saturating_sub(1)
        }
    } else {
        value
    };
    odd.clamp(min, max)
}

pub(crate) fn to_gray(frame: &RgbImage) -> GrayImage {
    imageops::grayscale(frame)
}

pub(crate) fn from_gray(gray: GrayImage) -> RgbImage {
    DynamicImage::ImageLuma8(gray).to_rgb8()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gray_frame(values: &[u8], width: u32) -> RgbImage {
        let height = values.len() as u32 / width;
        RgbImage::from_fn(width, height, |x, y| {
            let v = values[(y * width + x) as usize];
            Rgb([v, v, v])
        })
    }

    fn luma(frame: &RgbImage) -> Vec<u8> {
        frame.pixels().map(|p| p[0]).collect()
    }

    #[test]
    fn empty_chain_is_identity() {
        let frame = gray_frame(&[1, 2, 3, 4, 5, 6], 3);
        let chain = ProcessorChain::new();
        assert_eq!(chain.apply(frame.clone()).unwrap(), frame);
    }

    #[test]
    fn chain_applies_in_list_order() {
        let frame = gray_frame(&[100, 150, 100, 150], 2);
        let threshold = Threshold::new(128, ThresholdMode::Binary);

        let mut chain = ProcessorChain::new();
        chain.push(threshold.clone());
        chain.push(Invert);

        let expected = Invert.process(threshold.process(frame.clone()).unwrap()).unwrap();
        let result = chain.apply(frame.clone()).unwrap();
        assert_eq!(result, expected);
        assert_eq!(luma(&result), vec![255, 0, 255, 0]);
    }

    #[test]
    fn reordering_non_commutative_processors_changes_result() {
        let frame = gray_frame(&[127, 128], 2);

        let mut chain = ProcessorChain::new();
        chain.push(Threshold::new(128, ThresholdMode::Binary));
        chain.push(Invert);
        let threshold_first = chain.apply(frame.clone()).unwrap();
        assert_eq!(luma(&threshold_first), vec![255, 255]);

        assert!(chain.move_up(1));
        assert_eq!(chain.names(), vec!["Invert", "Threshold"]);
        let invert_first = chain.apply(frame).unwrap();
        assert_eq!(luma(&invert_first), vec![0, 0]);
    }

    #[test]
    fn mutations_respect_bounds() {
        let mut chain = ProcessorChain::new();
        chain.push(GrayScale);
        chain.push(Invert);
        chain.push(EqualizeHist);

        assert!(!chain.move_up(0));
        assert!(!chain.move_down(2));
        assert!(!chain.move_up(7));
        assert!(chain.remove(3).is_none());

        assert!(chain.move_down(0));
        assert_eq!(chain.names(), vec!["Invert", "Gray Scale", "Equalize Hist"]);

        let removed = chain.remove(1).unwrap();
        assert_eq!(removed.name(), "Gray Scale");
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn insert_and_replace_keep_positions() {
        let frame = gray_frame(&[100, 150], 2);
        let mut chain = ProcessorChain::new();
        chain.push(Threshold::new(128, ThresholdMode::Binary));
        chain.push(EqualizeHist);

        assert!(chain.insert(1, Invert));
        assert!(!chain.insert(4, Invert));
        assert_eq!(chain.names(), vec!["Threshold", "Invert", "Equalize Hist"]);
        chain.remove(2);

        assert_eq!(luma(&chain.apply(frame.clone()).unwrap()), vec![255, 0]);

        let mut lower = Threshold::default();
        lower.set_threshold(90);
        let previous = chain.replace(0, lower).unwrap();
        assert_eq!(previous.name(), "Threshold");
        assert_eq!(chain.names(), vec!["Threshold", "Invert"]);
        assert_eq!(luma(&chain.apply(frame).unwrap()), vec![0, 0]);

        assert!(chain.replace(5, Invert).is_none());
    }

    #[test]
    fn failing_processor_reports_its_name() {
        let mut chain = ProcessorChain::new();
        chain.push(RegionOfInterest::new(0, 0, 100, 100));
        let err = chain.apply(RgbImage::new(10, 10)).unwrap_err();
        assert!(format!("{:#}", err).contains("Region Of Interest failed"));
    }

    #[test]
    fn clamp_odd_steps_away_from_last_value() {
        assert_eq!(clamp_odd(4, 3, 1, 31), 5);
        assert_eq!(clamp_odd(4, 5, 1, 31), 3);
        assert_eq!(clamp_odd(7, 5, 1, 31), 7);
        assert_eq!(clamp_odd(0, 1, 1, 31), 1);
        assert_eq!(clamp_odd(40, 31, 1, 31), 31);
    }
}
