//! Static registry of processor types.

use std::sync::Arc;

use anyhow::Result;

use super::*;
use crate::error::WorkbenchError;

struct ProcessorEntry {
    name: &'static str,
    create: fn() -> Arc<dyn Processor>,
}

fn make<P: Processor + Default + 'static>() -> Arc<dyn Processor> {
    Arc::new(P::default())
}

// Sorted by name.
const PROCESSORS: &[ProcessorEntry] = &[
    ProcessorEntry { name: "Canny", create: make::<Canny> },
    ProcessorEntry { name: "Dilate", create: make::<Dilate> },
    ProcessorEntry { name: "Equalize Hist", create: make::<EqualizeHist> },
    ProcessorEntry { name: "Erode", create: make::<Erode> },
    ProcessorEntry { name: "Flip", create: make::<Flip> },
    ProcessorEntry { name: "Gray Scale", create: make::<GrayScale> },
    ProcessorEntry { name: "Invert", create: make::<Invert> },
    ProcessorEntry { name: "Region Of Interest", create: make::<RegionOfInterest> },
    ProcessorEntry { name: "Rotate", create: make::<Rotate> },
    ProcessorEntry { name: "Smooth Blur", create: make::<SmoothBlur> },
    ProcessorEntry { name: "Smooth Gaussian", create: make::<SmoothGaussian> },
    ProcessorEntry { name: "Smooth Median", create: make::<SmoothMedian> },
    ProcessorEntry { name: "Sobel", create: make::<Sobel> },
    ProcessorEntry { name: "Threshold", create: make::<Threshold> },
    ProcessorEntry { name: "Undistort", create: make::<Undistort> },
];

/// Names of every registered processor, sorted.
pub fn names() -> impl Iterator<Item = &'static str> {
    PROCESSORS.iter().map(|entry| entry.name)
}

/// Instantiate a processor with default configuration.
///
/// Lookup ignores case, spaces and punctuation, so `"smooth-gaussian"` and
/// `"SmoothGaussian"` both resolve to `"Smooth Gaussian"`.
pub fn create(name: &str) -> Result<Arc<dyn Processor>> {
    let key = catalog_key(name);
    PROCESSORS
        .iter()
        .find(|entry| catalog_key(entry.name) == key)
        .map(|entry| (entry.create)())
        .ok_or_else(|| WorkbenchError::UnknownProcessor(name.to_string()).into())
}

pub(crate) fn catalog_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
