use anyhow::Result;
use image::RgbImage;

use super::{Algorithm, AlgorithmOutput};

/// Identity: publishes the processed frame with no records.
#[derive(Debug, Default)]
pub struct NoAlgorithm;

impl Algorithm for NoAlgorithm {
    fn name(&self) -> &'static str {
        "None"
    }

    fn process(&mut self, frame: &RgbImage) -> Result<AlgorithmOutput> {
        Ok(AlgorithmOutput::passthrough(frame))
    }
}
