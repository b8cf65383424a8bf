use std::path::Path;

use anyhow::Result;
use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_with, Interpolation};

use super::Processor;
use crate::calibration::Calibration;

/// Compensates lens distortion using parameters persisted by a camera
/// calibration. Without parameters the processor passes frames through.
#[derive(Debug, Clone)]
pub struct Undistort {
    calibration: Option<Calibration>,
}

impl Default for Undistort {
    /// Loads calibration files from the working directory if present.
    fn default() -> Self {
        Self::from_dir(Path::new("."))
    }
}

impl Undistort {
    pub fn from_dir(dir: &Path) -> Self {
        let calibration = match Calibration::load(dir) {
            Ok(Some(calibration)) => {
                tracing::info!("Loaded calibration parameters from {}", dir.display());
                Some(calibration)
            }
            Ok(None) => {
                tracing::warn!(
                    "No calibration parameters in {}; undistort passes frames through",
                    dir.display()
                );
                None
            }
            Err(err) => {
                tracing::warn!("Failed to load calibration parameters: {:#}", err);
                None
            }
        };
        Self { calibration }
    }

    pub fn with_calibration(calibration: Calibration) -> Self {
        Self {
            calibration: Some(calibration),
        }
    }

    pub fn parameters_loaded(&self) -> bool {
        self.calibration.is_some()
    }
}

impl Processor for Undistort {
    fn name(&self) -> &'static str {
        "Undistort"
    }

    fn process(&self, frame: RgbImage) -> Result<RgbImage> {
        let Some(calibration) = &self.calibration else {
            return Ok(frame);
        };
        Ok(warp_with(
            &frame,
            |x, y| calibration.distort_pixel(x, y),
            Interpolation::Bilinear,
            Rgb([0, 0, 0]),
        ))
    }
}
