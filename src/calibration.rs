//! Persisted camera calibration: intrinsic matrix and distortion
//! coefficients, stored as two JSON files side by side.
//!
//! The crate only consumes calibrations through `Undistort`. Files are
//! produced by an external calibration tool or by [`Calibration::save`];
//! there is no chessboard accumulation here.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::WorkbenchError;

pub const CAMERA_MATRIX_FILE: &str = "camera_matrix.json";
pub const DIST_COEFFS_FILE: &str = "dist_coeffs.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Row-major 3x3 intrinsic matrix `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`.
    pub camera_matrix: [[f64; 3]; 3],
    /// OpenCV ordering: k1, k2, p1, p2, k3 (further terms ignored).
    pub dist_coeffs: Vec<f64>,
}

impl Calibration {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64, dist_coeffs: [f64; 5]) -> Self {
        Self {
            camera_matrix: [[fx, 0.0, cx], [0.0, fy, cy], [0.0, 0.0, 1.0]],
            dist_coeffs: dist_coeffs.to_vec(),
        }
    }

    /// Write both files into `dir`, replacing earlier results.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let matrix_path = dir.join(CAMERA_MATRIX_FILE);
        let coeffs_path = dir.join(DIST_COEFFS_FILE);

        let file = File::create(&matrix_path)
            .with_context(|| format!("Failed to create {}", matrix_path.display()))?;
        serde_json::to_writer_pretty(file, &self.camera_matrix)?;

        let file = File::create(&coeffs_path)
            .with_context(|| format!("Failed to create {}", coeffs_path.display()))?;
        serde_json::to_writer_pretty(file, &self.dist_coeffs)?;

        tracing::info!("Saved calibration parameters to {}", dir.display());
        Ok(())
    }

    /// Load both files from `dir`. Returns `Ok(None)` unless both exist.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let matrix_path = dir.join(CAMERA_MATRIX_FILE);
        let coeffs_path = dir.join(DIST_COEFFS_FILE);
        if !matrix_path.is_file() || !coeffs_path.is_file() {
            return Ok(None);
        }

        let camera_matrix: [[f64; 3]; 3] = read_json(&matrix_path)?;
        let dist_coeffs: Vec<f64> = read_json(&coeffs_path)?;

        if dist_coeffs.len() < 4 {
            return Err(WorkbenchError::InvalidCalibration {
                path: coeffs_path,
                reason: format!("expected at least 4 coefficients, found {}", dist_coeffs.len()),
            }
            .into());
        }
        if camera_matrix[0][0] == 0.0 || camera_matrix[1][1] == 0.0 {
            return Err(WorkbenchError::InvalidCalibration {
                path: matrix_path,
                reason: "focal length is zero".to_string(),
            }
            .into());
        }

        Ok(Some(Self {
            camera_matrix,
            dist_coeffs,
        }))
    }

    fn coefficient(&self, index: usize) -> f64 {
        self.dist_coeffs.get(index).copied().unwrap_or(0.0)
    }

    /// Map an undistorted output pixel to where it appears in the distorted
    /// source image (radial k1, k2, k3 and tangential p1, p2 terms).
    pub fn distort_pixel(&self, u: f32, v: f32) -> (f32, f32) {
        let [[fx, _, cx], [_, fy, cy], _] = self.camera_matrix;
        let (k1, k2, p1, p2, k3) = (
            self.coefficient(0),
            self.coefficient(1),
            self.coefficient(2),
            self.coefficient(3),
            self.coefficient(4),
        );

        let x = (u as f64 - cx) / fx;
        let y = (v as f64 - cy) / fy;
        let r2 = x * x + y * y;
        let radial = 1.0 + k1 * r2 + k2 * r2 * r2 + k3 * r2 * r2 * r2;
        let xd = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;

        ((fx * xd + cx) as f32, (fy * yd + cy) as f32)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|err| {
        WorkbenchError::InvalidCalibration {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
        .into()
    })
}
