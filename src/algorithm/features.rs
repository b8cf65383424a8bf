use anyhow::Result;
use image::{Rgb, RgbImage};
use imageproc::corners::{corners_fast12, corners_fast9, Corner};

use super::{Algorithm, AlgorithmOutput};
use crate::annotate::{draw_records, Annotation};
use crate::processor::to_gray;
use crate::records::{KeyPoint, ResultRecord};

/// Diameter reported for FAST keypoints, the size of the test circle.
const FAST_KEYPOINT_SIZE: f32 = 7.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FastVariant {
    /// 9 contiguous pixels of the 16-pixel circle.
    #[default]
    Fast9,
    /// 12 contiguous pixels; fewer, stronger corners.
    Fast12,
}

/// FAST corner detection, reported as keypoints ordered by response.
#[derive(Debug, Clone)]
pub struct FeatureDetection {
    pub variant: FastVariant,
    threshold: u8,
    max_keypoints: usize,
    pub annotation: Annotation,
}

impl Default for FeatureDetection {
    fn default() -> Self {
        Self {
            variant: FastVariant::Fast9,
            threshold: 10,
            max_keypoints: 500,
            annotation: Annotation::new(Rgb([0, 255, 255]), 1),
        }
    }
}

impl FeatureDetection {
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: u8) {
        self.threshold = threshold.max(1);
    }

    pub fn max_keypoints(&self) -> usize {
        self.max_keypoints
    }

    /// Zero keeps every detected corner.
    pub fn set_max_keypoints(&mut self, max: usize) {
        self.max_keypoints = max;
    }
}

fn to_keypoint(corner: &Corner) -> KeyPoint {
    KeyPoint {
        x: corner.x as f32,
        y: corner.y as f32,
        size: FAST_KEYPOINT_SIZE,
        angle: -1.0,
        response: corner.score,
        octave: 0,
        class_id: -1,
    }
}

impl Algorithm for FeatureDetection {
    fn name(&self) -> &'static str {
        "Feature Detection"
    }

    fn process(&mut self, frame: &RgbImage) -> Result<AlgorithmOutput> {
        let gray = to_gray(frame);
        let mut corners = match self.variant {
            FastVariant::Fast9 => corners_fast9(&gray, self.threshold),
            FastVariant::Fast12 => corners_fast12(&gray, self.threshold),
        };
        corners.sort_by(|a, b| b.score.total_cmp(&a.score));
        if self.max_keypoints > 0 {
            corners.truncate(self.max_keypoints);
        }

        let records: Vec<ResultRecord> = corners
            .iter()
            .map(|c| ResultRecord::KeyPoint(to_keypoint(c)))
            .collect();
        tracing::debug!("FAST: {} keypoints", records.len());

        let mut annotated = frame.clone();
        draw_records(&mut annotated, &records, self.annotation);
        Ok(AlgorithmOutput { annotated, records })
    }

    fn annotation(&self) -> Annotation {
        self.annotation
    }
}
