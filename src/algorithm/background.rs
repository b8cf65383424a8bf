use anyhow::Result;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;

use super::{Algorithm, AlgorithmOutput};
use crate::annotate::{draw_records, Annotation};
use crate::processor::{from_gray, to_gray};
use crate::records::{BoxRecord, Point, ResultRecord};

/// What the published frame shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackgroundView {
    /// Input frame with boxes around moving regions.
    #[default]
    Motion,
    /// Binary foreground mask.
    FgMask,
    /// Current background estimate.
    Background,
}

/// Running-average background model.
///
/// The model is seeded from the first frame, or whenever the frame size
/// changes, and is updated on every frame after that.
#[derive(Debug, Clone)]
pub struct BackgroundSubtraction {
    pub view: BackgroundView,
    learning_rate: f32,
    threshold: u8,
    min_area: u64,
    background: Option<Vec<f32>>,
    size: (u32, u32),
    pub annotation: Annotation,
}

impl Default for BackgroundSubtraction {
    fn default() -> Self {
        Self {
            view: BackgroundView::Motion,
            learning_rate: 0.05,
            threshold: 30,
            min_area: 10_000,
            background: None,
            size: (0, 0),
            annotation: Annotation::new(Rgb([0, 255, 0]), 2),
        }
    }
}

impl BackgroundSubtraction {
    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, rate: f32) {
        self.learning_rate = rate.clamp(0.0, 1.0);
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: u8) {
        self.threshold = threshold;
    }

    pub fn min_area(&self) -> u64 {
        self.min_area
    }

    /// Smallest bounding-box area reported as motion.
    pub fn set_min_area(&mut self, area: u64) {
        self.min_area = area;
    }

    /// Forget the background; the next frame seeds a new one.
    pub fn reset(&mut self) {
        self.background = None;
    }

    fn background_image(&self) -> GrayImage {
        let (width, height) = self.size;
        match &self.background {
            Some(model) => GrayImage::from_fn(width, height, |x, y| {
                Luma([model[(y * width + x) as usize].round() as u8])
            }),
            None => GrayImage::new(width, height),
        }
    }

    /// Foreground mask of `gray`, then fold `gray` into the model.
    fn update(&mut self, gray: &GrayImage) -> GrayImage {
        let size = gray.dimensions();
        let model = match &mut self.background {
            Some(model) if self.size == size => model,
            _ => {
                tracing::debug!("Seeding background model at {}x{}", size.0, size.1);
                self.size = size;
                self.background = Some(gray.pixels().map(|p| p[0] as f32).collect());
                return GrayImage::new(size.0, size.1);
            }
        };

        let threshold = self.threshold as f32;
        let rate = self.learning_rate;
        let mut mask = GrayImage::new(size.0, size.1);
        for ((value, bg), out) in gray.pixels().zip(model.iter_mut()).zip(mask.pixels_mut()) {
            let value = value[0] as f32;
            if (value - *bg).abs() > threshold {
                *out = Luma([255]);
            }
            *bg += rate * (value - *bg);
        }
        mask
    }
}

impl Algorithm for BackgroundSubtraction {
    fn name(&self) -> &'static str {
        "Background Subtraction"
    }

    fn process(&mut self, frame: &RgbImage) -> Result<AlgorithmOutput> {
        let mask = dilate(&self.update(&to_gray(frame)), Norm::LInf, 2);

        let records: Vec<ResultRecord> = find_contours::<i32>(&mask)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .filter_map(|c| {
                let points: Vec<Point> = c.points.iter().map(|p| Point::new(p.x, p.y)).collect();
                BoxRecord::enclosing(&points)
            })
            .filter(|b| b.area() >= self.min_area)
            .map(ResultRecord::Box)
            .collect();

        let annotated = match self.view {
            BackgroundView::Motion => {
                let mut annotated = frame.clone();
                draw_records(&mut annotated, &records, self.annotation);
                annotated
            }
            BackgroundView::FgMask => from_gray(mask),
            BackgroundView::Background => from_gray(self.background_image()),
        };
        Ok(AlgorithmOutput { annotated, records })
    }

    fn annotation(&self) -> Annotation {
        self.annotation
    }
}
