//! Person matting with a recurrent ONNX video-matting network.

mod recurrent;
mod tensor;

pub use recurrent::VideoMattingModel;
pub use tensor::{frame_to_nchw, Matte};

use std::path::Path;

use anyhow::Result;
use image::{Rgb, RgbImage};

use super::{Algorithm, AlgorithmOutput};
use crate::annotate::{draw_records, Annotation};
use crate::records::ResultRecord;

/// Alpha above which a pixel counts as foreground for the bounding box.
const FOREGROUND_ALPHA: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MattingView {
    /// Gray-scale alpha matte.
    #[default]
    Matte,
    /// Foreground over a solid background color.
    Composite,
    /// Input frame with a box around the foreground.
    Outline,
}

pub struct Matting {
    model: VideoMattingModel,
    pub view: MattingView,
    pub background: Rgb<u8>,
    pub annotation: Annotation,
}

impl Matting {
    pub fn new(model_path: &Path) -> Result<Self> {
        Ok(Self {
            model: VideoMattingModel::load(model_path)?,
            view: MattingView::default(),
            background: Rgb([0, 177, 64]),
            annotation: Annotation::default(),
        })
    }

    /// Drop the recurrent state, e.g. after a scene cut.
    pub fn reset(&mut self) {
        self.model.reset();
    }
}

impl Algorithm for Matting {
    fn name(&self) -> &'static str {
        "Matting"
    }

    fn process(&mut self, frame: &RgbImage) -> Result<AlgorithmOutput> {
        let matte = self.model.infer(frame)?;
        let records: Vec<ResultRecord> = matte
            .foreground_box(FOREGROUND_ALPHA)
            .map(ResultRecord::Box)
            .into_iter()
            .collect();

        let annotated = match self.view {
            MattingView::Matte => matte.to_rgb(),
            MattingView::Composite => matte.composite(frame, self.background),
            MattingView::Outline => {
                let mut annotated = frame.clone();
                draw_records(&mut annotated, &records, self.annotation);
                annotated
            }
        };
        Ok(AlgorithmOutput { annotated, records })
    }

    fn annotation(&self) -> Annotation {
        self.annotation
    }
}
