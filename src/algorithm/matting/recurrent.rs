use std::fmt::Display;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use ndarray::{Array1, ArrayD, IxDyn};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;

use super::tensor::{frame_to_nchw, Matte};

fn ort_error(err: impl Display) -> anyhow::Error {
    anyhow!("onnx runtime: {err}")
}

/// Recurrent video matting network (RobustVideoMatting ONNX export).
///
/// Inputs are `src, r1i, r2i, r3i, r4i, downsample_ratio`; outputs are
/// `fgr, pha, r1o, r2o, r3o, r4o`. The four recurrent tensors are fed back
/// on the next frame, so results depend on frame order.
pub struct VideoMattingModel {
    session: Session,
    input_width: u32,
    input_height: u32,
    downsample_ratio: f32,
    recurrent: Option<[ArrayD<f32>; 4]>,
}

impl VideoMattingModel {
    pub fn load(model_path: &Path) -> Result<Self> {
        tracing::info!("Loading matting model from {}", model_path.display());

        let session = Session::builder()
            .map_err(ort_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(ort_error)?
            .with_intra_threads(4)
            .map_err(ort_error)?
            .commit_from_file(model_path)
            .map_err(ort_error)
            .with_context(|| format!("Failed to load model from {}", model_path.display()))?;

        tracing::info!("Matting model loaded");
        Ok(Self {
            session,
            input_width: 512,
            input_height: 512,
            downsample_ratio: 0.25,
            recurrent: None,
        })
    }

    /// Zero-sized states; the network expands them on the first frame.
    fn initial_state() -> [ArrayD<f32>; 4] {
        std::array::from_fn(|_| ArrayD::zeros(IxDyn(&[1, 1, 1, 1])))
    }

    pub fn reset(&mut self) {
        tracing::debug!("Resetting matting recurrent state");
        self.recurrent = None;
    }

    pub fn infer(&mut self, frame: &RgbImage) -> Result<Matte> {
        let _span = tracing::debug_span!("matting_inference").entered();

        let src = frame_to_nchw(frame, self.input_width, self.input_height);
        // Taken out so a failed run starts over from a fresh state.
        let [r1, r2, r3, r4] = self.recurrent.take().unwrap_or_else(Self::initial_state);
        let ratio = Array1::from_vec(vec![self.downsample_ratio]);

        let outputs = self
            .session
            .run(ort::inputs![
                Tensor::from_array(src).map_err(ort_error)?,
                Tensor::from_array(r1).map_err(ort_error)?,
                Tensor::from_array(r2).map_err(ort_error)?,
                Tensor::from_array(r3).map_err(ort_error)?,
                Tensor::from_array(r4).map_err(ort_error)?,
                Tensor::from_array(ratio).map_err(ort_error)?
            ])
            .map_err(ort_error)
            .context("Matting inference failed")?;

        let extract = |index: usize| -> Result<(Vec<usize>, Vec<f32>)> {
            let (shape, data) = outputs[index].try_extract_tensor::<f32>().map_err(ort_error)?;
            Ok((shape.iter().map(|&d| d as usize).collect(), data.to_vec()))
        };

        let (pha_shape, pha) = extract(1)?;
        let mut next: Vec<ArrayD<f32>> = Vec::with_capacity(4);
        for index in 2..6 {
            let (shape, data) = extract(index)?;
            next.push(ArrayD::from_shape_vec(IxDyn(&shape), data)?);
        }
        let next: [ArrayD<f32>; 4] = next
            .try_into()
            .map_err(|_| anyhow!("matting model returned too few recurrent states"))?;
        self.recurrent = Some(next);

        let (width, height) = frame.dimensions();
        Matte::from_model_output(&pha_shape, &pha, width, height)
    }
}
