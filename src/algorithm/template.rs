use std::str::FromStr;

use anyhow::Result;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};

use super::{Algorithm, AlgorithmOutput, TemplateAlgorithm};
use crate::annotate::{draw_records, Annotation};
use crate::error::WorkbenchError;
use crate::processor::{from_gray, to_gray};
use crate::records::{BoxRecord, ResultRecord, TextRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMethod {
    SquaredError,
    SquaredErrorNormalized,
    CrossCorrelation,
    #[default]
    CrossCorrelationNormalized,
}

impl MatchMethod {
    fn lower_is_better(self) -> bool {
        matches!(self, MatchMethod::SquaredError | MatchMethod::SquaredErrorNormalized)
    }

    fn to_imageproc(self) -> MatchTemplateMethod {
        match self {
            MatchMethod::SquaredError => MatchTemplateMethod::SumOfSquaredErrors,
            MatchMethod::SquaredErrorNormalized => MatchTemplateMethod::SumOfSquaredErrorsNormalized,
            MatchMethod::CrossCorrelation => MatchTemplateMethod::CrossCorrelation,
            MatchMethod::CrossCorrelationNormalized => MatchTemplateMethod::CrossCorrelationNormalized,
        }
    }
}

impl FromStr for MatchMethod {
    type Err = WorkbenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match crate::processor::catalog_key(s).as_str() {
            "sqdiff" | "squarederror" => Ok(MatchMethod::SquaredError),
            "sqdiffnormed" | "squarederrornormalized" => Ok(MatchMethod::SquaredErrorNormalized),
            "ccorr" | "crosscorrelation" => Ok(MatchMethod::CrossCorrelation),
            "ccorrnormed" | "crosscorrelationnormalized" => {
                Ok(MatchMethod::CrossCorrelationNormalized)
            }
            _ => Err(WorkbenchError::InvalidParameter {
                name: "match method",
                reason: format!("unknown method {s:?}"),
            }),
        }
    }
}

/// Locate a user-selected template in each frame.
#[derive(Debug, Clone)]
pub struct TemplateMatch {
    pub method: MatchMethod,
    /// Publish the match-score map instead of the annotated frame.
    pub view_result: bool,
    /// Drop the template after the next successful match.
    pub one_shot: bool,
    /// Fail frames while no template is set, instead of passing them through.
    pub require_template: bool,
    /// Label the match with its score as a text record.
    pub show_score: bool,
    clear_requested: bool,
    template: Option<RgbImage>,
    response: Option<f32>,
    pub annotation: Annotation,
}

impl Default for TemplateMatch {
    fn default() -> Self {
        Self {
            method: MatchMethod::default(),
            view_result: false,
            one_shot: false,
            require_template: false,
            show_score: false,
            clear_requested: false,
            template: None,
            response: None,
            annotation: Annotation::new(Rgb([0, 0, 255]), 2),
        }
    }
}

impl TemplateMatch {
    /// Score of the best match on the last processed frame.
    pub fn response(&self) -> Option<f32> {
        self.response
    }

    /// Clear the template before the next frame is matched.
    pub fn request_clear(&mut self) {
        self.clear_requested = true;
    }
}

/// Scale a score map to 0..=255 and place it top-left on a frame-sized canvas.
fn score_view(scores: &image::ImageBuffer<Luma<f32>, Vec<f32>>, width: u32, height: u32) -> RgbImage {
    let extremes = find_extremes(scores);
    let range = (extremes.max_value - extremes.min_value).max(f32::EPSILON);
    let mut canvas = GrayImage::new(width, height);
    for (x, y, score) in scores.enumerate_pixels() {
        let level = (score[0] - extremes.min_value) / range * 255.0;
        canvas.put_pixel(x, y, Luma([level.round().clamp(0.0, 255.0) as u8]));
    }
    from_gray(canvas)
}

impl Algorithm for TemplateMatch {
    fn name(&self) -> &'static str {
        "Template Match"
    }

    fn process(&mut self, frame: &RgbImage) -> Result<AlgorithmOutput> {
        if std::mem::take(&mut self.clear_requested) {
            self.clear_template();
        }
        let Some(template) = &self.template else {
            self.response = None;
            if self.require_template {
                return Err(WorkbenchError::MissingTemplate("Template Match").into());
            }
            return Ok(AlgorithmOutput::passthrough(frame));
        };

        let (frame_width, frame_height) = frame.dimensions();
        let (template_width, template_height) = template.dimensions();
        if template_width > frame_width || template_height > frame_height {
            return Err(WorkbenchError::TemplateTooLarge {
                template_width,
                template_height,
                frame_width,
                frame_height,
            }
            .into());
        }

        let scores = match_template(&to_gray(frame), &to_gray(template), self.method.to_imageproc());
        let extremes = find_extremes(&scores);
        let (score, (x, y)) = if self.method.lower_is_better() {
            (extremes.min_value, extremes.min_value_location)
        } else {
            (extremes.max_value, extremes.max_value_location)
        };
        self.response = Some(score);
        tracing::debug!("Template match at {},{} score {}", x, y, score);

        let found = BoxRecord::new(x as i32, y as i32, template_width, template_height);
        let mut records = vec![ResultRecord::Box(found)];
        if self.show_score {
            records.push(ResultRecord::Text(TextRecord {
                text: format!("{score:.3}"),
                region: Some(found),
            }));
        }
        let annotated = if self.view_result {
            score_view(&scores, frame_width, frame_height)
        } else {
            let mut annotated = frame.clone();
            draw_records(&mut annotated, &records, self.annotation);
            annotated
        };

        if self.one_shot {
            self.clear_template();
        }
        Ok(AlgorithmOutput { annotated, records })
    }

    fn annotation(&self) -> Annotation {
        self.annotation
    }

    fn as_template_mut(&mut self) -> Option<&mut dyn TemplateAlgorithm> {
        Some(self)
    }
}

impl TemplateAlgorithm for TemplateMatch {
    fn set_template(&mut self, template: RgbImage) {
        tracing::info!("Template set ({}x{})", template.width(), template.height());
        self.template = Some(template);
        self.clear_requested = false;
    }

    fn clear_template(&mut self) {
        if self.template.take().is_some() {
            tracing::info!("Template cleared");
        }
    }

    fn template(&self) -> Option<&RgbImage> {
        self.template.as_ref()
    }
}
