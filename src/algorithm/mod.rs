//! Selectable per-frame algorithms.
//!
//! Exactly one algorithm is active at a time. Algorithms may keep state
//! across frames; that state lives in the instance and is dropped when a
//! different algorithm is selected.

mod background;
mod catalog;
mod contours;
mod features;
mod lines;
mod matting;
mod passthrough;
mod template;

pub use background::{BackgroundSubtraction, BackgroundView};
pub use catalog::{create, names};
pub use contours::{
    Approximation, BoundingCircle, BoundingRectangle, CircleType, ConvexHull, FindContours,
    RectType, RetrievalMode,
};
pub use features::{FastVariant, FeatureDetection};
pub use lines::HoughLines;
pub use matting::{Matting, MattingView};
pub use passthrough::NoAlgorithm;
pub use template::{MatchMethod, TemplateMatch};

use std::path::PathBuf;

use anyhow::Result;
use image::RgbImage;

use crate::annotate::Annotation;
use crate::records::ResultRecord;

/// Annotated frame plus the records drawn on it.
#[derive(Debug, Clone)]
pub struct AlgorithmOutput {
    pub annotated: RgbImage,
    pub records: Vec<ResultRecord>,
}

impl AlgorithmOutput {
    /// The input frame unchanged, with no records.
    pub fn passthrough(frame: &RgbImage) -> Self {
        Self {
            annotated: frame.clone(),
            records: Vec::new(),
        }
    }
}

pub trait Algorithm: Send {
    fn name(&self) -> &'static str;

    /// Process one frame. Frames arrive strictly in acquisition order.
    fn process(&mut self, frame: &RgbImage) -> Result<AlgorithmOutput>;

    /// Style used for overlays, and for redrawing retained records.
    fn annotation(&self) -> Annotation {
        Annotation::default()
    }

    /// Template capability, for algorithms matching a user-selected region.
    fn as_template_mut(&mut self) -> Option<&mut dyn TemplateAlgorithm> {
        None
    }
}

/// Secondary capability of template-matching algorithms.
pub trait TemplateAlgorithm {
    fn set_template(&mut self, template: RgbImage);

    fn clear_template(&mut self);

    fn template(&self) -> Option<&RgbImage>;
}

/// Construction inputs some catalog entries need.
#[derive(Debug, Clone, Default)]
pub struct AlgorithmSettings {
    /// ONNX model used by the matting algorithm.
    pub matting_model: Option<PathBuf>,
}

/// Holds the single selected algorithm.
///
/// Selecting replaces the instance outright, so any state the previous
/// algorithm accumulated is dropped with it.
pub struct AlgorithmSelector {
    settings: AlgorithmSettings,
    current: Box<dyn Algorithm>,
}

impl AlgorithmSelector {
    pub fn new(settings: AlgorithmSettings) -> Self {
        Self {
            settings,
            current: Box::new(NoAlgorithm),
        }
    }

    /// Instantiate `name` from the catalog and make it current.
    pub fn select(&mut self, name: &str) -> Result<()> {
        let next = create(name, &self.settings)?;
        tracing::info!("Selected algorithm {}", next.name());
        self.current = next;
        Ok(())
    }

    /// Make a preconfigured instance current.
    pub fn replace(&mut self, algorithm: Box<dyn Algorithm>) {
        tracing::info!("Selected algorithm {}", algorithm.name());
        self.current = algorithm;
    }

    pub fn current(&self) -> &dyn Algorithm {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> &mut dyn Algorithm {
        self.current.as_mut()
    }

    pub fn name(&self) -> &'static str {
        self.current.name()
    }
}

impl Default for AlgorithmSelector {
    fn default() -> Self {
        Self::new(AlgorithmSettings::default())
    }
}

/// Polygon vertices as `PointF`, for drawing.
pub(crate) fn as_pointf(points: &[crate::records::Point]) -> Vec<crate::records::PointF> {
    points.iter().map(|&p| p.into()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_starts_with_none() {
        let selector = AlgorithmSelector::default();
        assert_eq!(selector.name(), "None");
    }

    #[test]
    fn selecting_builds_a_fresh_instance() {
        let mut selector = AlgorithmSelector::default();
        selector.select("Template Match").unwrap();

        let template = RgbImage::new(4, 4);
        selector
            .current_mut()
            .as_template_mut()
            .unwrap()
            .set_template(template);
        assert!(selector.current_mut().as_template_mut().unwrap().template().is_some());

        selector.select("template-match").unwrap();
        assert!(selector.current_mut().as_template_mut().unwrap().template().is_none());
    }

    #[test]
    fn unknown_algorithm_keeps_current() {
        let mut selector = AlgorithmSelector::default();
        selector.select("Find Contours").unwrap();
        assert!(selector.select("Face Detection").is_err());
        assert_eq!(selector.name(), "Find Contours");
    }

    #[test]
    fn matting_requires_a_model() {
        let mut selector = AlgorithmSelector::default();
        let err = selector.select("Matting").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::error::WorkbenchError>(),
            Some(crate::error::WorkbenchError::MissingModel(_))
        ));
    }
}
