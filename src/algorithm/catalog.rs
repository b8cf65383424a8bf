//! Static registry of algorithm types.

use anyhow::Result;

use super::*;
use crate::error::WorkbenchError;
use crate::processor::catalog_key;

struct AlgorithmEntry {
    name: &'static str,
    create: fn(&AlgorithmSettings) -> Result<Box<dyn Algorithm>>,
}

fn make<A: Algorithm + Default + 'static>(_: &AlgorithmSettings) -> Result<Box<dyn Algorithm>> {
    Ok(Box::new(A::default()))
}

fn make_matting(settings: &AlgorithmSettings) -> Result<Box<dyn Algorithm>> {
    let path = settings
        .matting_model
        .as_ref()
        .ok_or(WorkbenchError::MissingModel("Matting"))?;
    Ok(Box::new(Matting::new(path)?))
}

// "None" first, the rest sorted by name.
const ALGORITHMS: &[AlgorithmEntry] = &[
    AlgorithmEntry { name: "None", create: make::<NoAlgorithm> },
    AlgorithmEntry { name: "Background Subtraction", create: make::<BackgroundSubtraction> },
    AlgorithmEntry { name: "Bounding Circle", create: make::<BoundingCircle> },
    AlgorithmEntry { name: "Bounding Rectangle", create: make::<BoundingRectangle> },
    AlgorithmEntry { name: "Convex Hull", create: make::<ConvexHull> },
    AlgorithmEntry { name: "Feature Detection", create: make::<FeatureDetection> },
    AlgorithmEntry { name: "Find Contours", create: make::<FindContours> },
    AlgorithmEntry { name: "Hough Lines", create: make::<HoughLines> },
    AlgorithmEntry { name: "Matting", create: make_matting },
    AlgorithmEntry { name: "Template Match", create: make::<TemplateMatch> },
];

/// Names of every registered algorithm, `"None"` first.
pub fn names() -> impl Iterator<Item = &'static str> {
    ALGORITHMS.iter().map(|entry| entry.name)
}

/// Instantiate a fresh algorithm by name.
pub fn create(name: &str, settings: &AlgorithmSettings) -> Result<Box<dyn Algorithm>> {
    let key = catalog_key(name);
    let entry = ALGORITHMS
        .iter()
        .find(|entry| catalog_key(entry.name) == key)
        .ok_or_else(|| WorkbenchError::UnknownAlgorithm(name.to_string()))?;
    (entry.create)(settings)
}
