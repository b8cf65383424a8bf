use std::path::PathBuf;

use thiserror::Error;

/// Domain failures raised by processors, algorithms and the catalogs.
///
/// Trait seams return `anyhow::Result`, so these travel wrapped in an
/// `anyhow::Error` and can be recovered with `downcast_ref` where a caller
/// cares about the exact cause.
#[derive(Debug, Error)]
pub enum WorkbenchError {
    #[error("unknown processor {0:?}")]
    UnknownProcessor(String),

    #[error("unknown algorithm {0:?}")]
    UnknownAlgorithm(String),

    #[error("region {x},{y} {width}x{height} exceeds frame {frame_width}x{frame_height}")]
    RegionOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    },

    #[error("template {template_width}x{template_height} is larger than frame {frame_width}x{frame_height}")]
    TemplateTooLarge {
        template_width: u32,
        template_height: u32,
        frame_width: u32,
        frame_height: u32,
    },

    #[error("{0} requires a template")]
    MissingTemplate(&'static str),

    #[error("{0} requires a model path (--model)")]
    MissingModel(&'static str),

    #[error("invalid calibration file {path}: {reason}")]
    InvalidCalibration { path: PathBuf, reason: String },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}
