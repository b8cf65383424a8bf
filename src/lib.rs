//! Interactive computer-vision workbench.
//!
//! Frames from a camera, an image file or a blank placeholder run through
//! an ordered chain of image processors, then through one selectable
//! algorithm that annotates the frame and reports result records. The
//! [`engine`] drives this loop on a background thread.

pub mod algorithm;
pub mod annotate;
pub mod calibration;
pub mod capture;
pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod processor;
pub mod records;

pub use config::EngineConfig;
pub use engine::{Engine, EngineBuilder, FrameStatus, Region};
pub use error::WorkbenchError;
