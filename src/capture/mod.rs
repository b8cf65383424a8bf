mod still;
mod webcam;

pub use still::{BlankSource, FileSource};
pub use webcam::{list_cameras, WebcamCapture};

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use image::RgbImage;

/// Trait for frame acquisition sources
pub trait CaptureSource {
    /// Acquire the next frame.
    ///
    /// Live sources block until the device has a frame ready. Still sources
    /// return immediately; the engine throttles them.
    fn capture_frame(&mut self) -> Result<RgbImage>;

    /// Get the resolution of captured frames
    fn resolution(&self) -> (u32, u32);

    /// Whether the source paces itself (camera) or must be throttled.
    fn is_live(&self) -> bool {
        false
    }
}

/// Which source the engine should acquire from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Camera(u32),
    File(PathBuf),
    Blank,
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpec::Camera(index) => write!(f, "camera {}", index),
            SourceSpec::File(path) => write!(f, "file {}", path.display()),
            SourceSpec::Blank => write!(f, "blank"),
        }
    }
}

/// Opens capture sources on the engine thread.
///
/// Sources are created where they are used so that device handles never
/// cross threads; only the opener itself moves into the engine.
pub trait SourceOpener: Send {
    fn open(&self, spec: &SourceSpec) -> Result<Box<dyn CaptureSource>>;
}

/// Opens real cameras, image files and the blank placeholder.
#[derive(Debug, Clone)]
pub struct DeviceOpener {
    pub capture_width: u32,
    pub capture_height: u32,
    pub blank_width: u32,
    pub blank_height: u32,
}

impl SourceOpener for DeviceOpener {
    fn open(&self, spec: &SourceSpec) -> Result<Box<dyn CaptureSource>> {
        let source: Box<dyn CaptureSource> = match spec {
            SourceSpec::Camera(index) => Box::new(WebcamCapture::new(
                *index,
                self.capture_width,
                self.capture_height,
            )?),
            SourceSpec::File(path) => Box::new(FileSource::new(
                path.clone(),
                self.blank_width,
                self.blank_height,
            )),
            SourceSpec::Blank => Box::new(BlankSource::new(self.blank_width, self.blank_height)),
        };
        Ok(source)
    }
}
