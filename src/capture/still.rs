use super::CaptureSource;
use anyhow::{Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

/// Placeholder source producing black frames when nothing is selected.
pub struct BlankSource {
    width: u32,
    height: u32,
}

impl BlankSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl CaptureSource for BlankSource {
    fn capture_frame(&mut self) -> Result<RgbImage> {
        Ok(RgbImage::new(self.width, self.height))
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Still image reloaded from disk on every tick, so edits to the file show
/// up live. A missing file yields a blank frame.
pub struct FileSource {
    path: PathBuf,
    blank: BlankSource,
    last_size: (u32, u32),
}

impl FileSource {
    pub fn new(path: PathBuf, blank_width: u32, blank_height: u32) -> Self {
        tracing::info!("Using image file {}", path.display());
        Self {
            path,
            blank: BlankSource::new(blank_width, blank_height),
            last_size: (blank_width, blank_height),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CaptureSource for FileSource {
    fn capture_frame(&mut self) -> Result<RgbImage> {
        let frame = if self.path.is_file() {
            image::open(&self.path)
                .with_context(|| format!("Failed to load image {}", self.path.display()))?
                .to_rgb8()
        } else {
            self.blank.capture_frame()?
        };
        self.last_size = frame.dimensions();
        Ok(frame)
    }

    fn resolution(&self) -> (u32, u32) {
        self.last_size
    }
}
