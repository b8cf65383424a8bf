use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{imageops, RgbImage};
use v4l::video::Output;
use v4l::{Device, Format, FourCC};

use super::{FrameUpdate, PresentationSink};

/// Writes annotated frames as YUYV to a v4l2loopback device, resizing to
/// the configured output resolution.
pub struct LoopbackSink {
    path: PathBuf,
    file: File,
    width: u32,
    height: u32,
}

impl LoopbackSink {
    pub fn open(device_path: &Path, width: u32, height: u32) -> Result<Self> {
        tracing::info!(
            "Opening v4l2loopback device at {} ({}x{})",
            device_path.display(),
            width,
            height
        );

        // Failing to negotiate leaves whatever format the device already has.
        if let Err(err) = negotiate_format(device_path, width, height) {
            tracing::warn!(
                "Could not set YUYV {}x{} on {}: {:#}",
                width,
                height,
                device_path.display(),
                err
            );
        }

        let file = File::options()
            .write(true)
            .open(device_path)
            .with_context(|| {
                format!("Failed to open v4l2loopback device at {}", device_path.display())
            })?;

        Ok(Self {
            path: device_path.to_path_buf(),
            file,
            width,
            height,
        })
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn negotiate_format(device_path: &Path, width: u32, height: u32) -> Result<()> {
    let device = Device::with_path(device_path)
        .with_context(|| format!("Failed to open {}", device_path.display()))?;
    let requested = Format::new(width, height, FourCC::new(b"YUYV"));
    let actual = Output::set_format(&device, &requested).context("VIDIOC_S_FMT failed")?;
    tracing::debug!(
        "Loopback format {}x{} {}",
        actual.width,
        actual.height,
        actual.fourcc
    );
    Ok(())
}

/// BT.601 full-range RGB to Y, U, V.
fn yuv(pixel: &image::Rgb<u8>) -> (f32, f32, f32) {
    let [r, g, b] = pixel.0.map(f32::from);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let u = -0.168_736 * r - 0.331_264 * g + 0.5 * b + 128.0;
    let v = 0.5 * r - 0.418_688 * g - 0.081_312 * b + 128.0;
    (y, u, v)
}

fn to_byte(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Pack an RGB frame as YUYV 4:2:2. Chroma is averaged over each pixel
/// pair; an odd final column is paired with itself.
pub fn rgb_to_yuyv(frame: &RgbImage) -> Vec<u8> {
    let (width, height) = frame.dimensions();
    let mut out = Vec::with_capacity((width.div_ceil(2) * 4 * height) as usize);
    for y in 0..height {
        for x in (0..width).step_by(2) {
            let left = frame.get_pixel(x, y);
            let right = frame.get_pixel((x + 1).min(width - 1), y);
            let (y0, u0, v0) = yuv(left);
            let (y1, u1, v1) = yuv(right);
            out.extend_from_slice(&[
                to_byte(y0),
                to_byte((u0 + u1) / 2.0),
                to_byte(y1),
                to_byte((v0 + v1) / 2.0),
            ]);
        }
    }
    out
}

impl PresentationSink for LoopbackSink {
    fn present(&mut self, update: &FrameUpdate) -> Result<()> {
        let frame = update.annotated.as_ref();
        let resized;
        let frame = if frame.dimensions() == (self.width, self.height) {
            frame
        } else {
            resized = imageops::resize(
                frame,
                self.width,
                self.height,
                imageops::FilterType::Triangle,
            );
            &resized
        };

        self.file
            .write_all(&rgb_to_yuyv(frame))
            .with_context(|| format!("Failed to write frame to {}", self.path.display()))?;
        Ok(())
    }
}
