use super::CaptureSource;
use anyhow::{Context, Result};
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;

pub struct WebcamCapture {
    camera: Camera,
    width: u32,
    height: u32,
}

impl WebcamCapture {
    pub fn new(device_index: u32, width: u32, height: u32) -> Result<Self> {
        tracing::info!(
            "Initializing webcam {} (requested {}x{})",
            device_index,
            width,
            height
        );

        let index = CameraIndex::Index(device_index);
        // Closest MJPEG mode; devices without MJPEG fall back to their
        // highest resolution.
        let wanted = CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, 30);
        let closest = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(wanted));
        let mut camera = match Camera::new(index.clone(), closest) {
            Ok(camera) => camera,
            Err(err) => {
                tracing::debug!("No MJPEG mode near {}x{}: {}", width, height, err);
                let highest = RequestedFormat::new::<RgbFormat>(
                    RequestedFormatType::AbsoluteHighestResolution,
                );
                Camera::new(index, highest)
                    .with_context(|| format!("Failed to open camera {}", device_index))?
            }
        };

        camera
            .open_stream()
            .context("Failed to open camera stream")?;

        let resolution = camera.resolution();
        tracing::info!(
            "Webcam {} streaming at {}x{}",
            device_index,
            resolution.width(),
            resolution.height()
        );

        Ok(Self {
            camera,
            width: resolution.width(),
            height: resolution.height(),
        })
    }
}

impl CaptureSource for WebcamCapture {
    fn capture_frame(&mut self) -> Result<RgbImage> {
        let frame = self.camera.frame().context("Failed to capture frame")?;

        let decoded = frame
            .decode_image::<RgbFormat>()
            .context("Failed to decode frame")?;

        Ok(decoded)
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn is_live(&self) -> bool {
        true
    }
}

/// List attached cameras as `(index, name)` pairs.
pub fn list_cameras() -> Result<Vec<(u32, String)>> {
    let cameras = nokhwa::query(ApiBackend::Auto).context("Failed to query cameras")?;

    Ok(cameras
        .iter()
        .enumerate()
        .map(|(position, info)| {
            let index = info.index().as_index().unwrap_or(position as u32);
            (index, info.human_name())
        })
        .collect())
}
