use std::time::{Duration, Instant};

use anyhow::Result;

use super::{FrameUpdate, PresentationSink};

const REPORT_EVERY: u64 = 30;

/// Logs average processing time and effective frame rate every 30 frames.
pub struct StatsSink {
    frame_count: u64,
    fault_count: u64,
    total_processing: Duration,
    window_start: Instant,
}

impl Default for StatsSink {
    fn default() -> Self {
        Self {
            frame_count: 0,
            fault_count: 0,
            total_processing: Duration::ZERO,
            window_start: Instant::now(),
        }
    }
}

impl StatsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn fault_count(&self) -> u64 {
        self.fault_count
    }

    /// Mean processing time over every frame seen so far.
    pub fn average_processing(&self) -> Duration {
        if self.frame_count == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.total_processing.as_secs_f64() / self.frame_count as f64)
    }
}

impl PresentationSink for StatsSink {
    fn present(&mut self, update: &FrameUpdate) -> Result<()> {
        self.frame_count += 1;
        self.total_processing += update.status.elapsed;
        if update.status.faulted {
            self.fault_count += 1;
        }

        if self.frame_count % REPORT_EVERY == 0 {
            let window = self.window_start.elapsed();
            let fps = REPORT_EVERY as f64 / window.as_secs_f64().max(f64::EPSILON);
            let avg_ms = self.average_processing().as_secs_f64() * 1000.0;
            tracing::info!(
                "Frame {}: {}x{}, processing={:.1}ms, fps={:.1}, faults={}",
                self.frame_count,
                update.status.width,
                update.status.height,
                avg_ms,
                fps,
                self.fault_count
            );
            self.window_start = Instant::now();
        }
        Ok(())
    }
}
