use std::time::Duration;

use crate::annotate::{DIAGNOSTIC_HEIGHT, DIAGNOSTIC_WIDTH};
use crate::capture::SourceSpec;

/// Engine timing and placeholder settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sleep between iterations while frozen.
    pub idle_interval: Duration,
    /// Minimum period of an iteration on a still source (file, blank), so
    /// it is re-read at this rate instead of spinning. Cameras pace
    /// themselves and are never throttled.
    pub throttle_interval: Duration,
    pub blank_width: u32,
    pub blank_height: u32,
    /// Consecutive acquisition failures before falling back to a blank source.
    pub max_capture_failures: u32,
    pub initial_source: SourceSpec,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_millis(100),
            throttle_interval: Duration::from_millis(100),
            blank_width: DIAGNOSTIC_WIDTH,
            blank_height: DIAGNOSTIC_HEIGHT,
            max_capture_failures: 3,
            initial_source: SourceSpec::Blank,
        }
    }
}
