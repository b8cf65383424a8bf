mod loopback;
mod records;
mod stats;

pub use loopback::{rgb_to_yuyv, LoopbackSink};
pub use records::RecordsSink;
pub use stats::StatsSink;

use std::sync::Arc;

use anyhow::Result;
use image::RgbImage;

use crate::engine::FrameStatus;
use crate::records::ResultRecord;

/// One published iteration.
#[derive(Debug, Clone)]
pub struct FrameUpdate {
    pub annotated: Arc<RgbImage>,
    /// `None` for a diagnostic frame published after a fault.
    pub records: Option<Arc<[ResultRecord]>>,
    pub status: FrameStatus,
}

/// Trait for presentation destinations.
///
/// Called on the engine thread once per iteration, in acquisition order.
/// Errors are logged by the engine and never stop the loop.
pub trait PresentationSink: Send {
    fn present(&mut self, update: &FrameUpdate) -> Result<()>;
}

/// Discards every update.
#[derive(Debug, Default)]
pub struct NullSink;

impl PresentationSink for NullSink {
    fn present(&mut self, _update: &FrameUpdate) -> Result<()> {
        Ok(())
    }
}

/// Forwards each update to every inner sink. A failing sink does not stop
/// the others; the first error is returned after all have run.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn PresentationSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl PresentationSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: Box<dyn PresentationSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl PresentationSink for FanoutSink {
    fn present(&mut self, update: &FrameUpdate) -> Result<()> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(err) = sink.present(update) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
