//! Background frame engine.
//!
//! One thread acquires frames, runs the processor chain and the selected
//! algorithm, and publishes the result. Commands arrive from other threads
//! through [`Engine`]. The published frame, its records and its status live
//! in a single mutex that also guards algorithm execution, snapshots and
//! redraws, so none of those ever observe a half-published frame.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{Receiver, Sender};
use image::{imageops, RgbImage};
use tracing::{debug, error, info, warn};

use crate::algorithm::{Algorithm, AlgorithmSelector, AlgorithmSettings};
use crate::annotate::{diagnostic_frame, draw_record};
use crate::capture::{BlankSource, CaptureSource, DeviceOpener, SourceOpener, SourceSpec};
use crate::config::EngineConfig;
use crate::output::{FrameUpdate, NullSink, PresentationSink};
use crate::processor::{Processor, ProcessorChain};
use crate::records::ResultRecord;

/// Dimensions and timing of the most recently published frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStatus {
    pub width: u32,
    pub height: u32,
    /// Chain plus algorithm time, excluding acquisition.
    pub elapsed: Duration,
    /// 1-based count of published frames; 0 before the first one.
    pub frame_index: u64,
    /// The frame is a diagnostic published after a failure.
    pub faulted: bool,
}

impl FrameStatus {
    pub fn frame_size_status(&self) -> String {
        format!(
            "{}x{} {:.1}ms",
            self.width,
            self.height,
            self.elapsed.as_secs_f64() * 1000.0
        )
    }
}

/// Rectangle in frame coordinates, as selected by a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    fn is_degenerate(&self) -> bool {
        self.width < 2 || self.height < 2 || self.x < 0 || self.y < 0
    }
}

struct FrameState {
    selector: AlgorithmSelector,
    /// Processed frame the current records refer to.
    last_frame: Option<RgbImage>,
    annotated: Arc<RgbImage>,
    records: Arc<[ResultRecord]>,
    status: FrameStatus,
}

struct Shared {
    running: AtomicBool,
    frozen: AtomicBool,
    chain: Mutex<ProcessorChain>,
    frame: Mutex<FrameState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct EngineBuilder {
    config: EngineConfig,
    opener: Option<Box<dyn SourceOpener>>,
    sink: Box<dyn PresentationSink>,
    chain: ProcessorChain,
    algorithm: Option<Box<dyn Algorithm>>,
    settings: AlgorithmSettings,
    frozen: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            opener: None,
            sink: Box::new(NullSink),
            chain: ProcessorChain::new(),
            algorithm: None,
            settings: AlgorithmSettings::default(),
            frozen: false,
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Source factory; defaults to real devices at 1920x1080.
    pub fn opener(mut self, opener: impl SourceOpener + 'static) -> Self {
        self.opener = Some(Box::new(opener));
        self
    }

    pub fn sink(mut self, sink: impl PresentationSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn chain(mut self, chain: ProcessorChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn algorithm(mut self, algorithm: Box<dyn Algorithm>) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    pub fn settings(mut self, settings: AlgorithmSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Start without acquiring until [`Engine::unfreeze`].
    pub fn frozen(mut self, frozen: bool) -> Self {
        self.frozen = frozen;
        self
    }

    pub fn start(self) -> Result<Engine> {
        let mut selector = AlgorithmSelector::new(self.settings);
        if let Some(algorithm) = self.algorithm {
            selector.replace(algorithm);
        }

        let config = self.config;
        let shared = Arc::new(Shared {
            running: AtomicBool::new(true),
            frozen: AtomicBool::new(self.frozen),
            chain: Mutex::new(self.chain),
            frame: Mutex::new(FrameState {
                selector,
                last_frame: None,
                annotated: Arc::new(RgbImage::new(config.blank_width, config.blank_height)),
                records: Arc::from(Vec::new()),
                status: FrameStatus::default(),
            }),
        });

        let opener = self.opener.unwrap_or_else(|| {
            Box::new(DeviceOpener {
                capture_width: 1920,
                capture_height: 1080,
                blank_width: config.blank_width,
                blank_height: config.blank_height,
            })
        });

        let (requests, incoming) = crossbeam_channel::unbounded();
        let worker_shared = shared.clone();
        let sink = self.sink;
        // Capture sources are not `Send`; the worker and its source are
        // created on the engine thread.
        let handle = thread::Builder::new()
            .name("workbench-engine".into())
            .spawn(move || {
                Worker {
                    shared: worker_shared,
                    requests: incoming,
                    opener,
                    sink,
                    source: Box::new(BlankSource::new(config.blank_width, config.blank_height)),
                    capture_failures: 0,
                    frame_index: 0,
                    config,
                }
                .run()
            })
            .context("Failed to spawn engine thread")?;

        Ok(Engine {
            shared,
            requests,
            handle: Some(handle),
        })
    }
}

/// Handle to the running engine. Dropping it stops and joins the loop.
pub struct Engine {
    shared: Arc<Shared>,
    requests: Sender<SourceSpec>,
    handle: Option<JoinHandle<()>>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn freeze(&self) {
        self.set_frozen(true);
    }

    pub fn unfreeze(&self) {
        self.set_frozen(false);
    }

    pub fn set_frozen(&self, frozen: bool) {
        if self.shared.frozen.swap(frozen, Ordering::SeqCst) != frozen {
            info!("Engine {}", if frozen { "frozen" } else { "running" });
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.shared.frozen.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Switch acquisition; the source is opened on the engine thread before
    /// its next iteration.
    pub fn select_source(&self, spec: SourceSpec) -> Result<()> {
        self.requests
            .send(spec)
            .map_err(|_| anyhow!("engine is not running"))
    }

    pub fn select_camera(&self, index: u32) -> Result<()> {
        self.select_source(SourceSpec::Camera(index))
    }

    pub fn select_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        self.select_source(SourceSpec::File(path.into()))
    }

    pub fn select_blank(&self) -> Result<()> {
        self.select_source(SourceSpec::Blank)
    }

    /// Append a catalog processor to the chain.
    pub fn add_processor(&self, name: &str) -> Result<()> {
        lock(&self.shared.chain).add(name)
    }

    /// Append a preconfigured processor.
    pub fn push_processor(&self, processor: impl Processor + 'static) {
        lock(&self.shared.chain).push(processor);
    }

    /// Insert a configured processor at `index`; `index == len` appends.
    pub fn insert_processor(&self, index: usize, processor: impl Processor + 'static) -> bool {
        lock(&self.shared.chain).insert(index, processor)
    }

    /// Swap in a reconfigured processor at `index`, keeping its position.
    pub fn replace_processor(&self, index: usize, processor: impl Processor + 'static) -> bool {
        lock(&self.shared.chain).replace(index, processor).is_some()
    }

    pub fn remove_processor(&self, index: usize) -> bool {
        lock(&self.shared.chain).remove(index).is_some()
    }

    pub fn move_processor_up(&self, index: usize) -> bool {
        lock(&self.shared.chain).move_up(index)
    }

    pub fn move_processor_down(&self, index: usize) -> bool {
        lock(&self.shared.chain).move_down(index)
    }

    pub fn clear_processors(&self) {
        lock(&self.shared.chain).clear();
    }

    pub fn processor_names(&self) -> Vec<&'static str> {
        lock(&self.shared.chain).names()
    }

    /// Replace the selected algorithm with a fresh catalog instance.
    pub fn select_algorithm(&self, name: &str) -> Result<()> {
        lock(&self.shared.frame).selector.select(name)
    }

    pub fn set_algorithm(&self, algorithm: Box<dyn Algorithm>) {
        lock(&self.shared.frame).selector.replace(algorithm);
    }

    pub fn algorithm_name(&self) -> &'static str {
        lock(&self.shared.frame).selector.name()
    }

    pub fn status(&self) -> FrameStatus {
        lock(&self.shared.frame).status.clone()
    }

    pub fn annotated(&self) -> Arc<RgbImage> {
        lock(&self.shared.frame).annotated.clone()
    }

    pub fn records(&self) -> Arc<[ResultRecord]> {
        lock(&self.shared.frame).records.clone()
    }

    /// Save the current annotated frame as a timestamped PNG in `dir`.
    /// Returns `None` before anything has been published.
    pub fn snap(&self, dir: &Path) -> Result<Option<PathBuf>> {
        let state = lock(&self.shared.frame);
        if state.status.frame_index == 0 {
            return Ok(None);
        }
        let path = snapshot_path(dir);
        state
            .annotated
            .save(&path)
            .with_context(|| format!("Failed to save snapshot {}", path.display()))?;
        info!("Snapshot saved to {}", path.display());
        Ok(Some(path))
    }

    /// While frozen, draw the records at `indices` onto a fresh copy of the
    /// last frame and make that the current annotated frame. Out-of-range
    /// indices are skipped.
    pub fn redraw(&self, indices: &[usize]) -> Option<Arc<RgbImage>> {
        if !self.is_frozen() {
            return None;
        }
        let mut state = lock(&self.shared.frame);
        let mut canvas = state.last_frame.clone()?;
        let style = state.selector.current().annotation();
        for record in indices.iter().filter_map(|&i| state.records.get(i)) {
            draw_record(&mut canvas, record, style);
        }
        let canvas = Arc::new(canvas);
        state.annotated = canvas.clone();
        Some(canvas)
    }

    /// While frozen, crop `region` from the last frame and hand it to the
    /// selected algorithm as its template. Degenerate regions, regions
    /// outside the frame and algorithms without template support leave
    /// everything unchanged. Returns whether a template was set.
    pub fn capture_template(&self, region: Region) -> bool {
        if !self.is_frozen() {
            debug!("Ignoring template capture while running");
            return false;
        }
        let mut state = lock(&self.shared.frame);
        if region.is_degenerate() {
            debug!("Ignoring degenerate template region {:?}", region);
            return false;
        }
        let Some(frame) = &state.last_frame else {
            return false;
        };

        let (x, y) = (region.x as u32, region.y as u32);
        let (frame_width, frame_height) = frame.dimensions();
        if x >= frame_width || y >= frame_height {
            warn!("Template region {:?} lies outside the frame", region);
            return false;
        }
        let width = (region.width as u32).min(frame_width - x);
        let height = (region.height as u32).min(frame_height - y);
        if width < 2 || height < 2 {
            debug!("Ignoring degenerate template region {:?}", region);
            return false;
        }
        let template = imageops::crop_imm(frame, x, y, width, height).to_image();

        match state.selector.current_mut().as_template_mut() {
            Some(target) => {
                target.set_template(template);
                true
            }
            None => false,
        }
    }

    pub fn clear_template(&self) -> bool {
        let mut state = lock(&self.shared.frame);
        match state.selector.current_mut().as_template_mut() {
            Some(target) => {
                target.clear_template();
                true
            }
            None => false,
        }
    }

    /// Stop the loop after its current iteration and wait for it.
    pub fn shutdown(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Engine thread panicked");
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn snapshot_path(dir: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y.%m.%d.%H.%M.%S").to_string();
    let mut path = dir.join(format!("{stamp}.png"));
    let mut suffix = 1;
    while path.exists() {
        path = dir.join(format!("{stamp}-{suffix}.png"));
        suffix += 1;
    }
    path
}

/// State owned by the engine thread.
struct Worker {
    shared: Arc<Shared>,
    requests: Receiver<SourceSpec>,
    opener: Box<dyn SourceOpener>,
    sink: Box<dyn PresentationSink>,
    source: Box<dyn CaptureSource>,
    capture_failures: u32,
    frame_index: u64,
    config: EngineConfig,
}

impl Worker {
    fn run(mut self) {
        info!("Engine started");
        let initial = self.config.initial_source.clone();
        self.switch_source(initial);

        while self.shared.running.load(Ordering::SeqCst) {
            // Switch requests wait in the channel until unfrozen, so a
            // failed open cannot replace the frozen results.
            if self.shared.frozen.load(Ordering::SeqCst) {
                thread::sleep(self.config.idle_interval);
                continue;
            }
            while let Ok(spec) = self.requests.try_recv() {
                self.switch_source(spec);
            }
            let iteration_start = Instant::now();
            self.iterate();
            if !self.source.is_live() {
                let elapsed = iteration_start.elapsed();
                if elapsed < self.config.throttle_interval {
                    thread::sleep(self.config.throttle_interval - elapsed);
                }
            }
        }
        info!("Engine stopped after {} frames", self.frame_index);
    }

    fn blank(&self) -> Box<dyn CaptureSource> {
        self.opener.open(&SourceSpec::Blank).unwrap_or_else(|_| {
            Box::new(BlankSource::new(self.config.blank_width, self.config.blank_height))
        })
    }

    fn switch_source(&mut self, spec: SourceSpec) {
        match self.opener.open(&spec) {
            Ok(source) => {
                let (width, height) = source.resolution();
                info!("Acquiring from {} ({}x{})", spec, width, height);
                self.source = source;
                self.capture_failures = 0;
            }
            Err(err) => {
                error!("Failed to open {}: {:#}", spec, err);
                self.publish_fault(&format!("Failed to open {spec}: {err:#}"), Duration::ZERO);
            }
        }
    }

    fn iterate(&mut self) {
        let frame = match self.source.capture_frame() {
            Ok(frame) => {
                self.capture_failures = 0;
                frame
            }
            Err(err) => {
                self.capture_failures += 1;
                error!(
                    "Capture failed ({}/{}): {:#}",
                    self.capture_failures, self.config.max_capture_failures, err
                );
                self.publish_fault(&format!("Capture failed: {err:#}"), Duration::ZERO);
                if self.capture_failures >= self.config.max_capture_failures {
                    error!("Too many capture failures, switching to blank source");
                    self.source = self.blank();
                    self.capture_failures = 0;
                }
                return;
            }
        };

        let started = Instant::now();
        let chain = lock(&self.shared.chain).clone();
        let processed = {
            let _span = tracing::debug_span!("chain", processors = chain.len()).entered();
            chain.apply(frame)
        };

        let shared = self.shared.clone();
        let update = {
            let mut state = lock(&shared.frame);
            let outcome = processed.and_then(|processed| {
                let _span = tracing::debug_span!("algorithm", name = state.selector.name()).entered();
                let output = state.selector.current_mut().process(&processed)?;
                Ok((processed, output))
            });
            match outcome {
                Ok((processed, output)) => {
                    self.frame_index += 1;
                    let (width, height) = processed.dimensions();
                    state.last_frame = Some(processed);
                    state.annotated = Arc::new(output.annotated);
                    state.records = Arc::from(output.records);
                    state.status = FrameStatus {
                        width,
                        height,
                        elapsed: started.elapsed(),
                        frame_index: self.frame_index,
                        faulted: false,
                    };
                    FrameUpdate {
                        annotated: state.annotated.clone(),
                        records: Some(state.records.clone()),
                        status: state.status.clone(),
                    }
                }
                Err(err) => {
                    error!("Frame failed: {:#}", err);
                    self.fault_locked(&mut state, &format!("{err:#}"), started.elapsed())
                }
            }
        };
        self.present(&update);
    }

    fn publish_fault(&mut self, message: &str, elapsed: Duration) {
        let shared = self.shared.clone();
        let update = {
            let mut state = lock(&shared.frame);
            self.fault_locked(&mut state, message, elapsed)
        };
        self.present(&update);
    }

    /// Replace the published frame with a diagnostic. The last good frame
    /// is kept for template capture; its records no longer apply.
    fn fault_locked(&mut self, state: &mut FrameState, message: &str, elapsed: Duration) -> FrameUpdate {
        self.frame_index += 1;
        let diagnostic = Arc::new(diagnostic_frame(message));
        state.annotated = diagnostic.clone();
        state.records = Arc::from(Vec::new());
        state.status = FrameStatus {
            width: diagnostic.width(),
            height: diagnostic.height(),
            elapsed,
            frame_index: self.frame_index,
            faulted: true,
        };
        FrameUpdate {
            annotated: diagnostic,
            records: None,
            status: state.status.clone(),
        }
    }

    fn present(&mut self, update: &FrameUpdate) {
        if let Err(err) = self.sink.present(update) {
            warn!("Presentation failed: {:#}", err);
        }
    }
}
