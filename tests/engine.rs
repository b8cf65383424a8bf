//! Engine behavior with scripted sources and a recording sink.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Result};
use image::{Rgb, RgbImage};
use workbench::algorithm::{Algorithm, AlgorithmOutput, FindContours, TemplateMatch};
use workbench::capture::{BlankSource, CaptureSource, FileSource, SourceOpener, SourceSpec};
use workbench::output::{FrameUpdate, PresentationSink};
use workbench::processor::{Invert, ProcessorChain, Threshold, ThresholdMode};
use workbench::{Engine, EngineBuilder, EngineConfig, Region};

const BLANK: (u32, u32) = (32, 24);

/// Uniform frames whose level increases by one every capture.
struct CountingSource {
    level: u8,
}

impl CaptureSource for CountingSource {
    fn capture_frame(&mut self) -> Result<RgbImage> {
        self.level = self.level.wrapping_add(1);
        Ok(RgbImage::from_pixel(BLANK.0, BLANK.1, Rgb([self.level; 3])))
    }

    fn resolution(&self) -> (u32, u32) {
        BLANK
    }
}

struct BrokenSource;

impl CaptureSource for BrokenSource {
    fn capture_frame(&mut self) -> Result<RgbImage> {
        bail!("device unplugged")
    }

    fn resolution(&self) -> (u32, u32) {
        BLANK
    }
}

/// Camera 0 counts, camera 1 is broken, other cameras do not exist.
struct ScriptedOpener;

impl SourceOpener for ScriptedOpener {
    fn open(&self, spec: &SourceSpec) -> Result<Box<dyn CaptureSource>> {
        Ok(match spec {
            SourceSpec::Camera(0) => Box::new(CountingSource { level: 0 }),
            SourceSpec::Camera(1) => Box::new(BrokenSource),
            SourceSpec::Camera(index) => return Err(anyhow!("no camera {index}")),
            SourceSpec::File(path) => Box::new(FileSource::new(path.clone(), BLANK.0, BLANK.1)),
            SourceSpec::Blank => Box::new(BlankSource::new(BLANK.0, BLANK.1)),
        })
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    updates: Arc<Mutex<Vec<FrameUpdate>>>,
}

impl RecordingSink {
    fn snapshot(&self) -> Vec<FrameUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

impl PresentationSink for RecordingSink {
    fn present(&mut self, update: &FrameUpdate) -> Result<()> {
        self.updates.lock().unwrap().push(update.clone());
        Ok(())
    }
}

/// Fails on the second frame only.
#[derive(Default)]
struct FlakyAlgorithm {
    calls: u32,
}

impl Algorithm for FlakyAlgorithm {
    fn name(&self) -> &'static str {
        "Flaky"
    }

    fn process(&mut self, frame: &RgbImage) -> Result<AlgorithmOutput> {
        self.calls += 1;
        if self.calls == 2 {
            bail!("flaky algorithm failed");
        }
        Ok(AlgorithmOutput::passthrough(frame))
    }
}

fn config(initial_source: SourceSpec) -> EngineConfig {
    EngineConfig {
        idle_interval: Duration::from_millis(5),
        throttle_interval: Duration::from_millis(5),
        blank_width: BLANK.0,
        blank_height: BLANK.1,
        max_capture_failures: 3,
        initial_source,
    }
}

fn builder(initial_source: SourceSpec, sink: &RecordingSink) -> EngineBuilder {
    Engine::builder()
        .config(config(initial_source))
        .opener(ScriptedOpener)
        .sink(sink.clone())
}

fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}

fn wait_for_updates(sink: &RecordingSink, count: usize) -> Vec<FrameUpdate> {
    wait_until("updates", || sink.snapshot().len() >= count);
    sink.snapshot()
}

/// Freeze and let any in-flight iteration finish publishing.
fn freeze_and_settle(engine: &Engine) {
    engine.freeze();
    thread::sleep(Duration::from_millis(100));
}

fn write_gray(path: &Path, width: u32, values: &[u8]) {
    let height = values.len() as u32 / width;
    image::GrayImage::from_fn(width, height, |x, y| image::Luma([values[(y * width + x) as usize]]))
        .save(path)
        .unwrap();
}

#[test]
fn threshold_scenario_publishes_binarized_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    write_gray(&path, 2, &[100, 150, 100, 150]);

    let mut chain = ProcessorChain::new();
    chain.push(Threshold::new(128, ThresholdMode::Binary));
    let sink = RecordingSink::default();
    let engine = builder(SourceSpec::File(path), &sink).chain(chain).start().unwrap();

    let update = wait_for_updates(&sink, 1).remove(0);
    assert!(!update.status.faulted);
    assert_eq!((update.status.width, update.status.height), (2, 2));
    let levels: Vec<u8> = update.annotated.pixels().map(|p| p[0]).collect();
    assert_eq!(levels, vec![0, 255, 0, 255]);
    assert_eq!(update.records.as_deref(), Some(&[][..]));
    assert_eq!(engine.algorithm_name(), "None");
}

#[test]
fn failing_algorithm_publishes_diagnostic_and_recovers() {
    let sink = RecordingSink::default();
    let engine = builder(SourceSpec::Camera(0), &sink)
        .algorithm(Box::new(FlakyAlgorithm::default()))
        .start()
        .unwrap();

    let updates = wait_for_updates(&sink, 3);
    drop(engine);

    assert!(!updates[0].status.faulted);
    assert!(updates[1].status.faulted);
    assert!(updates[1].records.is_none());
    assert_eq!(updates[1].annotated.dimensions(), (640, 480));
    assert!(updates[1].annotated.pixels().any(|p| *p != Rgb([0, 0, 0])));
    assert!(!updates[2].status.faulted);
    assert_eq!(updates[2].records.as_deref().map(<[_]>::len), Some(0));

    let indices: Vec<u64> = updates.iter().map(|u| u.status.frame_index).collect();
    assert_eq!(&indices[..3], &[1, 2, 3]);
}

#[test]
fn frozen_status_is_stable() {
    let sink = RecordingSink::default();
    let engine = builder(SourceSpec::Camera(0), &sink).start().unwrap();
    wait_for_updates(&sink, 2);

    freeze_and_settle(&engine);
    let first = engine.status();
    let published = sink.snapshot().len();
    thread::sleep(Duration::from_millis(50));

    assert_eq!(engine.status(), first);
    assert_eq!(sink.snapshot().len(), published);
    assert!(engine.is_frozen());

    engine.unfreeze();
    wait_until("a new frame", || engine.status().frame_index > first.frame_index);
}

#[test]
fn degenerate_template_capture_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.png");
    RgbImage::from_fn(40, 30, |x, y| {
        let v = ((x * x * 7 + y * y * 13 + x * y * 3 + x * 5) % 251) as u8;
        Rgb([v, v, v])
    })
    .save(&path)
    .unwrap();

    let sink = RecordingSink::default();
    let engine = builder(SourceSpec::File(path), &sink)
        .algorithm(Box::new(TemplateMatch::default()))
        .start()
        .unwrap();
    wait_for_updates(&sink, 1);
    freeze_and_settle(&engine);

    assert!(!engine.capture_template(Region::new(5, 5, 1, 8)));
    assert!(!engine.capture_template(Region::new(-2, 5, 8, 8)));
    assert!(engine.records().is_empty());

    assert!(engine.capture_template(Region::new(12, 7, 8, 6)));
    assert!(!engine.capture_template(Region::new(12, 7, 8, 0)));

    let seen = sink.snapshot().len();
    engine.unfreeze();
    wait_until("a matched frame", || {
        sink.snapshot()
            .iter()
            .skip(seen)
            .any(|u| u.records.as_deref().is_some_and(|r| r.len() == 1))
    });
    assert_eq!(engine.records().len(), 1);
}

#[test]
fn template_capture_needs_a_template_algorithm() {
    let sink = RecordingSink::default();
    let engine = builder(SourceSpec::Camera(0), &sink).start().unwrap();
    wait_for_updates(&sink, 1);
    freeze_and_settle(&engine);

    assert!(!engine.capture_template(Region::new(0, 0, 8, 8)));
    assert!(!engine.clear_template());
}

#[test]
fn template_capture_requires_freeze() {
    let sink = RecordingSink::default();
    let engine = builder(SourceSpec::Camera(0), &sink)
        .algorithm(Box::new(TemplateMatch::default()))
        .start()
        .unwrap();
    wait_for_updates(&sink, 1);

    assert!(!engine.capture_template(Region::new(0, 0, 8, 8)));
    freeze_and_settle(&engine);
    assert!(engine.capture_template(Region::new(0, 0, 8, 8)));
}

#[test]
fn source_switch_while_frozen_waits_for_unfreeze() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("square.png");
    RgbImage::from_fn(40, 30, |x, y| {
        if (8..20).contains(&x) && (6..18).contains(&y) {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    })
    .save(&path)
    .unwrap();

    let sink = RecordingSink::default();
    let engine = builder(SourceSpec::File(path), &sink)
        .algorithm(Box::new(FindContours::default()))
        .start()
        .unwrap();
    wait_for_updates(&sink, 1);
    freeze_and_settle(&engine);

    let status = engine.status();
    let records = engine.records();
    assert_eq!(records.len(), 1);
    let published = sink.snapshot().len();

    engine.select_camera(7).unwrap();
    thread::sleep(Duration::from_millis(50));

    assert_eq!(engine.status(), status);
    assert_eq!(engine.records(), records);
    assert_eq!(sink.snapshot().len(), published);
    let redrawn = engine.redraw(&[0]).unwrap();
    assert!(redrawn.pixels().any(|p| *p == Rgb([0, 255, 0])));

    engine.unfreeze();
    wait_until("the open failure", || {
        sink.snapshot().iter().skip(published).any(|u| u.status.faulted)
    });
}

#[test]
fn replaced_processor_changes_the_next_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    write_gray(&path, 2, &[100, 150, 100, 150]);

    let mut chain = ProcessorChain::new();
    chain.push(Threshold::new(128, ThresholdMode::Binary));
    let sink = RecordingSink::default();
    let engine = builder(SourceSpec::File(path), &sink).chain(chain).start().unwrap();
    wait_for_updates(&sink, 1);

    let mut lower = Threshold::default();
    lower.set_threshold(90);
    assert!(engine.replace_processor(0, lower));
    assert!(!engine.replace_processor(3, Threshold::default()));
    assert_eq!(engine.processor_names(), vec!["Threshold"]);

    wait_until("the reconfigured threshold", || {
        engine.annotated().pixels().all(|p| *p == Rgb([255, 255, 255]))
    });

    assert!(engine.insert_processor(0, Invert));
    assert!(!engine.insert_processor(5, Invert));
    assert_eq!(engine.processor_names(), vec!["Invert", "Threshold"]);
}

#[test]
fn snapshots_match_whole_published_frames() {
    let dir = tempfile::tempdir().unwrap();
    let sink = RecordingSink::default();
    let engine = builder(SourceSpec::Camera(0), &sink).start().unwrap();
    wait_for_updates(&sink, 1);

    let mut saved = Vec::new();
    for _ in 0..10 {
        if let Some(path) = engine.snap(dir.path()).unwrap() {
            saved.push(path);
        }
        thread::sleep(Duration::from_millis(3));
    }
    drop(engine);

    assert_eq!(saved.len(), 10);
    let levels: Vec<u8> = sink.snapshot().iter().map(|u| u.annotated.get_pixel(0, 0)[0]).collect();
    for path in saved {
        let image = image::open(&path).unwrap().to_rgb8();
        let first = *image.get_pixel(0, 0);
        assert!(image.pixels().all(|p| *p == first), "{} is torn", path.display());
        assert!(levels.contains(&first[0]), "{} was never published", path.display());
    }
}

#[test]
fn snap_before_first_frame_saves_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let sink = RecordingSink::default();
    let engine = builder(SourceSpec::Camera(0), &sink).frozen(true).start().unwrap();

    assert_eq!(engine.snap(dir.path()).unwrap(), None);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn redraw_draws_selected_records_on_the_last_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("squares.png");
    RgbImage::from_fn(40, 30, |x, y| {
        let inside = (4..12).contains(&x) && (4..12).contains(&y)
            || (24..34).contains(&x) && (10..20).contains(&y);
        if inside {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    })
    .save(&path)
    .unwrap();

    let sink = RecordingSink::default();
    let engine = builder(SourceSpec::File(path), &sink)
        .algorithm(Box::new(FindContours::default()))
        .start()
        .unwrap();
    wait_for_updates(&sink, 1);

    assert!(engine.redraw(&[0]).is_none());
    freeze_and_settle(&engine);
    assert_eq!(engine.records().len(), 2);

    let bare = engine.redraw(&[]).unwrap();
    assert!(bare.pixels().all(|p| *p == Rgb([0, 0, 0]) || *p == Rgb([255, 255, 255])));

    let green = Rgb([0, 255, 0]);
    let all = engine.redraw(&[0, 1, 7]).unwrap();
    assert!(all.pixels().any(|p| *p == green));
    assert_eq!(*engine.annotated(), *all);

    let one = engine.redraw(&[0]).unwrap();
    let count = |image: &RgbImage| image.pixels().filter(|p| **p == green).count();
    assert!(count(&one) > 0 && count(&one) < count(&all));
}

#[test]
fn repeated_capture_failures_fall_back_to_blank() {
    let sink = RecordingSink::default();
    let _engine = builder(SourceSpec::Camera(1), &sink).start().unwrap();

    let updates = wait_for_updates(&sink, 4);
    for update in &updates[..3] {
        assert!(update.status.faulted);
        assert!(update.records.is_none());
    }
    assert!(!updates[3].status.faulted);
    assert_eq!(updates[3].annotated.dimensions(), BLANK);
}

#[test]
fn unknown_camera_keeps_current_source() {
    let sink = RecordingSink::default();
    let engine = builder(SourceSpec::Camera(0), &sink).start().unwrap();
    wait_for_updates(&sink, 1);

    engine.select_camera(7).unwrap();
    wait_until("the open failure", || sink.snapshot().iter().any(|u| u.status.faulted));
    let faulted_at = sink.snapshot().iter().position(|u| u.status.faulted).unwrap();
    wait_for_updates(&sink, faulted_at + 2);

    let updates = sink.snapshot();
    assert!(!updates[faulted_at + 1].status.faulted);
    assert_eq!(updates[faulted_at + 1].annotated.dimensions(), BLANK);
}

#[test]
fn source_switch_takes_effect() {
    let sink = RecordingSink::default();
    let engine = builder(SourceSpec::Camera(0), &sink).start().unwrap();
    wait_for_updates(&sink, 1);

    engine.select_blank().unwrap();
    thread::sleep(Duration::from_millis(50));
    let seen = sink.snapshot().len();
    wait_for_updates(&sink, seen + 2);
    assert!(sink.snapshot()[seen..]
        .iter()
        .all(|u| u.annotated.pixels().all(|p| *p == Rgb([0, 0, 0]))));
}

#[test]
fn catalog_commands_update_the_running_engine() {
    let sink = RecordingSink::default();
    let engine = builder(SourceSpec::Camera(0), &sink).start().unwrap();

    engine.add_processor("invert").unwrap();
    engine.add_processor("Gray Scale").unwrap();
    assert!(engine.add_processor("sharpen").is_err());
    assert!(engine.move_processor_up(1));
    assert_eq!(engine.processor_names(), vec!["Gray Scale", "Invert"]);
    assert!(engine.remove_processor(0));
    assert!(!engine.remove_processor(5));
    assert_eq!(engine.processor_names(), vec!["Invert"]);

    engine.select_algorithm("Hough Lines").unwrap();
    assert!(engine.select_algorithm("Face Detection").is_err());
    assert_eq!(engine.algorithm_name(), "Hough Lines");

    wait_for_updates(&sink, 1);
}

#[test]
fn shutdown_stops_the_loop() {
    let sink = RecordingSink::default();
    let mut engine = builder(SourceSpec::Camera(0), &sink).start().unwrap();
    wait_for_updates(&sink, 1);

    engine.shutdown();
    assert!(!engine.is_running());
    let published = sink.snapshot().len();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(sink.snapshot().len(), published);
    assert!(engine.select_blank().is_err());
}
