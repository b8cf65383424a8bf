use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use workbench::algorithm::{self, AlgorithmSettings};
use workbench::capture::{self, DeviceOpener, SourceSpec};
use workbench::output::{FanoutSink, LoopbackSink, RecordsSink, StatsSink};
use workbench::processor::{self, ProcessorChain};
use workbench::{Engine, EngineConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Acquire from this camera index
    #[arg(long, conflicts_with = "file")]
    camera: Option<u32>,

    /// Acquire from an image file, reloaded every frame
    #[arg(long)]
    file: Option<PathBuf>,

    /// Capture resolution width
    #[arg(long, default_value_t = 1920)]
    capture_width: u32,

    /// Capture resolution height
    #[arg(long, default_value_t = 1080)]
    capture_height: u32,

    /// Processor chain, in execution order
    #[arg(long, value_delimiter = ',')]
    processors: Vec<String>,

    /// Selected algorithm
    #[arg(long, default_value = "None")]
    algorithm: String,

    /// Path to the matting model (ONNX file)
    #[arg(long)]
    model: Option<PathBuf>,

    /// Also write annotated frames to this v4l2loopback device
    #[arg(long)]
    loopback: Option<PathBuf>,

    /// Loopback output width
    #[arg(long, default_value_t = 1280)]
    output_width: u32,

    /// Loopback output height
    #[arg(long, default_value_t = 720)]
    output_height: u32,

    /// Append result records as JSON lines to this file
    #[arg(long)]
    records: Option<PathBuf>,

    /// Save a snapshot here when the run ends (needs --frames)
    #[arg(long, requires = "frames")]
    snap_dir: Option<PathBuf>,

    /// Stop after this many frames; run until killed otherwise, with no
    /// final snapshot or summary
    #[arg(long)]
    frames: Option<u64>,

    /// List processors, algorithms and cameras, then exit
    #[arg(long)]
    list: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    if args.list {
        return list();
    }

    tracing::info!("Workbench starting");

    let mut chain = ProcessorChain::new();
    for name in args.processors.iter().filter(|name| !name.trim().is_empty()) {
        chain.add(name.trim())?;
    }
    tracing::info!("Processors: {:?}", chain.names());

    let initial_source = match (&args.camera, &args.file) {
        (Some(index), _) => SourceSpec::Camera(*index),
        (None, Some(path)) => SourceSpec::File(path.clone()),
        (None, None) => SourceSpec::Blank,
    };
    let config = EngineConfig {
        initial_source,
        ..EngineConfig::default()
    };

    let mut sink = FanoutSink::new().with(StatsSink::new());
    if let Some(device) = &args.loopback {
        let loopback = LoopbackSink::open(device, args.output_width, args.output_height)
            .context("Failed to initialize v4l2loopback output")?;
        sink.push(Box::new(loopback));
    }
    if let Some(path) = &args.records {
        sink.push(Box::new(RecordsSink::create(path)?));
    }

    let opener = DeviceOpener {
        capture_width: args.capture_width,
        capture_height: args.capture_height,
        blank_width: config.blank_width,
        blank_height: config.blank_height,
    };
    let settings = AlgorithmSettings {
        matting_model: args.model.clone(),
    };

    let selected = algorithm::create(&args.algorithm, &settings)
        .with_context(|| format!("Failed to select algorithm {}", args.algorithm))?;

    let mut engine = Engine::builder()
        .config(config)
        .opener(opener)
        .sink(sink)
        .chain(chain)
        .settings(settings)
        .algorithm(selected)
        .start()?;

    match args.frames {
        Some(limit) => {
            while engine.status().frame_index < limit {
                std::thread::sleep(Duration::from_millis(20));
            }
        }
        None => {
            tracing::info!("Press Ctrl+C to stop");
            loop {
                std::thread::sleep(Duration::from_secs(1));
            }
        }
    }

    engine.freeze();
    if let Some(dir) = &args.snap_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        if let Some(path) = engine.snap(dir)? {
            println!("{}", path.display());
        }
    }
    let status = engine.status();
    tracing::info!(
        "Last frame {}: {} ({} records)",
        status.frame_index,
        status.frame_size_status(),
        engine.records().len()
    );
    engine.shutdown();
    Ok(())
}

fn list() -> Result<()> {
    println!("Processors:");
    for name in processor::names() {
        println!("  {name}");
    }
    println!("Algorithms:");
    for name in algorithm::names() {
        println!("  {name}");
    }
    println!("Cameras:");
    match capture::list_cameras() {
        Ok(cameras) if cameras.is_empty() => println!("  (none)"),
        Ok(cameras) => {
            for (index, name) in cameras {
                println!("  {index}: {name}");
            }
        }
        Err(err) => tracing::warn!("Camera query failed: {:#}", err),
    }
    Ok(())
}
