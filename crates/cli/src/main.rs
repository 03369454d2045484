use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use posestream_core::capture::domain::frame_source::FrameSource;
use posestream_core::capture::domain::resolution::Resolution;
use posestream_core::capture::infrastructure::image_directory_source::ImageDirectorySource;
use posestream_core::capture::infrastructure::synthetic_camera_source::SyntheticCameraSource;
use posestream_core::config::StreamConfig;
use posestream_core::pipeline::infrastructure::result_sinks::LandmarkStatusSink;
use posestream_core::pipeline::infrastructure::threaded_frame_pipeline::ThreadedFramePipeline;
use posestream_core::pipeline::pipeline_logger::LogPipelineLogger;
use posestream_core::pipeline::stream_pose_use_case::StreamPoseUseCase;
use posestream_core::pose::domain::pose::LandmarkKind;
use posestream_core::pose::domain::pose_detector::DetectorMode;
use posestream_core::pose::infrastructure::synthetic_pose_detector::SyntheticPoseDetector;
use posestream_core::pose::infrastructure::threaded_frame_analyzer::ThreadedFrameAnalyzer;
use posestream_core::shared::frame::Rotation;
use posestream_core::shared::permission::PermissionGate;

/// Live pose analysis over a camera stream, analyzing only the latest frame.
#[derive(Parser)]
#[command(name = "posestream")]
struct Cli {
    /// Settings file (defaults to the user config dir).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Play back images from this directory instead of the synthetic camera.
    #[arg(long)]
    images: Option<PathBuf>,

    /// Restart image playback when the directory is exhausted.
    #[arg(long = "loop")]
    looping: bool,

    /// Capture resolution: vga, hd or WIDTHxHEIGHT.
    #[arg(long)]
    resolution: Option<String>,

    /// Capture frame rate.
    #[arg(long)]
    fps: Option<u32>,

    /// Frame rotation in degrees: 0, 90, 180 or 270.
    #[arg(long)]
    rotation: Option<u32>,

    /// Frame buffers the camera may have outstanding.
    #[arg(long)]
    pool_size: Option<usize>,

    /// Detector mode: stream or single-image.
    #[arg(long)]
    mode: Option<String>,

    /// Simulated model latency per frame, in milliseconds.
    #[arg(long)]
    latency_ms: Option<u64>,

    /// Landmark whose confidence is displayed (e.g. nose, left_wrist).
    #[arg(long)]
    landmark: Option<String>,

    /// Stop after this many captured frames.
    #[arg(long)]
    frames: Option<u64>,

    /// Grant camera access without prompting.
    #[arg(long)]
    grant_camera: bool,

    /// Write the effective settings back to the config file.
    #[arg(long)]
    save_config: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .or_else(StreamConfig::default_path)
        .ok_or("No config directory available; pass --config")?;
    let config = apply_overrides(StreamConfig::load(&config_path)?, &cli)?;
    config.validate()?;
    if cli.save_config {
        config.save(&config_path)?;
        log::info!("Settings saved to {}", config_path.display());
    }

    let gate = PermissionGate::new();
    if cli.grant_camera || ask_camera_permission()? {
        gate.grant();
    } else {
        return Err("Camera permission denied".into());
    }

    let source = open_source(&cli, &config)?;
    log::info!(
        "Streaming at {} fps, detector mode {:?}, showing {}",
        source.target_fps(),
        config.detector_mode,
        config.landmark
    );

    let detector = SyntheticPoseDetector::new(config.detector_mode)
        .with_latency(Duration::from_millis(config.analysis_latency_ms));
    let analyzer = ThreadedFrameAnalyzer::new(Box::new(detector));
    let sink = LandmarkStatusSink::new(
        config.landmark,
        Box::new(|status: &str| {
            eprint!("\r{status:<40}");
        }),
    );
    let (handle, worker) = ThreadedFramePipeline::spawn(
        Box::new(analyzer),
        Box::new(sink),
        Box::new(LogPipelineLogger::default()),
        gate,
    )?;

    let interrupted = interrupt_flag();
    let mut use_case = StreamPoseUseCase::new(source, handle, worker, Some(interrupted.clone()));
    let report = use_case.execute()?;
    eprintln!();
    if interrupted.load(Ordering::SeqCst) {
        log::info!("Interrupted; stream shut down");
    }
    log::info!(
        "Analyzed {} of {} frames ({} ok, {} failed, {} skipped)",
        report.dispatched,
        report.submitted,
        report.succeeded,
        report.failed,
        report.superseded + report.released_at_shutdown
    );
    Ok(())
}

fn apply_overrides(
    mut config: StreamConfig,
    cli: &Cli,
) -> Result<StreamConfig, Box<dyn std::error::Error>> {
    if let Some(text) = &cli.resolution {
        config.resolution = Resolution::parse(text).ok_or_else(|| {
            format!("Resolution must be vga, hd or WIDTHxHEIGHT, got '{text}'")
        })?;
    }
    if let Some(fps) = cli.fps {
        config.fps = fps;
    }
    if let Some(degrees) = cli.rotation {
        config.rotation = Rotation::from_degrees(degrees)?;
    }
    if let Some(pool_size) = cli.pool_size {
        config.pool_size = pool_size;
    }
    if let Some(mode) = &cli.mode {
        config.detector_mode = parse_mode(mode)?;
    }
    if let Some(latency) = cli.latency_ms {
        config.analysis_latency_ms = latency;
    }
    if let Some(name) = &cli.landmark {
        config.landmark = LandmarkKind::from_name(name)
            .ok_or_else(|| format!("Unknown landmark '{name}'"))?;
    }
    if cli.frames.is_some() {
        config.frame_limit = cli.frames;
    }
    Ok(config)
}

fn parse_mode(mode: &str) -> Result<DetectorMode, String> {
    match mode {
        "stream" => Ok(DetectorMode::Stream),
        "single-image" | "single_image" => Ok(DetectorMode::SingleImage),
        other => Err(format!(
            "Mode must be 'stream' or 'single-image', got '{other}'"
        )),
    }
}

fn open_source(
    cli: &Cli,
    config: &StreamConfig,
) -> Result<Box<dyn FrameSource>, Box<dyn std::error::Error>> {
    match &cli.images {
        Some(dir) => {
            let source =
                ImageDirectorySource::open(dir, config.fps, config.rotation, config.pool_size)?
                    .looping(cli.looping)
                    .with_frame_limit(config.frame_limit);
            Ok(Box::new(source))
        }
        None => {
            if cli.looping {
                log::warn!("--loop only applies to --images playback");
            }
            let source = SyntheticCameraSource::new(
                config.resolution,
                config.fps,
                config.rotation,
                config.pool_size,
            )
            .with_frame_limit(config.frame_limit);
            Ok(Box::new(source))
        }
    }
}

/// Flag raised by Ctrl+C so the session can shut the pipeline down cleanly.
fn interrupt_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    }) {
        log::warn!("Failed to install Ctrl+C handler: {err}");
    }
    flag
}

fn ask_camera_permission() -> Result<bool, Box<dyn std::error::Error>> {
    eprint!("Allow posestream to access the camera? [y/N] ");
    io::stderr().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
