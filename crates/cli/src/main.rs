use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;

use vitalcam_core::detection::infrastructure::cached_landmark_detector::CachedLandmarkDetector;
use vitalcam_core::detection::infrastructure::landmark_track_file;
use vitalcam_core::pipeline::measure_recording_use_case::{FrameReading, MeasureRecordingUseCase};
use vitalcam_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use vitalcam_core::session::domain::engine::HeartRateEngine;
use vitalcam_core::session::domain::engine_config::EngineConfig;
use vitalcam_core::video::infrastructure::image_sequence_reader::ImageSequenceReader;

/// Heart rate estimation from a recorded face video.
#[derive(Parser)]
#[command(name = "vitalcam")]
struct Cli {
    /// Directory of frames (PNG/JPEG/...), played back in file-name order.
    frames_dir: PathBuf,

    /// JSON file with per-frame face landmarks.
    #[arg(long)]
    landmarks: PathBuf,

    /// JSON engine configuration; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Capture frame rate.
    #[arg(long)]
    fps: Option<f64>,

    /// Samples per analysis window.
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Re-estimate every N samples.
    #[arg(long)]
    calc_interval: Option<usize>,

    /// Face-less frames tolerated before the window is discarded.
    #[arg(long)]
    max_no_face_frames: Option<usize>,

    /// Print one JSON object per frame instead of text.
    #[arg(long)]
    json: bool,
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
    validate(&cli)?;

    let config = build_config(&cli)?;
    log::info!(
        "Window {} samples at {} fps, re-estimating every {} samples",
        config.buffer_size,
        config.fps,
        config.calc_interval
    );

    let meshes = landmark_track_file::load(&cli.landmarks)?;
    log::info!("Loaded landmarks for {} frames", meshes.len());
    let detector = CachedLandmarkDetector::new(Arc::new(meshes));

    let reader = ImageSequenceReader::new(config.fps);
    let engine = HeartRateEngine::new(config, Box::new(detector))?;
    let mut use_case = MeasureRecordingUseCase::new(
        Box::new(reader),
        engine,
        Box::new(StdoutPipelineLogger::default()),
    );

    let readings = use_case.execute(&cli.frames_dir)?;
    print_readings(&readings, cli.json)
}

fn build_config(cli: &Cli) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(fps) = cli.fps {
        config.fps = fps;
    }
    if let Some(size) = cli.buffer_size {
        config.buffer_size = size;
    }
    if let Some(interval) = cli.calc_interval {
        config.calc_interval = interval;
    }
    if let Some(max) = cli.max_no_face_frames {
        config.max_no_face_frames = max;
    }
    config.validate()?;
    Ok(config)
}

fn print_readings(readings: &[FrameReading], json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for reading in readings {
        if json {
            writeln!(out, "{}", serde_json::to_string(reading)?)?;
        } else {
            match reading.bpm {
                Some(bpm) => writeln!(out, "frame {:>5}: {bpm:6.1} BPM", reading.frame)?,
                None => writeln!(out, "frame {:>5}:      -", reading.frame)?,
            }
        }
    }
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.frames_dir.is_dir() {
        return Err(format!("Frames directory not found: {}", cli.frames_dir.display()).into());
    }
    if !cli.landmarks.is_file() {
        return Err(format!("Landmark file not found: {}", cli.landmarks.display()).into());
    }
    if let Some(path) = &cli.config {
        if !path.is_file() {
            return Err(format!("Config file not found: {}", path.display()).into());
        }
    }
    Ok(())
}
