use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};

use faceblur_core::anonymizing::domain::frame_anonymizer::FrameAnonymizer;
use faceblur_core::anonymizing::infrastructure::pixelate_anonymizer::PixelateAnonymizer;
use faceblur_core::config::Settings;
use faceblur_core::detection::domain::face_detector::FaceDetector;
use faceblur_core::detection::infrastructure::locator_factory::create_face_locator;
use faceblur_core::jobs::domain::artifact::FetchResult;
use faceblur_core::jobs::domain::job::{JobId, JobKind, PayloadItem};
use faceblur_core::jobs::infrastructure::in_memory_stats::InMemoryStats;
use faceblur_core::jobs::job_orchestrator::{JobOrchestrator, JobRuntime};
use faceblur_core::jobs::submission_validator::{SubmissionLimits, SubmissionValidator};
use faceblur_core::pipeline::image_pipeline::ImagePipeline;
use faceblur_core::pipeline::pipeline_logger::LogPipelineLogger;
use faceblur_core::pipeline::video_pipeline::VideoPipeline;
use faceblur_core::storage::artifact_store::ArtifactStore;
use faceblur_core::storage::reaper::{self, Reaper};
use faceblur_core::video::infrastructure::ffmpeg_backend::FfmpegBackend;
use faceblur_core::video::infrastructure::ffmpeg_probe::FfmpegDurationProbe;
use faceblur_core::video::infrastructure::media_finisher::MediaFinisher;
use faceblur_core::video::infrastructure::system_command_runner::SystemCommandRunner;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Face pixelation for images and videos.
#[derive(Parser)]
#[command(name = "faceblur", version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct CommonArgs {
    /// Directory searched for Haar cascade XML files before downloading.
    #[arg(long, global = true, env = "FACEBLUR_CASCADE_DIR")]
    cascade_dir: Option<PathBuf>,

    /// Root directory for job outputs.
    #[arg(long, global = true, env = "FACEBLUR_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// Plain pixel blocks without the blurred blend.
    #[arg(long, global = true)]
    no_soften: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Pixelate faces in one image (output is JPEG).
    Image { input: PathBuf, output: PathBuf },

    /// Pixelate faces in one video.
    Video {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        video: VideoArgs,
    },

    /// Submit files as jobs, wait for them and collect the results.
    Batch {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Where fetched artifacts are written.
        #[arg(long)]
        out_dir: PathBuf,

        /// Treat every input as a video (one job per file).
        #[arg(long)]
        video: bool,

        /// Number of worker threads (0 runs jobs inline).
        #[arg(long)]
        workers: Option<usize>,

        /// Give up waiting for a job after this many seconds.
        #[arg(long, default_value = "600")]
        timeout_secs: u64,

        #[command(flatten)]
        video_args: VideoArgs,
    },

    /// Delete stored artifacts older than the TTL, once.
    Sweep {
        /// Age in minutes after which a file is removed.
        #[arg(long)]
        ttl_minutes: Option<u64>,
    },
}

#[derive(Args)]
struct VideoArgs {
    /// Detection runs on a copy scaled by this factor (0.1-1.0).
    #[arg(long)]
    detect_scale: Option<f64>,

    /// Run detection every Nth kept frame.
    #[arg(long)]
    detect_every_n: Option<usize>,

    /// Output frame-rate cap (0 keeps the source rate).
    #[arg(long)]
    max_fps: Option<u32>,

    /// Do not copy the source's audio track.
    #[arg(long)]
    no_audio: bool,

    /// Keep the raw encoder output instead of re-encoding to H.264.
    #[arg(long)]
    no_transcode: bool,
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
    let mut settings = Settings::from_env();
    apply_common(&mut settings, &cli.common);

    match cli.command {
        Command::Image { input, output } => run_image(&settings, &input, &output),
        Command::Video {
            input,
            output,
            video,
        } => {
            apply_video(&mut settings, &video)?;
            run_video(&settings, &input, &output)
        }
        Command::Batch {
            inputs,
            out_dir,
            video,
            workers,
            timeout_secs,
            video_args,
        } => {
            apply_video(&mut settings, &video_args)?;
            if let Some(workers) = workers {
                settings.workers = workers;
            }
            let kind = if video { JobKind::Video } else { JobKind::Image };
            run_batch(
                &settings,
                kind,
                &inputs,
                &out_dir,
                Duration::from_secs(timeout_secs),
            )
        }
        Command::Sweep { ttl_minutes } => {
            if let Some(ttl) = ttl_minutes {
                settings.storage_ttl_minutes = ttl;
            }
            let removed = reaper::sweep(&settings.storage_dir, settings.storage_ttl());
            println!("Removed {removed} file(s) from {}", settings.storage_dir.display());
            Ok(())
        }
    }
}

fn apply_common(settings: &mut Settings, common: &CommonArgs) {
    if let Some(dir) = &common.cascade_dir {
        settings.cascade_dir = Some(dir.clone());
    }
    if let Some(dir) = &common.storage_dir {
        settings.storage_dir = dir.clone();
    }
    if common.no_soften {
        settings.soften_pixels = false;
    }
}

fn apply_video(settings: &mut Settings, args: &VideoArgs) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(scale) = args.detect_scale {
        if !(0.1..=1.0).contains(&scale) {
            return Err(format!("Detect scale must be between 0.1 and 1.0, got {scale}").into());
        }
        settings.video_detect_scale = scale;
    }
    if let Some(n) = args.detect_every_n {
        if n == 0 {
            return Err("Detect-every-n must be at least 1".into());
        }
        settings.video_detect_every_n = n;
    }
    if let Some(fps) = args.max_fps {
        settings.video_max_fps = fps;
    }
    if args.no_audio {
        settings.video_preserve_audio = false;
    }
    if args.no_transcode {
        settings.video_transcode_h264 = false;
    }
    Ok(())
}

fn build_components(
    settings: &Settings,
) -> Result<(Arc<dyn FaceDetector>, Arc<dyn FrameAnonymizer>), Box<dyn std::error::Error>> {
    log::info!("Loading face cascades");
    let locator = create_face_locator(settings.cascade_dir.as_deref())?;
    let detector: Arc<dyn FaceDetector> = Arc::new(locator);
    let anonymizer: Arc<dyn FrameAnonymizer> =
        Arc::new(PixelateAnonymizer::new(settings.soften_pixels));
    Ok((detector, anonymizer))
}

fn build_video_pipeline(
    detector: Arc<dyn FaceDetector>,
    anonymizer: Arc<dyn FrameAnonymizer>,
) -> VideoPipeline {
    VideoPipeline::new(
        detector,
        anonymizer,
        Arc::new(FfmpegBackend::new()),
        MediaFinisher::new(Arc::new(SystemCommandRunner::new())),
    )
}

fn run_image(
    settings: &Settings,
    input: &Path,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = read_input(input)?;
    let (detector, anonymizer) = build_components(settings)?;
    let pipeline = ImagePipeline::new(detector, anonymizer);

    let blurred = pipeline.process(&bytes)?;
    fs::write(output, blurred)?;
    log::info!("Output written to {}", output.display());
    Ok(())
}

fn run_video(
    settings: &Settings,
    input: &Path,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    if !input.exists() {
        return Err(format!("Input file not found: {}", input.display()).into());
    }
    let (detector, anonymizer) = build_components(settings)?;
    let pipeline = build_video_pipeline(detector, anonymizer);

    let mut logger = LogPipelineLogger::default();
    let report = pipeline.process_with_logger(input, output, &settings.video_options(), &mut logger)?;
    log::info!(
        "Output written to {} ({} frames at {:.2} fps, {:?})",
        output.display(),
        report.frame_count,
        report.output_fps,
        report.outcome
    );
    Ok(())
}

fn run_batch(
    settings: &Settings,
    kind: JobKind,
    inputs: &[PathBuf],
    out_dir: &Path,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(out_dir)?;
    let (detector, anonymizer) = build_components(settings)?;
    let runtime = JobRuntime {
        store: ArtifactStore::new(&settings.storage_dir),
        images: ImagePipeline::new(detector.clone(), anonymizer.clone()),
        videos: build_video_pipeline(detector, anonymizer),
        video_options: settings.video_options(),
    };
    let validator = SubmissionValidator::new(
        SubmissionLimits::from_settings(settings),
        Arc::new(FfmpegDurationProbe::new()),
    );
    let orchestrator = JobOrchestrator::new(
        runtime,
        validator,
        Arc::new(InMemoryStats::new()),
        settings.workers,
    )
    .with_retention(settings.storage_ttl().max(Duration::from_secs(60)));
    let reaper = Reaper::new(
        &settings.storage_dir,
        settings.storage_ttl(),
        settings.cleanup_interval(),
    )
    .spawn()?;

    let mut payloads = Vec::with_capacity(inputs.len());
    for input in inputs {
        payloads.push(payload_item(input)?);
    }
    let batches: Vec<Vec<PayloadItem>> = match kind {
        JobKind::Image => vec![payloads],
        JobKind::Video => payloads.into_iter().map(|item| vec![item]).collect(),
    };

    let mut ids = Vec::with_capacity(batches.len());
    for items in batches {
        ids.push(orchestrator.submit(kind, items)?);
    }

    let mut failures = 0;
    for id in &ids {
        match wait_for(&orchestrator, id, timeout)? {
            FetchResult::Ready(artifact) => {
                let path = out_dir.join(&artifact.filename);
                fs::write(&path, &artifact.bytes)?;
                println!("{id}: {} ({} bytes)", path.display(), artifact.bytes.len());
            }
            FetchResult::Failed(cause) => {
                failures += 1;
                eprintln!("{id}: {} ({})", cause, cause.code());
            }
            FetchResult::Pending => {
                failures += 1;
                eprintln!("{id}: still pending after {}s", timeout.as_secs());
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&orchestrator.stats())?);
    if let Some(handle) = reaper {
        handle.stop();
    }

    if failures > 0 {
        return Err(format!("{failures} of {} job(s) failed", ids.len()).into());
    }
    Ok(())
}

fn wait_for(
    orchestrator: &JobOrchestrator,
    id: &JobId,
    timeout: Duration,
) -> Result<FetchResult, Box<dyn std::error::Error>> {
    let deadline = Instant::now() + timeout;
    loop {
        let result = orchestrator.fetch(id)?;
        if !matches!(result, FetchResult::Pending) || Instant::now() >= deadline {
            return Ok(result);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    fs::read(path).map_err(|e| format!("Cannot read {}: {e}", path.display()).into())
}

fn payload_item(path: &Path) -> Result<PayloadItem, Box<dyn std::error::Error>> {
    let data = read_input(path)?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let content_type = content_type_for(path);
    Ok(PayloadItem::new(filename, content_type, data))
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        _ => "application/octet-stream",
    }
}
