mod settings;

use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::Parser;

use facesort_core::clustering::domain::distance::Metric;
use facesort_core::embedding::infrastructure::arcface_encoder::ArcFaceEncoder;
use facesort_core::embedding::infrastructure::face_embedder::FaceEmbedder;
use facesort_core::embedding::infrastructure::onnx_yolo_detector::{
    OnnxYoloDetector, DEFAULT_CONFIDENCE,
};
use facesort_core::input::directory_photo_source::DirectoryPhotoSource;
use facesort_core::pipeline::classify_photos_use_case::ClassifyPhotosUseCase;
use facesort_core::pipeline::event_listener::{EventListener, LogEventListener};
use facesort_core::pipeline::processing_task::ProcessingTask;
use facesort_core::pipeline::task_summary::{TaskOutcome, TaskSummary};
use facesort_core::routing::domain::routing_sink::{bucket_name, RoutingSink};
use facesort_core::routing::infrastructure::copy_routing_sink::CopyRoutingSink;
use facesort_core::routing::infrastructure::recording_routing_sink::RecordingRoutingSink;
use facesort_core::shared::constants::{
    DETECTION_MODEL_NAME, DETECTION_MODEL_URL, EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL,
};
use facesort_core::shared::model_resolver::ModelResolver;

use settings::Settings;

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Sort photos into per-person folders by face similarity.
#[derive(Parser)]
#[command(name = "facesort")]
struct Cli {
    /// Folder of photos to sort.
    input: PathBuf,

    /// Folder that receives the person_<n> subfolders.
    output: PathBuf,

    /// Maximum embedding distance for two photos to be the same person.
    #[arg(long)]
    tolerance: Option<f64>,

    /// Distance metric: euclidean or cosine.
    #[arg(long)]
    metric: Option<String>,

    /// ArcFace ONNX model file (downloaded on first use if omitted).
    #[arg(long)]
    model: Option<PathBuf>,

    /// YOLO face detection ONNX model file (downloaded on first use if omitted).
    #[arg(long)]
    detector_model: Option<PathBuf>,

    /// Minimum detector confidence for a face to count.
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    face_confidence: f64,

    /// Print the assignments without copying any files.
    #[arg(long)]
    dry_run: bool,

    /// Store --tolerance, --metric and the model paths as the new defaults.
    #[arg(long)]
    save_settings: bool,
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
    let settings = effective_settings(&cli, Settings::load());
    validate(&cli, &settings)?;
    let metric: Metric = settings.metric.parse()?;

    if cli.save_settings {
        let path = settings.save()?;
        log::info!("Saved settings to {}", path.display());
    }

    let embedder = build_embedder(&cli, &settings)?;

    let sink: Box<dyn RoutingSink> = if cli.dry_run {
        Box::new(RecordingRoutingSink::new())
    } else {
        Box::new(CopyRoutingSink::new(&cli.output))
    };

    let use_case = ClassifyPhotosUseCase::new(Box::new(embedder), sink, settings.tolerance, metric);
    let mut task = ProcessingTask::new();
    task.start(use_case, Box::new(DirectoryPhotoSource::new(&cli.input)))?;

    let token = task.cancellation_token();
    ctrlc::set_handler(move || {
        if token.is_cancelled() {
            process::exit(130);
        }
        log::warn!("Interrupted; stopping after the current photo (press Ctrl-C again to quit)");
        token.cancel();
    })?;

    let mut listener = LogEventListener::new(settings.progress_every);
    while !task.state().is_terminal() {
        if let Some(event) = task.next_event(EVENT_POLL_INTERVAL) {
            listener.on_event(&event);
        }
    }
    let report = task.wait()?;
    for event in &report.events {
        listener.on_event(event);
    }
    listener.summary();

    if cli.dry_run {
        print_assignments(&report.summary, &cli.output);
    }

    match report.summary.outcome {
        TaskOutcome::Failed(message) => Err(message.into()),
        TaskOutcome::Completed | TaskOutcome::Cancelled => Ok(()),
    }
}

fn build_embedder(
    cli: &Cli,
    settings: &Settings,
) -> Result<FaceEmbedder, Box<dyn std::error::Error>> {
    let resolver = match bundled_models_dir() {
        Some(dir) => ModelResolver::new()?.bundled_dir(dir),
        None => ModelResolver::new()?,
    };

    log::info!("Resolving model: {DETECTION_MODEL_NAME}");
    let detector_path = resolver.resolve(
        settings.detector_model_path.as_deref(),
        DETECTION_MODEL_NAME,
        DETECTION_MODEL_URL,
        Some(Box::new(download_progress)),
    )?;
    eprintln!();

    log::info!("Resolving model: {EMBEDDING_MODEL_NAME}");
    let encoder_path = resolver.resolve(
        settings.model_path.as_deref(),
        EMBEDDING_MODEL_NAME,
        EMBEDDING_MODEL_URL,
        Some(Box::new(download_progress)),
    )?;
    eprintln!();

    let detector = OnnxYoloDetector::new(&detector_path, cli.face_confidence)?;
    let encoder = ArcFaceEncoder::new(&encoder_path)?;
    Ok(FaceEmbedder::new(Box::new(detector), Box::new(encoder)))
}

/// `models/` next to the executable, for packaged installs.
fn bundled_models_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join("models"))
}

/// Command-line flags win over persisted settings.
fn effective_settings(cli: &Cli, mut settings: Settings) -> Settings {
    if let Some(tolerance) = cli.tolerance {
        settings.tolerance = tolerance;
    }
    if let Some(metric) = &cli.metric {
        settings.metric = metric.clone();
    }
    if let Some(model) = &cli.model {
        settings.model_path = Some(model.clone());
    }
    if let Some(model) = &cli.detector_model {
        settings.detector_model_path = Some(model.clone());
    }
    settings
}

fn validate(cli: &Cli, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.is_dir() {
        return Err(format!("Input folder not found: {}", cli.input.display()).into());
    }
    if same_path(&cli.input, &cli.output) {
        return Err("Output folder must differ from the input folder".into());
    }
    if !settings.tolerance.is_finite() || settings.tolerance < 0.0 {
        return Err(format!(
            "Tolerance must be a non-negative number, got {}",
            settings.tolerance
        )
        .into());
    }
    if !(0.0..=1.0).contains(&cli.face_confidence) {
        return Err(format!(
            "Face confidence must be between 0 and 1, got {}",
            cli.face_confidence
        )
        .into());
    }
    settings.metric.parse::<Metric>()?;
    Ok(())
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn print_assignments(summary: &TaskSummary, output: &Path) {
    for assignment in &summary.assignments {
        println!(
            "{} -> {}",
            assignment.item.path().display(),
            output
                .join(bucket_name(assignment.label))
                .join(assignment.item.name())
                .display()
        );
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face embedding model... {pct}%");
    } else {
        eprint!("\rDownloading face embedding model... {downloaded} bytes");
    }
}
