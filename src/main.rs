//! Tikbatch - Batch Vertical Video Conversion
//!
//! This is the main entry point for the tikbatch CLI, which converts
//! batches of videos to vertical 9:16 format with burned-in captions by
//! driving an external encoder script.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;
use walkdir::WalkDir;

use tikbatch::cli::{Args, Commands};
use tikbatch::config::{CaptionFont, Config};
use tikbatch::encoder::ProcessInvoker;
use tikbatch::error::TikbatchError;
use tikbatch::media::ffmpeg_available;
use tikbatch::orchestrator::{BatchEvent, Orchestrator, RunConfig};
use tikbatch::queue::{BatchQueue, JobStatus};
use tikbatch::runtime::{ResolveRuntime, RuntimeResolver};
use tikbatch::settings::{SettingsStore, TomlSettingsStore, KEY_CAPTION_FONT, KEY_OUTPUT_DIR};

const VIDEO_EXTENSIONS: [&str; 7] = ["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm"];

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    // Load configuration
    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            // Try to load config.toml from current directory first
            if std::path::Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    // Persistent settings, with the default output directory written
    // exactly once on first start.
    let mut settings = TomlSettingsStore::open(app_dir().join("settings.toml"))?;
    settings.ensure(
        KEY_OUTPUT_DIR,
        &config.output.dir.display().to_string(),
    )?;

    match args.command {
        Commands::Fonts => {
            println!("Supported caption fonts:");
            for font in CaptionFont::ALL {
                println!("  {}", font);
            }
        }
        Commands::Check => {
            let resolver = RuntimeResolver::new(config.runtime.clone());
            match resolver.resolve().await {
                Ok(resolved) => println!("Encoder runtime: {} (ok)", resolved.program),
                Err(e) => println!("Encoder runtime: not found\n  {}", e),
            }

            if ffmpeg_available("ffmpeg").await {
                println!("ffmpeg: available");
            } else {
                println!("ffmpeg: not found (the encoder script requires it)");
            }
        }
        Commands::Process {
            inputs,
            input_dir,
            caption,
            font,
            output_dir,
        } => {
            run_batch(
                &config,
                &mut settings,
                inputs,
                input_dir,
                caption,
                font,
                output_dir,
            )
            .await?;
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_batch(
    config: &Config,
    settings: &mut TomlSettingsStore,
    inputs: Vec<PathBuf>,
    input_dir: Option<PathBuf>,
    caption: Option<String>,
    font: Option<String>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let inputs = collect_inputs(inputs, input_dir)?;
    if inputs.is_empty() {
        return Err(TikbatchError::InputInvalid(
            "No input videos given; pass files or --input-dir".to_string(),
        )
        .into());
    }
    info!("Enqueueing {} video file(s)", inputs.len());

    // Explicit flags win over persisted settings, and are written back
    // through the store for the next run.
    let font = match font {
        Some(name) => {
            let font: CaptionFont = name.parse()?;
            settings.set(KEY_CAPTION_FONT, font.as_str())?;
            font
        }
        None => match settings.get(KEY_CAPTION_FONT) {
            Some(name) => name.parse().unwrap_or_else(|_| {
                warn!("Ignoring unknown persisted font '{}'", name);
                config.caption.font
            }),
            None => config.caption.font,
        },
    };

    let output_dir = match output_dir {
        Some(dir) => {
            settings.set(KEY_OUTPUT_DIR, &dir.display().to_string())?;
            dir
        }
        None => settings
            .get(KEY_OUTPUT_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| config.output.dir.clone()),
    };

    let mut queue = BatchQueue::new();
    queue.enqueue(inputs);
    if let Some(caption) = caption {
        queue.fill_empty_captions(&caption);
    }

    let names: HashMap<Uuid, String> = queue
        .jobs()
        .iter()
        .map(|job| (job.id, job.display_name.clone()))
        .collect();

    let queue = Arc::new(Mutex::new(queue));
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let reporter = tokio::spawn(report_progress(events_rx, names));

    let orchestrator = Orchestrator::new(
        queue.clone(),
        Box::new(RuntimeResolver::new(config.runtime.clone())),
        Box::new(ProcessInvoker::new(config.encoder.clone())),
    )
    .with_events(events_tx);

    let run_config = RunConfig { output_dir, font };
    let summary = orchestrator.run(&run_config).await?;

    // Dropping the orchestrator closes the event channel and lets the
    // reporter drain and exit.
    drop(orchestrator);
    let _ = reporter.await;

    println!();
    for job in queue.lock().expect("queue lock poisoned").jobs() {
        match job.status {
            JobStatus::Completed => println!("  ok    {}", job.display_name),
            JobStatus::Error => println!(
                "  fail  {}: {}",
                job.display_name,
                job.error.as_deref().unwrap_or("unknown error")
            ),
            _ => println!("  -     {}", job.display_name),
        }
    }
    println!(
        "\n{} succeeded, {} failed{}",
        summary.succeeded,
        summary.failed,
        if summary.aborted {
            " (run aborted early)"
        } else {
            ""
        }
    );
    println!("Output directory: {}", run_config.output_dir.display());

    if summary.aborted {
        anyhow::bail!("Batch run aborted before all jobs were attempted");
    }
    Ok(())
}

/// Explicit files plus, when given, every video found under `input_dir`.
fn collect_inputs(
    inputs: Vec<PathBuf>,
    input_dir: Option<PathBuf>,
) -> Result<Vec<PathBuf>> {
    let mut collected = Vec::new();

    for input in inputs {
        if !input.is_file() {
            return Err(TikbatchError::InputInvalid(format!(
                "Input file not found: {}",
                input.display()
            ))
            .into());
        }
        collected.push(input);
    }

    if let Some(dir) = input_dir {
        if !dir.is_dir() {
            return Err(TikbatchError::InputInvalid(format!(
                "Input path is not a directory: {}",
                dir.display()
            ))
            .into());
        }

        for entry in WalkDir::new(&dir).into_iter().filter_map(|e| e.ok()) {
            if let Some(extension) = entry.path().extension() {
                if let Some(ext_str) = extension.to_str() {
                    if VIDEO_EXTENSIONS.contains(&ext_str.to_lowercase().as_str()) {
                        collected.push(entry.path().to_path_buf());
                    }
                }
            }
        }
    }

    Ok(collected)
}

/// Renders batch events as a single reusable progress bar plus log lines.
async fn report_progress(
    mut events: mpsc::UnboundedReceiver<BatchEvent>,
    names: HashMap<Uuid, String>,
) {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{msg:30!} [{bar:40}] {pos:>3}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );

    while let Some(event) = events.recv().await {
        match event {
            BatchEvent::JobStarted { id } => {
                bar.reset();
                bar.set_message(names.get(&id).cloned().unwrap_or_default());
            }
            BatchEvent::JobProgress { progress, .. } => {
                // The encoder's values are unclamped; the bar is not.
                bar.set_position(progress.clamp(0.0, 100.0) as u64);
            }
            BatchEvent::JobCompleted { .. } => {
                bar.set_position(100);
            }
            BatchEvent::JobFailed { .. } | BatchEvent::RunFinished { .. } => {}
        }
    }
    bar.finish_and_clear();
}

/// Dot-directory for logs and settings, next to the current directory.
fn app_dir() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".tikbatch")
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = app_dir().join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "tikbatch.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    // Determine log level
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Create console layer
    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    // Create file layer
    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    // Setup layered subscriber
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    // Initialize the subscriber
    subscriber
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
