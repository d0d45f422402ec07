use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::CaptionFont;
use crate::encoder::{EncodeOutcome, EncodeRequest, EncoderInvoker, FailureKind};
use crate::error::{Result, TikbatchError};
use crate::queue::{BatchQueue, Job, JobStatus};
use crate::runtime::{ResolveRuntime, ResolvedCommand};

/// Per-run parameters, consumed by the orchestrator but owned elsewhere.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub output_dir: PathBuf,
    pub font: CaptionFont,
}

/// Job-state and progress notifications for whoever is watching the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchEvent {
    JobStarted { id: Uuid },
    JobProgress { id: Uuid, progress: f32 },
    JobCompleted { id: Uuid },
    JobFailed { id: Uuid, message: String },
    RunFinished { summary: RunSummary },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// True when the run stopped before exhausting its snapshot because
    /// of an environment-level failure.
    pub aborted: bool,
}

/// Promotion threshold: this many consecutive launch failures mean the
/// host environment is broken, not the individual files.
const MAX_CONSECUTIVE_LAUNCH_FAILURES: usize = 2;

/// Drives the queue strictly sequentially: one encoder subprocess in
/// flight at a time. The runtime command is resolved once per run and
/// reused across jobs; a resolution failure aborts the run while a
/// per-file encode failure only marks that job.
pub struct Orchestrator {
    queue: Arc<Mutex<BatchQueue>>,
    resolver: Box<dyn ResolveRuntime>,
    invoker: Box<dyn EncoderInvoker>,
    events: Option<mpsc::UnboundedSender<BatchEvent>>,
    running: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        queue: Arc<Mutex<BatchQueue>>,
        resolver: Box<dyn ResolveRuntime>,
        invoker: Box<dyn EncoderInvoker>,
    ) -> Self {
        Self {
            queue,
            resolver,
            invoker,
            events: None,
            running: AtomicBool::new(false),
        }
    }

    /// Attach a subscriber for job-state and progress events.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<BatchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn set_status(&self, id: Uuid, status: JobStatus, error: Option<String>) {
        self.queue
            .lock()
            .expect("queue lock poisoned")
            .set_status(id, status, error);
    }

    /// Run one batch over a snapshot of the currently eligible jobs.
    /// Jobs enqueued after the snapshot belong to the next run.
    pub async fn run(&self, run_config: &RunConfig) -> Result<RunSummary> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(TikbatchError::InputInvalid(
                "A batch run is already in progress".to_string(),
            ));
        }
        let result = self.run_inner(run_config).await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run_inner(&self, run_config: &RunConfig) -> Result<RunSummary> {
        prepare_output_dir(&run_config.output_dir)?;

        let snapshot: Vec<Job> = {
            let queue = self.queue.lock().expect("queue lock poisoned");
            queue.eligible_for_processing().cloned().collect()
        };

        if snapshot.is_empty() {
            info!("Nothing to process: no pending or errored jobs in the queue");
            let summary = RunSummary::default();
            self.emit(BatchEvent::RunFinished { summary });
            return Ok(summary);
        }

        info!("Starting batch run over {} job(s)", snapshot.len());

        let mut summary = RunSummary::default();
        let mut resolved: Option<ResolvedCommand> = None;
        let mut consecutive_launch_failures = 0usize;

        for (index, job) in snapshot.iter().enumerate() {
            self.set_status(job.id, JobStatus::Processing, None);
            self.emit(BatchEvent::JobStarted { id: job.id });

            // One resolution per run, shared by every job.
            let runtime = match &resolved {
                Some(runtime) => runtime.clone(),
                None => match self.resolver.resolve().await {
                    Ok(runtime) => {
                        resolved = Some(runtime.clone());
                        runtime
                    }
                    Err(e) => {
                        // A missing runtime fails identically for every
                        // job; fail the whole snapshot in one pass.
                        let message = e.to_string();
                        warn!("Aborting run, runtime resolution failed: {}", message);
                        self.fail_jobs(&snapshot[index..], &message, &mut summary);
                        summary.aborted = true;
                        break;
                    }
                },
            };

            let request = EncodeRequest {
                input: job.source.clone(),
                output: derive_output_path(&run_config.output_dir, &job.source),
                caption: job.caption.clone(),
                font: run_config.font,
            };

            let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
            let forward = async {
                while let Some(value) = progress_rx.recv().await {
                    self.queue
                        .lock()
                        .expect("queue lock poisoned")
                        .update_progress(job.id, value);
                    self.emit(BatchEvent::JobProgress {
                        id: job.id,
                        progress: value,
                    });
                }
            };

            let (outcome, _) = tokio::join!(
                self.invoker.encode(&runtime, &request, progress_tx),
                forward
            );

            match outcome {
                EncodeOutcome::Success => {
                    consecutive_launch_failures = 0;
                    self.set_status(job.id, JobStatus::Completed, None);
                    self.emit(BatchEvent::JobCompleted { id: job.id });
                    summary.succeeded += 1;
                    info!("Completed {}", job.display_name);
                }
                EncodeOutcome::Failure { kind, message } => {
                    self.set_status(job.id, JobStatus::Error, Some(message.clone()));
                    self.emit(BatchEvent::JobFailed {
                        id: job.id,
                        message: message.clone(),
                    });
                    summary.failed += 1;
                    warn!("Failed {}: {}", job.display_name, message);

                    if kind == FailureKind::Launch {
                        consecutive_launch_failures += 1;
                        if consecutive_launch_failures >= MAX_CONSECUTIVE_LAUNCH_FAILURES {
                            let reason = format!(
                                "Encoder failed to launch {} times in a row; \
                                 aborting remaining jobs: {}",
                                consecutive_launch_failures, message
                            );
                            warn!("{}", reason);
                            self.fail_jobs(&snapshot[index + 1..], &reason, &mut summary);
                            summary.aborted = true;
                            break;
                        }
                    } else {
                        consecutive_launch_failures = 0;
                    }
                }
            }
        }

        info!(
            "Batch run finished: {} succeeded, {} failed{}",
            summary.succeeded,
            summary.failed,
            if summary.aborted { " (aborted)" } else { "" }
        );
        self.emit(BatchEvent::RunFinished { summary });
        Ok(summary)
    }

    fn fail_jobs(&self, jobs: &[Job], message: &str, summary: &mut RunSummary) {
        for job in jobs {
            self.set_status(job.id, JobStatus::Error, Some(message.to_string()));
            self.emit(BatchEvent::JobFailed {
                id: job.id,
                message: message.to_string(),
            });
            summary.failed += 1;
        }
    }
}

/// The output directory must exist, or be creatable, before the first
/// dispatch; anything else is rejected without spawning a subprocess.
fn prepare_output_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Err(TikbatchError::InputInvalid(
            "Output directory is empty".to_string(),
        ));
    }
    std::fs::create_dir_all(dir).map_err(|e| {
        TikbatchError::InputInvalid(format!(
            "Cannot create output directory {}: {}",
            dir.display(),
            e
        ))
    })
}

/// Output path for a job: `<stem>_tiktok.mp4`, with a numeric suffix when
/// the name is already taken so reruns never overwrite earlier results.
fn derive_output_path(output_dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());

    let mut candidate = output_dir.join(format!("{}_tiktok.mp4", stem));
    let mut counter = 1;
    while candidate.exists() {
        candidate = output_dir.join(format!("{}_tiktok_{}.mp4", stem, counter));
        counter += 1;
    }
    candidate
}
