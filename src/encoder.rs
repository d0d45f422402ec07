use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::{CaptionFont, EncoderConfig};
use crate::progress::ProgressParser;
use crate::runtime::ResolvedCommand;

/// Everything the encoder script needs for one job, passed as positional
/// arguments: input, output, caption (possibly empty), font identifier.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub caption: String,
    pub font: CaptionFont,
}

/// Distinguishes "the command could not be started" from "the encoder ran
/// and reported a failure"; the two get different user messaging and the
/// orchestrator may promote recurring launch failures to a run abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Launch,
    Encode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EncodeOutcome {
    Success,
    Failure { kind: FailureKind, message: String },
}

impl EncodeOutcome {
    fn launch_failure(message: String) -> Self {
        EncodeOutcome::Failure {
            kind: FailureKind::Launch,
            message,
        }
    }

    fn encode_failure(message: String) -> Self {
        EncodeOutcome::Failure {
            kind: FailureKind::Encode,
            message,
        }
    }
}

/// Seam for the orchestrator: the production invoker spawns a real
/// subprocess, tests substitute a scripted stub.
#[async_trait]
pub trait EncoderInvoker: Send + Sync {
    /// Run one encode to completion. Progress percentages parsed from the
    /// process's stdout are delivered through `progress` while it runs;
    /// exactly one outcome is returned once it exits.
    async fn encode(
        &self,
        runtime: &ResolvedCommand,
        request: &EncodeRequest,
        progress: mpsc::UnboundedSender<f32>,
    ) -> EncodeOutcome;
}

/// Invokes the external encoder script through the resolved runtime:
/// `<runtime> <script> <input> <output> <caption> <font>`.
pub struct ProcessInvoker {
    config: EncoderConfig,
}

impl ProcessInvoker {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    fn command(&self, runtime: &ResolvedCommand, request: &EncodeRequest) -> Command {
        let mut cmd = Command::new(&runtime.program);
        cmd.arg(&self.config.script_path)
            .arg(&request.input)
            .arg(&request.output)
            .arg(&request.caption)
            .arg(request.font.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Keep the subprocess from flashing a console window.
        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd
    }
}

#[async_trait]
impl EncoderInvoker for ProcessInvoker {
    async fn encode(
        &self,
        runtime: &ResolvedCommand,
        request: &EncodeRequest,
        progress: mpsc::UnboundedSender<f32>,
    ) -> EncodeOutcome {
        info!(
            "Encoding {} -> {} (font: {})",
            request.input.display(),
            request.output.display(),
            request.font
        );

        let mut child = match self.command(runtime, request).spawn() {
            Ok(child) => child,
            Err(e) => {
                return EncodeOutcome::launch_failure(format!(
                    "Could not start '{}': {}",
                    runtime.program, e
                ));
            }
        };

        // Both pipes were requested above.
        let mut stdout = child.stdout.take().expect("stdout is piped");
        let mut stderr = child.stderr.take().expect("stderr is piped");

        let stdout_task = async {
            let mut parser = ProgressParser::new();
            let mut buf = [0u8; 4096];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let chunk = String::from_utf8_lossy(&buf[..n]);
                        for value in parser.push(&chunk) {
                            let _ = progress.send(value);
                        }
                    }
                }
            }
            if let Some(value) = parser.finish() {
                let _ = progress.send(value);
            }
        };

        let stderr_task = async {
            let mut captured = String::new();
            let _ = stderr.read_to_string(&mut captured).await;
            captured
        };

        let (_, captured_stderr) = tokio::join!(stdout_task, stderr_task);

        let status = match child.wait().await {
            Ok(status) => status,
            Err(e) => {
                return EncodeOutcome::encode_failure(format!(
                    "Failed to collect encoder exit status: {}",
                    e
                ));
            }
        };

        debug!("Encoder exited with {:?}", status.code());

        // Exit code 0 wins regardless of what landed on stderr.
        if status.success() {
            return EncodeOutcome::Success;
        }

        let stderr_text = captured_stderr.trim();
        let message = if stderr_text.is_empty() {
            match status.code() {
                Some(code) => format!("Encoder exited with code {}", code),
                None => "Encoder was terminated by a signal".to_string(),
            }
        } else {
            stderr_text.to_string()
        };

        EncodeOutcome::encode_failure(message)
    }
}
