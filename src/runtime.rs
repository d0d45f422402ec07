use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::error::{Result, TikbatchError};

/// Runtime command confirmed usable for the current batch run. Valid for
/// one run only; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub program: String,
}

impl ResolvedCommand {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
        }
    }
}

/// Seam for the orchestrator: production resolution probes real
/// processes, tests substitute a stub.
#[async_trait]
pub trait ResolveRuntime: Send + Sync {
    async fn resolve(&self) -> Result<ResolvedCommand>;
}

/// Probes an ordered list of candidate runtime commands with a version
/// check and returns the first that exits 0. Nothing is cached; every
/// call re-probes from scratch.
pub struct RuntimeResolver {
    config: RuntimeConfig,
}

impl RuntimeResolver {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    async fn probe(&self, candidate: &str) -> bool {
        debug!("Probing runtime candidate: {} {}", candidate, self.config.version_arg);

        let child = Command::new(candidate)
            .arg(&self.config.version_arg)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        let wait = Duration::from_secs(self.config.probe_timeout_secs);
        match tokio::time::timeout(wait, child).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                debug!("Candidate '{}' failed to launch: {}", candidate, e);
                false
            }
            Err(_) => {
                warn!("Candidate '{}' version check timed out after {:?}", candidate, wait);
                false
            }
        }
    }
}

#[async_trait]
impl ResolveRuntime for RuntimeResolver {
    /// Returns the first candidate whose version check succeeds. Later
    /// candidates are not attempted once one resolves. Fails with
    /// `RuntimeNotFound` when every candidate fails to launch or exits
    /// nonzero; no retries within a single resolution.
    async fn resolve(&self) -> Result<ResolvedCommand> {
        if self.config.candidates.is_empty() {
            return Err(TikbatchError::Config(
                "No runtime candidates configured".to_string(),
            ));
        }

        for candidate in &self.config.candidates {
            if self.probe(candidate).await {
                info!("Resolved encoder runtime: {}", candidate);
                return Ok(ResolvedCommand::new(candidate.clone()));
            }
        }

        Err(TikbatchError::RuntimeNotFound(format!(
            "None of the candidate commands ({}) answered '{}' successfully. \
             Install Python 3 and make sure it is on your PATH.",
            self.config.candidates.join(", "),
            self.config.version_arg
        )))
    }
}
