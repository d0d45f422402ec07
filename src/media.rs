use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// The encoder script shells out to ffmpeg; a missing ffmpeg means every
/// job would fail, so the `check` command probes for it up front.
pub async fn ffmpeg_available(binary: &str) -> bool {
    debug!("Probing for media tool: {} -version", binary);

    let status = Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    matches!(status, Ok(status) if status.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        assert!(!ffmpeg_available("definitely-not-an-installed-tool").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_exit_counts_as_available() {
        // `true` ignores its arguments and exits 0, standing in for a
        // working ffmpeg.
        assert!(ffmpeg_available("true").await);
    }
}
