//! Docker CLI prerequisites and registry login

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Locate docker and make sure the buildx plugin works.
///
/// Returns the docker binary path.
pub async fn preflight() -> Result<PathBuf> {
    let docker = which::which("docker").context("docker not found in PATH")?;
    debug!("Found docker at: {:?}", docker);

    let status = Command::new(&docker)
        .args(["buildx", "version"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .context("Failed to run docker buildx version")?;

    if !status.success() {
        return Err(anyhow!(
            "docker buildx not available. Install/enable buildx and create a builder."
        ));
    }

    Ok(docker)
}

/// Docker Hub `docker login` with the secret passed on stdin
pub async fn login(docker: &Path, username: &str, password: &str) -> Result<()> {
    info!("Logging into Docker Hub as {}", username);

    let mut child = Command::new(docker)
        .args(["login", "-u", username, "--password-stdin"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("Failed to run docker login")?;

    if let Some(mut stdin) = child.stdin.take() {
        // An early exit closes the pipe; the exit status below reports why
        if let Err(e) = stdin.write_all(password.as_bytes()).await {
            debug!("Could not write password to docker login: {}", e);
        }
    }

    let output = child
        .wait_with_output()
        .await
        .context("Failed to wait for docker login")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("docker login failed: {}", stderr.trim()));
    }

    info!("Docker login succeeded");
    Ok(())
}
