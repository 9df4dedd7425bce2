//! Build-and-publish through `docker buildx`

use crate::types::ImageReference;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tagmirror_core::config::{BuildConfig, TargetsConfig};
use tagmirror_core::source::{BuildExecutor, BuildOutcome};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Runs one multi-platform `docker buildx build --push` per tag, tagging the
/// result in every target repository
#[derive(Debug, Clone)]
pub struct BuildxExecutor {
    program: PathBuf,
    platforms: Vec<String>,
    always_pull: bool,
    targets: Vec<ImageReference>,
    tag_arg: String,
    dockerfile: PathBuf,
    context: PathBuf,
    timeout: Option<Duration>,
}

impl BuildxExecutor {
    /// Build from configuration. Target repositories must not carry a tag or
    /// digest of their own.
    pub fn from_config(build: &BuildConfig, targets: &TargetsConfig) -> Result<Self> {
        let targets = targets
            .repositories()
            .iter()
            .map(|repo| {
                let reference = ImageReference::parse(repo)
                    .with_context(|| format!("Invalid target repository '{}'", repo))?;
                if !reference.is_bare() {
                    return Err(anyhow!(
                        "Target repository '{}' must not include a tag or digest",
                        repo
                    ));
                }
                Ok(reference)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            program: PathBuf::from("docker"),
            platforms: build.platforms.clone(),
            always_pull: build.always_pull,
            targets,
            tag_arg: build.tag_arg.clone(),
            dockerfile: build.dockerfile.clone().into_std_path_buf(),
            context: build.context.clone().into_std_path_buf(),
            timeout: build.timeout(),
        })
    }

    /// Use a specific docker binary (e.g. the one found by preflight)
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Arguments passed to docker for `tag`
    pub fn command_args(&self, tag: &str) -> Vec<String> {
        let mut args = vec!["buildx".to_string(), "build".to_string()];

        if self.always_pull {
            args.push("--pull".to_string());
        }

        args.push("--platform".to_string());
        args.push(self.platforms.join(","));
        args.push("--provenance=false".to_string());

        for target in &self.targets {
            args.push("-t".to_string());
            args.push(target.with_tag(tag).to_string());
        }

        args.push("--build-arg".to_string());
        args.push(format!("{}={}", self.tag_arg, tag));
        args.push("-f".to_string());
        args.push(self.dockerfile.to_string_lossy().into_owned());
        args.push("--push".to_string());
        args.push(self.context.to_string_lossy().into_owned());

        args
    }
}

#[async_trait]
impl BuildExecutor for BuildxExecutor {
    async fn build(&self, tag: &str) -> BuildOutcome {
        let args = self.command_args(tag);
        info!("Building for tag={}", tag);
        debug!("Running: {} {}", self.program.display(), args.join(" "));

        let mut child = match Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to start {}: {}", self.program.display(), e);
                return BuildOutcome::Failure { exit_code: None };
            }
        };

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    warn!("Build for {} exceeded {:?}, stopping it", tag, limit);
                    if let Err(e) = child.kill().await {
                        warn!("Failed to stop build for {}: {}", tag, e);
                    }
                    return BuildOutcome::Failure { exit_code: None };
                }
            },
            None => child.wait().await,
        };

        match status {
            Ok(status) if status.success() => BuildOutcome::Success,
            Ok(status) => BuildOutcome::Failure {
                exit_code: status.code(),
            },
            Err(e) => {
                warn!("Failed waiting for build of {}: {}", tag, e);
                BuildOutcome::Failure { exit_code: None }
            }
        }
    }
}
