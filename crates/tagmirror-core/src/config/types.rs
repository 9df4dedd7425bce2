//! Configuration types (tagmirror.yaml)

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MirrorConfig {
    /// Where tags are mirrored from
    pub upstream: UpstreamConfig,

    /// Where built images are published
    pub targets: TargetsConfig,

    /// Build invocation settings
    pub build: BuildConfig,

    /// Which tags are in scope
    pub filter: FilterConfig,

    /// State file location
    pub state_path: Option<Utf8PathBuf>,

    /// Seconds between cycles in watch mode
    pub poll_interval_secs: u64,

    /// Maximum builds per cycle (0 = unbounded)
    pub max_builds_per_run: usize,

    /// Pause after each build, in seconds
    pub build_delay_secs: u64,

    /// Timeout for registry HTTP requests, in seconds
    pub request_timeout_secs: u64,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig::default(),
            targets: TargetsConfig::default(),
            build: BuildConfig::default(),
            filter: FilterConfig::default(),
            state_path: None,
            poll_interval_secs: 600,
            max_builds_per_run: 0,
            build_delay_secs: 0,
            request_timeout_secs: 30,
        }
    }
}

impl MirrorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn build_delay(&self) -> Duration {
        Duration::from_secs(self.build_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// How upstream tags are enumerated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TagSourceKind {
    /// Docker Hub repository API (`hub.docker.com/v2/repositories/...`)
    #[default]
    Hub,
    /// Registry v2 `tags/list` endpoint
    Registry,
}

/// Upstream repository identity and credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UpstreamConfig {
    /// Repository path (e.g., "library/caddy")
    pub repository: String,
    /// Registry base URL used for manifest lookups
    pub registry: String,
    /// Docker Hub API base URL used for tag listing
    pub hub_url: String,
    /// Token realm for bearer authentication
    pub auth_url: String,
    /// Token service name
    pub auth_service: String,
    pub tag_source: TagSourceKind,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            repository: "library/caddy".to_string(),
            registry: "https://registry-1.docker.io".to_string(),
            hub_url: "https://hub.docker.com".to_string(),
            auth_url: "https://auth.docker.io/token".to_string(),
            auth_service: "registry.docker.io".to_string(),
            tag_source: TagSourceKind::Hub,
            username: None,
            password: None,
        }
    }
}

impl UpstreamConfig {
    /// Username/password pair, only when both are set and non-empty
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

/// The two downstream repositories every build publishes to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TargetsConfig {
    pub dockerhub: String,
    pub ghcr: String,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            dockerhub: "melonsmasher/caddy-cloudflare-cache".to_string(),
            ghcr: "ghcr.io/melonsmasher/caddy-cloudflare-cache".to_string(),
        }
    }
}

impl TargetsConfig {
    pub fn repositories(&self) -> [&str; 2] {
        [&self.dockerhub, &self.ghcr]
    }
}

/// `docker buildx build` settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildConfig {
    /// Target platforms (e.g., "linux/amd64")
    pub platforms: Vec<String>,
    /// Pass `--pull` so base images are refreshed
    pub always_pull: bool,
    pub dockerfile: Utf8PathBuf,
    pub context: Utf8PathBuf,
    /// Build argument that receives the upstream tag
    pub tag_arg: String,
    /// Build timeout in seconds (0 = none)
    pub timeout_secs: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            platforms: vec!["linux/amd64".to_string(), "linux/arm64".to_string()],
            always_pull: true,
            dockerfile: Utf8PathBuf::from("Dockerfile"),
            context: Utf8PathBuf::from("."),
            tag_arg: "CADDY_TAG".to_string(),
            timeout_secs: 0,
        }
    }
}

impl BuildConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Tag scope settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FilterConfig {
    /// Only tags of this major version are mirrored
    pub major: u64,
    /// Allowed single variant suffixes (e.g., "alpine")
    pub variants: Vec<String>,
    /// Regular expressions rejecting a tag outright
    pub exclude: Vec<String>,
    /// Lowest mirrored version
    pub min_version: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            major: 2,
            variants: vec!["alpine".to_string()],
            exclude: vec![
                ".*-builder$".to_string(),
                ".*-windowsservercore.*".to_string(),
            ],
            min_version: "2.7.5".to_string(),
        }
    }
}
