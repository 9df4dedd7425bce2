//! Configuration file loading and environment overrides

use super::types::MirrorConfig;
use crate::error::{Error, Result};
use crate::filter::ParsedVersion;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::str::FromStr;
use tracing::debug;

/// Configuration file names to search for in the working directory
const CONFIG_FILE_NAMES: &[&str] = &["tagmirror.yaml", "tagmirror.yml"];

/// Directory under the home directory holding default state
const STATE_DIR_NAME: &str = ".tagmirror";

/// Default state file name
const STATE_FILE_NAME: &str = "state.json";

impl MirrorConfig {
    /// Load configuration from `path`, or from `tagmirror.yaml` in the
    /// working directory when present, then apply environment overrides.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Same as [`MirrorConfig::load`] with an explicit environment lookup
    pub fn load_with_env<F>(path: Option<&Utf8Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(p) => {
                let content = fs::read_to_string(p).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        Error::config_not_found(p.as_str())
                    } else {
                        Error::Io(e)
                    }
                })?;
                debug!("Loaded configuration from {}", p);
                Self::from_yaml(&content)?
            }
            None => match Self::find_config() {
                Some(found) => {
                    let content = fs::read_to_string(&found)?;
                    debug!("Loaded configuration from {}", found);
                    Self::from_yaml(&content)?
                }
                None => {
                    debug!("No configuration file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from YAML without validation or env overrides
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml_ng::from_str(content)?)
    }

    fn find_config() -> Option<Utf8PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(Utf8PathBuf::from)
            .find(|p| p.exists())
    }

    /// Overlay values from environment variables
    pub fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("UPSTREAM_REPO") {
            self.upstream.repository = v;
        }
        if let Some(v) = get("UPSTREAM_REGISTRY") {
            self.upstream.registry = v;
        }
        if let Some(v) = get("DOCKERHUB_USERNAME") {
            self.upstream.username = Some(v);
        }
        if let Some(v) = get("DOCKERHUB_PASSWORD").or_else(|| get("DOCKERHUB_TOKEN")) {
            self.upstream.password = Some(v);
        }
        if let Some(v) = get("TARGET_REPO_DOCKERHUB") {
            self.targets.dockerhub = v;
        }
        if let Some(v) = get("TARGET_REPO_GHCR") {
            self.targets.ghcr = v;
        }
        if let Some(v) = get("STATE_DB") {
            self.state_path = Some(Utf8PathBuf::from(v));
        }
        if let Some(v) = get("POLL_INTERVAL") {
            self.poll_interval_secs = parse_number("POLL_INTERVAL", &v)?;
        }
        if let Some(v) = get("PLATFORMS") {
            self.build.platforms = v
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = get("ALWAYS_PULL") {
            self.build.always_pull = v.trim() == "1";
        }
        if let Some(v) = get("DOCKERFILE") {
            self.build.dockerfile = Utf8PathBuf::from(v);
        }
        if let Some(v) = get("BUILD_CONTEXT") {
            self.build.context = Utf8PathBuf::from(v);
        }
        if let Some(v) = get("BUILD_TIMEOUT_SEC") {
            self.build.timeout_secs = parse_number("BUILD_TIMEOUT_SEC", &v)?;
        }
        if let Some(v) = get("MAX_BUILDS_PER_RUN") {
            self.max_builds_per_run = parse_number("MAX_BUILDS_PER_RUN", &v)?;
        }
        if let Some(v) = get("BUILD_DELAY_SEC") {
            self.build_delay_secs = parse_number("BUILD_DELAY_SEC", &v)?;
        }
        if let Some(v) = get("MIN_VERSION") {
            self.filter.min_version = v;
        }

        Ok(())
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(Error::invalid_config("poll-interval-secs must be greater than 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::invalid_config("request-timeout-secs must be greater than 0"));
        }
        if self.upstream.repository.trim().is_empty() {
            return Err(Error::invalid_config("upstream.repository must not be empty"));
        }
        if self.targets.dockerhub.trim().is_empty() || self.targets.ghcr.trim().is_empty() {
            return Err(Error::invalid_config("both target repositories must be set"));
        }
        if self.build.platforms.is_empty() {
            return Err(Error::invalid_config("build.platforms must list at least one platform"));
        }
        ParsedVersion::from_str(&self.filter.min_version)?;
        for pattern in &self.filter.exclude {
            regex::Regex::new(pattern).map_err(|e| Error::invalid_pattern(pattern.clone(), e))?;
        }
        Ok(())
    }

    /// Configured state path, or `~/.tagmirror/state.json`
    pub fn resolved_state_path(&self) -> Result<Utf8PathBuf> {
        if let Some(path) = &self.state_path {
            return Ok(path.clone());
        }

        let home = dirs::home_dir()
            .ok_or_else(|| Error::invalid_config("Could not determine home directory"))?;
        let home = Utf8PathBuf::try_from(home)
            .map_err(|e| Error::invalid_config(format!("Home directory is not UTF-8: {}", e)))?;
        Ok(home.join(STATE_DIR_NAME).join(STATE_FILE_NAME))
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::invalid_config(format!("{} must be a non-negative integer, got '{}'", key, value)))
}
