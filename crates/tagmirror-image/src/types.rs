//! Image reference parsing

use anyhow::{anyhow, Result};
use std::fmt;

/// Registry used when a reference names no host
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// Container image reference with registry, repository, and optional tag/digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry hostname (e.g., "ghcr.io", "docker.io")
    pub registry: String,
    /// Repository path (e.g., "melonsmasher/caddy-cloudflare-cache")
    pub repository: String,
    pub tag: Option<String>,
    /// Digest (e.g., "sha256:abc123...") - mutually exclusive with tag
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse an image reference string like "ghcr.io/acme/caddy:2.8.0"
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow!("Image reference is empty"));
        }

        // Split by @ for digest references
        let (image_part, digest) = match s.split_once('@') {
            Some((before, after)) => (before, Some(after.to_string())),
            None => (s, None),
        };

        // A ':' after the last '/' is a tag; earlier ones belong to a registry port
        let last_slash = image_part.rfind('/');
        let (name, tag) = match image_part.rfind(':') {
            Some(idx) if last_slash.is_none_or(|slash| idx > slash) => {
                (&image_part[..idx], Some(image_part[idx + 1..].to_string()))
            }
            _ => (image_part, None),
        };

        if tag.is_some() && digest.is_some() {
            return Err(anyhow!("Image reference has both a tag and a digest: {}", s));
        }

        // The first component is a registry only if it looks like a host
        let (registry, repository) = match name.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_string(), rest.to_string())
            }
            _ => (DEFAULT_REGISTRY.to_string(), name.to_string()),
        };

        if repository.is_empty() || tag.as_deref() == Some("") {
            return Err(anyhow!("Invalid image reference: {}", s));
        }

        Ok(Self {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// Same repository, pointed at `tag`
    pub fn with_tag(&self, tag: impl Into<String>) -> Self {
        Self {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            tag: Some(tag.into()),
            digest: None,
        }
    }

    /// True when neither a tag nor a digest is set
    pub fn is_bare(&self) -> bool {
        self.tag.is_none() && self.digest.is_none()
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = format!("{}/{}", self.registry, self.repository);
        if let Some(digest) = &self.digest {
            write!(f, "{}@{}", base, digest)
        } else if let Some(tag) = &self.tag {
            write!(f, "{}:{}", base, tag)
        } else {
            write!(f, "{}", base)
        }
    }
}
