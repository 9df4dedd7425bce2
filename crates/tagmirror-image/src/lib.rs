//! Registry access and image publishing for tagmirror
//!
//! This crate provides the external capabilities the sync engine consumes:
//! - Listing upstream tags (Docker Hub API or registry `tags/list`)
//! - Resolving a tag's manifest digest against a v2 registry
//! - Building and pushing a tag with `docker buildx`
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tagmirror_core::source::DigestResolver;
//! use tagmirror_image::{RegistryClient, UpstreamImage};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = RegistryClient::new("https://registry-1.docker.io", Duration::from_secs(30))?
//!         .with_token_auth("https://auth.docker.io/token", "registry.docker.io");
//!     let upstream = UpstreamImage::new(client, "library/caddy");
//!
//!     println!("{:?}", upstream.resolve("2.8.4").await?);
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod docker;
pub mod hub;
pub mod registry;
pub mod types;
pub mod upstream;

pub use builder::BuildxExecutor;
pub use hub::HubTagLister;
pub use registry::RegistryClient;
pub use types::ImageReference;
pub use upstream::UpstreamImage;

use anyhow::{Context, Result};
use std::time::Duration;
use url::Url;

/// Version of the tagmirror-image crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// HTTP client shared settings: user agent and per-request timeout
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(format!("tagmirror/{}", VERSION))
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Parse a base URL, assuming https for bare hosts. The path always ends in
/// `/` so relative joins append instead of replacing the last segment.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };

    let mut url = Url::parse(&with_scheme).with_context(|| format!("Invalid URL: {}", raw))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
