//! Bridge between tagmirror-core's `TagSource`/`DigestResolver` traits and the
//! concrete registry clients in this crate.

use crate::hub::HubTagLister;
use crate::registry::RegistryClient;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tagmirror_core::config::{TagSourceKind, UpstreamConfig};
use tagmirror_core::source::{DigestResolver, TagSource};

/// The upstream repository being mirrored
///
/// Digests always come from the registry; tag names come from Docker Hub's
/// API or from the registry's own listing.
pub struct UpstreamImage {
    registry: RegistryClient,
    repository: String,
    hub: Option<HubTagLister>,
}

impl UpstreamImage {
    /// Use the registry for both tag listing and digests
    pub fn new(registry: RegistryClient, repository: impl Into<String>) -> Self {
        Self {
            registry,
            repository: repository.into(),
            hub: None,
        }
    }

    /// List tags through Docker Hub instead of the registry
    pub fn with_hub_listing(mut self, hub: HubTagLister) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Build from configuration
    pub fn from_config(config: &UpstreamConfig, timeout: Duration) -> Result<Self> {
        let mut registry = RegistryClient::new(&config.registry, timeout)?
            .with_token_auth(&config.auth_url, &config.auth_service);
        if let Some((username, password)) = config.credentials() {
            registry = registry.with_credentials(username, password);
        }

        let upstream = Self::new(registry, &config.repository);
        match config.tag_source {
            TagSourceKind::Hub => {
                let hub = HubTagLister::new(&config.hub_url, &config.repository, timeout)?;
                Ok(upstream.with_hub_listing(hub))
            }
            TagSourceKind::Registry => Ok(upstream),
        }
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }
}

#[async_trait]
impl TagSource for UpstreamImage {
    async fn list_tags(&self) -> Result<Vec<String>> {
        match &self.hub {
            Some(hub) => hub.list_tags().await,
            None => self.registry.list_tags(&self.repository).await,
        }
    }
}

#[async_trait]
impl DigestResolver for UpstreamImage {
    async fn resolve(&self, tag: &str) -> Result<Option<String>> {
        self.registry.manifest_digest(&self.repository, tag).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, tag_source: TagSourceKind) -> UpstreamConfig {
        UpstreamConfig {
            repository: "library/caddy".to_string(),
            registry: server.uri(),
            hub_url: server.uri(),
            auth_url: format!("{}/token", server.uri()),
            auth_service: "registry.docker.io".to_string(),
            tag_source,
            username: None,
            password: None,
        }
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "anon"})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_hub_listing_selected_by_config() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/repositories/library/caddy/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "next": null,
                "results": [{"name": "2.8.0"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let upstream = UpstreamImage::from_config(
            &config_for(&server, TagSourceKind::Hub),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(upstream.list_tags().await.unwrap(), vec!["2.8.0"]);
    }

    #[tokio::test]
    async fn test_registry_listing_and_resolution() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/v2/library/caddy/tags/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"tags": ["2.8.0"]})))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/v2/library/caddy/manifests/2.8.0"))
            .respond_with(ResponseTemplate::new(200).insert_header("Docker-Content-Digest", "sha256:AAA"))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/v2/library/caddy/manifests/2.9.0"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let upstream = UpstreamImage::from_config(
            &config_for(&server, TagSourceKind::Registry),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(upstream.repository(), "library/caddy");
        assert_eq!(upstream.list_tags().await.unwrap(), vec!["2.8.0"]);
        assert_eq!(
            upstream.resolve("2.8.0").await.unwrap().as_deref(),
            Some("sha256:AAA")
        );
        assert_eq!(upstream.resolve("2.9.0").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreachable_registry_is_transient_error() {
        let server = MockServer::start().await;
        let config = config_for(&server, TagSourceKind::Registry);
        drop(server);

        let upstream = UpstreamImage::from_config(&config, Duration::from_secs(2)).unwrap();
        assert!(upstream.resolve("2.8.0").await.is_err());
    }
}
