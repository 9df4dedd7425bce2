//! Tag listing through the Docker Hub repository API
//!
//! Docker Hub pages `/v2/repositories/<repo>/tags` with an absolute `next`
//! URL in the response body rather than a `Link` header.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

/// Results per page requested from Docker Hub
const PAGE_SIZE: u32 = 100;

/// Lists tags of one Docker Hub repository
pub struct HubTagLister {
    client: reqwest::Client,
    base_url: Url,
    repository: String,
}

impl HubTagLister {
    /// `hub_url` is the API host ("https://hub.docker.com"), `repository`
    /// the namespaced name ("library/caddy")
    pub fn new(hub_url: &str, repository: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: crate::http_client(timeout)?,
            base_url: crate::parse_base_url(hub_url)?,
            repository: repository.into(),
        })
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// All tag names, following `next` until exhausted
    pub async fn list_tags(&self) -> Result<Vec<String>> {
        let mut tags = Vec::new();
        let mut url = self
            .base_url
            .join(&format!(
                "v2/repositories/{}/tags?page_size={}",
                self.repository, PAGE_SIZE
            ))
            .context("Invalid Docker Hub tags URL")?;
        let mut pages = 0usize;

        loop {
            debug!("Listing tags from: {}", url);

            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .with_context(|| format!("Failed to connect to Docker Hub at {}", url))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(anyhow!("Docker Hub returned {} for {}: {}", status, url, body));
            }

            let page: TagPage = response
                .json()
                .await
                .context("Failed to parse Docker Hub tags response")?;
            pages += 1;

            tags.extend(page.results.into_iter().filter_map(|t| t.name).filter(|n| !n.is_empty()));

            match page.next.filter(|n| !n.is_empty()) {
                Some(next) => {
                    url = Url::parse(&next)
                        .with_context(|| format!("Invalid next page URL: {}", next))?;
                }
                None => break,
            }
        }

        trace!("Found {} tags across {} pages", tags.len(), pages);
        Ok(tags)
    }
}

#[derive(Debug, Deserialize)]
struct TagPage {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    results: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    #[serde(default)]
    name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_list_tags_follows_next() {
        let server = MockServer::start().await;
        let next = format!(
            "{}/v2/repositories/library/caddy/tags?page=2&page_size=100",
            server.uri()
        );

        Mock::given(method("GET"))
            .and(path("/v2/repositories/library/caddy/tags"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "count": 3,
                "next": null,
                "results": [{"name": "2.7.6-alpine"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v2/repositories/library/caddy/tags"))
            .and(query_param("page_size", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "count": 3,
                "next": next,
                "results": [{"name": "2.7.6"}, {"name": "2.8.0-builder"}, {"name": ""}, {}]
            })))
            .mount(&server)
            .await;

        let lister = HubTagLister::new(&server.uri(), "library/caddy", Duration::from_secs(5)).unwrap();
        let tags = lister.list_tags().await.unwrap();

        assert_eq!(tags, vec!["2.7.6", "2.8.0-builder", "2.7.6-alpine"]);
    }

    #[tokio::test]
    async fn test_list_tags_error_aborts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/repositories/library/caddy/tags"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let lister = HubTagLister::new(&server.uri(), "library/caddy", Duration::from_secs(5)).unwrap();
        let err = lister.list_tags().await.unwrap_err();
        assert!(err.to_string().contains("429"));
    }
}
