//! Docker Registry HTTP API v2 client: token auth, tag listing, manifest digests

use anyhow::{anyhow, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, trace};
use url::Url;

/// Manifest media types accepted when resolving digests. Lists/indexes come
/// first so multi-arch tags report the digest of the index.
const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.list.v2+json, \
    application/vnd.oci.image.index.v1+json, \
    application/vnd.docker.distribution.manifest.v2+json, \
    application/vnd.oci.image.manifest.v1+json";

/// Header carrying the content digest of a manifest
const DIGEST_HEADER: &str = "docker-content-digest";

/// Tokens are refreshed this long before they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(10);

/// Lifetime assumed when the token endpoint does not say
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 60;

/// Bearer token endpoint (`WWW-Authenticate: Bearer realm=...,service=...`)
#[derive(Debug, Clone)]
struct TokenAuth {
    realm: String,
    service: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Client for the Docker Registry HTTP API v2
pub struct RegistryClient {
    client: reqwest::Client,
    base_url: Url,
    token_auth: Option<TokenAuth>,
    /// Username/password used when requesting bearer tokens
    credentials: Option<(String, String)>,
    /// Bearer tokens by scope
    bearer_tokens: RwLock<HashMap<String, CachedToken>>,
}

impl RegistryClient {
    /// Create a client for `registry_url` ("https://registry-1.docker.io",
    /// or a bare host, which is assumed to be https)
    pub fn new(registry_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: crate::http_client(timeout)?,
            base_url: crate::parse_base_url(registry_url)?,
            token_auth: None,
            credentials: None,
            bearer_tokens: RwLock::new(HashMap::new()),
        })
    }

    /// Request pull tokens from `realm` for `service` before each scope is used
    pub fn with_token_auth(mut self, realm: impl Into<String>, service: impl Into<String>) -> Self {
        self.token_auth = Some(TokenAuth {
            realm: realm.into(),
            service: service.into(),
        });
        self
    }

    /// Authenticate token requests (raises anonymous rate limits)
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn cached_token(&self, scope: &str) -> Option<String> {
        let tokens = self.bearer_tokens.read().ok()?;
        tokens
            .get(scope)
            .filter(|cached| cached.expires_at > Instant::now())
            .map(|cached| cached.token.clone())
    }

    /// Get a pull token for `repository`, from cache when still valid
    async fn get_token(&self, auth: &TokenAuth, repository: &str) -> Result<String> {
        let scope = format!("repository:{}:pull", repository);
        if let Some(token) = self.cached_token(&scope) {
            return Ok(token);
        }

        debug!("Requesting registry token from {} for {}", auth.realm, scope);

        let mut token_url = Url::parse(&auth.realm)
            .with_context(|| format!("Invalid token realm: {}", auth.realm))?;
        token_url
            .query_pairs_mut()
            .append_pair("service", &auth.service)
            .append_pair("scope", &scope);

        let mut request = self.client.get(token_url);
        if let Some((username, password)) = &self.credentials {
            debug!("Using authenticated request for registry token");
            request = request.basic_auth(username, Some(password));
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to request token from {}", auth.realm))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Token request failed ({}): {}", status, body));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        let token = token_response
            .token
            .or(token_response.access_token)
            .ok_or_else(|| anyhow!("Token response from {} contained no token", auth.realm))?;

        let lifetime = Duration::from_secs(
            token_response
                .expires_in
                .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
        );
        let expires_at = Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN);

        if let Ok(mut tokens) = self.bearer_tokens.write() {
            tokens.insert(
                scope,
                CachedToken {
                    token: token.clone(),
                    expires_at,
                },
            );
        }

        Ok(token)
    }

    /// Authorization header for requests against `repository`
    async fn get_auth_header(&self, repository: &str) -> Result<Option<HeaderValue>> {
        match &self.token_auth {
            Some(auth) => {
                let bearer = self.get_token(auth, repository).await?;
                Ok(Some(HeaderValue::from_str(&format!("Bearer {}", bearer))?))
            }
            None => Ok(None),
        }
    }

    async fn headers(&self, repository: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(auth_header) = self.get_auth_header(repository).await? {
            headers.insert(AUTHORIZATION, auth_header);
        }
        Ok(headers)
    }

    /// List all tags for a repository (handles pagination)
    pub async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        let mut all_tags = Vec::new();
        let mut url = self
            .base_url
            .join(&format!("v2/{}/tags/list?n=1000", repository))
            .context("Invalid tag list URL")?;

        loop {
            debug!("Listing tags from: {}", url);

            let response = self
                .client
                .get(url.clone())
                .headers(self.headers(repository).await?)
                .send()
                .await
                .with_context(|| format!("Failed to connect to registry at {}", url))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(anyhow!(
                    "Registry returned {} for {}: {}",
                    status,
                    url,
                    if body.is_empty() {
                        "(no response body)".to_string()
                    } else {
                        body
                    }
                ));
            }

            // Check for Link header for pagination
            let next_url = match response.headers().get("link").and_then(|h| h.to_str().ok()) {
                Some(link) => parse_link_header(link, &url)?,
                None => None,
            };

            let tags_response: TagsResponse = response
                .json()
                .await
                .context("Failed to parse tags response")?;

            all_tags.extend(tags_response.tags);

            match next_url {
                Some(next) => url = next,
                None => break,
            }
        }

        trace!("Found {} tags total", all_tags.len());
        Ok(all_tags)
    }

    /// Content digest of the manifest `reference` points at.
    ///
    /// `Ok(None)` when the registry does not know the reference (404) or
    /// does not report a digest.
    pub async fn manifest_digest(&self, repository: &str, reference: &str) -> Result<Option<String>> {
        let url = self
            .base_url
            .join(&format!("v2/{}/manifests/{}", repository, reference))
            .context("Invalid manifest URL")?;

        let mut headers = self.headers(repository).await?;
        headers.insert(ACCEPT, HeaderValue::from_static(MANIFEST_ACCEPT));

        debug!("Fetching manifest digest from: {}", url);

        // HEAD does not count against Docker Hub pull limits
        let response = self
            .client
            .head(url.clone())
            .headers(headers.clone())
            .send()
            .await
            .with_context(|| format!("Failed to query manifest at {}", url))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if response.status().is_success() {
            if let Some(digest) = digest_header(response.headers()) {
                return Ok(Some(digest));
            }
        }

        trace!("HEAD {} returned {}, falling back to GET", url, response.status());

        let response = self
            .client
            .get(url.clone())
            .headers(headers)
            .send()
            .await
            .with_context(|| format!("Failed to get manifest at {}", url))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Failed to get manifest ({}): {}", status, body));
        }

        Ok(digest_header(response.headers()))
    }
}

fn digest_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(DIGEST_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Parse Link header for pagination
/// Format: </v2/library/caddy/tags/list?n=1000&last=2.7.6>; rel="next"
fn parse_link_header(link: &str, current: &Url) -> Result<Option<Url>> {
    let Some(part) = link
        .split(',')
        .map(str::trim)
        .find(|part| part.contains("rel=\"next\""))
    else {
        return Ok(None);
    };

    let target = part
        .find('<')
        .and_then(|start| {
            let rest = &part[start + 1..];
            rest.find('>').map(|end| &rest[..end])
        })
        .ok_or_else(|| anyhow!("Malformed Link header: {}", link))?;

    // Relative links resolve against the page that returned them
    current
        .join(target)
        .map(Some)
        .with_context(|| format!("Invalid next page URL in Link header: {}", target))
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}
