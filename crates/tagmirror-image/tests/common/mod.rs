//! Shared fixtures for tagmirror-image integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tagmirror_core::source::{BuildExecutor, BuildOutcome};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const REPOSITORY: &str = "library/caddy";

/// Tag listing served by the fake registry
pub async fn mock_tag_list(server: &MockServer, tags: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("/v2/{}/tags/list", REPOSITORY)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": REPOSITORY,
            "tags": tags,
        })))
        .mount(server)
        .await;
}

/// Manifest HEAD for `tag` answering with `digest`
pub async fn mock_manifest(server: &MockServer, tag: &str, digest: &str) {
    Mock::given(method("HEAD"))
        .and(path(format!("/v2/{}/manifests/{}", REPOSITORY, tag)))
        .respond_with(ResponseTemplate::new(200).insert_header("Docker-Content-Digest", digest))
        .mount(server)
        .await;
}

/// Manifest HEAD for `tag` answering 404
pub async fn mock_missing_manifest(server: &MockServer, tag: &str) {
    Mock::given(method("HEAD"))
        .and(path(format!("/v2/{}/manifests/{}", REPOSITORY, tag)))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

/// Executor that records requested tags instead of running docker
#[derive(Clone, Default)]
pub struct RecordingExecutor {
    built: Arc<Mutex<Vec<String>>>,
    failing: Arc<HashSet<String>>,
}

impl RecordingExecutor {
    pub fn failing(tags: &[&str]) -> Self {
        Self {
            built: Arc::default(),
            failing: Arc::new(tags.iter().map(|t| t.to_string()).collect()),
        }
    }

    pub fn built(&self) -> Vec<String> {
        self.built.lock().unwrap().clone()
    }
}

#[async_trait]
impl BuildExecutor for RecordingExecutor {
    async fn build(&self, tag: &str) -> BuildOutcome {
        self.built.lock().unwrap().push(tag.to_string());
        if self.failing.contains(tag) {
            BuildOutcome::Failure { exit_code: Some(1) }
        } else {
            BuildOutcome::Success
        }
    }
}
