//! Upload capability: the remote archival store seam
//!
//! The pipeline consumes the store as two opaque operations: ensure the
//! destination repository exists, and put one local file at a destination
//! path, returning its public URL. The production implementation talks to
//! the Hugging Face Hub HTTP API; tests substitute mocks through the
//! [`ArtifactStore`] trait.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use serde_json::json;
use tracing::{debug, info};

use crate::config::Settings;
use crate::constants::hub;
use crate::errors::{StoreError, StoreResult};

use super::models::RepoKind;

/// The consumed archival store capability
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Create the destination repository if it does not exist yet
    async fn ensure_repository(&self) -> StoreResult<()>;

    /// Upload one local file to `path_in_repo`; returns the public URL.
    /// The local file must not be touched on failure.
    async fn upload(&self, local: &Path, path_in_repo: &str) -> StoreResult<String>;
}

/// Join the configured path prefix with an artifact file name
pub fn path_in_repo(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim().trim_start_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix.trim_end_matches('/'), name)
    }
}

/// Hugging Face Hub store client
#[derive(Debug, Clone)]
pub struct HfStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
    repo_id: String,
    repo_kind: RepoKind,
    branch: String,
}

impl HfStore {
    /// Build a store client from the resolved settings
    pub fn new(settings: &Settings) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("tube_archiver/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: hub::BASE_URL.to_string(),
            token: settings.token.clone(),
            repo_id: settings.repo_id.clone(),
            repo_kind: settings.repo_kind,
            branch: settings.branch.clone(),
        })
    }

    /// Point the client at a different Hub endpoint (tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Public content URL for an uploaded path
    pub fn resolve_url(&self, path_in_repo: &str) -> String {
        format!(
            "{}/{}{}/resolve/{}/{}",
            self.base_url,
            self.repo_kind.url_prefix(),
            self.repo_id,
            self.branch,
            path_in_repo,
        )
    }

    /// Commit endpoint for this repository and branch
    fn commit_url(&self) -> String {
        format!(
            "{}/api/{}s/{}/commit/{}",
            self.base_url, self.repo_kind, self.repo_id, self.branch,
        )
    }

    /// Repository creation payload, splitting an owner-qualified id
    fn create_payload(&self) -> serde_json::Value {
        match self.repo_id.split_once('/') {
            Some((owner, name)) => json!({
                "type": self.repo_kind.as_str(),
                "name": name,
                "organization": owner,
            }),
            None => json!({
                "type": self.repo_kind.as_str(),
                "name": self.repo_id,
            }),
        }
    }
}

#[async_trait]
impl ArtifactStore for HfStore {
    async fn ensure_repository(&self) -> StoreResult<()> {
        let url = format!("{}{}", self.base_url, hub::CREATE_REPO_PATH);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&self.create_payload())
            .send()
            .await?;

        let status = response.status();
        // 409 means the repository already exists, which is the goal
        if status.is_success() || status.as_u16() == 409 {
            debug!("repository {} ready ({})", self.repo_id, status);
            return Ok(());
        }
        Err(StoreError::RepoCreation {
            repo_id: self.repo_id.clone(),
            status: status.as_u16(),
        })
    }

    async fn upload(&self, local: &Path, path_in_repo: &str) -> StoreResult<String> {
        let content = tokio::fs::read(local).await.map_err(|source| StoreError::Io {
            path: local.to_path_buf(),
            source,
        })?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(content);

        // NDJSON commit: one header operation, one file operation
        let header = json!({
            "key": "header",
            "value": {
                "summary": format!("Upload {path_in_repo} with tube_archiver"),
                "description": "",
            },
        });
        let file = json!({
            "key": "file",
            "value": {
                "path": path_in_repo,
                "content": encoded,
                "encoding": "base64",
            },
        });
        let body = format!("{header}\n{file}");

        let response = self
            .client
            .post(self.commit_url())
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(StoreError::UploadRejected {
                path: PathBuf::from(local),
                status: status.as_u16(),
                detail,
            });
        }

        let url = self.resolve_url(path_in_repo);
        info!("uploaded {} -> {}", local.display(), url);
        Ok(url)
    }
}
