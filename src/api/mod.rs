// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Hub Integration Module for hubfetch.
//!
//! Provides the remote-repository collaborator: listing a repo's file tree
//! and opening individual files as byte streams. The orchestrator only sees
//! the [`RepoStore`] trait, so tests (and any future backend) can stand in
//! for the real hub.
//!
//! # Example
//!
//! ```no_run
//! use hubfetch::api::{HubClient, RepoStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = HubClient::new(None);
//! let entries = client.list_files("openai/whisper-tiny", "main").await?;
//! for entry in &entries {
//!     println!("{} ({} bytes)", entry.path, entry.size);
//! }
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use serde::Deserialize;

use crate::error::{ListingError, TransferError};

/// Default hub endpoint.
const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

/// Environment variable overriding the hub endpoint.
const ENDPOINT_ENV: &str = "HF_ENDPOINT";

/// Kind of a listed tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    /// Anything the hub may add later (lfs pointers surface as `file`).
    #[serde(other)]
    Unknown,
}

/// One entry of a repository listing.
///
/// Paths are repo-relative and forward-slash separated. Only `File` entries
/// take part in a download run.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteEntry {
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

/// An opened remote file: an optional size hint plus the body as a stream
/// of chunks. The body is never buffered whole.
pub struct RemoteBlob {
    pub size_hint: Option<u64>,
    pub stream: BoxStream<'static, Result<Bytes, TransferError>>,
}

/// The remote-repository capability consumed by the download orchestrator.
#[allow(async_fn_in_trait)]
pub trait RepoStore {
    /// Enumerate every entry of the repository at the given revision.
    async fn list_files(
        &self,
        repo_id: &str,
        revision: &str,
    ) -> Result<Vec<RemoteEntry>, ListingError>;

    /// Open one file as a byte stream. `Ok(None)` means the file is gone
    /// (listed a moment ago, 404 now) - callers skip it silently.
    async fn open_file(
        &self,
        repo_id: &str,
        path: &str,
        revision: &str,
    ) -> Result<Option<RemoteBlob>, TransferError>;
}

/// Client for a Hugging Face-compatible hub.
#[derive(Debug, Clone)]
pub struct HubClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HubClient {
    /// Create a client against the default endpoint (or `HF_ENDPOINT` when
    /// set), with an optional bearer token.
    pub fn new(token: Option<String>) -> Self {
        let endpoint = std::env::var(ENDPOINT_ENV)
            .ok()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        Self::with_endpoint(endpoint, token)
    }

    /// Create a client against a specific endpoint.
    pub fn with_endpoint(endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl RepoStore for HubClient {
    async fn list_files(
        &self,
        repo_id: &str,
        revision: &str,
    ) -> Result<Vec<RemoteEntry>, ListingError> {
        let mut url = format!(
            "{}/api/models/{}/tree/{}?recursive=true",
            self.endpoint, repo_id, revision
        );
        let mut entries = Vec::new();

        // The tree endpoint paginates via a Link header; follow it until
        // the last page.
        loop {
            tracing::debug!("listing page: {}", url);
            let response = self
                .authorize(self.http.get(&url))
                .send()
                .await
                .map_err(ListingError::Request)?;

            let status = response.status();
            if !status.is_success() {
                return Err(ListingError::Status {
                    status: status.as_u16(),
                    repo_id: repo_id.to_string(),
                });
            }

            let next = next_page_url(response.headers());
            let body = response.bytes().await.map_err(ListingError::Request)?;
            let page: Vec<RemoteEntry> =
                serde_json::from_slice(&body).map_err(|source| ListingError::Decode {
                    repo_id: repo_id.to_string(),
                    source,
                })?;
            entries.extend(page);

            match next {
                Some(next) => url = next,
                None => break,
            }
        }

        tracing::debug!("listed {} entries for {}", entries.len(), repo_id);
        Ok(entries)
    }

    async fn open_file(
        &self,
        repo_id: &str,
        path: &str,
        revision: &str,
    ) -> Result<Option<RemoteBlob>, TransferError> {
        let url = format!(
            "{}/{}/resolve/{}/{}",
            self.endpoint, repo_id, revision, path
        );
        let response = self
            .authorize(self.http.get(&url))
            .send()
            .await
            .map_err(|source| TransferError::Request {
                path: path.to_string(),
                source,
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(TransferError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        let size_hint = response.content_length();
        let owned_path = path.to_string();
        let stream = response
            .bytes_stream()
            .map_err(move |source| TransferError::Request {
                path: owned_path.clone(),
                source,
            })
            .boxed();

        Ok(Some(RemoteBlob { size_hint, stream }))
    }
}

/// Extract the `rel="next"` target from a Link header, if present.
fn next_page_url(headers: &reqwest::header::HeaderMap) -> Option<String> {
    let link = headers.get(reqwest::header::LINK)?.to_str().ok()?;
    for part in link.split(',') {
        let part = part.trim();
        if !part.contains("rel=\"next\"") {
            continue;
        }
        let start = part.find('<')? + 1;
        let end = part.find('>')?;
        if start < end {
            return Some(part[start..end].to_string());
        }
    }
    None
}
