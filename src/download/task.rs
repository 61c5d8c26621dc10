// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! One file, one task: stream a remote file to its local path while
//! feeding byte counts into a progress slot.

use std::path::Path;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::api::RepoStore;
use crate::download::plan::PlanEntry;
use crate::download::slots::SlotHandle;
use crate::error::TransferError;

/// How a single task ended, short of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The file was fetched whole and written out.
    Downloaded { bytes: u64 },
    /// The file disappeared between listing and fetch. Nothing was written;
    /// the remote listing is eventually consistent and this is not a failure.
    Vanished,
}

/// Fetch one remote file to `dest_root`, reporting progress through `slot`.
///
/// Parent directories are created on demand; `create_dir_all` is idempotent,
/// so sibling tasks creating overlapping ancestors cannot race each other
/// into an error. Each run rewrites the file from scratch - no resume, no
/// partial artifacts.
///
/// Errors abort this task only; the caller aggregates them after the whole
/// batch settles.
pub async fn fetch_file<S: RepoStore>(
    store: &S,
    repo_id: &str,
    revision: &str,
    entry: &PlanEntry,
    dest_root: &Path,
    slot: SlotHandle,
) -> Result<TaskOutcome, TransferError> {
    let io_err = |source| TransferError::Io {
        path: entry.path.clone(),
        source,
    };

    let target = dest_root.join(&entry.path);
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let Some(blob) = store.open_file(repo_id, &entry.path, revision).await? else {
        tracing::warn!("{} vanished between listing and fetch, skipping", entry.path);
        slot.finish();
        return Ok(TaskOutcome::Vanished);
    };

    let mut file = tokio::fs::File::create(&target).await.map_err(io_err)?;
    let mut stream = blob.stream;
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        slot.advance(chunk.len() as u64);
        file.write_all(&chunk).await.map_err(io_err)?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(io_err)?;
    slot.finish();

    tracing::debug!("{}: {} bytes", entry.path, written);
    Ok(TaskOutcome::Downloaded { bytes: written })
}
