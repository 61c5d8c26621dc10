// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error taxonomy for hubfetch.
//!
//! Three classes matter to callers:
//! - [`ListingError`] - remote enumeration failed, nothing was started
//! - [`TransferError`] - one file's stream or write failed, siblings unaffected
//! - [`DownloadError`] - what a whole run returns, including the aggregate of
//!   every per-file failure collected after all tasks settled
//!
//! A file vanishing between listing and fetch is not an error (the task skips
//! it), and a filter matching nothing is a successful no-op run.

use thiserror::Error;

/// Remote enumeration failed outright. Fatal: no task has started yet.
#[derive(Debug, Error)]
pub enum ListingError {
    /// The listing request itself failed (DNS, TLS, connection).
    #[error("listing request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The hub answered with a non-success status.
    #[error("hub returned HTTP {status} while listing {repo_id}")]
    Status { status: u16, repo_id: String },

    /// The listing payload did not look like a file tree.
    #[error("could not decode listing for {repo_id}: {source}")]
    Decode {
        repo_id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One file's transfer failed mid-flight. Fatal to that task only.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Opening or reading the remote stream failed.
    #[error("transfer failed for {path}: {source}")]
    Request {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    /// The hub answered with a non-success, non-404 status.
    #[error("hub returned HTTP {status} while fetching {path}")]
    Status { status: u16, path: String },

    /// Creating, writing, or flushing the destination file failed.
    #[error("write failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// What a whole run can fail with.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// A filter pattern did not compile.
    #[error("invalid filter pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error(transparent)]
    Listing(#[from] ListingError),

    /// The destination root could not be created.
    #[error("could not prepare destination: {0}")]
    Io(#[from] std::io::Error),

    /// Some tasks failed after the batch settled. Successful siblings stay
    /// on disk; `failures` names every path that did not make it.
    #[error("{} of {attempted} transfers failed", .failures.len())]
    Transfer {
        attempted: usize,
        failures: Vec<(String, TransferError)>,
    },
}
