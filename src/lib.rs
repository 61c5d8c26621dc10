// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! hubfetch - parallel downloader for model-hub repositories
//!
//! Every file, one screen of progress.
//!
//! hubfetch lists a hub repository, filters the tree by glob patterns, and
//! fetches the matching files concurrently with live per-file progress. The
//! progress area never outgrows the terminal: a fixed pool of rows is
//! recycled between files, and the pool size also bounds the download
//! concurrency.
//!
//! # Core Modules
//!
//! - [`download`] - the orchestrator, the plan, and the slot pool
//! - [`api`] - hub listing and file streams behind the `RepoStore` trait
//! - [`auth`] - bearer-token resolution (env var, then token file)
//! - [`error`] - the listing/transfer/aggregate error taxonomy

pub mod api;
pub mod auth;
pub mod download;
pub mod error;
pub mod utils;

// Re-export commonly used types from the download core
pub use download::{
    download_repo, DownloadOptions, DownloadReport, FilterSpec, PlanEntry, SilentDisplay,
    SlotPool, TerminalDisplay, DEFAULT_PARALLELISM,
};

// Re-export the collaborator surface
pub use api::{EntryKind, HubClient, RemoteBlob, RemoteEntry, RepoStore};
pub use auth::resolve_token;
pub use error::{DownloadError, ListingError, TransferError};
pub use utils::format_size;
