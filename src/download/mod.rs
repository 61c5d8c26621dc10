// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Concurrent Repository Download for hubfetch
//!
//! This module is the core of the crate: it turns a remote listing into an
//! ordered plan and fetches it under a bounded scheduler while a
//! fixed-capacity pool of progress rows is recycled across tasks.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐    ┌──────────────────┐
//! │ orchestrator     │───▶│ plan             │
//! │ (bounded batch)  │    │ (filter + order) │
//! └────────┬─────────┘    └──────────────────┘
//!          │
//!          ▼
//! ┌──────────────────┐    ┌──────────────────┐
//! │ task             │───▶│ slots            │
//! │ (stream to disk) │    │ (recycled rows)  │
//! └──────────────────┘    └────────┬─────────┘
//!                                  │
//!                                  ▼
//!                         ┌──────────────────┐
//!                         │ display          │
//!                         │ (terminal/silent)│
//!                         └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use hubfetch::api::HubClient;
//! use hubfetch::download::{download_repo, DownloadOptions, TerminalDisplay};
//!
//! # async fn example() -> Result<(), hubfetch::error::DownloadError> {
//! let client = HubClient::new(None);
//! let report = download_repo(
//!     &client,
//!     "openai/whisper-tiny",
//!     Path::new("whisper-tiny"),
//!     &DownloadOptions::default(),
//!     Arc::new(TerminalDisplay::new()),
//! )
//! .await?;
//! println!("{} files", report.downloaded.len());
//! # Ok(())
//! # }
//! ```

pub mod align;
pub mod display;
pub mod orchestrator;
pub mod plan;
pub mod slots;
pub mod task;

// Re-export commonly used items
pub use align::{align, FALLBACK_COLUMNS, ROW_OVERHEAD};
pub use display::{ProgressDisplay, ProgressRow, SilentDisplay, TerminalDisplay};
pub use orchestrator::{
    download_repo, DownloadOptions, DownloadReport, DEFAULT_PARALLELISM,
};
pub use plan::{build_plan, FilterSpec, PlanEntry};
pub use slots::{SlotHandle, SlotPool};
pub use task::{fetch_file, TaskOutcome};
