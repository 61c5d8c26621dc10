// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The download run: list, filter, order, then fetch under a bounded pool.
//!
//! Dispatch order is plan order (ascending size); completion order is
//! whatever the network decides. Task failures never cancel siblings - the
//! batch always settles, then failures are reported in aggregate. The
//! display is torn down exactly once whether the run completes, unwinds, or
//! gets interrupted.

use std::path::Path;
use std::sync::{Arc, Mutex, Once};

use futures_util::{stream, StreamExt};

use crate::api::RepoStore;
use crate::download::display::ProgressDisplay;
use crate::download::plan::{build_plan, FilterSpec};
use crate::download::slots::SlotPool;
use crate::download::task::{fetch_file, TaskOutcome};
use crate::error::{DownloadError, TransferError};

/// Concurrency cap applied on top of the requested parallelism and the
/// display's row capacity.
pub const DEFAULT_PARALLELISM: usize = 8;

/// Options for one download run.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Revision (branch, tag, or commit) to download from.
    pub revision: String,
    /// Glob patterns; empty means every file.
    pub filters: Vec<String>,
    /// Requested concurrency, clamped by the display and the default cap.
    pub parallelism: usize,
    /// Label rows with basenames instead of full repo-relative paths.
    pub bare_labels: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            revision: "main".to_string(),
            filters: Vec::new(),
            parallelism: DEFAULT_PARALLELISM,
            bare_labels: false,
        }
    }
}

/// What a successful run produced.
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// (path, bytes written) per downloaded file.
    pub downloaded: Vec<(String, u64)>,
    /// Paths that vanished between listing and fetch.
    pub skipped: Vec<String>,
}

impl DownloadReport {
    pub fn is_empty(&self) -> bool {
        self.downloaded.is_empty() && self.skipped.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.downloaded.iter().map(|(_, bytes)| bytes).sum()
    }
}

/// Download every matching file of `repo_id` into `dest`.
///
/// Zero matches is a successful no-op: no directories are created and no
/// display rows are added. Otherwise one task per plan entry runs under a
/// bounded scheduler, and the call returns once every task has settled.
pub async fn download_repo<S: RepoStore>(
    store: &S,
    repo_id: &str,
    dest: &Path,
    options: &DownloadOptions,
    display: Arc<dyn ProgressDisplay>,
) -> Result<DownloadReport, DownloadError> {
    let filter = FilterSpec::compile(&options.filters)?;
    let entries = store.list_files(repo_id, &options.revision).await?;
    let plan = build_plan(entries, &filter, display.columns(), options.bare_labels);

    if plan.is_empty() {
        tracing::info!("no files matched for {}", repo_id);
        return Ok(DownloadReport::default());
    }

    let effective = effective_parallelism(options.parallelism, display.row_capacity());
    tracing::info!(
        "{} at {}: {} files, {} concurrent",
        repo_id,
        options.revision,
        plan.len(),
        effective
    );

    tokio::fs::create_dir_all(dest).await?;

    let pool = SlotPool::new(effective, Arc::clone(&display));
    let guard = DisplayGuard::arm(Arc::clone(&display));

    let results: Vec<(String, Result<TaskOutcome, TransferError>)> = stream::iter(plan.iter())
        .map(|entry| {
            let pool = Arc::clone(&pool);
            async move {
                let slot = pool.acquire(entry.size, &entry.label);
                let result =
                    fetch_file(store, repo_id, &options.revision, entry, dest, slot).await;
                (entry.path.clone(), result)
            }
        })
        .buffer_unordered(effective)
        .collect()
        .await;

    // Normal teardown path; the guard also covers unwind and Ctrl+C.
    drop(guard);

    let attempted = results.len();
    let mut report = DownloadReport::default();
    let mut failures = Vec::new();
    for (path, result) in results {
        match result {
            Ok(TaskOutcome::Downloaded { bytes }) => report.downloaded.push((path, bytes)),
            Ok(TaskOutcome::Vanished) => report.skipped.push(path),
            Err(error) => {
                tracing::error!("{}: {}", path, error);
                failures.push((path, error));
            }
        }
    }

    if failures.is_empty() {
        Ok(report)
    } else {
        Err(DownloadError::Transfer {
            attempted,
            failures,
        })
    }
}

/// The enforced concurrency limit: requested, clamped by how many rows the
/// display can show and by the default cap, never below one.
fn effective_parallelism(requested: usize, row_capacity: usize) -> usize {
    requested.min(row_capacity).min(DEFAULT_PARALLELISM).max(1)
}

// One display at a time may be armed for signal teardown. The ctrlc handler
// is installed once per process and only acts while a run is armed, so a
// finished run can never have its display stopped twice.
static ARMED: Mutex<Option<Arc<dyn ProgressDisplay>>> = Mutex::new(None);
static HANDLER: Once = Once::new();

fn take_armed() -> Option<Arc<dyn ProgressDisplay>> {
    ARMED.lock().unwrap_or_else(|e| e.into_inner()).take()
}

/// Guarantees the display is stopped exactly once: on drop (normal return
/// or panic unwind) or from the interrupt handler, whichever fires first.
struct DisplayGuard;

impl DisplayGuard {
    fn arm(display: Arc<dyn ProgressDisplay>) -> Self {
        HANDLER.call_once(|| {
            let result = ctrlc::set_handler(|| {
                if let Some(display) = take_armed() {
                    display.stop();
                }
                // 130 = terminated by SIGINT
                std::process::exit(130);
            });
            if let Err(error) = result {
                tracing::warn!("could not install interrupt handler: {}", error);
            }
        });
        *ARMED.lock().unwrap_or_else(|e| e.into_inner()) = Some(display);
        DisplayGuard
    }
}

impl Drop for DisplayGuard {
    fn drop(&mut self) {
        if let Some(display) = take_armed() {
            display.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_parallelism_clamped_by_rows() {
        // 50 files queued or 5, the display height wins
        assert_eq!(effective_parallelism(8, 3), 3);
    }

    #[test]
    fn test_effective_parallelism_clamped_by_default() {
        assert_eq!(effective_parallelism(64, usize::MAX), DEFAULT_PARALLELISM);
    }

    #[test]
    fn test_effective_parallelism_floors_at_one() {
        assert_eq!(effective_parallelism(0, 24), 1);
        assert_eq!(effective_parallelism(4, 0), 1);
    }

    #[test]
    fn test_requested_below_all_caps_wins() {
        assert_eq!(effective_parallelism(2, 24), 2);
    }
}
