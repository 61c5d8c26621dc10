// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! End-to-end download runs against an in-memory repository store.
//!
//! The store streams file bodies in small chunks with a short delay per
//! chunk, and counts how many streams are open at once, so these tests can
//! observe the concurrency bound without any network.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;

use hubfetch::api::{EntryKind, RemoteBlob, RemoteEntry, RepoStore};
use hubfetch::download::{
    download_repo, DownloadOptions, ProgressDisplay, ProgressRow, SilentDisplay,
};
use hubfetch::error::{DownloadError, ListingError, TransferError};

const REPO: &str = "acme/test-model";

// =============================================================================
// In-Memory Store
// =============================================================================

#[derive(Default)]
struct MemoryStore {
    /// (path, body) pairs, returned in listing order.
    files: Vec<(String, Vec<u8>)>,
    /// Paths listed with a size but gone by fetch time.
    vanished: Vec<(String, u64)>,
    /// Extra raw listing entries (directories and friends).
    extra_entries: Vec<RemoteEntry>,
    /// Path whose stream fails after its first chunk.
    poison: Option<String>,
    /// Concurrency probe over open streams.
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    /// Fetch order, for dispatch-order assertions.
    opened: Mutex<Vec<String>>,
}

impl MemoryStore {
    fn with_files(files: &[(&str, &[u8])]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(p, b)| (p.to_string(), b.to_vec()))
                .collect(),
            ..Default::default()
        }
    }

    fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn opened_order(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

/// Decrements the open-stream counter when the stream is dropped.
struct StreamProbe(Arc<AtomicUsize>);

impl Drop for StreamProbe {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RepoStore for MemoryStore {
    async fn list_files(
        &self,
        _repo_id: &str,
        _revision: &str,
    ) -> Result<Vec<RemoteEntry>, ListingError> {
        let mut entries: Vec<RemoteEntry> = self
            .files
            .iter()
            .map(|(path, body)| RemoteEntry {
                path: path.clone(),
                size: body.len() as u64,
                kind: EntryKind::File,
            })
            .collect();
        entries.extend(self.vanished.iter().map(|(path, size)| RemoteEntry {
            path: path.clone(),
            size: *size,
            kind: EntryKind::File,
        }));
        entries.extend(self.extra_entries.iter().cloned());
        Ok(entries)
    }

    async fn open_file(
        &self,
        _repo_id: &str,
        path: &str,
        _revision: &str,
    ) -> Result<Option<RemoteBlob>, TransferError> {
        self.opened.lock().unwrap().push(path.to_string());

        if self.vanished.iter().any(|(p, _)| p == path) {
            return Ok(None);
        }
        let Some((_, body)) = self.files.iter().find(|(p, _)| p == path) else {
            return Ok(None);
        };

        let mut chunks: Vec<Result<Bytes, TransferError>> = body
            .chunks(3)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        if self.poison.as_deref() == Some(path) {
            chunks.truncate(1);
            chunks.push(Err(TransferError::Status {
                status: 500,
                path: path.to_string(),
            }));
        }

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        let probe = StreamProbe(Arc::clone(&self.active));

        let stream = futures_util::stream::unfold(
            (chunks.into_iter(), probe),
            |(mut chunks, probe)| async move {
                tokio::time::sleep(Duration::from_millis(2)).await;
                chunks.next().map(|chunk| (chunk, (chunks, probe)))
            },
        )
        .boxed();

        Ok(Some(RemoteBlob {
            size_hint: Some(body.len() as u64),
            stream,
        }))
    }
}

// =============================================================================
// Display that counts rows (terminal stand-in with a fixed capacity)
// =============================================================================

struct CountingDisplay {
    capacity: usize,
    rows_created: AtomicUsize,
}

impl CountingDisplay {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            rows_created: AtomicUsize::new(0),
        }
    }
}

impl ProgressDisplay for CountingDisplay {
    fn columns(&self) -> usize {
        80
    }

    fn row_capacity(&self) -> usize {
        self.capacity
    }

    fn create_row(&self) -> Box<dyn ProgressRow> {
        self.rows_created.fetch_add(1, Ordering::SeqCst);
        SilentDisplay.create_row()
    }

    fn stop(&self) {}
}

fn silent() -> Arc<dyn ProgressDisplay> {
    Arc::new(SilentDisplay)
}

fn options(filters: &[&str], jobs: usize) -> DownloadOptions {
    DownloadOptions {
        filters: filters.iter().map(|f| f.to_string()).collect(),
        parallelism: jobs,
        ..Default::default()
    }
}

fn read(dest: &Path, rel: &str) -> Vec<u8> {
    std::fs::read(dest.join(rel)).unwrap()
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_three_files_land_with_exact_sizes() {
    let store = MemoryStore::with_files(&[
        ("ten.bin", &[1u8; 10]),
        ("two.bin", &[2u8; 2]),
        ("hundred.bin", &[3u8; 100]),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out");

    let report = download_repo(&store, REPO, &dest, &options(&[], 2), silent())
        .await
        .unwrap();

    assert_eq!(report.downloaded.len(), 3);
    assert_eq!(report.total_bytes(), 112);
    assert_eq!(read(&dest, "two.bin").len(), 2);
    assert_eq!(read(&dest, "ten.bin").len(), 10);
    assert_eq!(read(&dest, "hundred.bin").len(), 100);
    assert!(store.peak_concurrency() <= 2);
}

#[tokio::test]
async fn test_dispatch_order_is_smallest_first() {
    let store = MemoryStore::with_files(&[
        ("ten.bin", &[0u8; 10]),
        ("two.bin", &[0u8; 2]),
        ("hundred.bin", &[0u8; 100]),
    ]);
    let dir = tempfile::tempdir().unwrap();

    // Serial run so fetch order equals dispatch order
    download_repo(&store, REPO, dir.path(), &options(&[], 1), silent())
        .await
        .unwrap();

    assert_eq!(
        store.opened_order(),
        vec!["two.bin", "ten.bin", "hundred.bin"]
    );
}

#[tokio::test]
async fn test_filter_limits_the_plan() {
    let store = MemoryStore::with_files(&[
        ("a.json", b"{}"),
        ("b.safetensors", &[0u8; 64]),
        ("c.json", b"[]"),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out");

    let report = download_repo(&store, REPO, &dest, &options(&["*.json"], 2), silent())
        .await
        .unwrap();

    let mut paths: Vec<&str> = report.downloaded.iter().map(|(p, _)| p.as_str()).collect();
    paths.sort_unstable();
    assert_eq!(paths, vec!["a.json", "c.json"]);
    assert!(!dest.join("b.safetensors").exists());
}

#[tokio::test]
async fn test_no_match_is_a_clean_no_op() {
    let store = MemoryStore::with_files(&[("model.safetensors", &[0u8; 32])]);
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("never-created");

    let report = download_repo(&store, REPO, &dest, &options(&["*.xyz"], 2), silent())
        .await
        .unwrap();

    assert!(report.is_empty());
    assert!(!dest.exists(), "no-op run must not create the destination");
}

#[tokio::test]
async fn test_directories_are_ignored() {
    let mut store = MemoryStore::with_files(&[("onnx/model.onnx", &[0u8; 16])]);
    store.extra_entries.push(RemoteEntry {
        path: "onnx".to_string(),
        size: 0,
        kind: EntryKind::Directory,
    });
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out");

    let report = download_repo(&store, REPO, &dest, &options(&[], 2), silent())
        .await
        .unwrap();

    assert_eq!(report.downloaded.len(), 1);
    assert_eq!(read(&dest, "onnx/model.onnx").len(), 16);
}

#[tokio::test]
async fn test_vanished_file_is_skipped_silently() {
    let mut store = MemoryStore::with_files(&[("kept.bin", &[7u8; 8])]);
    store.vanished.push(("gone.bin".to_string(), 40));
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out");

    let report = download_repo(&store, REPO, &dest, &options(&[], 2), silent())
        .await
        .unwrap();

    assert_eq!(report.downloaded.len(), 1);
    assert_eq!(report.skipped, vec!["gone.bin".to_string()]);
    assert!(!dest.join("gone.bin").exists());
    assert_eq!(read(&dest, "kept.bin"), vec![7u8; 8]);
}

#[tokio::test]
async fn test_failed_transfer_does_not_cancel_siblings() {
    let mut store = MemoryStore::with_files(&[
        ("good-1.bin", &[1u8; 20]),
        ("bad.bin", &[2u8; 20]),
        ("good-2.bin", &[3u8; 20]),
    ]);
    store.poison = Some("bad.bin".to_string());
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out");

    let error = download_repo(&store, REPO, &dest, &options(&[], 2), silent())
        .await
        .unwrap_err();

    match error {
        DownloadError::Transfer {
            attempted,
            failures,
        } => {
            assert_eq!(attempted, 3);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0, "bad.bin");
        }
        other => panic!("expected aggregate transfer error, got {other}"),
    }

    // Siblings settled and landed in full
    assert_eq!(read(&dest, "good-1.bin"), vec![1u8; 20]);
    assert_eq!(read(&dest, "good-2.bin"), vec![3u8; 20]);
}

#[tokio::test]
async fn test_concurrency_never_exceeds_jobs() {
    let files: Vec<(String, Vec<u8>)> = (0..10)
        .map(|i| (format!("file-{i}.bin"), vec![i as u8; 30]))
        .collect();
    let store = MemoryStore {
        files,
        ..Default::default()
    };
    let dir = tempfile::tempdir().unwrap();

    download_repo(&store, REPO, dir.path(), &options(&[], 3), silent())
        .await
        .unwrap();

    assert!(
        store.peak_concurrency() <= 3,
        "peak concurrency {} exceeded the limit",
        store.peak_concurrency()
    );
}

#[tokio::test]
async fn test_short_display_clamps_parallelism_and_rows() {
    let files: Vec<(String, Vec<u8>)> = (0..50)
        .map(|i| (format!("chunk-{i:02}.bin"), vec![0u8; 12]))
        .collect();
    let store = MemoryStore {
        files,
        ..Default::default()
    };
    let display = Arc::new(CountingDisplay::new(3));
    let dir = tempfile::tempdir().unwrap();

    // Parallelism requested 8, terminal fits 3 rows
    let report = download_repo(
        &store,
        REPO,
        dir.path(),
        &options(&[], 8),
        display.clone(),
    )
    .await
    .unwrap();

    assert_eq!(report.downloaded.len(), 50);
    assert!(store.peak_concurrency() <= 3);
    assert!(
        display.rows_created.load(Ordering::SeqCst) <= 3,
        "display rows must stay within the terminal's capacity"
    );
}

#[tokio::test]
async fn test_rerun_overwrites_byte_identical() {
    let store = MemoryStore::with_files(&[("weights.bin", &[9u8; 77]), ("cfg.json", b"{}")]);
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out");

    download_repo(&store, REPO, &dest, &options(&[], 2), silent())
        .await
        .unwrap();
    let first = read(&dest, "weights.bin");

    download_repo(&store, REPO, &dest, &options(&[], 2), silent())
        .await
        .unwrap();

    assert_eq!(read(&dest, "weights.bin"), first);
    assert_eq!(read(&dest, "weights.bin"), vec![9u8; 77]);
    assert_eq!(read(&dest, "cfg.json"), b"{}");
}

#[tokio::test]
async fn test_nested_paths_create_parent_directories() {
    let store = MemoryStore::with_files(&[
        ("deep/nested/tree/model.bin", &[4u8; 9]),
        ("deep/nested/other.bin", &[5u8; 5]),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out");

    download_repo(&store, REPO, &dest, &options(&[], 2), silent())
        .await
        .unwrap();

    assert_eq!(read(&dest, "deep/nested/tree/model.bin"), vec![4u8; 9]);
    assert_eq!(read(&dest, "deep/nested/other.bin"), vec![5u8; 5]);
}
