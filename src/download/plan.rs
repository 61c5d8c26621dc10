// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Download plan construction: glob filtering, ordering, and labels.
//!
//! The plan is built once per run and read-only afterwards. Files are
//! ordered by ascending size - small files first, so the display fills
//! with completed rows early and predictably - with listing order as the
//! tie-breaker (stable sort).

use glob::Pattern;

use crate::api::{EntryKind, RemoteEntry};
use crate::download::align;

/// Compiled set of glob patterns. Empty means match-all.
#[derive(Debug, Clone)]
pub struct FilterSpec {
    patterns: Vec<Pattern>,
}

impl FilterSpec {
    /// Compile a set of glob patterns. Order is preserved but irrelevant to
    /// matching; a path passes if any pattern matches.
    pub fn compile(patterns: &[String]) -> Result<Self, glob::PatternError> {
        let patterns = patterns
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Match-all filter.
    pub fn match_all() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|p| p.matches(path))
    }
}

/// One file selected for download, with its pre-aligned display label.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    /// Repo-relative, forward-slash separated path.
    pub path: String,
    /// Size in bytes, as reported by the listing.
    pub size: u64,
    /// Padded label, shared width across the whole plan.
    pub label: String,
}

/// Build the download plan from a raw listing.
///
/// Keeps file entries matching the filter, stable-sorts them by ascending
/// size, then computes labels in one pass over the entire matched set so
/// every row shares the same padding width for the whole run.
pub fn build_plan(
    entries: Vec<RemoteEntry>,
    filter: &FilterSpec,
    columns: usize,
    bare_labels: bool,
) -> Vec<PlanEntry> {
    let mut files: Vec<RemoteEntry> = entries
        .into_iter()
        .filter(|e| e.kind == EntryKind::File && filter.matches(&e.path))
        .collect();
    files.sort_by_key(|e| e.size);

    let names: Vec<String> = files
        .iter()
        .map(|e| {
            if bare_labels {
                e.path.rsplit('/').next().unwrap_or(&e.path).to_string()
            } else {
                e.path.clone()
            }
        })
        .collect();
    let labels = align::align(&names, columns);

    files
        .into_iter()
        .zip(labels)
        .map(|(entry, label)| PlanEntry {
            path: entry.path,
            size: entry.size,
            label,
        })
        .collect()
}
