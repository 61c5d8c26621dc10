// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Progress display capability.
//!
//! The slot pool talks to a [`ProgressDisplay`] and never to indicatif
//! directly. Two implementations exist: [`TerminalDisplay`] renders real
//! rows, [`SilentDisplay`] renders nothing. Tasks always get a row either
//! way, so nothing downstream branches on whether a display is present.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::download::align::FALLBACK_COLUMNS;
use crate::utils::format_size;

/// Rows assumed when the terminal cannot be queried.
const FALLBACK_ROWS: usize = 24;

/// Rows kept free below the progress area (prompt, summary line).
const RESERVED_ROWS: usize = 2;

/// One renderable progress row. Rows are recycled: `begin` resets the row
/// for a new occupant, `advance` moves it, `complete` marks it done.
pub trait ProgressRow: Send {
    fn begin(&mut self, total: u64, label: &str);
    fn advance(&mut self, delta: u64);
    fn complete(&mut self);
}

/// A bounded progress surface.
pub trait ProgressDisplay: Send + Sync {
    /// Terminal width in columns, used for label alignment.
    fn columns(&self) -> usize;

    /// How many progress rows fit on screen. Bounds the slot pool and,
    /// through it, the effective parallelism.
    fn row_capacity(&self) -> usize;

    /// Add one row to the display.
    fn create_row(&self) -> Box<dyn ProgressRow>;

    /// Tear the display down. Idempotent; called on normal completion,
    /// on unwind, and from the Ctrl+C handler.
    fn stop(&self);
}

/// Live terminal rendering via indicatif.
pub struct TerminalDisplay {
    multi: MultiProgress,
    columns: usize,
    rows: usize,
    stopped: AtomicBool,
}

impl TerminalDisplay {
    /// Create a display sized from the live terminal, falling back to
    /// 80x24 when the query fails (piped output, dumb terminals).
    pub fn new() -> Self {
        let (columns, rows) = crossterm::terminal::size()
            .map(|(w, h)| (w as usize, h as usize))
            .unwrap_or((FALLBACK_COLUMNS, FALLBACK_ROWS));
        Self::with_dimensions(columns, rows)
    }

    /// Create a display with fixed dimensions.
    pub fn with_dimensions(columns: usize, rows: usize) -> Self {
        Self {
            multi: MultiProgress::new(),
            columns,
            rows,
            stopped: AtomicBool::new(false),
        }
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressDisplay for TerminalDisplay {
    fn columns(&self) -> usize {
        self.columns
    }

    fn row_capacity(&self) -> usize {
        // A terminal too short for even one row still allows one.
        self.rows.saturating_sub(RESERVED_ROWS).max(1)
    }

    fn create_row(&self) -> Box<dyn ProgressRow> {
        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix} [{bar:30.cyan/blue}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Box::new(TerminalRow { bar })
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            let _ = self.multi.clear();
        }
    }
}

struct TerminalRow {
    bar: ProgressBar,
}

impl TerminalRow {
    fn refresh_counter(&self) {
        self.bar.set_message(format!(
            "{} / {}",
            format_size(self.bar.position()),
            format_size(self.bar.length().unwrap_or(0)),
        ));
    }
}

impl ProgressRow for TerminalRow {
    fn begin(&mut self, total: u64, label: &str) {
        self.bar.reset();
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_prefix(label.to_string());
        self.refresh_counter();
    }

    fn advance(&mut self, delta: u64) {
        self.bar.inc(delta);
        self.refresh_counter();
    }

    fn complete(&mut self) {
        self.refresh_counter();
    }
}

/// The no-op display: unbounded rows, nothing rendered.
#[derive(Debug, Default)]
pub struct SilentDisplay;

impl ProgressDisplay for SilentDisplay {
    fn columns(&self) -> usize {
        FALLBACK_COLUMNS
    }

    fn row_capacity(&self) -> usize {
        usize::MAX
    }

    fn create_row(&self) -> Box<dyn ProgressRow> {
        Box::new(SilentRow)
    }

    fn stop(&self) {}
}

struct SilentRow;

impl ProgressRow for SilentRow {
    fn begin(&mut self, _total: u64, _label: &str) {}
    fn advance(&mut self, _delta: u64) {}
    fn complete(&mut self) {}
}
