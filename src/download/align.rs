// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Label alignment for progress rows.
//!
//! Every row of the display shares one padding width so byte counters and
//! bars line up. The width is the widest label across the *whole* plan,
//! clamped so a row never wraps; it must therefore be computed once over
//! the full set, never incrementally per batch.

use unicode_width::UnicodeWidthStr;

/// Columns reserved per row for the bar glyphs, separators, and byte
/// counters. Labels get whatever is left of the terminal width.
pub const ROW_OVERHEAD: usize = 50;

/// Width used when the terminal cannot be queried (piped output).
pub const FALLBACK_COLUMNS: usize = 80;

/// Minimum label budget, so pathological terminals still show something.
const MIN_LABEL_WIDTH: usize = 8;

/// Pad each name with trailing spaces to a common display width.
///
/// The target width is the widest name, clamped to `columns - ROW_OVERHEAD`.
/// Names wider than the clamp pass through unchanged rather than being
/// truncated; every other name pads up to the target.
pub fn align(names: &[String], columns: usize) -> Vec<String> {
    let budget = columns.saturating_sub(ROW_OVERHEAD).max(MIN_LABEL_WIDTH);
    let widest = names
        .iter()
        .map(|name| name.width())
        .max()
        .unwrap_or(0)
        .min(budget);

    names
        .iter()
        .map(|name| {
            let current = name.width();
            if current >= widest {
                name.clone()
            } else {
                format!("{}{}", name, " ".repeat(widest - current))
            }
        })
        .collect()
}
