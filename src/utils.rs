// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Utility functions for hubfetch.

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;

/// Format a byte count with size-adaptive precision.
///
/// Values of 1 MiB and up get one decimal digit; smaller values render as
/// whole numbers so the counter does not jitter between fractional digits
/// while a small file streams in.
///
/// # Examples
///
/// ```
/// use hubfetch::utils::format_size;
///
/// assert_eq!(format_size(512), "512 B");
/// assert_eq!(format_size(10 * 1024), "10 KiB");
/// assert_eq!(format_size(1536 * 1024), "1.5 MiB");
/// ```
pub fn format_size(bytes: u64) -> String {
    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{} KiB", bytes / KIB)
    } else {
        format!("{} B", bytes)
    }
}
