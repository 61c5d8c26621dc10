// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Credential resolution for hub access.
//!
//! A bearer token is resolved once per run, in priority order:
//! 1. the `HF_TOKEN` environment variable
//! 2. the token file under the cache home (`$HF_HOME/token`, or
//!    `~/.cache/huggingface/token` when `HF_HOME` is unset)
//!
//! Absence of a token is not an error; public repositories work
//! unauthenticated.

use std::env;
use std::path::{Path, PathBuf};

/// Environment variable holding the bearer token directly.
const TOKEN_ENV: &str = "HF_TOKEN";

/// Environment variable overriding the cache home directory.
const CACHE_HOME_ENV: &str = "HF_HOME";

/// Default cache home, relative to the user's home directory.
const DEFAULT_CACHE_HOME: &str = ".cache/huggingface";

/// Resolve the bearer token, if any.
pub fn resolve_token() -> Option<String> {
    if let Ok(token) = env::var(TOKEN_ENV) {
        let token = token.trim();
        if !token.is_empty() {
            tracing::debug!("using token from {}", TOKEN_ENV);
            return Some(token.to_string());
        }
    }

    let path = token_file_path()?;
    let token = read_token_file(&path)?;
    tracing::debug!("using token from {}", path.display());
    Some(token)
}

/// Location of the on-disk token file, if a cache home can be determined.
pub fn token_file_path() -> Option<PathBuf> {
    let cache_home = match env::var(CACHE_HOME_ENV) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()?.join(DEFAULT_CACHE_HOME),
    };
    Some(cache_home.join("token"))
}

/// Read and trim a token file. Missing, unreadable, or empty files all
/// resolve to no token.
fn read_token_file(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let token = contents.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
