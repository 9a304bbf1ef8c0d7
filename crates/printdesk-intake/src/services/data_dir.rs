// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution.

use std::path::{Path, PathBuf};

use printdesk_core::error::{PrintdeskError, Result};

/// Environment variable naming the data directory.
pub const DATA_DIR_ENV: &str = "PRINTDESK_DATA_DIR";

/// Return the application data directory, creating it if needed.
///
/// An explicit directory (the `--data-dir` flag) wins, then
/// `PRINTDESK_DATA_DIR`, then the platform data location.
pub fn data_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    let dir = resolve(explicit, |key| std::env::var(key).ok());
    std::fs::create_dir_all(&dir).map_err(|e| {
        PrintdeskError::StorageUnavailable(format!("create {}: {e}", dir.display()))
    })?;
    Ok(dir)
}

/// Pick the data directory without touching the filesystem.
fn resolve(explicit: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    if let Some(dir) = env(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs_fallback(&env).join("printdesk")
}

fn dirs_fallback(env: &impl Fn(&str) -> Option<String>) -> PathBuf {
    // Try XDG data dir, then fallback to home
    if let Some(xdg) = env("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Some(home) = env("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    // Last resort
    PathBuf::from("/tmp")
}
