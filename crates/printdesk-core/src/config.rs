// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Which persistence backend holds printers and submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Relational store in a SQLite database file.
    #[default]
    Sqlite,
    /// Flat CSV sheets laid out like the lab spreadsheet.
    Tabular,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "tabular" | "csv" => Ok(Self::Tabular),
            other => Err(format!("unknown storage backend `{other}`")),
        }
    }
}

/// Persistent application settings.
///
/// Relative paths are resolved against the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Backend selected at startup.
    pub backend: StorageBackend,
    /// SQLite database file (sqlite backend).
    pub database_file: PathBuf,
    /// Directory holding `printers.csv` and `submissions.csv` (tabular backend).
    pub tabular_dir: PathBuf,
    /// Directory the uploaded model files are stored in.
    pub files_dir: PathBuf,
    /// SQLite database holding the audit trail.
    pub audit_file: PathBuf,
    /// Upload extensions accepted by validation (lowercase, no dot).
    pub accepted_extensions: Vec<String>,
    /// How long a writer waits for the store lock before giving up.
    pub lock_timeout_ms: u64,
    /// Enable audit trail logging.
    pub audit_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            database_file: PathBuf::from("printdesk.db"),
            tabular_dir: PathBuf::from("tabular"),
            files_dir: PathBuf::from("files"),
            audit_file: PathBuf::from("audit.db"),
            accepted_extensions: vec!["stl".into()],
            lock_timeout_ms: 5_000,
            audit_enabled: true,
        }
    }
}

impl AppConfig {
    /// Resolve a configured path against `data_dir` unless it is absolute.
    pub fn resolve(&self, data_dir: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            data_dir.join(path)
        }
    }

    pub fn accepts_extension(&self, extension: &str) -> bool {
        self.accepted_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }

    pub fn lock_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.lock_timeout_ms)
    }
}
