// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Upload vault: two-phase storage of submitted model files.
//
// An upload is first written to `<root>/.staging` under a random name.  Only
// once the submission record is committed is it renamed to its final name
// `submission_<n>.<ext>`.  The staging directory sits inside the root so the
// rename never crosses a filesystem and is atomic.  A crash before the rename
// leaves at most an anonymous staging file, which `sweep_staging` removes.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use printdesk_core::error::{PrintdeskError, Result};
use printdesk_core::types::SequenceNumber;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use crate::integrity::{hash_bytes, hash_file, verify_hash};

const STAGING_DIR: &str = ".staging";

/// An upload written to the staging area but not yet visible under its final
/// name.  Dropping it deletes the staging file.
#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
    extension: String,
    sha256: String,
    len: u64,
}

impl StagedFile {
    /// SHA-256 hex digest of the staged bytes.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Where the staged bytes currently live.
    pub fn staging_path(&self) -> &Path {
        self.file.path()
    }
}

/// Directory of stored model files.
#[derive(Debug, Clone)]
pub struct FileVault {
    root: PathBuf,
    staging: PathBuf,
}

impl FileVault {
    /// Open (or create) the vault rooted at `root`.
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let staging = root.join(STAGING_DIR);
        fs::create_dir_all(&staging).map_err(|e| {
            PrintdeskError::StorageUnavailable(format!("create {}: {e}", staging.display()))
        })?;
        debug!("file vault opened");
        Ok(Self { root, staging })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a stored file reference.
    ///
    /// References are bare file names; anything that could escape the vault
    /// is rejected as a schema error.
    pub fn path_of(&self, reference: &str) -> Result<PathBuf> {
        let plain = !reference.is_empty()
            && !reference.contains(['/', '\\'])
            && reference != "."
            && reference != "..";
        if !plain {
            return Err(PrintdeskError::Schema(format!(
                "file reference `{reference}` is not a plain file name"
            )));
        }
        Ok(self.root.join(reference))
    }

    /// Write `bytes` to the staging area.
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub fn stage(&self, bytes: &[u8], extension: &str) -> Result<StagedFile> {
        let suffix = format!(".{}", extension.to_ascii_lowercase());
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(&self.staging)
            .map_err(|e| PrintdeskError::FileWrite(format!("create staging file: {e}")))?;

        file.write_all(bytes)
            .and_then(|()| file.as_file().sync_all())
            .map_err(|e| PrintdeskError::FileWrite(format!("write staging file: {e}")))?;

        let staged = StagedFile {
            file,
            extension: extension.to_ascii_lowercase(),
            sha256: hash_bytes(bytes),
            len: bytes.len() as u64,
        };
        debug!(path = %staged.staging_path().display(), "upload staged");
        Ok(staged)
    }

    /// Move a staged upload to its final name for submission `seq`.
    ///
    /// Refuses to replace an existing file.  Returns the file reference.
    #[instrument(skip(self, staged), fields(seq = %seq))]
    pub fn store_file(&self, seq: SequenceNumber, staged: StagedFile) -> Result<String> {
        let reference = seq.file_name(&staged.extension);
        let dest = self.root.join(&reference);

        staged
            .file
            .persist_noclobber(&dest)
            .map_err(|e| PrintdeskError::FileWrite(format!("{}: {}", dest.display(), e.error)))?;

        info!(file = %reference, "upload stored");
        Ok(reference)
    }

    /// Read a stored file back.
    pub fn load(&self, reference: &str) -> Result<Vec<u8>> {
        let path = self.path_of(reference)?;
        Ok(fs::read(path)?)
    }

    /// Check a stored file against the digest recorded when it was accepted.
    #[instrument(skip(self))]
    pub fn verify(&self, reference: &str, expected_sha256: &str) -> Result<()> {
        let path = self.path_of(reference)?;
        let actual = hash_file(&path)?;
        verify_hash(&actual, expected_sha256)
    }

    /// Delete staging leftovers from interrupted submissions.
    ///
    /// Returns how many files were removed.
    #[instrument(skip(self))]
    pub fn sweep_staging(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.staging)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %entry.path().display(), error = %e, "stale upload not removed"),
            }
        }
        if removed > 0 {
            info!(removed, "stale staged uploads removed");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> (tempfile::TempDir, FileVault) {
        let dir = tempfile::tempdir().expect("temp dir");
        let vault = FileVault::open(dir.path().join("files")).expect("open vault");
        (dir, vault)
    }

    fn staging_count(vault: &FileVault) -> usize {
        fs::read_dir(vault.root().join(STAGING_DIR))
            .expect("read staging")
            .count()
    }

    #[test]
    fn staged_file_is_invisible_until_stored() {
        let (_dir, vault) = vault();
        let staged = vault.stage(b"solid cube", "STL").expect("stage");
        assert_eq!(staged.extension(), "stl");
        assert!(!vault.root().join("submission_1.stl").exists());

        let reference = vault.store_file(SequenceNumber(1), staged).expect("store");
        assert_eq!(reference, "submission_1.stl");
        assert_eq!(vault.load(&reference).expect("load"), b"solid cube");
        assert_eq!(staging_count(&vault), 0);
    }

    #[test]
    fn dropped_stage_leaves_nothing_behind() {
        let (_dir, vault) = vault();
        let staged = vault.stage(b"abandoned", "stl").expect("stage");
        assert_eq!(staging_count(&vault), 1);
        drop(staged);
        assert_eq!(staging_count(&vault), 0);
    }

    #[test]
    fn existing_final_file_is_not_replaced() {
        let (_dir, vault) = vault();
        fs::write(vault.root().join("submission_4.stl"), b"original").expect("seed");

        let staged = vault.stage(b"intruder", "stl").expect("stage");
        let result = vault.store_file(SequenceNumber(4), staged);
        assert!(matches!(result, Err(PrintdeskError::FileWrite(_))));
        assert_eq!(vault.load("submission_4.stl").expect("load"), b"original");
    }

    #[test]
    fn verify_detects_tampering() {
        let (_dir, vault) = vault();
        let staged = vault.stage(b"facet normal 0 0 1", "stl").expect("stage");
        let digest = staged.sha256().to_owned();
        let reference = vault.store_file(SequenceNumber(2), staged).expect("store");

        vault.verify(&reference, &digest).expect("untouched file verifies");

        fs::write(vault.root().join(&reference), b"edited").expect("tamper");
        assert!(matches!(
            vault.verify(&reference, &digest),
            Err(PrintdeskError::IntegrityMismatch { .. })
        ));
    }

    #[test]
    fn sweep_removes_leftovers() {
        let (_dir, vault) = vault();
        fs::write(vault.root().join(STAGING_DIR).join("upload-crash.stl"), b"x")
            .expect("seed leftover");
        assert_eq!(vault.sweep_staging().expect("sweep"), 1);
        assert_eq!(staging_count(&vault), 0);
    }

    #[test]
    fn references_cannot_escape_the_vault() {
        let (_dir, vault) = vault();
        assert!(vault.path_of("../config.json").is_err());
        assert!(vault.path_of("").is_err());
        assert!(vault.path_of("submission_1.stl").is_ok());
    }
}
