// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Upload integrity: SHA-256 fingerprints of submitted model files.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use printdesk_core::error::{PrintdeskError, Result};
use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of `data` as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hash a stored file without loading it into memory at once.
///
/// Model files can run to hundreds of megabytes, so the file is fed to the
/// hasher in fixed-size chunks.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compare an actual digest against the one recorded at submission time.
pub fn verify_hash(actual_hex: &str, expected_hex: &str) -> Result<()> {
    if actual_hex.eq_ignore_ascii_case(expected_hex) {
        Ok(())
    } else {
        Err(PrintdeskError::IntegrityMismatch {
            expected: expected_hex.to_owned(),
            actual: actual_hex.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// SHA-256 of the empty byte slice (well-known constant).
    const EMPTY_SHA256: &str =
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn hash_empty_input() {
        assert_eq!(hash_bytes(b""), EMPTY_SHA256);
    }

    #[test]
    fn file_hash_matches_in_memory_hash() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        let data = vec![0x5Au8; 200 * 1024];
        file.write_all(&data).expect("write");
        file.flush().expect("flush");

        let on_disk = hash_file(file.path()).expect("hash file");
        assert_eq!(on_disk, hash_bytes(&data));
    }

    #[test]
    fn mismatch_reports_both_digests() {
        match verify_hash(&hash_bytes(b"a"), "0000") {
            Err(PrintdeskError::IntegrityMismatch { expected, actual }) => {
                assert_eq!(expected, "0000");
                assert_eq!(actual, hash_bytes(b"a"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = hash_file(&dir.path().join("absent.stl"));
        assert!(matches!(result, Err(PrintdeskError::Io(_))));
    }
}
