//! Integrity verification of downloaded archives.
//!
//! The expected value comes from the manifest's `crc64` field. Despite the
//! name it is treated as an opaque hex digest: MD5 by default, SHA-256 when
//! the expected value is 64 hex characters long.

use md5::Md5;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Length of a hex-encoded SHA-256 digest.
const SHA256_HEX_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Md5,
    Sha256,
}

impl ChecksumAlgorithm {
    /// Picks the algorithm for an expected digest string. Selection only looks
    /// at the length, so an expected value never changes meaning between runs.
    pub fn for_expected(expected: &str) -> Self {
        if expected.len() == SHA256_HEX_LEN && expected.bytes().all(|b| b.is_ascii_hexdigit()) {
            ChecksumAlgorithm::Sha256
        } else {
            ChecksumAlgorithm::Md5
        }
    }

    /// Hash a file in fixed-size chunks and return the digest as lowercase hex.
    pub fn digest_path(self, path: &Path) -> io::Result<String> {
        let f = File::open(path)?;
        match self {
            ChecksumAlgorithm::Md5 => digest_reader::<Md5, _>(f),
            ChecksumAlgorithm::Sha256 => digest_reader::<Sha256, _>(f),
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChecksumAlgorithm::Md5 => f.write_str("MD5"),
            ChecksumAlgorithm::Sha256 => f.write_str("SHA-256"),
        }
    }
}

fn digest_reader<D: Digest, R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = D::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Outcome of checking a file against an expected digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub algorithm: ChecksumAlgorithm,
    pub actual: String,
    pub matches: bool,
}

/// Compute the digest of `path` and compare it to `expected`.
///
/// The comparison is case-sensitive; computed digests are lowercase hex.
pub fn verify(path: &Path, expected: &str) -> io::Result<Verification> {
    let algorithm = ChecksumAlgorithm::for_expected(expected);
    let actual = algorithm.digest_path(path)?;
    let matches = actual == expected;
    Ok(Verification {
        algorithm,
        actual,
        matches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn file_with(content: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn md5_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let digest = ChecksumAlgorithm::Md5.digest_path(f.path()).unwrap();
        assert_eq!(digest, "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn sha256_known_content() {
        let f = file_with(b"hello\n");
        let digest = ChecksumAlgorithm::Sha256.digest_path(f.path()).unwrap();
        assert_eq!(
            digest,
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }

    #[test]
    fn algorithm_chosen_by_length() {
        assert_eq!(
            ChecksumAlgorithm::for_expected("d41d8cd98f00b204e9800998ecf8427e"),
            ChecksumAlgorithm::Md5
        );
        assert_eq!(
            ChecksumAlgorithm::for_expected(
                "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
            ),
            ChecksumAlgorithm::Sha256
        );
        assert_eq!(
            ChecksumAlgorithm::for_expected("deadbeef"),
            ChecksumAlgorithm::Md5
        );
    }

    #[test]
    fn verify_is_deterministic_and_detects_single_byte_change() {
        let original = file_with(b"hello world");
        let first = ChecksumAlgorithm::Md5.digest_path(original.path()).unwrap();
        let second = ChecksumAlgorithm::Md5.digest_path(original.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "5eb63bbbe01eeed093cb22bb8f5acdc3");

        let v = verify(original.path(), &first).unwrap();
        assert!(v.matches);

        let altered = file_with(b"hello worle");
        let v = verify(altered.path(), &first).unwrap();
        assert!(!v.matches);
        assert_ne!(v.actual, first);
    }

    #[test]
    fn verify_is_case_sensitive() {
        let f = file_with(b"hello world");
        let v = verify(f.path(), "5EB63BBBE01EEED093CB22BB8F5ACDC3").unwrap();
        assert!(!v.matches);
        assert_eq!(v.actual, "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn verify_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(verify(&dir.path().join("absent.zip"), "deadbeef").is_err());
    }
}
