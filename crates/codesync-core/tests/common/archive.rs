//! In-memory ZIP builder for tests.

use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// An archive entry: a directory (`None` content) or a file.
pub type Entry<'a> = (&'a str, Option<&'a [u8]>);

/// Builds a ZIP containing `entries`, in order.
pub fn build_zip(entries: &[Entry<'_>]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in entries {
        match content {
            None => zip.add_directory(*name, options).unwrap(),
            Some(bytes) => {
                zip.start_file(*name, options).unwrap();
                zip.write_all(bytes).unwrap();
            }
        }
    }
    zip.finish().unwrap().into_inner()
}

/// MD5 hex digest of `bytes`, computed the same way the verifier does.
pub fn md5_hex(bytes: &[u8]) -> String {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(bytes).unwrap();
    f.flush().unwrap();
    codesync_core::checksum::ChecksumAlgorithm::Md5
        .digest_path(f.path())
        .unwrap()
}
