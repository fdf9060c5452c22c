//! Temporary directories and fixture files.

use std::path::{Path, PathBuf};

/// Creates a temporary directory for test output.
///
/// The directory is removed when the returned `TempDir` is dropped.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("geo_test_")
        .tempdir()
        .expect("Failed to create temporary test directory")
}

/// Write `contents` to `dir/name` and return the full path.
pub fn write_fixture(dir: &Path, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("Failed to write fixture file");
    path
}
