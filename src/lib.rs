//! Shared fixtures for the end-to-end tests over `testdata/`

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Directory of the named fixture package
pub fn fixture_dir(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata").join(name)
}

/// Copy the files of a fixture package into `dest`
pub fn copy_fixture(name: &str, dest: &Path) -> io::Result<()> {
    for entry in fs::read_dir(fixture_dir(name))? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::copy(entry.path(), dest.join(entry.file_name()))?;
        }
    }
    Ok(())
}

/// Expected output stored beside a fixture
pub fn golden(name: &str, file: &str) -> io::Result<String> {
    fs::read_to_string(fixture_dir(name).join(file))
}
