#![allow(dead_code)]

use std::{
    fs,
    path::Path,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use cairn_core::Database;
use tempfile::{NamedTempFile, TempDir};

/// Helper function to create a temporary database for testing
pub fn create_test_db() -> (NamedTempFile, Database) {
    let temp_file = NamedTempFile::new().expect("Failed to create temporary file");
    let db = Database::new(temp_file.path()).expect("Failed to create test database");
    (temp_file, db)
}

/// Writes `files` into a package directory `name` under `root`, creating a
/// `package.json` for it.
pub fn write_package(root: &Path, name: &str, files: &[(&str, &str)]) {
    let package = root.join(name);
    fs::create_dir_all(&package).expect("Failed to create package dir");
    fs::write(
        package.join("package.json"),
        format!(r#"{{"name": "{name}"}}"#),
    )
    .expect("Failed to write package.json");
    for (path, contents) in files {
        let path = package.join(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create source dir");
        }
        fs::write(path, contents).expect("Failed to write source file");
    }
}

/// A project root with its own database file.
pub fn create_test_project() -> (TempDir, Database) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db = Database::new(temp_dir.path().join("memory.db")).expect("Failed to create database");
    (temp_dir, db)
}

/// Overwrites `path` and pins its mtime to `secs` after the epoch, so
/// successive rewrites in one test never share an mtime.
pub fn rewrite_at(path: &Path, contents: &str, secs: u64) {
    fs::write(path, contents).expect("Failed to write source file");
    let file = fs::File::options()
        .write(true)
        .open(path)
        .expect("Failed to open source file");
    file.set_modified(SystemTime::from(UNIX_EPOCH + Duration::from_secs(secs)))
        .expect("Failed to set mtime");
}
