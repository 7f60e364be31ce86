//! Package and source file discovery.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use walkdir::{DirEntry, WalkDir};

use crate::{
    db::utils::to_slash_path,
    error::{CairnError, Result},
    models::PackageInfo,
};

pub const MANIFEST_FILE: &str = "package.json";

/// Directories never descended into.
const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    "dist",
    "build",
    "out",
    "target",
    "coverage",
];

const SOURCE_EXTENSIONS: &[&str] = &["ts", "mts", "cts", "tsx", "js", "jsx", "mjs", "cjs"];

/// Finds every directory under `root` holding a `package.json`, sorted by
/// path.
pub fn discover_packages(root: &Path) -> Result<Vec<PackageInfo>> {
    if !root.is_dir() {
        return Err(CairnError::invalid_input("root")
            .with_reason(format!("{} is not a directory", root.display())));
    }

    let mut manifests: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_ignored_dir(entry))
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == MANIFEST_FILE)
        .filter_map(|entry| entry.path().parent().map(Path::to_path_buf))
        .collect();
    manifests.sort();

    let mut seen = HashSet::new();
    let mut packages = Vec::with_capacity(manifests.len());
    for dir in manifests {
        let mut name = package_name(&dir);
        if !seen.insert(name.clone()) {
            let relative = dir.strip_prefix(root).unwrap_or(&dir);
            name = format!("{name}@{}", to_slash_path(relative));
            seen.insert(name.clone());
        }
        packages.push(PackageInfo { name, path: dir });
    }

    log::debug!("Discovered {} package(s) under {}", packages.len(), root.display());
    Ok(packages)
}

/// Source files owned by the package at `package_root`, as
/// `(relative path, absolute path)` pairs sorted by relative path. Nested
/// packages own their own files and are skipped.
pub fn source_files(package_root: &Path) -> Vec<(String, PathBuf)> {
    let mut files: Vec<(String, PathBuf)> = WalkDir::new(package_root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !(is_ignored_dir(entry)
                    || entry.file_type().is_dir() && entry.path().join(MANIFEST_FILE).is_file())
        })
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_source_file(entry.path()))
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(package_root).ok()?;
            Some((to_slash_path(relative), entry.path().to_path_buf()))
        })
        .collect();
    files.sort();
    files
}

/// TypeScript and JavaScript sources, excluding declaration files.
pub fn is_source_file(path: &Path) -> bool {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if [".d.ts", ".d.mts", ".d.cts"]
        .iter()
        .any(|suffix| file_name.ends_with(suffix))
    {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

fn is_ignored_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || IGNORED_DIRS.contains(&name.as_ref())
}

fn package_name(dir: &Path) -> String {
    let from_manifest = fs::read_to_string(dir.join(MANIFEST_FILE))
        .ok()
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
        .and_then(|manifest| {
            manifest
                .get("name")
                .and_then(|n| n.as_str())
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
        });

    from_manifest.unwrap_or_else(|| {
        dir.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_discovers_manifests_and_skips_vendor_dirs() {
        let root = tempfile::tempdir().unwrap();
        write(&root.path().join("package.json"), r#"{"name": "@acme/app"}"#);
        write(&root.path().join("libs/util/package.json"), "{}");
        write(
            &root.path().join("node_modules/left-pad/package.json"),
            r#"{"name": "left-pad"}"#,
        );
        write(&root.path().join(".cache/x/package.json"), r#"{"name": "x"}"#);

        let packages = discover_packages(root.path()).unwrap();
        let names: Vec<&str> = packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["@acme/app", "util"]);
    }

    #[test]
    fn test_source_files_stop_at_nested_packages() {
        let root = tempfile::tempdir().unwrap();
        write(&root.path().join("package.json"), "{}");
        write(&root.path().join("src/index.ts"), "");
        write(&root.path().join("src/view.tsx"), "");
        write(&root.path().join("src/types.d.ts"), "");
        write(&root.path().join("README.md"), "");
        write(&root.path().join("libs/util/package.json"), "{}");
        write(&root.path().join("libs/util/index.ts"), "");

        let files: Vec<String> = source_files(root.path())
            .into_iter()
            .map(|(relative, _)| relative)
            .collect();
        assert_eq!(files, vec!["src/index.ts", "src/view.tsx"]);
    }

    #[test]
    fn test_missing_root_is_rejected() {
        let err = discover_packages(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, CairnError::InvalidInput { .. }));
    }
}
