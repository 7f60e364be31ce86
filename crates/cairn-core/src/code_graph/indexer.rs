//! Incremental re-indexing of discovered packages.
//!
//! Files are compared against stored metadata by mtime; a file whose mtime
//! moved is hashed and only re-parsed when its content actually changed.
//! Each package is written with one [`Database::store_package_graph`] call,
//! so a package is either fully updated or left as it was.

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use super::{
    discover::{discover_packages, source_files},
    parser::SourceParser,
};
use crate::{
    db::{graph_queries::PackageGraphUpdate, utils::sha256_hex, Database},
    deadline::Deadline,
    error::{CairnError, Result},
    models::{CodeEntityKind, FileMeta, IndexReport, PackageInfo, ParseResult, ParseStats},
};

/// How a re-index run behaves.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOptions {
    /// Drop the stored graph first and re-parse everything
    pub full: bool,
    /// Keep the parsed entities and relationships in the returned run
    pub collect: bool,
}

/// Result of [`index_project`].
#[derive(Debug, Clone, Default)]
pub struct IndexRun {
    pub report: IndexReport,
    /// Parse output for changed files, when requested
    pub parsed: Option<ParseResult>,
}

/// Partition of a package's files against stored metadata.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FileDiff {
    /// New files, or files whose mtime differs from the stored one
    pub changed: Vec<String>,
    /// Files with metadata but no longer on disk
    pub deleted: Vec<String>,
    pub unchanged: Vec<String>,
}

/// Compares `(relative path, mtime)` pairs on disk with stored metadata.
pub fn diff_file_sets(current: &[(String, i64)], stored: &HashMap<String, FileMeta>) -> FileDiff {
    let mut diff = FileDiff::default();
    let mut on_disk = HashSet::with_capacity(current.len());

    for (path, mtime_ms) in current {
        on_disk.insert(path.as_str());
        match stored.get(path) {
            Some(meta) if meta.mtime_ms == *mtime_ms => diff.unchanged.push(path.clone()),
            _ => diff.changed.push(path.clone()),
        }
    }

    diff.deleted = stored
        .keys()
        .filter(|path| !on_disk.contains(path.as_str()))
        .cloned()
        .collect();
    diff.deleted.sort();
    diff
}

/// Re-indexes every package under `root`, stopping between packages and
/// files once `deadline` has passed. Packages not stored before the deadline
/// are listed in [`IndexReport::skipped_packages`].
pub fn index_project(
    db: &mut Database,
    root: &Path,
    options: IndexOptions,
    deadline: &Deadline,
) -> Result<IndexRun> {
    if options.full {
        log::info!("Full re-index requested; dropping stored code graph");
        db.reset_code_graph()?;
    }

    let packages = discover_packages(root)?;
    let mut parser = SourceParser::new()?;
    let mut run = IndexRun {
        report: IndexReport::default(),
        parsed: options.collect.then(ParseResult::default),
    };

    let mut remaining = packages.iter();
    for package in remaining.by_ref() {
        if deadline.expired() {
            run.report.skipped_packages.push(package.name.clone());
            break;
        }
        match index_package(db, &mut parser, package, deadline, &mut run) {
            Ok(()) => run.report.packages += 1,
            Err(CairnError::Timeout { .. }) => {
                run.report.skipped_packages.push(package.name.clone());
                break;
            }
            Err(e) => {
                log::warn!("Failed to index package {}: {e}", package.name);
                run.report.errors.push(format!("{}: {e}", package.name));
            }
        }
    }
    run.report
        .skipped_packages
        .extend(remaining.map(|p| p.name.clone()));

    if run.report.skipped_packages.is_empty() {
        remove_vanished_packages(db, &packages, &mut run.report)?;
    }

    if let Some(parsed) = run.parsed.as_mut() {
        parsed.stats = Some(ParseStats {
            files_parsed: run.report.changed_files,
            entities: run.report.entities_written,
            relationships: run.report.relationships_written,
            errors: run.report.errors.clone(),
        });
    }

    log::info!(
        "Indexed {} package(s): {} changed, {} deleted, {} unchanged file(s)",
        run.report.packages,
        run.report.changed_files,
        run.report.deleted_files,
        run.report.unchanged_files
    );
    Ok(run)
}

fn index_package(
    db: &mut Database,
    parser: &mut SourceParser,
    package: &PackageInfo,
    deadline: &Deadline,
    run: &mut IndexRun,
) -> Result<()> {
    let files = source_files(&package.path);
    let stored = db.file_metadata(&package.name)?;

    let mut absolute: HashMap<String, PathBuf> = HashMap::with_capacity(files.len());
    let mut current = Vec::with_capacity(files.len());
    for (relative, path) in files {
        match modified_ms(&path) {
            Ok(mtime_ms) => {
                current.push((relative.clone(), mtime_ms));
                absolute.insert(relative, path);
            }
            Err(e) => run.report.errors.push(e.to_string()),
        }
    }

    let diff = diff_file_sets(&current, &stored);
    let mtimes: HashMap<&str, i64> = current.iter().map(|(p, m)| (p.as_str(), *m)).collect();

    let mut update = PackageGraphUpdate {
        package: package.name.clone(),
        deleted_files: diff.deleted.clone(),
        ..Default::default()
    };
    let mut unchanged = diff.unchanged.len() as u32;
    let mut parse_errors = Vec::new();

    for relative in &diff.changed {
        deadline.check("Code graph index")?;

        let Some(path) = absolute.get(relative) else {
            continue;
        };
        let mtime_ms = mtimes.get(relative.as_str()).copied().unwrap_or_default();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                parse_errors.push(format!("{}: {e}", path.display()));
                continue;
            }
        };
        let content_hash = sha256_hex(&bytes);

        // Touched without modification: refresh the mtime only.
        if let Some(previous) = stored.get(relative) {
            if previous.content_hash.as_deref() == Some(content_hash.as_str()) {
                update.file_meta.push(FileMeta {
                    mtime_ms,
                    ..previous.clone()
                });
                unchanged += 1;
                continue;
            }
        }

        let source = String::from_utf8_lossy(&bytes);
        let graph = match parser.parse_file(&package.name, relative, &source) {
            Ok(graph) => graph,
            Err(e) => {
                parse_errors.push(format!("{}:{relative}: {e}", package.name));
                continue;
            }
        };

        let entity_count = graph
            .entities
            .iter()
            .filter(|e| e.kind != CodeEntityKind::File)
            .count() as u32;
        update.replaced_files.push(relative.clone());
        update.file_meta.push(FileMeta {
            package: package.name.clone(),
            file_path: relative.clone(),
            mtime_ms,
            content_hash: Some(content_hash),
            entity_count,
        });
        update.entities.extend(graph.entities);
        update.relationships.extend(graph.relationships);
    }

    // Nothing committed yet; a late deadline skips the whole package.
    deadline.check("Code graph index")?;

    let has_work = !update.replaced_files.is_empty()
        || !update.deleted_files.is_empty()
        || !update.file_meta.is_empty();
    if has_work {
        let counts = db.store_package_graph(&update)?;
        run.report.entities_written += counts.entities;
        run.report.relationships_written += counts.relationships;
    }

    run.report.changed_files += update.replaced_files.len() as u32;
    run.report.deleted_files += update.deleted_files.len() as u32;
    run.report.unchanged_files += unchanged;
    run.report.errors.extend(parse_errors);

    if let Some(parsed) = run.parsed.as_mut() {
        parsed.entities.extend(update.entities);
        parsed.relationships.extend(update.relationships);
    }
    Ok(())
}

/// Packages with stored metadata that were not discovered this run lose all
/// their files.
fn remove_vanished_packages(
    db: &mut Database,
    discovered: &[PackageInfo],
    report: &mut IndexReport,
) -> Result<()> {
    let live: HashSet<&str> = discovered.iter().map(|p| p.name.as_str()).collect();
    for package in db.indexed_packages()? {
        if live.contains(package.as_str()) {
            continue;
        }
        let mut deleted_files: Vec<String> = db.file_metadata(&package)?.into_keys().collect();
        deleted_files.sort();
        log::info!(
            "Package {package} no longer exists; removing {} file(s)",
            deleted_files.len()
        );
        report.deleted_files += deleted_files.len() as u32;
        db.store_package_graph(&PackageGraphUpdate {
            package,
            deleted_files,
            ..Default::default()
        })?;
    }
    Ok(())
}

fn modified_ms(path: &Path) -> Result<i64> {
    let metadata = fs::metadata(path).map_err(|source| CairnError::FileSystem {
        path: path.to_path_buf(),
        source,
    })?;
    let modified = metadata.modified().map_err(|source| CairnError::FileSystem {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(millis_since_epoch(modified))
}

/// Milliseconds since the epoch, or 0 for an mtime that predates it or does
/// not fit in an `i64`.
fn millis_since_epoch(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => i64::try_from(elapsed.as_millis()).unwrap_or_else(|_| {
            log::debug!("mtime {time:?} overflows; storing 0");
            0
        }),
        Err(_) => {
            log::debug!("mtime {time:?} predates the epoch; storing 0");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(path: &str, mtime_ms: i64) -> (String, FileMeta) {
        (
            path.to_string(),
            FileMeta {
                package: "app".to_string(),
                file_path: path.to_string(),
                mtime_ms,
                content_hash: None,
                entity_count: 1,
            },
        )
    }

    #[test]
    fn test_diff_file_sets() {
        let stored: HashMap<String, FileMeta> =
            HashMap::from([meta("a.ts", 10), meta("b.ts", 20), meta("gone.ts", 30)]);
        let current = vec![
            ("a.ts".to_string(), 10),
            ("b.ts".to_string(), 21),
            ("new.ts".to_string(), 5),
        ];

        let diff = diff_file_sets(&current, &stored);
        assert_eq!(diff.unchanged, vec!["a.ts"]);
        assert_eq!(diff.changed, vec!["b.ts", "new.ts"]);
        assert_eq!(diff.deleted, vec!["gone.ts"]);
    }

    #[test]
    fn test_diff_with_no_metadata_marks_everything_changed() {
        let current = vec![("a.ts".to_string(), 1)];
        let diff = diff_file_sets(&current, &HashMap::new());
        assert_eq!(diff.changed, vec!["a.ts"]);
        assert!(diff.deleted.is_empty());
        assert!(diff.unchanged.is_empty());
    }

    #[test]
    fn test_millis_since_epoch() {
        use std::time::Duration;

        assert_eq!(millis_since_epoch(UNIX_EPOCH + Duration::from_millis(1_500)), 1_500);
        assert_eq!(millis_since_epoch(UNIX_EPOCH - Duration::from_secs(10)), 0);
    }
}
