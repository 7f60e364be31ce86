//! Static analysis of TypeScript/JavaScript packages into the code graph.

use std::{collections::HashSet, fs};

pub mod discover;
pub mod indexer;
pub mod parser;

pub use discover::{discover_packages, source_files};
pub use indexer::{diff_file_sets, index_project, FileDiff, IndexOptions, IndexRun};
pub use parser::{Dialect, FileGraph, SourceParser};

use crate::{
    error::{CairnError, Result},
    models::{ParseResult, ParseStats},
    params::ParsePackage,
};

/// Parses a package (or the listed subset of its files) without touching the
/// database. Unreadable or unparsable files are reported in the stats and
/// skipped.
pub fn parse_package(params: &ParsePackage) -> Result<ParseResult> {
    if !params.path.is_dir() {
        return Err(CairnError::invalid_input("path")
            .with_reason(format!("{} is not a directory", params.path.display())));
    }
    if params.name.trim().is_empty() {
        return Err(CairnError::invalid_input("name").with_reason("Package name cannot be empty"));
    }

    let wanted: Option<HashSet<&str>> = params
        .files
        .as_ref()
        .map(|files| files.iter().map(|f| f.trim_start_matches("./")).collect());

    let mut parser = SourceParser::new()?;
    let mut result = ParseResult::default();
    let mut stats = ParseStats::default();

    for (relative, path) in source_files(&params.path) {
        if wanted
            .as_ref()
            .is_some_and(|wanted| !wanted.contains(relative.as_str()))
        {
            continue;
        }
        let source = match fs::read(&path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                stats.errors.push(format!("{}: {e}", path.display()));
                continue;
            }
        };
        match parser.parse_file(&params.name, &relative, &source) {
            Ok(graph) => {
                stats.files_parsed += 1;
                stats.entities += graph.entities.len() as u32;
                stats.relationships += graph.relationships.len() as u32;
                result.entities.extend(graph.entities);
                result.relationships.extend(graph.relationships);
            }
            Err(e) => stats.errors.push(e.to_string()),
        }
    }

    result.stats = Some(stats);
    Ok(result)
}
