//! Code graph entities, relationships and index statistics.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CairnError, Result};

/// Prefix for relationship targets that could not be resolved to an entity.
pub const EXTERNAL_PREFIX: &str = "ext:";

/// Kind of a code graph node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum CodeEntityKind {
    Function,
    Class,
    Type,
    Interface,
    Variable,
    File,
}

impl CodeEntityKind {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeEntityKind::Function => "function",
            CodeEntityKind::Class => "class",
            CodeEntityKind::Type => "type",
            CodeEntityKind::Interface => "interface",
            CodeEntityKind::Variable => "variable",
            CodeEntityKind::File => "file",
        }
    }
}

impl FromStr for CodeEntityKind {
    type Err = CairnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "function" | "method" => Ok(CodeEntityKind::Function),
            "class" => Ok(CodeEntityKind::Class),
            "type" | "enum" => Ok(CodeEntityKind::Type),
            "interface" => Ok(CodeEntityKind::Interface),
            "variable" | "const" => Ok(CodeEntityKind::Variable),
            "file" => Ok(CodeEntityKind::File),
            _ => Err(CairnError::invalid_enum(
                "entity kind",
                s,
                &["function", "class", "type", "interface", "variable", "file"],
            )),
        }
    }
}

/// Type of a directed code graph edge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum CodeRelationKind {
    Calls,
    Imports,
    Exports,
    Extends,
    Implements,
    Defines,
}

impl CodeRelationKind {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeRelationKind::Calls => "calls",
            CodeRelationKind::Imports => "imports",
            CodeRelationKind::Exports => "exports",
            CodeRelationKind::Extends => "extends",
            CodeRelationKind::Implements => "implements",
            CodeRelationKind::Defines => "defines",
        }
    }
}

impl FromStr for CodeRelationKind {
    type Err = CairnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "calls" => Ok(CodeRelationKind::Calls),
            "imports" => Ok(CodeRelationKind::Imports),
            "exports" => Ok(CodeRelationKind::Exports),
            "extends" => Ok(CodeRelationKind::Extends),
            "implements" => Ok(CodeRelationKind::Implements),
            "defines" => Ok(CodeRelationKind::Defines),
            _ => Err(CairnError::invalid_enum(
                "relationship kind",
                s,
                &["calls", "imports", "exports", "extends", "implements", "defines"],
            )),
        }
    }
}

/// A function, class, type, interface, variable or file in a package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeEntity {
    /// `<package>:<file>#<kind>:<qualified name>`
    pub id: String,
    pub package: String,
    /// Path relative to the package root, with `/` separators
    pub file_path: String,
    /// Qualified name; methods are prefixed with their class (`Store.open`)
    pub name: String,
    pub kind: CodeEntityKind,
    /// 1-based line of the declaration
    pub line_number: u32,
    pub exported: bool,
}

impl CodeEntity {
    /// Build an entity with its deterministic id.
    pub fn new(
        package: &str,
        file_path: &str,
        name: impl Into<String>,
        kind: CodeEntityKind,
        line_number: u32,
    ) -> Self {
        let name = name.into();
        Self {
            id: Self::make_id(package, file_path, kind, &name),
            package: package.to_string(),
            file_path: file_path.to_string(),
            name,
            kind,
            line_number,
            exported: false,
        }
    }

    /// Deterministic id from package, file, kind and qualified name.
    pub fn make_id(package: &str, file_path: &str, kind: CodeEntityKind, name: &str) -> String {
        format!("{package}:{file_path}#{}:{name}", kind.as_str())
    }

    /// Id of the file entity that represents `file_path` itself.
    pub fn file_id(package: &str, file_path: &str) -> String {
        Self::make_id(package, file_path, CodeEntityKind::File, file_path)
    }

    /// The unqualified name (`open` for `Store.open`).
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// Where a freshly parsed relationship points before it is stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum RelationTarget {
    /// A known entity id in the same file
    Entity(String),
    /// A bare symbol name to be resolved against the stored graph
    Symbol(String),
    /// A module specifier from an import statement
    Module(String),
}

/// A relationship as emitted by the parser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ParsedRelationship {
    pub from_id: String,
    pub target: RelationTarget,
    pub kind: CodeRelationKind,
    /// File the relationship was found in, relative to the package root
    pub file_path: String,
    pub line_number: u32,
}

/// A relationship as stored, with its target resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeRelationship {
    pub from_id: String,
    /// Entity id, or `ext:<symbol>` when nothing matched
    pub to_id: String,
    pub kind: CodeRelationKind,
    pub package: String,
    pub file_path: String,
}

impl CodeRelationship {
    pub fn is_external(&self) -> bool {
        self.to_id.starts_with(EXTERNAL_PREFIX)
    }
}

/// Per-file bookkeeping used to decide whether a file needs re-parsing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileMeta {
    pub package: String,
    pub file_path: String,
    pub mtime_ms: i64,
    /// SHA-256 of the file bytes, hex encoded
    pub content_hash: Option<String>,
    pub entity_count: u32,
}

/// Counters reported by a parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParseStats {
    pub files_parsed: u32,
    pub entities: u32,
    pub relationships: u32,
    /// Files that could not be read or parsed, with the reason
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Output of parsing a package (or a subset of its files).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParseResult {
    pub entities: Vec<CodeEntity>,
    pub relationships: Vec<ParsedRelationship>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ParseStats>,
}

/// A package boundary found under the project root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: String,
    /// Absolute directory containing the manifest
    pub path: std::path::PathBuf,
}

/// Outcome of an incremental re-index run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexReport {
    pub packages: u32,
    pub changed_files: u32,
    pub deleted_files: u32,
    pub unchanged_files: u32,
    pub entities_written: u32,
    pub relationships_written: u32,
    /// Packages skipped because the deadline passed before they were stored
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_packages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// An entity reached by a reverse traversal, with its distance from the start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dependent {
    pub entity: CodeEntity,
    pub depth: u32,
}

/// Entity, relationship and file counts for one package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageSummary {
    pub package: String,
    pub files: u32,
    pub entities: u32,
    pub relationships: u32,
}
