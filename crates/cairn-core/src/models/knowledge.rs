//! Knowledge graph entities and the typed relationships between them.

use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CairnError, Result};

/// Kind of a knowledge graph node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Something an agent learned while working on an issue
    Learning,
    /// A named region of the codebase, e.g. `API` or `auth`
    CodeArea,
    /// A single source file
    File,
    /// A reusable approach that applies to a code area
    Pattern,
    /// A mistake that was made and later fixed
    Mistake,
}

impl EntityKind {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Learning => "Learning",
            EntityKind::CodeArea => "CodeArea",
            EntityKind::File => "File",
            EntityKind::Pattern => "Pattern",
            EntityKind::Mistake => "Mistake",
        }
    }

    /// Deterministic identifier for an entity of this kind.
    ///
    /// Learnings and mistakes are keyed by a hash of their text, code areas by
    /// their lowercased name, files by path and patterns by a slug of their
    /// name. Re-deriving the same logical entity therefore yields the same id.
    ///
    /// ```rust
    /// use cairn_core::models::EntityKind;
    ///
    /// assert_eq!(EntityKind::CodeArea.id_for("API"), "area:api");
    /// assert_eq!(EntityKind::Pattern.id_for("Retry with Backoff"), "pattern:retry-with-backoff");
    /// assert!(EntityKind::Learning.id_for("X").starts_with("learning:"));
    /// ```
    pub fn id_for(&self, key: &str) -> String {
        match self {
            EntityKind::Learning => format!("learning:{}", short_hash(key)),
            EntityKind::CodeArea => format!("area:{}", key.trim().to_lowercase()),
            EntityKind::File => format!("file:{}", key.trim()),
            EntityKind::Pattern => format!("pattern:{}", slugify(key)),
            EntityKind::Mistake => format!("mistake:{}", short_hash(key)),
        }
    }
}

impl FromStr for EntityKind {
    type Err = CairnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "Learning" => Ok(EntityKind::Learning),
            "CodeArea" => Ok(EntityKind::CodeArea),
            "File" => Ok(EntityKind::File),
            "Pattern" => Ok(EntityKind::Pattern),
            "Mistake" => Ok(EntityKind::Mistake),
            _ => Err(CairnError::invalid_enum(
                "entity type",
                s,
                &["Learning", "CodeArea", "File", "Pattern", "Mistake"],
            )),
        }
    }
}

/// Type of a directed knowledge graph edge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    About,
    InFile,
    LedTo,
    AppliesTo,
    Supersedes,
}

impl RelationshipType {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::About => "ABOUT",
            RelationshipType::InFile => "IN_FILE",
            RelationshipType::LedTo => "LED_TO",
            RelationshipType::AppliesTo => "APPLIES_TO",
            RelationshipType::Supersedes => "SUPERSEDES",
        }
    }

    /// Whether an edge of this type may connect `from` to `to`.
    pub fn allows(&self, from: EntityKind, to: EntityKind) -> bool {
        use EntityKind::*;

        match self {
            RelationshipType::About => from == Learning && to == CodeArea,
            RelationshipType::InFile => matches!(from, Learning | Mistake) && to == File,
            RelationshipType::LedTo => matches!(from, Pattern | Mistake) && to == Learning,
            RelationshipType::AppliesTo => from == Pattern && to == CodeArea,
            RelationshipType::Supersedes => from == Learning && to == Learning,
        }
    }

    /// Reject endpoint kinds this relationship type does not allow.
    pub fn check(&self, from: EntityKind, to: EntityKind) -> Result<()> {
        if self.allows(from, to) {
            Ok(())
        } else {
            Err(CairnError::InvalidRelationship {
                rel_type: self.as_str().to_string(),
                from_kind: from.as_str().to_string(),
                to_kind: to.as_str().to_string(),
            })
        }
    }
}

impl FromStr for RelationshipType {
    type Err = CairnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "ABOUT" => Ok(RelationshipType::About),
            "IN_FILE" => Ok(RelationshipType::InFile),
            "LED_TO" => Ok(RelationshipType::LedTo),
            "APPLIES_TO" => Ok(RelationshipType::AppliesTo),
            "SUPERSEDES" => Ok(RelationshipType::Supersedes),
            _ => Err(CairnError::invalid_enum(
                "relationship type",
                s,
                &["ABOUT", "IN_FILE", "LED_TO", "APPLIES_TO", "SUPERSEDES"],
            )),
        }
    }
}

/// A stored knowledge graph node.
///
/// Which optional fields are populated depends on `kind`: learnings carry
/// content and usually a code area, files carry a path, mistakes may carry a
/// path and line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeEntity {
    pub id: String,
    pub kind: EntityKind,
    /// Short display name (the code area name, file path, pattern name, or
    /// the first line of a learning)
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_area: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_number: Option<u64>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A stored knowledge graph edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relationship {
    pub from_id: String,
    pub to_id: String,
    pub rel_type: RelationshipType,
    pub created_at: Timestamp,
}

/// Filter dimensions for a learning query. Any populated dimension may match.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeFilter {
    pub code_area: Option<String>,
    pub file_path: Option<String>,
    pub issue_number: Option<u64>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl KnowledgeFilter {
    /// True when no dimension is set.
    pub fn is_empty(&self) -> bool {
        self.code_area.is_none()
            && self.file_path.is_none()
            && self.issue_number.is_none()
            && self.keywords.iter().all(|k| k.trim().is_empty())
    }
}

/// A learning returned by a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredLearning {
    pub learning: KnowledgeEntity,
    /// Cosine similarity in `[-1, 1]`
    pub score: f32,
}

/// Lowercase hex SHA-256 of `text`, truncated to 16 characters.
fn short_hash(text: &str) -> String {
    let digest = Sha256::digest(text.trim().as_bytes());
    digest
        .iter()
        .take(8)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}
