//! Knowledge graph writes and ranked learning queries.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};

use super::utils::{enum_at, json_at, micros_to_timestamp, now_micros, timestamp_at};
use crate::{
    error::{CairnError, DatabaseResultExt, Result},
    models::{EntityKind, KnowledgeEntity, KnowledgeFilter, Relationship, RelationshipType},
    params::{NewLearning, NewMistake, NewPattern},
};

const ENTITY_COLUMNS: &str = "id, entity_type, name, content, code_area, file_path, line_number, issue_number, metadata, created_at, updated_at";
const UPSERT_ENTITY_SQL: &str = "INSERT INTO knowledge_entities (id, entity_type, name, content, code_area, file_path, line_number, issue_number, metadata, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10) ON CONFLICT(id) DO UPDATE SET name = excluded.name, content = COALESCE(excluded.content, content), code_area = COALESCE(excluded.code_area, code_area), file_path = COALESCE(excluded.file_path, file_path), line_number = COALESCE(excluded.line_number, line_number), issue_number = COALESCE(excluded.issue_number, issue_number), metadata = excluded.metadata, updated_at = excluded.updated_at";
const ENSURE_NODE_SQL: &str = "INSERT OR IGNORE INTO knowledge_entities (id, entity_type, name, file_path, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5)";
const SELECT_ENTITY_KIND_SQL: &str = "SELECT entity_type FROM knowledge_entities WHERE id = ?1";
const INSERT_RELATIONSHIP_SQL: &str = "INSERT OR IGNORE INTO knowledge_relationships (from_id, to_id, rel_type, created_at) VALUES (?1, ?2, ?3, ?4)";
const SELECT_RELATIONSHIPS_SQL: &str = "SELECT from_id, to_id, rel_type, created_at FROM knowledge_relationships WHERE from_id = ?1 OR to_id = ?1 ORDER BY id";
const NOT_SUPERSEDED: &str =
    "id NOT IN (SELECT to_id FROM knowledge_relationships WHERE rel_type = 'SUPERSEDES')";

/// Longest name derived from a learning's content.
const NAME_MAX_CHARS: usize = 80;

// Ranks for the query dimensions; higher is more specific.
const RANK_ISSUE: u8 = 4;
const RANK_FILE: u8 = 3;
const RANK_AREA: u8 = 2;
const RANK_KEYWORD: u8 = 1;

impl super::Database {
    pub(crate) fn build_entity_from_row(row: &rusqlite::Row) -> rusqlite::Result<KnowledgeEntity> {
        Ok(KnowledgeEntity {
            id: row.get(0)?,
            kind: enum_at(row, 1)?,
            name: row.get(2)?,
            content: row.get(3)?,
            code_area: row.get(4)?,
            file_path: row.get(5)?,
            line_number: row.get::<_, Option<i64>>(6)?.map(|n| n as u32),
            issue_number: row.get::<_, Option<i64>>(7)?.map(|n| n as u64),
            metadata: json_at(row, 8)?,
            created_at: timestamp_at(row, 9)?,
            updated_at: timestamp_at(row, 10)?,
        })
    }

    /// Stores a batch of learnings in one transaction. Each learning gets its
    /// code area and file nodes created when missing, plus ABOUT and IN_FILE
    /// edges. Storing the same content again updates the existing learning.
    pub fn store_learnings(&mut self, learnings: &[NewLearning]) -> Result<Vec<KnowledgeEntity>> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let mut ids = Vec::with_capacity(learnings.len());
        for learning in learnings {
            let content = learning.content.trim();
            if content.is_empty() {
                return Err(CairnError::invalid_input("content")
                    .with_reason("Learning content cannot be empty"));
            }

            let id = EntityKind::Learning.id_for(content);
            let now = now_micros();
            let metadata = metadata_json(&learning.metadata)?;
            let code_area = non_empty(learning.code_area.as_deref());
            let file_path = non_empty(learning.file_path.as_deref());

            tx.execute(
                UPSERT_ENTITY_SQL,
                params![
                    id,
                    EntityKind::Learning.as_str(),
                    learning_name(content),
                    content,
                    code_area,
                    file_path,
                    learning.line_number.map(i64::from),
                    learning.issue_number.map(|n| n as i64),
                    metadata,
                    now
                ],
            )
            .db_context("Failed to store learning")?;

            if let Some(area) = code_area {
                let area_id = ensure_node(&tx, EntityKind::CodeArea, area)?;
                insert_relationship(&tx, &id, &area_id, RelationshipType::About)?;
            }
            if let Some(path) = file_path {
                let file_id = ensure_node(&tx, EntityKind::File, path)?;
                insert_relationship(&tx, &id, &file_id, RelationshipType::InFile)?;
            }
            ids.push(id);
        }

        tx.commit().db_context("Failed to commit transaction")?;

        log::debug!("Stored {} learning(s)", ids.len());
        ids.iter()
            .map(|id| {
                self.get_entity(id)?
                    .ok_or_else(|| CairnError::EntityNotFound { id: id.clone() })
            })
            .collect()
    }

    /// Stores a pattern with an APPLIES_TO edge to its code area and LED_TO
    /// edges to each referenced learning.
    pub fn store_pattern(&mut self, pattern: &NewPattern) -> Result<KnowledgeEntity> {
        let name = pattern.name.trim();
        if name.is_empty() {
            return Err(
                CairnError::invalid_input("name").with_reason("Pattern name cannot be empty")
            );
        }
        let area = pattern.code_area.trim();
        if area.is_empty() {
            return Err(
                CairnError::invalid_input("code_area").with_reason("Pattern needs a code area")
            );
        }

        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let id = EntityKind::Pattern.id_for(name);
        tx.execute(
            UPSERT_ENTITY_SQL,
            params![
                id,
                EntityKind::Pattern.as_str(),
                name,
                non_empty(pattern.description.as_deref()),
                area,
                Option::<String>::None,
                Option::<i64>::None,
                Option::<i64>::None,
                "{}",
                now_micros()
            ],
        )
        .db_context("Failed to store pattern")?;

        let area_id = ensure_node(&tx, EntityKind::CodeArea, area)?;
        insert_relationship(&tx, &id, &area_id, RelationshipType::AppliesTo)?;
        for learning_id in &pattern.learning_ids {
            insert_relationship(&tx, &id, learning_id, RelationshipType::LedTo)?;
        }

        tx.commit().db_context("Failed to commit transaction")?;

        self.get_entity(&id)?
            .ok_or(CairnError::EntityNotFound { id })
    }

    /// Stores a mistake with an IN_FILE edge when it names a file and a
    /// LED_TO edge to the learning that fixed it.
    pub fn store_mistake(&mut self, mistake: &NewMistake) -> Result<KnowledgeEntity> {
        let description = mistake.description.trim();
        if description.is_empty() {
            return Err(CairnError::invalid_input("description")
                .with_reason("Mistake description cannot be empty"));
        }

        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let id = EntityKind::Mistake.id_for(description);
        let file_path = non_empty(mistake.file_path.as_deref());
        tx.execute(
            UPSERT_ENTITY_SQL,
            params![
                id,
                EntityKind::Mistake.as_str(),
                learning_name(description),
                description,
                Option::<String>::None,
                file_path,
                mistake.line_number.map(i64::from),
                mistake.issue_number.map(|n| n as i64),
                "{}",
                now_micros()
            ],
        )
        .db_context("Failed to store mistake")?;

        if let Some(path) = file_path {
            let file_id = ensure_node(&tx, EntityKind::File, path)?;
            insert_relationship(&tx, &id, &file_id, RelationshipType::InFile)?;
        }
        if let Some(learning_id) = non_empty(mistake.learning_id.as_deref()) {
            insert_relationship(&tx, &id, learning_id, RelationshipType::LedTo)?;
        }

        tx.commit().db_context("Failed to commit transaction")?;

        self.get_entity(&id)?
            .ok_or(CairnError::EntityNotFound { id })
    }

    /// Records that `new_id` replaces `old_id`. The old learning no longer
    /// appears in query results.
    pub fn supersede_learning(&mut self, old_id: &str, new_id: &str) -> Result<Relationship> {
        if old_id == new_id {
            return Err(CairnError::validation("A learning cannot supersede itself"));
        }
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        let relationship = insert_relationship(&tx, new_id, old_id, RelationshipType::Supersedes)?;
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(relationship)
    }

    /// Retrieves any knowledge entity by id.
    pub fn get_entity(&self, id: &str) -> Result<Option<KnowledgeEntity>> {
        let sql = format!("SELECT {ENTITY_COLUMNS} FROM knowledge_entities WHERE id = ?1");
        self.connection
            .query_row(&sql, params![id], Self::build_entity_from_row)
            .optional()
            .db_context("Failed to query knowledge entity")
    }

    /// All edges touching an entity, in either direction.
    pub fn relationships_of(&self, id: &str) -> Result<Vec<Relationship>> {
        let mut stmt = self
            .connection
            .prepare(SELECT_RELATIONSHIPS_SQL)
            .db_context("Failed to prepare query")?;
        let relationships = stmt
            .query_map(params![id], |row| {
                Ok(Relationship {
                    from_id: row.get(0)?,
                    to_id: row.get(1)?,
                    rel_type: enum_at(row, 2)?,
                    created_at: timestamp_at(row, 3)?,
                })
            })
            .db_context("Failed to query relationships")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch relationships")?;
        Ok(relationships)
    }

    /// Counts entities of a kind. Mostly useful for inspection and tests.
    pub fn count_entities(&self, kind: EntityKind) -> Result<usize> {
        self.connection
            .query_row(
                "SELECT COUNT(*) FROM knowledge_entities WHERE entity_type = ?1",
                params![kind.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as usize)
            .db_context("Failed to count knowledge entities")
    }

    /// Returns learnings matching any dimension of `filter`, most specific
    /// match first (issue, then file, then code area, then keyword), ties
    /// broken by most recent update. Superseded learnings are excluded.
    ///
    /// Code area and file nodes named by the filter are created if missing.
    pub fn query_learnings(
        &mut self,
        filter: &KnowledgeFilter,
        limit: usize,
    ) -> Result<Vec<KnowledgeEntity>> {
        let area = non_empty(filter.code_area.as_deref());
        let file = non_empty(filter.file_path.as_deref());

        if area.is_some() || file.is_some() {
            let tx = self
                .connection
                .transaction()
                .db_context("Failed to begin transaction")?;
            if let Some(area) = area {
                ensure_node(&tx, EntityKind::CodeArea, area)?;
            }
            if let Some(file) = file {
                ensure_node(&tx, EntityKind::File, file)?;
            }
            tx.commit().db_context("Failed to commit transaction")?;
        }

        let mut ranked: HashMap<String, (u8, KnowledgeEntity)> = HashMap::new();
        let mut merge = |rank: u8, entities: Vec<KnowledgeEntity>| {
            for entity in entities {
                let slot = ranked
                    .entry(entity.id.clone())
                    .or_insert((rank, entity));
                slot.0 = slot.0.max(rank);
            }
        };

        if let Some(issue) = filter.issue_number {
            merge(
                RANK_ISSUE,
                self.select_learnings("issue_number = ?1", params![issue as i64])?,
            );
        }
        if let Some(file) = file {
            merge(
                RANK_FILE,
                self.select_learnings(
                    "(file_path = ?1 OR id IN (SELECT from_id FROM knowledge_relationships WHERE to_id = ?2 AND rel_type = 'IN_FILE'))",
                    params![file, EntityKind::File.id_for(file)],
                )?,
            );
        }
        if let Some(area) = area {
            merge(
                RANK_AREA,
                self.select_learnings(
                    "(lower(code_area) = lower(?1) OR id IN (SELECT from_id FROM knowledge_relationships WHERE to_id = ?2 AND rel_type = 'ABOUT'))",
                    params![area, EntityKind::CodeArea.id_for(area)],
                )?,
            );
        }
        for keyword in filter.keywords.iter().map(|k| k.trim()).filter(|k| !k.is_empty()) {
            merge(
                RANK_KEYWORD,
                self.select_learnings(
                    "(instr(lower(content), lower(?1)) > 0 OR instr(lower(COALESCE(code_area, '')), lower(?1)) > 0)",
                    params![keyword],
                )?,
            );
        }

        let mut results: Vec<(u8, KnowledgeEntity)> = ranked.into_values().collect();
        results.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| b.1.updated_at.cmp(&a.1.updated_at))
                .then_with(|| a.1.id.cmp(&b.1.id))
        });
        results.truncate(limit);
        Ok(results.into_iter().map(|(_, entity)| entity).collect())
    }

    fn select_learnings(
        &self,
        condition: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<KnowledgeEntity>> {
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM knowledge_entities WHERE entity_type = 'Learning' AND {NOT_SUPERSEDED} AND {condition}"
        );
        let mut stmt = self
            .connection
            .prepare(&sql)
            .db_context("Failed to prepare query")?;
        let entities = stmt
            .query_map(params, Self::build_entity_from_row)
            .db_context("Failed to query learnings")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch learnings")?;
        Ok(entities)
    }
}

/// Creates a code area or file node if it does not exist yet.
fn ensure_node(conn: &Connection, kind: EntityKind, name: &str) -> Result<String> {
    let id = kind.id_for(name);
    let file_path = (kind == EntityKind::File).then_some(name);
    conn.execute(
        ENSURE_NODE_SQL,
        params![id, kind.as_str(), name, file_path, now_micros()],
    )
    .db_context("Failed to create knowledge node")?;
    Ok(id)
}

/// Inserts an edge after checking its endpoints exist and their kinds are an
/// allowed pair for `rel_type`. Duplicate edges are ignored.
fn insert_relationship(
    conn: &Connection,
    from_id: &str,
    to_id: &str,
    rel_type: RelationshipType,
) -> Result<Relationship> {
    let from_kind = entity_kind(conn, from_id)?;
    let to_kind = entity_kind(conn, to_id)?;
    rel_type.check(from_kind, to_kind)?;

    let now = now_micros();
    conn.execute(
        INSERT_RELATIONSHIP_SQL,
        params![from_id, to_id, rel_type.as_str(), now],
    )
    .db_context("Failed to insert relationship")?;

    Ok(Relationship {
        from_id: from_id.to_string(),
        to_id: to_id.to_string(),
        rel_type,
        created_at: micros_to_timestamp(now),
    })
}

fn entity_kind(conn: &Connection, id: &str) -> Result<EntityKind> {
    let raw: Option<String> = conn
        .query_row(SELECT_ENTITY_KIND_SQL, params![id], |row| row.get(0))
        .optional()
        .db_context("Failed to query entity type")?;
    match raw {
        Some(raw) => raw.parse(),
        None => Err(CairnError::EntityNotFound { id: id.to_string() }),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn metadata_json(metadata: &serde_json::Value) -> Result<String> {
    if metadata.is_null() {
        Ok("{}".to_string())
    } else {
        Ok(serde_json::to_string(metadata)?)
    }
}

/// First line of `content`, shortened for display.
fn learning_name(content: &str) -> String {
    let first_line = content.lines().next().unwrap_or(content).trim();
    if first_line.chars().count() <= NAME_MAX_CHARS {
        first_line.to_string()
    } else {
        let mut name: String = first_line.chars().take(NAME_MAX_CHARS - 1).collect();
        name.push('…');
        name
    }
}
