//! Code graph storage and the query surface over it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Transaction};

use super::utils::{enum_at, normalize_path, to_slash_path};
use crate::{
    deadline::Deadline,
    error::{DatabaseResultExt, Result},
    models::{
        CodeEntity, CodeEntityKind, CodeRelationKind, Dependent, FileMeta, PackageSummary,
        ParsedRelationship, RelationTarget, EXTERNAL_PREFIX,
    },
};

const CODE_ENTITY_COLUMNS: &str = "id, package, file_path, name, kind, line_number, exported";
const DELETE_FILE_RELATIONSHIPS_SQL: &str =
    "DELETE FROM code_relationships WHERE package = ?1 AND file_path = ?2";
const DELETE_FILE_ENTITIES_SQL: &str =
    "DELETE FROM code_entities WHERE package = ?1 AND file_path = ?2";
const INSERT_CODE_ENTITY_SQL: &str = "INSERT INTO code_entities (id, package, file_path, name, kind, line_number, exported) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";
const INSERT_CODE_RELATIONSHIP_SQL: &str = "INSERT OR IGNORE INTO code_relationships (package, file_path, from_id, to_id, rel_type) VALUES (?1, ?2, ?3, ?4, ?5)";
const RESOLVE_SYMBOL_SQL: &str = "SELECT id FROM code_entities WHERE kind != 'file' AND (name = ?1 OR substr(name, -length(?1) - 1) = '.' || ?1) ORDER BY (package = ?2 AND file_path = ?3) DESC, (package = ?2) DESC, exported DESC, (name = ?1) DESC, id LIMIT 1";
const FILE_ENTITY_EXISTS_SQL: &str =
    "SELECT EXISTS(SELECT 1 FROM code_entities WHERE id = ?1 AND kind = 'file')";
const SELECT_FILE_ENTITY_NAMES_SQL: &str =
    "SELECT id, name FROM code_entities WHERE package = ?1 AND file_path = ?2 AND kind != 'file'";
const ENTITY_EXISTS_SQL: &str = "SELECT EXISTS(SELECT 1 FROM code_entities WHERE id = ?1)";
const DETACH_INCOMING_SQL: &str = "UPDATE OR IGNORE code_relationships SET to_id = ?1 WHERE to_id = ?2 AND rel_type IN ('calls', 'extends', 'implements')";
const SELECT_EXTERNAL_EDGES_SQL: &str = "SELECT id, package, file_path, to_id FROM code_relationships WHERE to_id LIKE 'ext:%' AND rel_type IN ('calls', 'extends', 'implements')";
const REPOINT_EDGE_SQL: &str = "UPDATE OR IGNORE code_relationships SET to_id = ?1 WHERE id = ?2";
const DELETE_EDGE_SQL: &str = "DELETE FROM code_relationships WHERE id = ?1 AND to_id LIKE 'ext:%'";
const DELETE_DANGLING_SQL: &str = "DELETE FROM code_relationships WHERE from_id NOT IN (SELECT id FROM code_entities) OR (to_id NOT LIKE 'ext:%' AND to_id NOT IN (SELECT id FROM code_entities))";
const DELETE_FILE_META_SQL: &str =
    "DELETE FROM code_file_metadata WHERE package = ?1 AND file_path = ?2";
const UPSERT_FILE_META_SQL: &str = "INSERT INTO code_file_metadata (package, file_path, mtime_ms, content_hash, entity_count) VALUES (?1, ?2, ?3, ?4, ?5) ON CONFLICT(package, file_path) DO UPDATE SET mtime_ms = excluded.mtime_ms, content_hash = excluded.content_hash, entity_count = excluded.entity_count";
const SELECT_FILE_META_SQL: &str = "SELECT package, file_path, mtime_ms, content_hash, entity_count FROM code_file_metadata WHERE package = ?1";

/// Matches a file given as a package-relative path, as `<package>:<path>`, or
/// as a longer path ending in the package-relative one.
const FILE_MATCH: &str = "(file_path = ?1 OR ?1 = package || ':' || file_path OR substr(?1, -length(file_path) - 1) = '/' || file_path)";

/// Extensions tried, in order, when resolving a relative import.
const MODULE_SUFFIXES: &[&str] = &[
    "", ".ts", ".tsx", ".d.ts", ".js", ".jsx", ".mts", ".cts", ".mjs", ".cjs", "/index.ts",
    "/index.tsx", "/index.js", "/index.jsx",
];

/// Everything needed to replace one package's graph data atomically.
#[derive(Debug, Clone, Default)]
pub struct PackageGraphUpdate {
    pub package: String,
    /// Files whose entities and outgoing relationships are replaced
    pub replaced_files: Vec<String>,
    /// Files that no longer exist; their metadata rows are removed
    pub deleted_files: Vec<String>,
    pub entities: Vec<CodeEntity>,
    pub relationships: Vec<ParsedRelationship>,
    /// Metadata rows to write (parsed files and touched-but-unchanged files)
    pub file_meta: Vec<FileMeta>,
}

/// Row counts written by [`super::Database::store_package_graph`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoredCounts {
    pub entities: u32,
    pub relationships: u32,
    pub repointed: u32,
    /// Incoming edges turned back into `ext:` edges after their target went away
    pub detached: u32,
    pub dangling_removed: u32,
}

impl super::Database {
    fn build_code_entity_from_row(row: &rusqlite::Row) -> rusqlite::Result<CodeEntity> {
        Ok(CodeEntity {
            id: row.get(0)?,
            package: row.get(1)?,
            file_path: row.get(2)?,
            name: row.get(3)?,
            kind: enum_at(row, 4)?,
            line_number: row.get::<_, i64>(5)? as u32,
            exported: row.get(6)?,
        })
    }

    /// Replaces a package's graph data for the files in `update` in a single
    /// transaction. Any failure rolls back to the prior graph.
    pub fn store_package_graph(&mut self, update: &PackageGraphUpdate) -> Result<StoredCounts> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        let package = update.package.as_str();

        let mut removed: Vec<(String, String)> = Vec::new();
        for file in update.replaced_files.iter().chain(&update.deleted_files) {
            removed.extend(file_entity_names(&tx, package, file)?);
            tx.execute(DELETE_FILE_RELATIONSHIPS_SQL, params![package, file])
                .db_context("Failed to delete file relationships")?;
            tx.execute(DELETE_FILE_ENTITIES_SQL, params![package, file])
                .db_context("Failed to delete file entities")?;
        }

        let mut counts = StoredCounts::default();
        for entity in &update.entities {
            tx.execute(
                INSERT_CODE_ENTITY_SQL,
                params![
                    entity.id,
                    entity.package,
                    entity.file_path,
                    entity.name,
                    entity.kind.as_str(),
                    i64::from(entity.line_number),
                    entity.exported
                ],
            )
            .db_context("Failed to insert code entity")?;
            counts.entities += 1;
        }

        for relationship in &update.relationships {
            let to_id = resolve_target(&tx, package, relationship)?;
            counts.relationships += tx
                .execute(
                    INSERT_CODE_RELATIONSHIP_SQL,
                    params![
                        package,
                        relationship.file_path,
                        relationship.from_id,
                        to_id,
                        relationship.kind.as_str()
                    ],
                )
                .db_context("Failed to insert code relationship")? as u32;
        }

        counts.detached = detach_incoming_edges(&tx, &removed)?;

        let new_names: HashSet<&str> = update
            .entities
            .iter()
            .filter(|e| e.kind != CodeEntityKind::File)
            .flat_map(|e| [e.name.as_str(), e.short_name()])
            .collect();
        if !new_names.is_empty() {
            counts.repointed = repoint_external_edges(&tx, &new_names)?;
        }

        counts.dangling_removed = tx
            .execute(DELETE_DANGLING_SQL, [])
            .db_context("Failed to remove dangling relationships")? as u32;

        for file in &update.deleted_files {
            tx.execute(DELETE_FILE_META_SQL, params![package, file])
                .db_context("Failed to delete file metadata")?;
        }
        for meta in &update.file_meta {
            tx.execute(
                UPSERT_FILE_META_SQL,
                params![
                    meta.package,
                    meta.file_path,
                    meta.mtime_ms,
                    meta.content_hash,
                    i64::from(meta.entity_count)
                ],
            )
            .db_context("Failed to store file metadata")?;
        }

        tx.commit().db_context("Failed to commit transaction")?;

        log::debug!(
            "Stored package {package}: {} entities, {} relationships, {} re-pointed, {} detached, \
             {} dangling removed",
            counts.entities,
            counts.relationships,
            counts.repointed,
            counts.detached,
            counts.dangling_removed
        );
        Ok(counts)
    }

    /// Removes every code graph row so the next index run starts from scratch.
    pub fn reset_code_graph(&mut self) -> Result<()> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        tx.execute_batch(
            "DELETE FROM code_relationships; DELETE FROM code_entities; DELETE FROM code_file_metadata;",
        )
        .db_context("Failed to reset code graph")?;
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(())
    }

    /// Stored per-file metadata for a package, keyed by relative path.
    pub fn file_metadata(&self, package: &str) -> Result<HashMap<String, FileMeta>> {
        let mut stmt = self
            .connection
            .prepare(SELECT_FILE_META_SQL)
            .db_context("Failed to prepare query")?;
        let rows = stmt
            .query_map(params![package], |row| {
                Ok(FileMeta {
                    package: row.get(0)?,
                    file_path: row.get(1)?,
                    mtime_ms: row.get(2)?,
                    content_hash: row.get(3)?,
                    entity_count: row.get::<_, i64>(4)? as u32,
                })
            })
            .db_context("Failed to query file metadata")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch file metadata")?;
        Ok(rows
            .into_iter()
            .map(|meta| (meta.file_path.clone(), meta))
            .collect())
    }

    /// Names of every package with indexed files.
    pub fn indexed_packages(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .connection
            .prepare("SELECT DISTINCT package FROM code_file_metadata ORDER BY package")
            .db_context("Failed to prepare query")?;
        let packages = stmt
            .query_map([], |row| row.get(0))
            .db_context("Failed to query packages")?
            .collect::<std::result::Result<Vec<String>, _>>()
            .db_context("Failed to fetch packages")?;
        Ok(packages)
    }

    /// Retrieves a code entity by id.
    pub fn code_entity(&self, id: &str) -> Result<Option<CodeEntity>> {
        let sql = format!("SELECT {CODE_ENTITY_COLUMNS} FROM code_entities WHERE id = ?1");
        self.connection
            .query_row(&sql, params![id], Self::build_code_entity_from_row)
            .optional()
            .db_context("Failed to query code entity")
    }

    /// Entities whose name contains `pattern` (case-insensitive): exact
    /// matches first, then prefix matches, then other substrings.
    pub fn find_code_entities(
        &self,
        pattern: &str,
        kind: Option<CodeEntityKind>,
        limit: usize,
    ) -> Result<Vec<CodeEntity>> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {CODE_ENTITY_COLUMNS} FROM code_entities \
             WHERE instr(lower(name), lower(?1)) > 0 AND (?2 IS NULL OR kind = ?2) \
             ORDER BY CASE \
                 WHEN lower(name) = lower(?1) OR lower(substr(name, -length(?1) - 1)) = '.' || lower(?1) THEN 0 \
                 WHEN instr(lower(name), lower(?1)) = 1 THEN 1 \
                 ELSE 2 END, \
             length(name), name, id LIMIT ?3"
        );
        let mut stmt = self
            .connection
            .prepare(&sql)
            .db_context("Failed to prepare query")?;
        let entities = stmt
            .query_map(
                params![pattern, kind.map(|k| k.as_str()), limit as i64],
                Self::build_code_entity_from_row,
            )
            .db_context("Failed to query code entities")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch code entities")?;
        Ok(entities)
    }

    /// Entities with a direct `calls` edge to anything named `name`.
    pub fn what_calls(&self, name: &str) -> Result<Vec<CodeEntity>> {
        let targets = self.symbol_targets(name)?;
        let callers = self.incoming(&targets, &[CodeRelationKind::Calls])?;
        let mut entities = self.entities_by_ids(&callers.into_iter().collect::<Vec<_>>())?;
        sort_entities(&mut entities);
        Ok(entities)
    }

    /// Transitive callers of `name` over `calls` edges only, up to `max_depth`.
    pub fn callers(
        &self,
        name: &str,
        max_depth: u32,
        limit: usize,
        deadline: &Deadline,
    ) -> Result<Vec<Dependent>> {
        let start = self.symbol_targets(name)?;
        self.reverse_reach(start, &[CodeRelationKind::Calls], max_depth, limit, deadline)
    }

    /// Everything that transitively depends on an entity or file through
    /// `calls` and `imports` edges, up to `max_depth` levels.
    ///
    /// `target` may be an entity id, a file path, or an entity name.
    pub fn blast_radius(
        &self,
        target: &str,
        max_depth: u32,
        limit: usize,
        deadline: &Deadline,
    ) -> Result<Vec<Dependent>> {
        let start = if self.code_entity(target)?.is_some() {
            vec![target.to_string()]
        } else {
            let in_file = self.entities_in_file(target)?;
            if in_file.is_empty() {
                self.symbol_targets(target)?
            } else {
                in_file.into_iter().map(|e| e.id).collect()
            }
        };
        self.reverse_reach(
            start,
            &[CodeRelationKind::Calls, CodeRelationKind::Imports],
            max_depth,
            limit,
            deadline,
        )
    }

    /// Files that import the given file.
    pub fn what_depends_on(&self, file: &str) -> Result<Vec<CodeEntity>> {
        let targets: Vec<String> = self
            .entities_in_file(file)?
            .into_iter()
            .filter(|e| e.kind == CodeEntityKind::File)
            .map(|e| e.id)
            .collect();
        let importers = self.incoming(&targets, &[CodeRelationKind::Imports])?;
        let mut entities = self.entities_by_ids(&importers.into_iter().collect::<Vec<_>>())?;
        sort_entities(&mut entities);
        Ok(entities)
    }

    /// Entities a file exports, in declaration order.
    pub fn exports(&self, file: &str) -> Result<Vec<CodeEntity>> {
        let mut entities: Vec<CodeEntity> = self
            .entities_in_file(file)?
            .into_iter()
            .filter(|e| e.exported && e.kind != CodeEntityKind::File)
            .collect();
        sort_entities(&mut entities);
        Ok(entities)
    }

    /// Per-package file, entity and relationship counts.
    pub fn graph_summary(&self) -> Result<Vec<PackageSummary>> {
        let sql = "SELECT p.package, \
                   (SELECT COUNT(*) FROM code_file_metadata m WHERE m.package = p.package), \
                   (SELECT COUNT(*) FROM code_entities e WHERE e.package = p.package), \
                   (SELECT COUNT(*) FROM code_relationships r WHERE r.package = p.package) \
                   FROM (SELECT package FROM code_file_metadata UNION SELECT package FROM code_entities) p \
                   ORDER BY p.package";
        let mut stmt = self
            .connection
            .prepare(sql)
            .db_context("Failed to prepare query")?;
        let summaries = stmt
            .query_map([], |row| {
                Ok(PackageSummary {
                    package: row.get(0)?,
                    files: row.get::<_, i64>(1)? as u32,
                    entities: row.get::<_, i64>(2)? as u32,
                    relationships: row.get::<_, i64>(3)? as u32,
                })
            })
            .db_context("Failed to query graph summary")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch graph summary")?;
        Ok(summaries)
    }

    /// Number of stored relationships with the given `(from, to, kind)`.
    pub fn count_code_relationships(
        &self,
        from_id: &str,
        to_id: &str,
        kind: CodeRelationKind,
    ) -> Result<usize> {
        self.connection
            .query_row(
                "SELECT COUNT(*) FROM code_relationships WHERE from_id = ?1 AND to_id = ?2 AND rel_type = ?3",
                params![from_id, to_id, kind.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as usize)
            .db_context("Failed to count code relationships")
    }

    fn entities_in_file(&self, file: &str) -> Result<Vec<CodeEntity>> {
        let sql = format!(
            "SELECT {CODE_ENTITY_COLUMNS} FROM code_entities WHERE {FILE_MATCH} ORDER BY line_number, id"
        );
        let mut stmt = self
            .connection
            .prepare(&sql)
            .db_context("Failed to prepare query")?;
        let entities = stmt
            .query_map(params![file.trim()], Self::build_code_entity_from_row)
            .db_context("Failed to query file entities")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch file entities")?;
        Ok(entities)
    }

    /// Ids of entities named `name` (or methods with that short name), plus
    /// the unresolved `ext:` form of the name.
    fn symbol_targets(&self, name: &str) -> Result<Vec<String>> {
        let name = name.trim();
        let mut stmt = self
            .connection
            .prepare(
                "SELECT id FROM code_entities WHERE kind != 'file' AND (name = ?1 OR substr(name, -length(?1) - 1) = '.' || ?1)",
            )
            .db_context("Failed to prepare query")?;
        let mut ids = stmt
            .query_map(params![name], |row| row.get::<_, String>(0))
            .db_context("Failed to query symbol")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch symbol")?;
        ids.push(format!("{EXTERNAL_PREFIX}{name}"));
        Ok(ids)
    }

    /// Source ids of edges of the given kinds pointing at any of `targets`.
    fn incoming(&self, targets: &[String], kinds: &[CodeRelationKind]) -> Result<HashSet<String>> {
        let mut stmt = self
            .connection
            .prepare("SELECT from_id, rel_type FROM code_relationships WHERE to_id = ?1")
            .db_context("Failed to prepare query")?;
        let mut sources = HashSet::new();
        for target in targets {
            let rows = stmt
                .query_map(params![target], |row| {
                    Ok((row.get::<_, String>(0)?, enum_at::<CodeRelationKind>(row, 1)?))
                })
                .db_context("Failed to query incoming relationships")?;
            for row in rows {
                let (from_id, kind) = row.db_context("Failed to fetch incoming relationship")?;
                if kinds.contains(&kind) {
                    sources.insert(from_id);
                }
            }
        }
        Ok(sources)
    }

    fn entities_by_ids(&self, ids: &[String]) -> Result<Vec<CodeEntity>> {
        let mut entities = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entity) = self.code_entity(id)? {
                entities.push(entity);
            }
        }
        Ok(entities)
    }

    /// Breadth-first reverse traversal from `start`. Each entity is reported
    /// once, at the depth it was first reached.
    fn reverse_reach(
        &self,
        start: Vec<String>,
        kinds: &[CodeRelationKind],
        max_depth: u32,
        limit: usize,
        deadline: &Deadline,
    ) -> Result<Vec<Dependent>> {
        let mut seen: HashSet<String> = start.iter().cloned().collect();
        let mut queue: VecDeque<(String, u32)> = start.into_iter().map(|id| (id, 0)).collect();
        let mut results = Vec::new();

        while let Some((id, depth)) = queue.pop_front() {
            deadline.check("graph traversal")?;
            if depth >= max_depth {
                continue;
            }
            let mut sources: Vec<String> = self
                .incoming(std::slice::from_ref(&id), kinds)?
                .into_iter()
                .collect();
            sources.sort();
            for source in sources {
                if !seen.insert(source.clone()) {
                    continue;
                }
                if let Some(entity) = self.code_entity(&source)? {
                    results.push(Dependent {
                        entity,
                        depth: depth + 1,
                    });
                    if results.len() >= limit {
                        return Ok(results);
                    }
                }
                queue.push_back((source, depth + 1));
            }
        }

        Ok(results)
    }
}

/// Resolves a parsed relationship target to a stored id, or `ext:<symbol>`.
///
/// Symbols resolve to the same file first, then the same package (exported
/// first), then any package. Relative module specifiers resolve to a file
/// entity in the same package.
fn resolve_target(
    tx: &Transaction<'_>,
    package: &str,
    relationship: &ParsedRelationship,
) -> Result<String> {
    match &relationship.target {
        RelationTarget::Entity(id) => Ok(id.clone()),
        RelationTarget::Symbol(name) => {
            let resolved = resolve_symbol(tx, package, &relationship.file_path, name)?;
            Ok(resolved.unwrap_or_else(|| format!("{EXTERNAL_PREFIX}{name}")))
        }
        RelationTarget::Module(specifier) => {
            resolve_module(tx, package, &relationship.file_path, specifier)
        }
    }
}

fn resolve_symbol(
    conn: &Connection,
    package: &str,
    file_path: &str,
    name: &str,
) -> Result<Option<String>> {
    conn.query_row(
        RESOLVE_SYMBOL_SQL,
        params![name, package, file_path],
        |row| row.get(0),
    )
    .optional()
    .db_context("Failed to resolve symbol")
}

fn resolve_module(
    conn: &Connection,
    package: &str,
    file_path: &str,
    specifier: &str,
) -> Result<String> {
    if !specifier.starts_with('.') {
        return Ok(format!("{EXTERNAL_PREFIX}{specifier}"));
    }

    let dir = Path::new(file_path).parent().unwrap_or_else(|| Path::new(""));
    let base = to_slash_path(&normalize_path(&dir.join(specifier)));
    // ESM-style TypeScript imports name the emitted `.js` file.
    let stripped = [".js", ".jsx", ".mjs", ".cjs"]
        .iter()
        .find_map(|ext| base.strip_suffix(ext))
        .map(String::from);

    for stem in std::iter::once(base.clone()).chain(stripped) {
        for suffix in MODULE_SUFFIXES {
            let candidate = format!("{stem}{suffix}");
            let id = CodeEntity::file_id(package, &candidate);
            let exists: bool = conn
                .query_row(FILE_ENTITY_EXISTS_SQL, params![id], |row| row.get(0))
                .db_context("Failed to resolve module")?;
            if exists {
                return Ok(id);
            }
        }
    }
    Ok(format!("{EXTERNAL_PREFIX}{specifier}"))
}

fn file_entity_names(
    conn: &Connection,
    package: &str,
    file_path: &str,
) -> Result<Vec<(String, String)>> {
    let mut stmt = conn
        .prepare(SELECT_FILE_ENTITY_NAMES_SQL)
        .db_context("Failed to prepare query")?;
    let rows = stmt
        .query_map(params![package, file_path], |row| Ok((row.get(0)?, row.get(1)?)))
        .db_context("Failed to query file entities")?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .db_context("Failed to fetch file entities")
}

/// Turns `calls`/`extends`/`implements` edges aimed at removed entities back
/// into `ext:<short name>` edges, so callers in untouched files reconnect once
/// the symbol is defined again. Rows that would collide are left for the
/// dangling sweep.
fn detach_incoming_edges(conn: &Connection, removed: &[(String, String)]) -> Result<u32> {
    let mut detached = 0;
    for (id, name) in removed {
        let exists: bool = conn
            .query_row(ENTITY_EXISTS_SQL, params![id], |row| row.get(0))
            .db_context("Failed to check code entity")?;
        if exists {
            continue;
        }
        let short_name = name.rsplit('.').next().unwrap_or(name);
        detached += conn
            .execute(
                DETACH_INCOMING_SQL,
                params![format!("{EXTERNAL_PREFIX}{short_name}"), id],
            )
            .db_context("Failed to detach relationship")? as u32;
    }
    Ok(detached)
}

/// Points `ext:` edges in any package at entities that now exist.
fn repoint_external_edges(conn: &Connection, new_names: &HashSet<&str>) -> Result<u32> {
    let candidates: Vec<(i64, String, String, String)> = {
        let mut stmt = conn
            .prepare(SELECT_EXTERNAL_EDGES_SQL)
            .db_context("Failed to prepare query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })
            .db_context("Failed to query external relationships")?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch external relationships")?
    };

    let mut repointed = 0;
    for (edge_id, package, file_path, to_id) in candidates {
        let symbol = &to_id[EXTERNAL_PREFIX.len()..];
        if !new_names.contains(symbol) {
            continue;
        }
        let Some(resolved) = resolve_symbol(conn, &package, &file_path, symbol)? else {
            continue;
        };
        let updated = conn
            .execute(REPOINT_EDGE_SQL, params![resolved, edge_id])
            .db_context("Failed to re-point relationship")?;
        if updated == 0 {
            // The resolved edge already exists; drop the unresolved duplicate.
            conn.execute(DELETE_EDGE_SQL, params![edge_id])
                .db_context("Failed to remove duplicate relationship")?;
        }
        repointed += 1;
    }
    Ok(repointed)
}

fn sort_entities(entities: &mut [CodeEntity]) {
    entities.sort_by(|a, b| {
        (a.package.as_str(), a.file_path.as_str(), a.line_number, a.id.as_str()).cmp(&(
            b.package.as_str(),
            b.file_path.as_str(),
            b.line_number,
            b.id.as_str(),
        ))
    });
}
