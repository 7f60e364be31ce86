//! Storage for learning embeddings.

use rusqlite::params;

use super::utils::now_micros;
use crate::{
    error::{DatabaseResultExt, Result},
    models::KnowledgeEntity,
    semantic::vector::{blob_to_f32_vec, f32_slice_to_blob},
};

const UPSERT_EMBEDDING_SQL: &str = "INSERT INTO learning_embeddings (entity_id, model, dimensions, embedding, updated_at) VALUES (?1, ?2, ?3, ?4, ?5) ON CONFLICT(entity_id) DO UPDATE SET model = excluded.model, dimensions = excluded.dimensions, embedding = excluded.embedding, updated_at = excluded.updated_at";

impl super::Database {
    /// Stores or replaces the embedding of a learning.
    pub fn upsert_embedding(&self, entity_id: &str, model: &str, vector: &[f32]) -> Result<()> {
        self.connection
            .execute(
                UPSERT_EMBEDDING_SQL,
                params![
                    entity_id,
                    model,
                    vector.len() as i64,
                    f32_slice_to_blob(vector),
                    now_micros()
                ],
            )
            .db_context("Failed to store embedding")?;
        Ok(())
    }

    /// Learnings with an embedding from `model` at `dimensions`, excluding
    /// superseded ones. Vectors from other models are ignored.
    pub fn learning_embeddings(
        &self,
        model: &str,
        dimensions: usize,
    ) -> Result<Vec<(KnowledgeEntity, Vec<f32>)>> {
        let sql = "SELECT e.id, e.entity_type, e.name, e.content, e.code_area, e.file_path, e.line_number, e.issue_number, e.metadata, e.created_at, e.updated_at, v.embedding \
                   FROM learning_embeddings v JOIN knowledge_entities e ON e.id = v.entity_id \
                   WHERE e.entity_type = 'Learning' AND v.model = ?1 AND v.dimensions = ?2 \
                   AND e.id NOT IN (SELECT to_id FROM knowledge_relationships WHERE rel_type = 'SUPERSEDES')";
        let mut stmt = self
            .connection
            .prepare(sql)
            .db_context("Failed to prepare query")?;
        let rows = stmt
            .query_map(params![model, dimensions as i64], |row| {
                let entity = Self::build_entity_from_row(row)?;
                let blob: Vec<u8> = row.get(11)?;
                Ok((entity, blob_to_f32_vec(&blob)))
            })
            .db_context("Failed to query embeddings")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch embeddings")?;
        Ok(rows)
    }

    /// Learnings that have no embedding from `model` yet, newest first.
    pub fn learnings_missing_embedding(
        &self,
        model: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeEntity>> {
        let sql = "SELECT id, entity_type, name, content, code_area, file_path, line_number, issue_number, metadata, created_at, updated_at \
                   FROM knowledge_entities WHERE entity_type = 'Learning' \
                   AND id NOT IN (SELECT entity_id FROM learning_embeddings WHERE model = ?1) \
                   ORDER BY updated_at DESC LIMIT ?2";
        let mut stmt = self
            .connection
            .prepare(sql)
            .db_context("Failed to prepare query")?;
        let rows = stmt
            .query_map(params![model, limit as i64], Self::build_entity_from_row)
            .db_context("Failed to query learnings without embeddings")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch learnings without embeddings")?;
        Ok(rows)
    }
}
