//! Knowledge graph operations for the Store.

use std::sync::Arc;

use super::Store;
use crate::{
    error::{CairnError, Result},
    models::{KnowledgeEntity, KnowledgeFilter, Relationship, ScoredLearning},
    params::{NewLearning, NewMistake, NewPattern, SearchSimilar, Supersede},
};

impl Store {
    /// Stores a batch of learnings in one transaction, creating their code
    /// area and file nodes. New learnings are embedded when a semantic
    /// backend is configured; embedding failures never fail the write.
    pub async fn store_learnings(&self, learnings: &[NewLearning]) -> Result<Vec<KnowledgeEntity>> {
        let learnings = learnings.to_vec();
        let semantic = Arc::clone(&self.semantic);

        self.with_database(move |db| {
            let stored = db.store_learnings(&learnings)?;
            semantic.embed_learnings(db, &stored);
            Ok(stored)
        })
        .await
    }

    pub async fn store_pattern(&self, pattern: &NewPattern) -> Result<KnowledgeEntity> {
        let pattern = pattern.clone();
        self.with_database(move |db| db.store_pattern(&pattern)).await
    }

    pub async fn store_mistake(&self, mistake: &NewMistake) -> Result<KnowledgeEntity> {
        let mistake = mistake.clone();
        self.with_database(move |db| db.store_mistake(&mistake)).await
    }

    /// Marks `old_id` as replaced by `new_id`; the old learning stops
    /// appearing in queries.
    pub async fn supersede_learning(&self, params: &Supersede) -> Result<Relationship> {
        let Supersede { old_id, new_id } = params.clone();
        self.with_database(move |db| db.supersede_learning(&old_id, &new_id))
            .await
    }

    /// Ranked learnings matching any dimension of `filter`.
    pub async fn query_learnings(
        &self,
        filter: &KnowledgeFilter,
        limit: usize,
    ) -> Result<Vec<KnowledgeEntity>> {
        let filter = filter.clone();
        self.with_database(move |db| db.query_learnings(&filter, limit))
            .await
    }

    /// Learnings semantically similar to `params.text`.
    ///
    /// # Errors
    ///
    /// Returns `CairnError::EmbedderUnavailable` when no backend is
    /// configured or it failed to start; callers fall back to
    /// [`Store::query_learnings`].
    pub async fn search_similar(&self, params: &SearchSimilar) -> Result<Vec<ScoredLearning>> {
        if !self.semantic.is_configured() {
            return Err(CairnError::EmbedderUnavailable {
                reason: "no embedding backend configured".to_string(),
            });
        }
        let SearchSimilar {
            text,
            limit,
            threshold,
        } = params.clone();
        let semantic = Arc::clone(&self.semantic);

        self.with_database(move |db| semantic.search(db, &text, limit, threshold))
            .await
    }

    pub async fn get_entity(&self, id: &str) -> Result<Option<KnowledgeEntity>> {
        let id = id.to_string();
        self.with_database(move |db| db.get_entity(&id)).await
    }

    /// Edges touching an entity in either direction.
    pub async fn relationships_of(&self, id: &str) -> Result<Vec<Relationship>> {
        let id = id.to_string();
        self.with_database(move |db| db.relationships_of(&id)).await
    }
}
