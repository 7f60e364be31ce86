//! Optional semantic index over learnings.
//!
//! The embedding backend is supplied as a provider closure and resolved on
//! first use. Resolution happens once per [`SemanticIndex`]; a failure is
//! cached and logged a single time, after which every call reports
//! [`CairnError::EmbedderUnavailable`] so callers can fall back to keyword
//! queries.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, OnceLock,
};

pub mod embedder;
pub mod vector;

pub use embedder::{Embedder, HashingEmbedder};

use crate::{
    db::Database,
    error::{CairnError, Result},
    models::{KnowledgeEntity, ScoredLearning},
};

/// Learnings embedded on demand per search, for stores that predate the
/// backend.
const BACKFILL_LIMIT: usize = 64;

/// Lazily builds the embedding backend.
pub type EmbedderProvider = Arc<dyn Fn() -> Result<Arc<dyn Embedder>> + Send + Sync>;

/// Embedding storage and similarity search for learnings.
pub struct SemanticIndex {
    provider: Option<EmbedderProvider>,
    embedder: OnceLock<std::result::Result<Arc<dyn Embedder>, String>>,
    warned: AtomicBool,
}

impl SemanticIndex {
    pub fn new(provider: Option<EmbedderProvider>) -> Self {
        Self {
            provider,
            embedder: OnceLock::new(),
            warned: AtomicBool::new(false),
        }
    }

    /// An index with no backend; every search reports the embedder missing.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// The resolved backend, initializing it on first call.
    pub fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        let Some(provider) = &self.provider else {
            return Err(CairnError::EmbedderUnavailable {
                reason: "no embedding backend configured".to_string(),
            });
        };

        let resolved = self
            .embedder
            .get_or_init(|| provider().map_err(|e| e.to_string()));

        match resolved {
            Ok(embedder) => Ok(Arc::clone(embedder)),
            Err(reason) => {
                self.warn_once(reason);
                Err(CairnError::EmbedderUnavailable {
                    reason: reason.clone(),
                })
            }
        }
    }

    fn warn_once(&self, reason: &str) {
        if !self.warned.swap(true, Ordering::Relaxed) {
            log::warn!("Semantic search disabled: {reason}");
        }
    }

    /// Embeds and stores the given learnings. Failures are logged once and
    /// never surface to the caller.
    pub fn embed_learnings(&self, db: &Database, learnings: &[KnowledgeEntity]) {
        if !self.is_configured() || learnings.is_empty() {
            return;
        }
        let embedder = match self.embedder() {
            Ok(embedder) => embedder,
            Err(_) => return,
        };
        for learning in learnings {
            if let Err(e) = embed_one(embedder.as_ref(), db, learning) {
                self.warn_once(&format!("failed to embed learning {}: {e}", learning.id));
            }
        }
    }

    /// Learnings whose embedding has cosine similarity of at least
    /// `threshold` with `text`, best first.
    pub fn search(
        &self,
        db: &Database,
        text: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredLearning>> {
        let embedder = self.embedder()?;

        let missing = db.learnings_missing_embedding(embedder.model(), BACKFILL_LIMIT)?;
        if !missing.is_empty() {
            log::debug!("Backfilling {} learning embedding(s)", missing.len());
            for learning in &missing {
                embed_one(embedder.as_ref(), db, learning)?;
            }
        }

        let query = embedder.embed(text)?;
        let mut scored: Vec<ScoredLearning> = db
            .learning_embeddings(embedder.model(), embedder.dimensions())?
            .into_iter()
            .map(|(learning, vector)| ScoredLearning {
                score: vector::cosine_similarity(&query, &vector),
                learning,
            })
            .filter(|scored| scored.score >= threshold)
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.learning.updated_at.cmp(&a.learning.updated_at))
        });
        scored.truncate(limit);
        Ok(scored)
    }
}

impl Default for SemanticIndex {
    fn default() -> Self {
        Self::disabled()
    }
}

fn embed_one(embedder: &dyn Embedder, db: &Database, learning: &KnowledgeEntity) -> Result<()> {
    let text = learning.content.as_deref().unwrap_or(&learning.name);
    let vector = embedder.embed(text)?;
    if vector.len() != embedder.dimensions() {
        return Err(CairnError::validation(format!(
            "embedder {} returned {} dimensions, expected {}",
            embedder.model(),
            vector.len(),
            embedder.dimensions()
        )));
    }
    db.upsert_embedding(&learning.id, embedder.model(), &vector)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn test_disabled_index_reports_unavailable() {
        let index = SemanticIndex::disabled();
        assert!(matches!(
            index.embedder(),
            Err(CairnError::EmbedderUnavailable { .. })
        ));
    }

    #[test]
    fn test_provider_runs_once_even_when_failing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let provider: EmbedderProvider = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(CairnError::Configuration {
                message: "model files missing".to_string(),
            })
        });
        let index = SemanticIndex::new(Some(provider));

        for _ in 0..3 {
            let err = index.embedder().err().unwrap();
            assert!(err.to_string().contains("model files missing"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
