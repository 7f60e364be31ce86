//! Builder for creating and configuring Store instances.

use std::path::{Path, PathBuf};

use tokio::task;

use super::Store;
use crate::{
    db::{utils::normalize_path, Database},
    error::{CairnError, Result},
    semantic::{EmbedderProvider, SemanticIndex},
};

/// Directory under the project root that holds the database.
pub const DATA_DIR: &str = ".cairn";

/// Database file name inside [`DATA_DIR`].
pub const DATABASE_FILE: &str = "memory.db";

/// Builder for creating and configuring Store instances.
#[derive(Clone, Default)]
pub struct StoreBuilder {
    database_path: Option<PathBuf>,
    root: Option<PathBuf>,
    embedder: Option<EmbedderProvider>,
}

impl StoreBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom database file path.
    ///
    /// If not specified, uses `<root>/.cairn/memory.db`.
    pub fn with_database_path<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        if let Some(path) = path {
            self.database_path = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// Sets the project root. Defaults to the current directory.
    pub fn with_root<P: AsRef<Path>>(mut self, root: Option<P>) -> Self {
        if let Some(root) = root {
            self.root = Some(root.as_ref().to_path_buf());
        }
        self
    }

    /// Supplies the embedding backend used for semantic search. It is not
    /// invoked until the first search or learning write needs it.
    pub fn with_embedder_provider(mut self, provider: Option<EmbedderProvider>) -> Self {
        self.embedder = provider;
        self
    }

    /// Builds the configured store, creating the database file and schema.
    ///
    /// # Errors
    ///
    /// Returns `CairnError::FileSystem` if the database directory cannot be
    /// created, `CairnError::Database` if initialization fails
    pub async fn build(self) -> Result<Store> {
        let root = match self.root {
            Some(root) => absolute(&root)?,
            None => current_dir()?,
        };
        let db_path = match self.database_path {
            Some(path) => absolute(&path)?,
            None => root.join(DATA_DIR).join(DATABASE_FILE),
        };

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CairnError::FileSystem {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let db_path_clone = db_path.clone();
        task::spawn_blocking(move || {
            let _db = Database::new(&db_path_clone)?;
            Ok::<(), CairnError>(())
        })
        .await
        .map_err(CairnError::join_error)??;

        log::debug!("Opened memory database at {}", db_path.display());
        Ok(Store::new(db_path, root, SemanticIndex::new(self.embedder)))
    }
}

fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().map_err(|e| CairnError::FileSystem {
        path: PathBuf::from("."),
        source: e,
    })
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(normalize_path(path))
    } else {
        Ok(normalize_path(&current_dir()?.join(path)))
    }
}
