//! Code graph operations for the Store.

use crate::{
    code_graph::{self, IndexOptions, IndexRun},
    deadline::Deadline,
    error::{CairnError, Result},
    models::{CodeEntity, Dependent, PackageSummary, ParseResult},
    params::{FindEntities, ParsePackage, Traversal},
};

use super::Store;

impl Store {
    /// Incrementally re-indexes every package under the project root.
    pub async fn index_project(
        &self,
        options: IndexOptions,
        deadline: Deadline,
    ) -> Result<IndexRun> {
        let root = self.root.clone();
        self.with_database(move |db| code_graph::index_project(db, &root, options, &deadline))
            .await
    }

    /// Parses one package without storing anything.
    pub async fn parse_package(&self, params: &ParsePackage) -> Result<ParseResult> {
        let params = params.clone();
        tokio::task::spawn_blocking(move || code_graph::parse_package(&params))
            .await
            .map_err(CairnError::join_error)?
    }

    pub async fn find_entities(&self, params: &FindEntities) -> Result<Vec<CodeEntity>> {
        let FindEntities {
            pattern,
            kind,
            limit,
        } = params.clone();
        self.with_database(move |db| db.find_code_entities(&pattern, kind, limit))
            .await
    }

    /// Entities that call anything named `name`.
    pub async fn what_calls(&self, name: &str) -> Result<Vec<CodeEntity>> {
        let name = name.to_string();
        self.with_database(move |db| db.what_calls(&name)).await
    }

    /// Transitive callers of `params.target`.
    pub async fn callers(&self, params: &Traversal, deadline: Deadline) -> Result<Vec<Dependent>> {
        let Traversal {
            target,
            max_depth,
            limit,
        } = params.clone();
        self.with_database(move |db| db.callers(&target, max_depth, limit, &deadline))
            .await
    }

    /// Everything that transitively depends on an entity or file.
    pub async fn blast_radius(
        &self,
        params: &Traversal,
        deadline: Deadline,
    ) -> Result<Vec<Dependent>> {
        let Traversal {
            target,
            max_depth,
            limit,
        } = params.clone();
        self.with_database(move |db| db.blast_radius(&target, max_depth, limit, &deadline))
            .await
    }

    /// Files importing `file`.
    pub async fn what_depends_on(&self, file: &str) -> Result<Vec<CodeEntity>> {
        let file = file.to_string();
        self.with_database(move |db| db.what_depends_on(&file)).await
    }

    pub async fn exports(&self, file: &str) -> Result<Vec<CodeEntity>> {
        let file = file.to_string();
        self.with_database(move |db| db.exports(&file)).await
    }

    pub async fn graph_summary(&self) -> Result<Vec<PackageSummary>> {
        self.with_database(|db| db.graph_summary()).await
    }
}
