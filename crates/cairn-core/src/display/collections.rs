//! Collection wrapper types for displaying groups of domain objects.
//!
//! Each wrapper formats its items with their own `Display` impl and prints a
//! short notice for an empty collection.

use std::fmt;

use crate::models::{
    CodeEntity, Dependent, KnowledgeEntity, PackageSummary, Relationship, ScoredLearning, Workflow,
};

macro_rules! collection {
    ($(#[$doc:meta])* $name:ident, $item:ty, $empty:literal) => {
        $(#[$doc])*
        pub struct $name(pub Vec<$item>);

        impl $name {
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            pub fn len(&self) -> usize {
                self.0.len()
            }

            pub fn iter(&self) -> std::slice::Iter<'_, $item> {
                self.0.iter()
            }
        }

        impl From<Vec<$item>> for $name {
            fn from(items: Vec<$item>) -> Self {
                Self(items)
            }
        }

        impl<'a> IntoIterator for &'a $name {
            type Item = &'a $item;
            type IntoIter = std::slice::Iter<'a, $item>;

            fn into_iter(self) -> Self::IntoIter {
                self.0.iter()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.0.is_empty() {
                    return writeln!(f, $empty);
                }
                for item in &self.0 {
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    };
}

collection!(
    /// Workflows, each rendered in full.
    Workflows,
    Workflow,
    "No workflows found."
);

collection!(
    /// Learnings from a knowledge query.
    Learnings,
    KnowledgeEntity,
    "No learnings found."
);

collection!(
    /// Learnings from a similarity search, best first.
    ScoredLearnings,
    ScoredLearning,
    "No similar learnings found."
);

collection!(
    /// Knowledge graph edges.
    Relationships,
    Relationship,
    "No relationships."
);

collection!(
    /// Code entities as a bullet list.
    CodeEntities,
    CodeEntity,
    "No matching entities."
);

collection!(
    /// Traversal results, indented by depth.
    Dependents,
    Dependent,
    "Nothing depends on this."
);

/// Per-package counts rendered as a markdown table with a totals row.
pub struct GraphSummary(pub Vec<PackageSummary>);

impl fmt::Display for GraphSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "The code graph is empty. Run `cairn graph parse` first.");
        }
        writeln!(f, "| Package | Files | Entities | Relationships |")?;
        writeln!(f, "|---|---|---|---|")?;
        for summary in &self.0 {
            write!(f, "{summary}")?;
        }
        let (files, entities, relationships) = self.0.iter().fold((0, 0, 0), |acc, s| {
            (acc.0 + s.files, acc.1 + s.entities, acc.2 + s.relationships)
        });
        writeln!(f, "| **Total** | {files} | {entities} | {relationships} |")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_collections() {
        assert_eq!(Workflows(vec![]).to_string(), "No workflows found.\n");
        assert_eq!(CodeEntities(vec![]).to_string(), "No matching entities.\n");
    }

    #[test]
    fn test_graph_summary_totals() {
        let summary = GraphSummary(vec![
            PackageSummary {
                package: "a".to_string(),
                files: 2,
                entities: 10,
                relationships: 7,
            },
            PackageSummary {
                package: "b".to_string(),
                files: 1,
                entities: 3,
                relationships: 1,
            },
        ]);
        assert!(summary.to_string().contains("| **Total** | 3 | 13 | 8 |"));
    }

    #[test]
    fn test_code_entities_render_each_item() {
        let entities = CodeEntities(vec![CodeEntity::new(
            "app",
            "src/a.ts",
            "foo",
            crate::models::CodeEntityKind::Function,
            4,
        )]);
        assert_eq!(entities.to_string(), "- function **foo** `app:src/a.ts:4`\n");
    }
}
