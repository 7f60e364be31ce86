//! Search keyword extraction from goal titles and branch names.

use std::collections::HashSet;

/// Default cap on extracted keywords.
pub const DEFAULT_MAX_KEYWORDS: usize = 5;

const MIN_KEYWORD_LEN: usize = 3;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "into", "onto", "that", "this", "these", "those", "then",
    "than", "when", "what", "where", "which", "while", "will", "should", "would", "could", "can",
    "are", "was", "were", "been", "being", "have", "has", "had", "not", "but", "all", "any", "our",
    "your", "their", "its", "via", "use", "using", "add", "adds", "added", "make", "update",
    "updates", "new", "get", "set", "fix", "fixes", "fixed", "feat", "feature", "chore", "refactor",
    "docs", "test", "tests", "wip", "issue", "bug", "main", "master", "head", "branch", "task",
];

/// Lowercased keywords from `text`: split on anything that is not a letter
/// or digit, with stop-words, pure numbers and short tokens removed.
/// Duplicates are dropped and the first `max` kept.
pub fn extract_keywords(text: &str, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|token| token.chars().count() >= MIN_KEYWORD_LEN)
        .filter(|token| !token.chars().all(|c| c.is_ascii_digit()))
        .filter(|token| !STOP_WORDS.contains(&token.as_str()))
        .filter(|token| seen.insert(token.clone()))
        .take(max)
        .collect()
}

/// The first run of digits in a branch name, e.g. `42` in `feat/42-login`.
pub fn issue_number_from_branch(branch: &str) -> Option<u64> {
    branch
        .split(|c: char| !c.is_ascii_digit())
        .find(|run| !run.is_empty())
        .and_then(|run| run.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_name_keywords() {
        assert_eq!(
            extract_keywords("feat/123-add-session-context-builder", DEFAULT_MAX_KEYWORDS),
            vec!["session", "context", "builder"]
        );
    }

    #[test]
    fn test_keywords_are_capped_and_deduplicated() {
        let keywords = extract_keywords(
            "Parser parser cache index storage graph query planner",
            DEFAULT_MAX_KEYWORDS,
        );
        assert_eq!(keywords, vec!["parser", "cache", "index", "storage", "graph"]);
    }

    #[test]
    fn test_empty_and_noise_only_input() {
        assert!(extract_keywords("", 5).is_empty());
        assert!(extract_keywords("fix/42 a of to", 5).is_empty());
    }

    #[test]
    fn test_issue_number_from_branch() {
        assert_eq!(issue_number_from_branch("feat/42-login"), Some(42));
        assert_eq!(issue_number_from_branch("issue-7/part-2"), Some(7));
        assert_eq!(issue_number_from_branch("main"), None);
    }
}
