//! Conventional-commit message synthesis for the merge primitive.
//!
//! Deterministic and offline: the commit type and scope are inferred from
//! the task title alone, never from an agent call, so a merge never blocks
//! on an extra round trip.

use crate::constants::{COMMIT_SCOPE_STOPWORDS, COMMIT_TYPE_KEYWORDS, DEFAULT_COMMIT_TYPE};
use crate::models::TaskId;

fn infer_commit_type(title: &str) -> &'static str {
    let lower = title.to_lowercase();
    for (commit_type, keywords) in COMMIT_TYPE_KEYWORDS {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            return commit_type;
        }
    }
    DEFAULT_COMMIT_TYPE
}

fn infer_scope(title: &str) -> Option<String> {
    let second_word = title.split_whitespace().nth(1)?.to_lowercase();
    let cleaned: String = second_word.chars().filter(|c| c.is_alphanumeric()).collect();

    if cleaned.len() > 2 && !COMMIT_SCOPE_STOPWORDS.contains(&cleaned.as_str()) {
        Some(cleaned)
    } else {
        None
    }
}

/// Builds a conventional-commit message: `<type>(<scope>)?: <title>` header
/// followed by a body line per commit (stripping the short-hash prefix
/// `git log --oneline` produces).
pub fn generate_semantic_commit_message(_task_id: TaskId, title: &str, commits: &[String]) -> String {
    let commit_type = infer_commit_type(title);
    let header = match infer_scope(title) {
        Some(scope) => format!("{commit_type}({scope}): {title}"),
        None => format!("{commit_type}: {title}"),
    };

    if commits.is_empty() {
        return header;
    }

    let body = commits
        .iter()
        .map(|line| {
            let subject = line.split_once(' ').map(|(_, rest)| rest).unwrap_or(line);
            format!("- {subject}")
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!("{header}\n\n{body}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_fix_type() {
        assert_eq!(infer_commit_type("Fix the login bug"), "fix");
    }

    #[test]
    fn infers_feat_type() {
        assert_eq!(infer_commit_type("Add dark mode toggle"), "feat");
    }

    #[test]
    fn falls_back_to_chore() {
        assert_eq!(infer_commit_type("Bump dependency versions"), "chore");
    }

    #[test]
    fn scope_omitted_for_stopword() {
        assert_eq!(infer_scope("Fix the login bug"), None);
    }

    #[test]
    fn scope_extracted_from_second_word() {
        assert_eq!(infer_scope("Update scheduler backoff"), Some("scheduler".to_string()));
    }

    #[test]
    fn header_includes_scope_when_present() {
        let message = generate_semantic_commit_message(
            TaskId::new(),
            "Update scheduler backoff",
            &[],
        );
        assert_eq!(message, "chore(scheduler): Update scheduler backoff");
    }

    #[test]
    fn body_strips_short_hash_prefix() {
        let message = generate_semantic_commit_message(
            TaskId::new(),
            "Fix login bug",
            &["abc1234 fix login crash".to_string()],
        );
        assert!(message.ends_with("- fix login crash"));
    }
}
