//! Input sanitization for anything that reaches a git shell argument.
//! Same posture as the rest of the git-shelling code in this crate: strip to
//! `[a-z0-9_-]`, lowercase, and cap length before it touches a subprocess.

use crate::constants::BRANCH_SLUG_MAX_LENGTH;

/// Sanitizes a branch name component (base branch, task-derived ref) down to
/// a safe alphabet, preserving `/` so qualified refs like `origin/main` still
/// read correctly.
pub fn sanitize_branch_component(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/'))
        .collect::<String>()
        .to_lowercase()
}

/// Turns a task title into a branch-name-safe slug, capped at
/// `BRANCH_SLUG_MAX_LENGTH` characters.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut last_was_dash = false;

    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash && !slug.is_empty() {
            slug.push('-');
            last_was_dash = true;
        }
    }

    let slug = slug.trim_end_matches('-').to_string();
    slug.chars().take(BRANCH_SLUG_MAX_LENGTH).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Fix the login bug!!"), "fix-the-login-bug");
    }

    #[test]
    fn slugify_caps_length() {
        let title = "a".repeat(100);
        assert_eq!(slugify(&title).len(), BRANCH_SLUG_MAX_LENGTH);
    }

    #[test]
    fn sanitize_branch_strips_shell_metacharacters() {
        assert_eq!(sanitize_branch_component("main; rm -rf /"), "mainrm-rf/");
    }
}
