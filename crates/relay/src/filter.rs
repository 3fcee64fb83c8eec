//! Per-repository event filtering.
//!
//! Each configured axis (branch, label, author) must pass; an axis with no
//! entries is unrestricted.

use glob::Pattern;

use crate::models::FilterConfig;

const WILDCARD: &str = "*";

/// Attributes of an event that filters match on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFacts {
    /// Branch the event concerns, for event types that have one.
    pub branch: Option<String>,
    /// `Some` for label-bearing event types, even when the set is empty.
    pub labels: Option<Vec<String>>,
    /// Acting user.
    pub author: Option<String>,
}

/// Whether an event passes every configured filter axis.
#[must_use]
pub fn allows(config: &FilterConfig, facts: &EventFacts) -> bool {
    branch_allows(&config.branch_filter, facts.branch.as_deref())
        && labels_allow(&config.label_filter, facts.labels.as_deref())
        && author_allows(&config.author_filter, facts.author.as_deref())
}

fn branch_allows(patterns: &[String], branch: Option<&str>) -> bool {
    if patterns.is_empty() {
        return true;
    }
    // Events without a branch are not subject to branch filtering.
    let Some(branch) = branch else {
        return true;
    };
    patterns.iter().any(|p| branch_matches(p, branch))
}

fn branch_matches(pattern: &str, branch: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(glob) => glob.matches(branch),
        Err(_) => pattern == branch,
    }
}

fn labels_allow(filter: &[String], labels: Option<&[String]>) -> bool {
    if filter.is_empty() {
        return true;
    }
    let Some(labels) = labels else {
        return true;
    };
    if labels.is_empty() {
        return false;
    }
    filter
        .iter()
        .any(|wanted| wanted == WILDCARD || labels.iter().any(|l| l == wanted))
}

fn author_allows(filter: &[String], author: Option<&str>) -> bool {
    if filter.is_empty() {
        return true;
    }
    let Some(author) = author else {
        return false;
    };
    filter.iter().any(|a| a == WILDCARD || a == author)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn push_facts(branch: &str, author: &str) -> EventFacts {
        EventFacts {
            branch: Some(branch.to_string()),
            labels: None,
            author: Some(author.to_string()),
        }
    }

    fn labelled(labels: &[&str]) -> EventFacts {
        EventFacts {
            branch: None,
            labels: Some(list(labels)),
            author: Some("reporter".to_string()),
        }
    }

    #[test]
    fn test_unconfigured_allows_everything() {
        let config = FilterConfig::default();
        assert!(allows(&config, &push_facts("anything", "anyone")));
        assert!(allows(&config, &labelled(&[])));
        assert!(allows(&config, &EventFacts::default()));
    }

    #[test]
    fn test_branch_globs() {
        let config = FilterConfig {
            branch_filter: list(&["main", "release/*"]),
            ..FilterConfig::default()
        };
        assert!(allows(&config, &push_facts("main", "dev")));
        assert!(allows(&config, &push_facts("release/1.2", "dev")));
        assert!(!allows(&config, &push_facts("feature/x", "dev")));
        assert!(!allows(&config, &push_facts("mainline", "dev")));

        // No branch: not subject to the branch axis
        assert!(allows(&config, &labelled(&["bug"])));
    }

    #[test]
    fn test_branch_wildcard_and_invalid_pattern() {
        let star = FilterConfig {
            branch_filter: list(&["*"]),
            ..FilterConfig::default()
        };
        assert!(allows(&star, &push_facts("whatever", "dev")));

        let invalid = FilterConfig {
            branch_filter: list(&["[unclosed"]),
            ..FilterConfig::default()
        };
        assert!(allows(&invalid, &push_facts("[unclosed", "dev")));
        assert!(!allows(&invalid, &push_facts("main", "dev")));
    }

    #[test]
    fn test_label_axis() {
        let config = FilterConfig {
            label_filter: list(&["bug", "urgent"]),
            ..FilterConfig::default()
        };
        assert!(allows(&config, &labelled(&["enhancement", "urgent"])));
        assert!(!allows(&config, &labelled(&["enhancement"])));
        // Label-bearing event without labels
        assert!(!allows(&config, &labelled(&[])));
        // Event type without labels
        assert!(allows(&config, &push_facts("main", "dev")));
    }

    #[test]
    fn test_label_wildcard_needs_a_label() {
        let config = FilterConfig {
            label_filter: list(&["*"]),
            ..FilterConfig::default()
        };
        assert!(allows(&config, &labelled(&["anything"])));
        assert!(!allows(&config, &labelled(&[])));
    }

    #[test]
    fn test_author_axis() {
        let config = FilterConfig {
            author_filter: list(&["octocat"]),
            ..FilterConfig::default()
        };
        assert!(allows(&config, &push_facts("main", "octocat")));
        assert!(!allows(&config, &push_facts("main", "mallory")));
        assert!(!allows(&config, &EventFacts::default()));

        let star = FilterConfig {
            author_filter: list(&["*"]),
            ..FilterConfig::default()
        };
        assert!(allows(&star, &push_facts("main", "mallory")));
    }

    #[test]
    fn test_axes_are_conjunctive() {
        let config = FilterConfig {
            branch_filter: list(&["main"]),
            author_filter: list(&["octocat"]),
            ..FilterConfig::default()
        };
        assert!(allows(&config, &push_facts("main", "octocat")));
        assert!(!allows(&config, &push_facts("dev", "octocat")));
        assert!(!allows(&config, &push_facts("main", "mallory")));
    }
}
