//! Mention token extraction.
//!
//! Clients embed mentions in message content as `@[displayName](userId)`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static MENTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@\[([^\]]+)\]\(([^)\s]+)\)").expect("mention pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub display_name: String,
    pub user_id: String,
}

/// Extract mention tokens in order of appearance, deduplicated by user id.
pub fn extract_mentions(content: &str) -> Vec<Mention> {
    let mut seen = HashSet::new();
    MENTION_PATTERN
        .captures_iter(content)
        .filter_map(|caps| {
            let user_id = caps.get(2)?.as_str().to_string();
            if !seen.insert(user_id.clone()) {
                return None;
            }
            Some(Mention {
                display_name: caps.get(1)?.as_str().to_string(),
                user_id,
            })
        })
        .collect()
}
