//! Context window — a bounded log of prior role/content interactions.
//!
//! Entries are only ever appended. Once the log grows past
//! [`MAX_ENTRIES`] it is cut back to the [`RETAINED_ENTRIES`] most recent,
//! so its length never exceeds `MAX_ENTRIES` between calls.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const MAX_ENTRIES: usize = 1000;
pub const RETAINED_ENTRIES: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextWindowEntry {
    /// Free-form: `user`, `assistant`, `tool`, or whatever the caller uses
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ContextWindowEntry {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ContextWindow {
    entries: VecDeque<ContextWindowEntry>,
}

impl ContextWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry stamped with the current time.
    pub fn add(&mut self, role: impl Into<String>, content: impl Into<String>) {
        self.push(ContextWindowEntry::new(role, content));
    }

    /// Append a pre-built entry.
    pub fn push(&mut self, entry: ContextWindowEntry) {
        self.entries.push_back(entry);
        if self.entries.len() > MAX_ENTRIES {
            let excess = self.entries.len() - RETAINED_ENTRIES;
            self.entries.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ContextWindowEntry> {
        self.entries.iter()
    }

    /// Up to `limit` of the most recent entries whose content contains
    /// `keyword` (case-insensitive) and which are no older than `max_age`
    /// relative to `now`. Returned oldest first.
    pub fn related(
        &self,
        keyword: &str,
        now: DateTime<Utc>,
        max_age: Duration,
        limit: usize,
    ) -> Vec<ContextWindowEntry> {
        let keyword = keyword.to_lowercase();
        let cutoff = now - max_age;

        let mut matches: Vec<ContextWindowEntry> = self
            .entries
            .iter()
            .rev()
            .filter(|e| e.timestamp >= cutoff)
            .filter(|e| e.content.to_lowercase().contains(&keyword))
            .take(limit)
            .cloned()
            .collect();
        matches.reverse();
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolwright_core::message::Role;

    #[test]
    fn overflow_keeps_most_recent_half() {
        let mut window = ContextWindow::new();
        for i in 0..MAX_ENTRIES {
            window.add(Role::User, format!("entry {i}"));
        }
        assert_eq!(window.len(), MAX_ENTRIES);

        window.add(Role::User, "entry 1000");
        assert_eq!(window.len(), RETAINED_ENTRIES);

        let contents: Vec<&str> = window.entries().map(|e| e.content.as_str()).collect();
        assert_eq!(contents.first(), Some(&"entry 501"));
        assert_eq!(contents.last(), Some(&"entry 1000"));
    }

    #[test]
    fn never_exceeds_bound() {
        let mut window = ContextWindow::new();
        for i in 0..2500 {
            window.add(Role::Assistant, i.to_string());
            assert!(window.len() <= MAX_ENTRIES);
        }
    }

    #[test]
    fn related_filters_by_keyword_and_age() {
        let now = Utc::now();
        let mut window = ContextWindow::new();
        window.push(ContextWindowEntry {
            role: Role::User.into(),
            content: "old search results".into(),
            timestamp: now - Duration::hours(2),
        });
        window.push(ContextWindowEntry {
            role: Role::User.into(),
            content: "Search for TODOs".into(),
            timestamp: now - Duration::minutes(5),
        });
        window.push(ContextWindowEntry {
            role: Role::Assistant.into(),
            content: "architecture looks layered".into(),
            timestamp: now - Duration::minutes(1),
        });

        let related = window.related("search", now, Duration::hours(1), 10);
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].content, "Search for TODOs");
    }

    #[test]
    fn roles_are_free_form() {
        let mut window = ContextWindow::new();
        window.add("tool", "search_by_query [repo-search] {}");
        window.add(Role::System, "be terse");

        let roles: Vec<&str> = window.entries().map(|e| e.role.as_str()).collect();
        assert_eq!(roles, ["tool", "system"]);
        let value = serde_json::to_value(window.entries().next().unwrap()).unwrap();
        assert_eq!(value["role"], "tool");
    }

    #[test]
    fn related_caps_to_most_recent() {
        let now = Utc::now();
        let mut window = ContextWindow::new();
        for i in 0..15 {
            window.push(ContextWindowEntry {
                role: Role::User.into(),
                content: format!("analysis step {i}"),
                timestamp: now - Duration::seconds(15 - i),
            });
        }

        let related = window.related("ANALYSIS", now, Duration::hours(1), 10);
        assert_eq!(related.len(), 10);
        assert_eq!(related[0].content, "analysis step 5");
        assert_eq!(related[9].content, "analysis step 14");
    }
}
