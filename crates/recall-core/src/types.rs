// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Recall workspace.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single stored interaction, immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// The user query that produced this interaction.
    pub query: String,
    /// The assistant response to the query.
    pub response: String,
    /// Embedding vector for semantic search. Length equals the configured
    /// dimension for every persisted entry.
    #[serde(skip)]
    pub embedding: Vec<f32>,
    /// Coarse classification of the entry.
    pub category: MemoryCategory,
    /// Retention weight used by relevance scoring and pruning.
    pub importance: Importance,
    /// Free-form labels attached at store time.
    pub tags: BTreeSet<String>,
    /// Optional caller-supplied metadata.
    pub metadata: Option<serde_json::Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Classification of a stored entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryCategory {
    #[default]
    General,
    Important,
    Summary,
    Context,
    Fact,
    Preference,
}

impl MemoryCategory {
    /// Convert to string for SQLite storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryCategory::General => "general",
            MemoryCategory::Important => "important",
            MemoryCategory::Summary => "summary",
            MemoryCategory::Context => "context",
            MemoryCategory::Fact => "fact",
            MemoryCategory::Preference => "preference",
        }
    }

    /// Parse from SQLite string.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "important" => MemoryCategory::Important,
            "summary" => MemoryCategory::Summary,
            "context" => MemoryCategory::Context,
            "fact" => MemoryCategory::Fact,
            "preference" => MemoryCategory::Preference,
            _ => MemoryCategory::General,
        }
    }
}

/// Retention weight of an entry. Ordered: `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Importance {
    /// Convert to string for SQLite storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Importance::Low => "low",
            Importance::Medium => "medium",
            Importance::High => "high",
            Importance::Critical => "critical",
        }
    }

    /// Parse from SQLite string.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "low" => Importance::Low,
            "high" => Importance::High,
            "critical" => Importance::Critical,
            _ => Importance::Medium,
        }
    }

    /// Normalized scoring weight: 0.25, 0.5, 0.75, 1.0 for Low..Critical.
    pub fn weight(&self) -> f32 {
        match self {
            Importance::Low => 0.25,
            Importance::Medium => 0.5,
            Importance::High => 0.75,
            Importance::Critical => 1.0,
        }
    }

    /// The importance levels strictly below `self`, as storage strings.
    /// Used to build pruning predicates.
    pub fn levels_below(&self) -> &'static [&'static str] {
        match self {
            Importance::Low => &[],
            Importance::Medium => &["low"],
            Importance::High => &["low", "medium"],
            Importance::Critical => &["low", "medium", "high"],
        }
    }
}

/// An entry paired with its retrieval scores. Produced at query time,
/// never persisted.
#[derive(Debug, Clone)]
pub struct MemoryResult {
    pub entry: MemoryEntry,
    /// Raw (or merged) similarity from the search path(s).
    pub similarity: f32,
    /// Weighted combination of similarity, recency, and importance.
    pub relevance_score: f32,
}

/// One turn of recent conversation held by the context window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextInteraction {
    pub query: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
    /// True when this interaction was recalled from the durable store
    /// rather than observed live in the current session.
    pub from_long_term_memory: bool,
}

impl ContextInteraction {
    /// Approximate token count: total characters divided by four.
    ///
    /// Every budget comparison in the engine uses this same formula so
    /// token totals stay consistent across components.
    pub fn token_count(&self) -> usize {
        (self.query.len() + self.response.len()) / 4
    }
}

/// A role-labeled message derived from a context window, ready to be
/// serialized into a downstream prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextMessage {
    /// "user" or "assistant".
    pub role: &'static str,
    pub text: String,
}

/// An ordered window of recent interactions with its aggregate token count.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Interactions in chronological order (oldest first).
    pub interactions: Vec<ContextInteraction>,
    /// Sum of [`ContextInteraction::token_count`] over `interactions`.
    pub token_count: usize,
    /// True when older history exists beyond what this window includes.
    pub is_truncated: bool,
}

impl ConversationContext {
    /// Flatten the window into a role-labeled message sequence.
    pub fn messages(&self) -> Vec<ContextMessage> {
        let mut messages = Vec::with_capacity(self.interactions.len() * 2);
        for interaction in &self.interactions {
            messages.push(ContextMessage {
                role: "user",
                text: interaction.query.clone(),
            });
            messages.push(ContextMessage {
                role: "assistant",
                text: interaction.response.clone(),
            });
        }
        messages
    }
}

/// Output of the external summarizer collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// The compressed conversation text.
    pub text: String,
    /// Topics the summarizer identified, stored as tags on the summary entry.
    pub key_topics: Vec<String>,
    /// Token count reported by the summarizer for `text`.
    pub token_count: usize,
}

/// Diagnostic counters exposed by the orchestrator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryServiceStatistics {
    /// Total entries currently in the durable store.
    pub total_entries: i64,
    /// Mean wall-clock latency of successful `store` calls, in milliseconds.
    pub average_store_latency_ms: f64,
    /// Mean wall-clock latency of successful `retrieve` calls, in milliseconds.
    pub average_retrieve_latency_ms: f64,
    /// Embedding-cache hits divided by total embedding lookups.
    pub cache_hit_rate: f64,
    /// When the last maintenance cycle completed, if any.
    pub last_optimization: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn interaction(query: &str, response: &str) -> ContextInteraction {
        ContextInteraction {
            query: query.to_string(),
            response: response.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            from_long_term_memory: false,
        }
    }

    #[test]
    fn importance_ordering() {
        assert!(Importance::Low < Importance::Medium);
        assert!(Importance::Medium < Importance::High);
        assert!(Importance::High < Importance::Critical);
    }

    #[test]
    fn importance_weights_are_normalized_ordinals() {
        assert_eq!(Importance::Low.weight(), 0.25);
        assert_eq!(Importance::Medium.weight(), 0.5);
        assert_eq!(Importance::High.weight(), 0.75);
        assert_eq!(Importance::Critical.weight(), 1.0);
    }

    #[test]
    fn importance_levels_below() {
        assert!(Importance::Low.levels_below().is_empty());
        assert_eq!(Importance::High.levels_below(), &["low", "medium"]);
        assert_eq!(
            Importance::Critical.levels_below(),
            &["low", "medium", "high"]
        );
    }

    #[test]
    fn importance_string_roundtrip() {
        for importance in [
            Importance::Low,
            Importance::Medium,
            Importance::High,
            Importance::Critical,
        ] {
            assert_eq!(Importance::from_str_value(importance.as_str()), importance);
        }
    }

    #[test]
    fn category_string_roundtrip() {
        for category in [
            MemoryCategory::General,
            MemoryCategory::Important,
            MemoryCategory::Summary,
            MemoryCategory::Context,
            MemoryCategory::Fact,
            MemoryCategory::Preference,
        ] {
            assert_eq!(
                MemoryCategory::from_str_value(category.as_str()),
                category
            );
        }
    }

    #[test]
    fn unknown_category_falls_back_to_general() {
        assert_eq!(
            MemoryCategory::from_str_value("nonsense"),
            MemoryCategory::General
        );
    }

    #[test]
    fn token_count_is_chars_over_four() {
        let i = interaction("What is my name?", "Your name is Alice.");
        assert_eq!(i.token_count(), (16 + 19) / 4);
    }

    #[test]
    fn context_messages_are_role_labeled_pairs() {
        let context = ConversationContext {
            interactions: vec![interaction("hi", "hello"), interaction("bye", "later")],
            token_count: 0,
            is_truncated: false,
        };
        let messages = context.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[0].text, "hi");
        assert_eq!(messages[1].role, "assistant");
        assert_eq!(messages[1].text, "hello");
        assert_eq!(messages[2].role, "user");
        assert_eq!(messages[3].role, "assistant");
    }
}
