// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Recall memory engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup. Every value is fixed at construction and
//! immutable thereafter.

use serde::{Deserialize, Serialize};

use recall_core::Importance;

/// Top-level Recall configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RecallConfig {
    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Memory engine settings.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Recent-context window settings.
    #[serde(default)]
    pub context: ContextConfig,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "recall.db".to_string()
}

/// Memory engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Fixed embedding vector dimension. Every stored entry and every
    /// provider output must have exactly this length.
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    /// Capacity of the text -> vector embedding cache.
    #[serde(default = "default_embedding_cache_size")]
    pub embedding_cache_size: usize,

    /// Capacity of the query -> ranked-results cache.
    #[serde(default = "default_query_cache_size")]
    pub query_cache_size: usize,

    /// Schedule a maintenance cycle after every Nth successful store.
    #[serde(default = "default_optimization_interval")]
    pub optimization_interval: usize,

    /// Vector search scans the embeddings of this many most-recently
    /// inserted entries rather than the full corpus. Recency-biased
    /// approximate top-K; raise it to widen the scan.
    #[serde(default = "default_vector_scan_limit")]
    pub vector_scan_limit: usize,

    /// Wall-clock period of the background maintenance loop, in seconds.
    #[serde(default = "default_maintenance_period_secs")]
    pub maintenance_period_secs: u64,

    /// Token budget handed to the summarizer collaborator.
    #[serde(default = "default_max_summary_tokens")]
    pub max_summary_tokens: usize,

    /// Default age threshold for pruning, in days.
    #[serde(default = "default_prune_older_than_days")]
    pub prune_older_than_days: i64,

    /// Default importance threshold for pruning: entries strictly below
    /// this level are eligible.
    #[serde(default = "default_prune_min_importance")]
    pub prune_min_importance: Importance,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            embedding_dimension: default_embedding_dimension(),
            embedding_cache_size: default_embedding_cache_size(),
            query_cache_size: default_query_cache_size(),
            optimization_interval: default_optimization_interval(),
            vector_scan_limit: default_vector_scan_limit(),
            maintenance_period_secs: default_maintenance_period_secs(),
            max_summary_tokens: default_max_summary_tokens(),
            prune_older_than_days: default_prune_older_than_days(),
            prune_min_importance: default_prune_min_importance(),
        }
    }
}

fn default_embedding_dimension() -> usize {
    384
}

fn default_embedding_cache_size() -> usize {
    1000
}

fn default_query_cache_size() -> usize {
    64
}

fn default_optimization_interval() -> usize {
    100
}

fn default_vector_scan_limit() -> usize {
    1000
}

fn default_maintenance_period_secs() -> u64 {
    3600
}

fn default_max_summary_tokens() -> usize {
    500
}

fn default_prune_older_than_days() -> i64 {
    90
}

fn default_prune_min_importance() -> Importance {
    Importance::Medium
}

/// Recent-context window configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    /// Token budget of the recent-interaction log.
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// Size of the sliding window returned by recent-window queries.
    /// The log itself holds at most twice this many interactions.
    #[serde(default = "default_sliding_window_size")]
    pub sliding_window_size: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: default_max_context_tokens(),
            sliding_window_size: default_sliding_window_size(),
        }
    }
}

fn default_max_context_tokens() -> usize {
    4000
}

fn default_sliding_window_size() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RecallConfig::default();
        assert_eq!(config.storage.database_path, "recall.db");
        assert_eq!(config.memory.embedding_dimension, 384);
        assert_eq!(config.memory.embedding_cache_size, 1000);
        assert_eq!(config.memory.optimization_interval, 100);
        assert_eq!(config.memory.vector_scan_limit, 1000);
        assert_eq!(config.memory.max_summary_tokens, 500);
        assert_eq!(config.memory.prune_min_importance, Importance::Medium);
        assert_eq!(config.context.max_context_tokens, 4000);
        assert_eq!(config.context.sliding_window_size, 10);
    }

    #[test]
    fn toml_section_overrides_defaults() {
        let toml_str = r#"
[memory]
embedding_dimension = 768
vector_scan_limit = 250

[context]
sliding_window_size = 4
"#;
        let config: RecallConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.memory.embedding_dimension, 768);
        assert_eq!(config.memory.vector_scan_limit, 250);
        // Untouched fields keep their defaults.
        assert_eq!(config.memory.embedding_cache_size, 1000);
        assert_eq!(config.context.sliding_window_size, 4);
        assert_eq!(config.context.max_context_tokens, 4000);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let toml_str = r#"
[memory]
embeding_dimension = 384
"#;
        assert!(toml::from_str::<RecallConfig>(toml_str).is_err());
    }

    #[test]
    fn prune_importance_parses_from_lowercase() {
        let toml_str = r#"
[memory]
prune_min_importance = "high"
"#;
        let config: RecallConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.memory.prune_min_importance, Importance::High);
    }
}
