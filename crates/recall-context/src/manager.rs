// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The recent-interaction window: a bounded, strictly serialized,
//! append-only log with a running token total.
//!
//! All state lives behind one `tokio::sync::Mutex`, so every call is
//! processed in arrival order with no interleaved mutation. The log is
//! session-scoped and in-memory only; long-term recall goes back through
//! the durable store, never through this window.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use recall_config::ContextConfig;
use recall_core::{ContextInteraction, ConversationContext};

/// Aggregate counters over the current window.
#[derive(Debug, Clone, Default)]
pub struct ContextStatistics {
    /// Number of interactions currently held.
    pub interaction_count: usize,
    /// Sum of per-interaction token counts.
    pub total_tokens: usize,
    /// Mean tokens per interaction (0 when empty).
    pub average_tokens: f64,
    /// Oldest interaction timestamp, if any.
    pub oldest: Option<DateTime<Utc>>,
    /// Newest interaction timestamp, if any.
    pub newest: Option<DateTime<Utc>>,
    /// Fraction of interactions recalled from long-term memory.
    pub long_term_fraction: f64,
}

struct ContextLog {
    interactions: VecDeque<ContextInteraction>,
    total_tokens: usize,
}

/// Owner of the bounded recent-interaction log.
pub struct ContextManager {
    max_tokens: usize,
    sliding_window_size: usize,
    log: Mutex<ContextLog>,
}

impl ContextManager {
    /// Creates an empty window from context configuration.
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            max_tokens: config.max_context_tokens,
            sliding_window_size: config.sliding_window_size,
            log: Mutex::new(ContextLog {
                interactions: VecDeque::new(),
                total_tokens: 0,
            }),
        }
    }

    /// Append a live interaction observed in the current session.
    pub async fn add_interaction(&self, query: &str, response: &str) {
        self.record(ContextInteraction {
            query: query.to_string(),
            response: response.to_string(),
            timestamp: Utc::now(),
            from_long_term_memory: false,
        })
        .await;
    }

    /// Append a fully specified interaction, then enforce the window
    /// invariants in order: first evict from the oldest end until the
    /// token total fits `max_tokens`, then evict the oldest excess until
    /// at most `2 x sliding_window_size` interactions remain.
    pub async fn record(&self, interaction: ContextInteraction) {
        let mut log = self.log.lock().await;
        log.total_tokens += interaction.token_count();
        log.interactions.push_back(interaction);

        while log.total_tokens > self.max_tokens {
            match log.interactions.pop_front() {
                Some(evicted) => {
                    log.total_tokens -= evicted.token_count();
                    debug!(tokens = evicted.token_count(), "evicted over token budget");
                }
                None => break,
            }
        }

        // Hard cap: bounds memory even for many near-empty interactions.
        while log.interactions.len() > 2 * self.sliding_window_size {
            if let Some(evicted) = log.interactions.pop_front() {
                log.total_tokens -= evicted.token_count();
            }
        }
    }

    /// Budgeted window: walks newest to oldest, greedily including
    /// interactions while the running total stays within `max_tokens`.
    ///
    /// Stops at the first older interaction that does not fit, even if a
    /// further-back one might have fit alone: ordering, not best-fit
    /// packing, governs inclusion. Returned interactions are in
    /// chronological order.
    pub async fn get_context(&self, max_tokens: usize) -> ConversationContext {
        let log = self.log.lock().await;
        let mut included = Vec::new();
        let mut total = 0usize;
        let mut truncated = false;

        for interaction in log.interactions.iter().rev() {
            let tokens = interaction.token_count();
            if total + tokens > max_tokens {
                truncated = true;
                break;
            }
            total += tokens;
            included.push(interaction.clone());
        }
        included.reverse();

        ConversationContext {
            interactions: included,
            token_count: total,
            is_truncated: truncated,
        }
    }

    /// The last `sliding_window_size` interactions regardless of token
    /// budget. `is_truncated` is set when older history exists.
    pub async fn get_recent_window(&self) -> ConversationContext {
        let log = self.log.lock().await;
        let skip = log.interactions.len().saturating_sub(self.sliding_window_size);
        let included: Vec<ContextInteraction> =
            log.interactions.iter().skip(skip).cloned().collect();
        let token_count = included.iter().map(ContextInteraction::token_count).sum();

        ConversationContext {
            interactions: included,
            token_count,
            is_truncated: skip > 0,
        }
    }

    /// Interactions whose timestamp falls within `[start, end]`,
    /// in chronological order.
    pub async fn get_context_for_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ConversationContext {
        let log = self.log.lock().await;
        let included: Vec<ContextInteraction> = log
            .interactions
            .iter()
            .filter(|i| i.timestamp >= start && i.timestamp <= end)
            .cloned()
            .collect();
        let token_count = included.iter().map(ContextInteraction::token_count).sum();

        ConversationContext {
            interactions: included,
            token_count,
            is_truncated: false,
        }
    }

    /// Drop everything but the newest `keep_count` interactions.
    pub async fn prune_old(&self, keep_count: usize) {
        let mut log = self.log.lock().await;
        while log.interactions.len() > keep_count {
            if let Some(evicted) = log.interactions.pop_front() {
                log.total_tokens -= evicted.token_count();
            }
        }
    }

    /// Empty the window.
    pub async fn clear(&self) {
        let mut log = self.log.lock().await;
        log.interactions.clear();
        log.total_tokens = 0;
    }

    /// The newest interaction's query, if any. Context assembly uses it
    /// to seed long-term retrieval.
    pub async fn latest_query(&self) -> Option<String> {
        let log = self.log.lock().await;
        log.interactions.back().map(|i| i.query.clone())
    }

    /// Aggregate counters over the current window.
    pub async fn get_statistics(&self) -> ContextStatistics {
        let log = self.log.lock().await;
        let count = log.interactions.len();
        if count == 0 {
            return ContextStatistics::default();
        }
        let long_term = log
            .interactions
            .iter()
            .filter(|i| i.from_long_term_memory)
            .count();
        ContextStatistics {
            interaction_count: count,
            total_tokens: log.total_tokens,
            average_tokens: log.total_tokens as f64 / count as f64,
            oldest: log.interactions.front().map(|i| i.timestamp),
            newest: log.interactions.back().map(|i| i.timestamp),
            long_term_fraction: long_term as f64 / count as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn config(max_tokens: usize, window: usize) -> ContextConfig {
        ContextConfig {
            max_context_tokens: max_tokens,
            sliding_window_size: window,
        }
    }

    /// A query/response pair totalling exactly `tokens * 4` characters.
    fn sized(tokens: usize) -> (String, String) {
        let half = tokens * 2;
        ("q".repeat(half), "r".repeat(half))
    }

    #[tokio::test]
    async fn budget_invariant_holds_for_any_budget() {
        let manager = ContextManager::new(&config(1000, 10));
        for _ in 0..12 {
            let (q, r) = sized(17);
            manager.add_interaction(&q, &r).await;
        }
        for budget in [0, 1, 16, 17, 50, 100, 1000] {
            let context = manager.get_context(budget).await;
            assert!(
                context.token_count <= budget,
                "budget {budget} exceeded: {}",
                context.token_count
            );
        }
    }

    #[tokio::test]
    async fn add_evicts_oldest_when_over_token_budget() {
        let manager = ContextManager::new(&config(100, 10));
        let (q1, r1) = sized(60);
        let (q2, r2) = sized(60);
        manager.add_interaction(&q1, &r1).await;
        manager.add_interaction(&q2, &r2).await;

        let stats = manager.get_statistics().await;
        assert_eq!(stats.interaction_count, 1);
        assert_eq!(stats.total_tokens, 60);
    }

    #[tokio::test]
    async fn add_enforces_hard_interaction_cap() {
        // Tiny interactions never trip the token budget, so only the
        // 2 x window cap bounds the log.
        let manager = ContextManager::new(&config(100_000, 2));
        for i in 0..9 {
            manager.add_interaction(&format!("q{i}"), "r").await;
        }
        let stats = manager.get_statistics().await;
        assert_eq!(stats.interaction_count, 4);

        // The survivors are the newest four.
        let window = manager.get_context(100_000).await;
        assert_eq!(window.interactions[0].query, "q5");
        assert_eq!(window.interactions[3].query, "q8");
    }

    #[tokio::test]
    async fn get_context_stops_at_first_nonfitting_interaction() {
        let manager = ContextManager::new(&config(10_000, 10));
        let (small_old_q, small_old_r) = sized(5);
        let (big_q, big_r) = sized(100);
        let (small_new_q, small_new_r) = sized(5);
        manager.add_interaction(&small_old_q, &small_old_r).await;
        manager.add_interaction(&big_q, &big_r).await;
        manager.add_interaction(&small_new_q, &small_new_r).await;

        // Budget fits the newest small one and the far-back small one, but
        // the walk must stop at the big middle interaction.
        let context = manager.get_context(20).await;
        assert_eq!(context.interactions.len(), 1);
        assert_eq!(context.token_count, 5);
        assert!(context.is_truncated);
    }

    #[tokio::test]
    async fn get_context_preserves_chronological_order() {
        let manager = ContextManager::new(&config(10_000, 10));
        manager.add_interaction("first", "a").await;
        manager.add_interaction("second", "b").await;
        manager.add_interaction("third", "c").await;

        let context = manager.get_context(10_000).await;
        let queries: Vec<&str> = context
            .interactions
            .iter()
            .map(|i| i.query.as_str())
            .collect();
        assert_eq!(queries, vec!["first", "second", "third"]);
        assert!(!context.is_truncated);
    }

    #[tokio::test]
    async fn recent_window_caps_at_window_size() {
        let manager = ContextManager::new(&config(100_000, 3));
        for i in 0..5 {
            manager.add_interaction(&format!("q{i}"), "r").await;
        }
        let window = manager.get_recent_window().await;
        assert_eq!(window.interactions.len(), 3);
        assert_eq!(window.interactions[0].query, "q2");
        assert!(window.is_truncated);
    }

    #[tokio::test]
    async fn recent_window_not_truncated_when_small() {
        let manager = ContextManager::new(&config(100_000, 10));
        manager.add_interaction("only", "one").await;
        let window = manager.get_recent_window().await;
        assert_eq!(window.interactions.len(), 1);
        assert!(!window.is_truncated);
    }

    #[tokio::test]
    async fn date_range_filters_by_timestamp() {
        let manager = ContextManager::new(&config(100_000, 10));
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        for (offset, query) in [(0i64, "early"), (10, "middle"), (20, "late")] {
            manager
                .record(ContextInteraction {
                    query: query.to_string(),
                    response: "r".to_string(),
                    timestamp: base + Duration::minutes(offset),
                    from_long_term_memory: false,
                })
                .await;
        }

        let context = manager
            .get_context_for_date_range(base + Duration::minutes(5), base + Duration::minutes(15))
            .await;
        assert_eq!(context.interactions.len(), 1);
        assert_eq!(context.interactions[0].query, "middle");
    }

    #[tokio::test]
    async fn prune_old_keeps_newest() {
        let manager = ContextManager::new(&config(100_000, 10));
        for i in 0..6 {
            manager.add_interaction(&format!("q{i}"), "r").await;
        }
        manager.prune_old(2).await;
        let context = manager.get_context(100_000).await;
        assert_eq!(context.interactions.len(), 2);
        assert_eq!(context.interactions[0].query, "q4");
        assert_eq!(context.interactions[1].query, "q5");
    }

    #[tokio::test]
    async fn clear_resets_everything() {
        let manager = ContextManager::new(&config(100_000, 10));
        manager.add_interaction("q", "r").await;
        manager.clear().await;
        let stats = manager.get_statistics().await;
        assert_eq!(stats.interaction_count, 0);
        assert_eq!(stats.total_tokens, 0);
        assert!(manager.latest_query().await.is_none());
    }

    #[tokio::test]
    async fn statistics_reflect_window_contents() {
        let manager = ContextManager::new(&config(100_000, 10));
        let (q1, r1) = sized(10);
        let (q2, r2) = sized(30);
        manager.add_interaction(&q1, &r1).await;
        manager.add_interaction(&q2, &r2).await;
        manager
            .record(ContextInteraction {
                query: "from store".to_string(),
                response: "recalled".to_string(),
                timestamp: Utc::now(),
                from_long_term_memory: true,
            })
            .await;

        let stats = manager.get_statistics().await;
        assert_eq!(stats.interaction_count, 3);
        assert_eq!(stats.total_tokens, 10 + 30 + ("from store".len() + "recalled".len()) / 4);
        assert!((stats.long_term_fraction - 1.0 / 3.0).abs() < 1e-9);
        assert!(stats.oldest.unwrap() <= stats.newest.unwrap());
    }

    #[tokio::test]
    async fn latest_query_returns_newest() {
        let manager = ContextManager::new(&config(100_000, 10));
        assert!(manager.latest_query().await.is_none());
        manager.add_interaction("first", "r").await;
        manager.add_interaction("second", "r").await;
        assert_eq!(manager.latest_query().await.as_deref(), Some("second"));
    }
}
