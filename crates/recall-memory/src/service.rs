// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The orchestrator: public API of the Recall memory engine.
//!
//! Owns the embedding and query-result caches, writes to the store and
//! the context window in parallel, runs hybrid retrieval and ranking,
//! assembles budgeted context, and schedules background maintenance.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use recall_config::{MemoryConfig, RecallConfig};
use recall_context::ContextManager;
use recall_core::{
    ContextInteraction, ConversationContext, ConversationSummary, EmbeddingProvider, Importance,
    MemoryCategory, MemoryEntry, MemoryResult, MemoryServiceStatistics, RecallError, Summarizer,
};
use recall_storage::{Database, EntryStore};

use crate::cache::LruCache;
use crate::maintenance::{self, MaintenanceTask};
use crate::scoring;

/// Boost applied to lexical-only hits during hybrid merge: an exact
/// keyword match that vector search missed is still a strong signal.
const LEXICAL_ONLY_BOOST: f32 = 1.2;

/// How many long-term matches context assembly asks for.
const CONTEXT_RECALL_LIMIT: usize = 3;
/// Similarity floor for long-term matches pulled into context.
const CONTEXT_RECALL_THRESHOLD: f32 = 0.75;

/// Query label stored on summary entries.
const SUMMARY_QUERY_LABEL: &str = "Conversation summary";

/// Optional attributes attached to an entry at store time.
#[derive(Debug, Clone, Default)]
pub struct EntryAttributes {
    pub category: MemoryCategory,
    pub importance: Importance,
    pub tags: BTreeSet<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Exclusion filters applied to `search` candidates.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Keep only entries in one of these categories.
    pub categories: Option<Vec<MemoryCategory>>,
    /// Keep only entries at or above this importance.
    pub min_importance: Option<Importance>,
    /// Keep only entries created at or after this instant.
    pub created_after: Option<DateTime<Utc>>,
    /// Keep only entries created at or before this instant.
    pub created_before: Option<DateTime<Utc>>,
    /// Keep only entries carrying every one of these tags.
    pub required_tags: BTreeSet<String>,
}

impl SearchFilters {
    fn matches(&self, entry: &MemoryEntry) -> bool {
        if let Some(categories) = &self.categories
            && !categories.contains(&entry.category)
        {
            return false;
        }
        if let Some(min) = self.min_importance
            && entry.importance < min
        {
            return false;
        }
        if let Some(after) = self.created_after
            && entry.created_at < after
        {
            return false;
        }
        if let Some(before) = self.created_before
            && entry.created_at > before
        {
            return false;
        }
        self.required_tags.iter().all(|tag| entry.tags.contains(tag))
    }

    /// Compact encoding for the result-cache key.
    fn fingerprint(&self) -> String {
        let categories = self
            .categories
            .as_ref()
            .map(|cs| cs.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(","))
            .unwrap_or_default();
        let importance = self.min_importance.map(|i| i.as_str()).unwrap_or_default();
        let after = self
            .created_after
            .map(|t| t.timestamp_millis().to_string())
            .unwrap_or_default();
        let before = self
            .created_before
            .map(|t| t.timestamp_millis().to_string())
            .unwrap_or_default();
        let tags = self
            .required_tags
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(",");
        format!("{categories}|{importance}|{after}|{before}|{tags}")
    }
}

/// Internal diagnostic counters shared with the maintenance task.
#[derive(Debug, Default)]
pub(crate) struct StatsInner {
    pub(crate) store_calls: u64,
    pub(crate) store_latency_total_ms: f64,
    pub(crate) retrieve_calls: u64,
    pub(crate) retrieve_latency_total_ms: f64,
    pub(crate) embedding_cache_hits: u64,
    pub(crate) embedding_cache_misses: u64,
    pub(crate) last_optimization: Option<DateTime<Utc>>,
}

/// The memory engine orchestrator.
///
/// Built once at process start with explicit dependency injection and
/// shared by handle; all state is internal and there are no globals.
pub struct MemoryService {
    memory_config: MemoryConfig,
    store: EntryStore,
    context: ContextManager,
    embedder: Arc<dyn EmbeddingProvider>,
    summarizer: Arc<dyn Summarizer>,
    embedding_cache: Mutex<LruCache<String, Vec<f32>>>,
    result_cache: Mutex<LruCache<String, Vec<MemoryResult>>>,
    store_count: AtomicUsize,
    stats: Arc<Mutex<StatsInner>>,
    maintenance: Mutex<Option<MaintenanceTask>>,
}

impl MemoryService {
    /// Open the configured database and build the full engine.
    ///
    /// Fails fast with [`RecallError::Config`] on invalid configuration or
    /// an embedding provider whose dimension disagrees with it.
    pub async fn open(
        config: RecallConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Result<Self, RecallError> {
        recall_config::validate(&config)?;
        let db = Database::open(&config.storage.database_path).await?;
        Self::with_database(config, &db, embedder, summarizer)
    }

    /// Build the engine over an already opened database.
    ///
    /// Must be called within a tokio runtime: construction spawns the
    /// periodic maintenance loop.
    pub fn with_database(
        config: RecallConfig,
        db: &Database,
        embedder: Arc<dyn EmbeddingProvider>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Result<Self, RecallError> {
        recall_config::validate(&config)?;
        if embedder.dimension() != config.memory.embedding_dimension {
            return Err(RecallError::Config(format!(
                "embedding provider dimension {} does not match configured dimension {}",
                embedder.dimension(),
                config.memory.embedding_dimension
            )));
        }

        let store = EntryStore::new(
            db,
            config.memory.embedding_dimension,
            config.memory.vector_scan_limit,
        );
        let context = ContextManager::new(&config.context);
        let stats = Arc::new(Mutex::new(StatsInner::default()));
        let maintenance = MaintenanceTask::spawn(
            store.clone(),
            config.memory.prune_older_than_days,
            config.memory.prune_min_importance,
            Duration::from_secs(config.memory.maintenance_period_secs),
            stats.clone(),
        );

        info!(
            dimension = config.memory.embedding_dimension,
            scan_limit = config.memory.vector_scan_limit,
            "memory service ready"
        );

        Ok(Self {
            embedding_cache: Mutex::new(LruCache::new(config.memory.embedding_cache_size)),
            result_cache: Mutex::new(LruCache::new(config.memory.query_cache_size)),
            memory_config: config.memory,
            store,
            context,
            embedder,
            summarizer,
            store_count: AtomicUsize::new(0),
            stats,
            maintenance: Mutex::new(Some(maintenance)),
        })
    }

    /// Persist one interaction: embed the query, insert into the store,
    /// mirror into the context window, and flush the result cache.
    ///
    /// Every `optimization_interval`-th successful store schedules a
    /// detached maintenance cycle that cannot block or fail this call.
    pub async fn store(
        &self,
        query: &str,
        response: &str,
        attributes: Option<EntryAttributes>,
    ) -> Result<(), RecallError> {
        let started = Instant::now();
        let embedding = self.embed_cached(query).await?;
        let attrs = attributes.unwrap_or_default();
        let entry = MemoryEntry {
            id: Uuid::new_v4().to_string(),
            query: query.to_string(),
            response: response.to_string(),
            embedding,
            category: attrs.category,
            importance: attrs.importance,
            tags: attrs.tags,
            metadata: attrs.metadata,
            created_at: Utc::now(),
        };

        self.store.insert(&entry).await?;
        self.context.add_interaction(query, response).await;
        // Conservative coherence: any new entry can change any prior
        // query's top-K, so the whole cache goes.
        self.result_cache.lock().await.clear();

        let stored = self.store_count.fetch_add(1, Ordering::Relaxed) + 1;
        if stored % self.memory_config.optimization_interval == 0 {
            let store = self.store.clone();
            let stats = self.stats.clone();
            let days = self.memory_config.prune_older_than_days;
            let min_importance = self.memory_config.prune_min_importance;
            tokio::spawn(async move {
                maintenance::run_cycle(&store, days, min_importance, &stats).await;
            });
            debug!(stored, "scheduled background maintenance");
        }

        let mut stats = self.stats.lock().await;
        stats.store_calls += 1;
        stats.store_latency_total_ms += started.elapsed().as_secs_f64() * 1000.0;
        Ok(())
    }

    /// Semantic retrieval: vector search over-fetched at twice the limit,
    /// ranked by relevance, truncated, and cached.
    pub async fn retrieve(
        &self,
        query: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<MemoryResult>, RecallError> {
        let started = Instant::now();
        let cache_key = format!("retrieve:{limit}:{threshold}:{query}");
        if let Some(results) = self.result_cache.lock().await.get(&cache_key) {
            self.record_retrieve(started).await;
            return Ok(results);
        }

        let embedding = self.embed_cached(query).await?;
        let mut results = self
            .store
            .vector_search(&embedding, 2 * limit, threshold)
            .await?;
        scoring::score_and_rank(&mut results, Utc::now());
        results.truncate(limit);

        self.result_cache
            .lock()
            .await
            .insert(cache_key, results.clone());
        self.record_retrieve(started).await;
        Ok(results)
    }

    /// Hybrid search: lexical and vector legs run concurrently, merge by
    /// entry id, filter by exclusion, rank by relevance.
    ///
    /// Ids present in both legs average their similarities; lexical-only
    /// hits are boosted by [`LEXICAL_ONLY_BOOST`] before scoring.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        filters: Option<&SearchFilters>,
    ) -> Result<Vec<MemoryResult>, RecallError> {
        let fingerprint = filters.map(SearchFilters::fingerprint).unwrap_or_default();
        let cache_key = format!("search:{limit}:{fingerprint}:{query}");
        if let Some(results) = self.result_cache.lock().await.get(&cache_key) {
            return Ok(results);
        }

        let embedding = self.embed_cached(query).await?;
        let (lexical, vector) = tokio::join!(
            self.store.lexical_search(query, 2 * limit),
            self.store.vector_search(&embedding, 2 * limit, 0.0),
        );
        let (lexical, vector) = (lexical?, vector?);

        struct Candidate {
            entry: MemoryEntry,
            vector_sim: Option<f32>,
            lexical_sim: Option<f32>,
        }

        let mut candidates: HashMap<String, Candidate> = HashMap::new();
        for result in vector {
            candidates.insert(
                result.entry.id.clone(),
                Candidate {
                    entry: result.entry,
                    vector_sim: Some(result.similarity),
                    lexical_sim: None,
                },
            );
        }
        for result in lexical {
            match candidates.get_mut(&result.entry.id) {
                Some(candidate) => candidate.lexical_sim = Some(result.similarity),
                None => {
                    candidates.insert(
                        result.entry.id.clone(),
                        Candidate {
                            entry: result.entry,
                            vector_sim: None,
                            lexical_sim: Some(result.similarity),
                        },
                    );
                }
            }
        }

        let mut results: Vec<MemoryResult> = candidates
            .into_values()
            .filter_map(|candidate| {
                let similarity = match (candidate.vector_sim, candidate.lexical_sim) {
                    (Some(v), Some(l)) => (v + l) / 2.0,
                    (Some(v), None) => v,
                    (None, Some(l)) => l * LEXICAL_ONLY_BOOST,
                    (None, None) => return None,
                };
                if let Some(filters) = filters
                    && !filters.matches(&candidate.entry)
                {
                    return None;
                }
                Some(MemoryResult {
                    entry: candidate.entry,
                    similarity,
                    relevance_score: 0.0,
                })
            })
            .collect();

        scoring::score_and_rank(&mut results, Utc::now());
        results.truncate(limit);

        self.result_cache
            .lock()
            .await
            .insert(cache_key, results.clone());
        Ok(results)
    }

    /// Assemble the context handed to the downstream generator.
    ///
    /// Starts from the budgeted recent window; when budget remains, the
    /// newest query seeds a long-term retrieval whose results are
    /// prepended (marked `from_long_term_memory`) ahead of the window,
    /// skipping any that duplicate an interaction already present.
    pub async fn get_current_context(
        &self,
        max_tokens: usize,
    ) -> Result<ConversationContext, RecallError> {
        let mut context = self.context.get_context(max_tokens).await;
        if context.token_count >= max_tokens {
            return Ok(context);
        }
        let Some(query) = context.interactions.last().map(|i| i.query.clone()) else {
            return Ok(context);
        };

        let results = self
            .retrieve(&query, CONTEXT_RECALL_LIMIT, CONTEXT_RECALL_THRESHOLD)
            .await?;

        let mut remaining = max_tokens - context.token_count;
        let mut recalled: Vec<ContextInteraction> = Vec::new();
        for result in results {
            let already_present = context
                .interactions
                .iter()
                .chain(recalled.iter())
                .any(|i| i.query == result.entry.query && i.response == result.entry.response);
            if already_present {
                continue;
            }
            let interaction = ContextInteraction {
                query: result.entry.query,
                response: result.entry.response,
                timestamp: result.entry.created_at,
                from_long_term_memory: true,
            };
            let tokens = interaction.token_count();
            if tokens > remaining {
                break;
            }
            remaining -= tokens;
            recalled.push(interaction);
        }

        if !recalled.is_empty() {
            context.token_count += recalled
                .iter()
                .map(ContextInteraction::token_count)
                .sum::<usize>();
            recalled.append(&mut context.interactions);
            context.interactions = recalled;
        }
        Ok(context)
    }

    /// Compress the recent window through the summarizer and store the
    /// result as a high-importance summary entry.
    ///
    /// Summaries are durable only: they never feed back into the recent
    /// context window.
    pub async fn summarize_conversation(
        &self,
        max_tokens: usize,
    ) -> Result<ConversationSummary, RecallError> {
        let window = self.context.get_recent_window().await;
        if window.interactions.is_empty() {
            return Err(RecallError::Internal(
                "no interactions to summarize".to_string(),
            ));
        }

        let summary = self
            .summarizer
            .summarize(&window.interactions, max_tokens)
            .await?;
        let embedding = self.embed_cached(&summary.text).await?;
        let entry = MemoryEntry {
            id: Uuid::new_v4().to_string(),
            query: SUMMARY_QUERY_LABEL.to_string(),
            response: summary.text.clone(),
            embedding,
            category: MemoryCategory::Summary,
            importance: Importance::High,
            tags: summary.key_topics.iter().cloned().collect(),
            metadata: None,
            created_at: Utc::now(),
        };
        self.store.insert(&entry).await?;
        self.result_cache.lock().await.clear();
        debug!(topics = summary.key_topics.len(), "stored conversation summary");
        Ok(summary)
    }

    /// Delete old low-importance entries, then optimize. Returns the
    /// number of entries removed.
    pub async fn prune_memories(
        &self,
        older_than_days: i64,
        min_importance: Importance,
    ) -> Result<usize, RecallError> {
        let cutoff = Utc::now() - chrono::Duration::days(older_than_days);
        let removed = self.store.prune(cutoff, min_importance, None).await?;
        self.store.optimize().await?;
        if removed > 0 {
            self.result_cache.lock().await.clear();
        }
        info!(removed, older_than_days, "pruned memories");
        Ok(removed)
    }

    /// Clear the recent window and the result cache. The durable store is
    /// untouched.
    pub async fn clear_context(&self) {
        self.context.clear().await;
        self.result_cache.lock().await.clear();
    }

    /// Diagnostic counters for the downstream consumer.
    pub async fn statistics(&self) -> Result<MemoryServiceStatistics, RecallError> {
        let total_entries = self.store.count().await?;
        let stats = self.stats.lock().await;
        let lookups = stats.embedding_cache_hits + stats.embedding_cache_misses;
        Ok(MemoryServiceStatistics {
            total_entries,
            average_store_latency_ms: if stats.store_calls == 0 {
                0.0
            } else {
                stats.store_latency_total_ms / stats.store_calls as f64
            },
            average_retrieve_latency_ms: if stats.retrieve_calls == 0 {
                0.0
            } else {
                stats.retrieve_latency_total_ms / stats.retrieve_calls as f64
            },
            cache_hit_rate: if lookups == 0 {
                0.0
            } else {
                stats.embedding_cache_hits as f64 / lookups as f64
            },
            last_optimization: stats.last_optimization,
        })
    }

    /// The recent-window manager, for surfaces that need direct window
    /// queries (recent window, date ranges, window statistics).
    pub fn context(&self) -> &ContextManager {
        &self.context
    }

    /// Stop the periodic maintenance loop. Idempotent.
    pub async fn shutdown(&self) {
        if let Some(task) = self.maintenance.lock().await.take() {
            task.stop().await;
            debug!("memory service shut down");
        }
    }

    /// Embed through the text -> vector cache. Identical text never
    /// reaches the provider twice within the cache's lifetime.
    async fn embed_cached(&self, text: &str) -> Result<Vec<f32>, RecallError> {
        let key = text.to_string();
        if let Some(vector) = self.embedding_cache.lock().await.get(&key) {
            self.stats.lock().await.embedding_cache_hits += 1;
            return Ok(vector);
        }
        self.stats.lock().await.embedding_cache_misses += 1;

        let vector = self.embedder.embed(text).await?;
        if vector.len() != self.memory_config.embedding_dimension {
            return Err(RecallError::Embedding {
                message: format!(
                    "provider returned {} dimensions, expected {}",
                    vector.len(),
                    self.memory_config.embedding_dimension
                ),
                source: None,
            });
        }
        self.embedding_cache.lock().await.insert(key, vector.clone());
        Ok(vector)
    }

    async fn record_retrieve(&self, started: Instant) {
        let mut stats = self.stats.lock().await;
        stats.retrieve_calls += 1;
        stats.retrieve_latency_total_ms += started.elapsed().as_secs_f64() * 1000.0;
    }
}
