// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable entry store: SQLite rows with BLOB vectors, FTS5/BM25 lexical
//! search, bounded-window cosine vector search, and predicate pruning.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::params;
use tracing::debug;

use recall_core::{Importance, MemoryCategory, MemoryEntry, MemoryResult, RecallError};

use crate::database::{Database, storage_err};
use crate::vector::{blob_to_vec, cosine_similarity, vec_to_blob};

const ENTRY_COLUMNS: &str =
    "id, query, response, embedding, category, importance, tags, metadata, created_at";

/// Persistent store for memory entries.
///
/// Rows and their FTS index move together: sync triggers fire inside the
/// same statement transaction as the row change, so an insert either
/// lands in both or in neither. All calls go through the single
/// background writer thread owned by [`Database`].
#[derive(Clone)]
pub struct EntryStore {
    conn: tokio_rusqlite::Connection,
    dimension: usize,
    scan_limit: usize,
}

impl EntryStore {
    /// Creates a store over an opened database.
    ///
    /// `dimension` is the fixed embedding length accepted for inserts;
    /// `scan_limit` bounds the vector-search window to that many
    /// most-recently-inserted rows.
    pub fn new(db: &Database, dimension: usize, scan_limit: usize) -> Self {
        Self {
            conn: db.connection().clone(),
            dimension,
            scan_limit,
        }
    }

    /// Persist one entry. Row and FTS index update atomically.
    pub async fn insert(&self, entry: &MemoryEntry) -> Result<(), RecallError> {
        let row = self.encode_row(entry)?;
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO memory_entries (id, query, response, embedding, category, importance, tags, metadata, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        row.id,
                        row.query,
                        row.response,
                        row.embedding,
                        row.category,
                        row.importance,
                        row.tags,
                        row.metadata,
                        row.created_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Persist a batch of entries inside a single transaction.
    /// All rows land or none do.
    pub async fn batch_insert(&self, entries: &[MemoryEntry]) -> Result<(), RecallError> {
        if entries.is_empty() {
            return Ok(());
        }
        let rows = entries
            .iter()
            .map(|entry| self.encode_row(entry))
            .collect::<Result<Vec<_>, _>>()?;
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO memory_entries (id, query, response, embedding, category, importance, tags, metadata, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    )?;
                    for row in &rows {
                        stmt.execute(params![
                            row.id,
                            row.query,
                            row.response,
                            row.embedding,
                            row.category,
                            row.importance,
                            row.tags,
                            row.metadata,
                            row.created_at,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Cosine-similarity search over the scan window.
    ///
    /// Scans the embeddings of the `scan_limit` most-recently-inserted
    /// rows (recency-biased approximate top-K, not full-corpus), keeps
    /// those with similarity >= `threshold`, and returns up to `limit`
    /// full entries sorted by similarity descending. Rows whose stored
    /// vector length differs from the query's are skipped.
    pub async fn vector_search(
        &self,
        query: &[f32],
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<MemoryResult>, RecallError> {
        let query_vec = query.to_vec();
        let scan_limit = self.scan_limit as i64;
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, embedding FROM memory_entries ORDER BY rowid DESC LIMIT ?1",
                )?;
                let candidates = stmt
                    .query_map([scan_limit], |row| {
                        let id: String = row.get(0)?;
                        let blob: Vec<u8> = row.get(1)?;
                        Ok((id, blob_to_vec(&blob)))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                let mut scored: Vec<(String, f32)> = candidates
                    .into_iter()
                    .filter_map(|(id, embedding)| {
                        if embedding.len() != query_vec.len() {
                            return None;
                        }
                        let similarity = cosine_similarity(&query_vec, &embedding);
                        (similarity >= threshold).then_some((id, similarity))
                    })
                    .collect();
                scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                scored.truncate(limit);

                if scored.is_empty() {
                    return Ok(Vec::new());
                }

                let placeholders: Vec<String> =
                    (1..=scored.len()).map(|i| format!("?{i}")).collect();
                let sql = format!(
                    "SELECT {ENTRY_COLUMNS} FROM memory_entries WHERE id IN ({})",
                    placeholders.join(", ")
                );
                let mut by_id = HashMap::new();
                {
                    let mut stmt = conn.prepare(&sql)?;
                    let ids: Vec<&dyn rusqlite::types::ToSql> = scored
                        .iter()
                        .map(|(id, _)| id as &dyn rusqlite::types::ToSql)
                        .collect();
                    for row in stmt.query_map(ids.as_slice(), row_to_entry)? {
                        let entry = row?;
                        by_id.insert(entry.id.clone(), entry);
                    }
                }

                let results = scored
                    .into_iter()
                    .filter_map(|(id, similarity)| {
                        by_id.remove(&id).map(|entry| MemoryResult {
                            entry,
                            similarity,
                            relevance_score: 0.0,
                        })
                    })
                    .collect();
                Ok(results)
            })
            .await
            .map_err(storage_err)
    }

    /// Stemmed keyword search over `query`+`response` via FTS5, ranked by
    /// BM25. The BM25 rank r becomes pseudo-similarity `1/(1+|r|)` so it
    /// composes with vector scores downstream.
    pub async fn lexical_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemoryResult>, RecallError> {
        let Some(match_expr) = fts_match_expr(query) else {
            return Ok(Vec::new());
        };
        let limit = limit as i64;
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT m.id, m.query, m.response, m.embedding, m.category, m.importance, m.tags, m.metadata, m.created_at,
                            bm25(memory_entries_fts) AS rank
                     FROM memory_entries_fts
                     JOIN memory_entries m ON m.rowid = memory_entries_fts.rowid
                     WHERE memory_entries_fts MATCH ?1
                     ORDER BY bm25(memory_entries_fts)
                     LIMIT ?2",
                )?;
                let results = stmt
                    .query_map(params![match_expr, limit], |row| {
                        let entry = row_to_entry(row)?;
                        let rank: f64 = row.get(9)?;
                        Ok(MemoryResult {
                            entry,
                            similarity: (1.0 / (1.0 + rank.abs())) as f32,
                            relevance_score: 0.0,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(results)
            })
            .await
            .map_err(storage_err)
    }

    /// Delete all entries with `created_at < older_than` and importance
    /// strictly below `min_importance` (and matching `category` if given).
    /// Returns the number of rows removed.
    pub async fn prune(
        &self,
        older_than: DateTime<Utc>,
        min_importance: Importance,
        category: Option<MemoryCategory>,
    ) -> Result<usize, RecallError> {
        let below = min_importance.levels_below();
        if below.is_empty() {
            // Nothing is strictly below Low.
            return Ok(0);
        }
        let importance_list = below
            .iter()
            .map(|level| format!("'{level}'"))
            .collect::<Vec<_>>()
            .join(", ");
        let cutoff = format_timestamp(older_than);
        let removed = self
            .conn
            .call(move |conn| {
                let removed = match category {
                    Some(category) => conn.execute(
                        &format!(
                            "DELETE FROM memory_entries
                             WHERE created_at < ?1 AND importance IN ({importance_list}) AND category = ?2"
                        ),
                        params![cutoff, category.as_str()],
                    )?,
                    None => conn.execute(
                        &format!(
                            "DELETE FROM memory_entries
                             WHERE created_at < ?1 AND importance IN ({importance_list})"
                        ),
                        params![cutoff],
                    )?,
                };
                Ok(removed)
            })
            .await
            .map_err(storage_err)?;
        debug!(removed, "pruned entries");
        Ok(removed)
    }

    /// Rebuild the FTS index structure, checkpoint the WAL, and let SQLite
    /// re-analyze. Pure maintenance; never required for correctness.
    pub async fn optimize(&self) -> Result<(), RecallError> {
        self.conn
            .call(|conn| {
                conn.execute(
                    "INSERT INTO memory_entries_fts(memory_entries_fts) VALUES('optimize')",
                    [],
                )?;
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE); PRAGMA optimize;")?;
                Ok(())
            })
            .await
            .map_err(storage_err)?;
        debug!("store optimized");
        Ok(())
    }

    /// Total number of stored entries.
    pub async fn count(&self) -> Result<i64, RecallError> {
        self.conn
            .call(|conn| {
                let count =
                    conn.query_row("SELECT COUNT(*) FROM memory_entries", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
            .map_err(storage_err)
    }

    fn encode_row(&self, entry: &MemoryEntry) -> Result<EncodedRow, RecallError> {
        if entry.embedding.len() != self.dimension {
            return Err(RecallError::Internal(format!(
                "entry {} has embedding length {}, store dimension is {}",
                entry.id,
                entry.embedding.len(),
                self.dimension
            )));
        }
        let tags = serde_json::to_string(&entry.tags)
            .map_err(|e| RecallError::Internal(format!("failed to encode tags: {e}")))?;
        let metadata = entry
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RecallError::Internal(format!("failed to encode metadata: {e}")))?;
        Ok(EncodedRow {
            id: entry.id.clone(),
            query: entry.query.clone(),
            response: entry.response.clone(),
            embedding: vec_to_blob(&entry.embedding),
            category: entry.category.as_str(),
            importance: entry.importance.as_str(),
            tags,
            metadata,
            created_at: format_timestamp(entry.created_at),
        })
    }
}

/// An entry flattened into SQLite column values.
struct EncodedRow {
    id: String,
    query: String,
    response: String,
    embedding: Vec<u8>,
    category: &'static str,
    importance: &'static str,
    tags: String,
    metadata: Option<String>,
    created_at: String,
}

/// RFC 3339 with millisecond precision and a `Z` suffix; matches the
/// schema default so timestamps compare lexicographically.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Sanitize user text into an FTS5 MATCH expression.
///
/// Each whitespace token is double-quoted (with embedded quotes stripped)
/// and terms are OR-joined, so FTS5 operators never leak in from user
/// input. Returns `None` when no usable token remains.
fn fts_match_expr(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|token| token.replace('"', ""))
        .filter(|token| !token.is_empty())
        .map(|token| format!("\"{token}\""))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

/// Convert a rusqlite row (ENTRY_COLUMNS order) into a MemoryEntry.
fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<MemoryEntry> {
    use rusqlite::types::Type;

    let embedding_blob: Vec<u8> = row.get(3)?;
    let category: String = row.get(4)?;
    let importance: String = row.get(5)?;
    let tags_json: String = row.get(6)?;
    let tags = serde_json::from_str(&tags_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e))
    })?;
    let metadata_json: Option<String> = row.get(7)?;
    let metadata = metadata_json
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;
    let created_at_raw: String = row.get(8)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(MemoryEntry {
        id: row.get(0)?,
        query: row.get(1)?,
        response: row.get(2)?,
        embedding: blob_to_vec(&embedding_blob),
        category: MemoryCategory::from_str_value(&category),
        importance: Importance::from_str_value(&importance),
        tags,
        metadata,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::BTreeSet;

    const DIM: usize = 4;

    async fn setup_store(scan_limit: usize) -> EntryStore {
        let db = Database::open_in_memory().await.unwrap();
        EntryStore::new(&db, DIM, scan_limit)
    }

    fn make_entry(id: &str, query: &str, response: &str, embedding: Vec<f32>) -> MemoryEntry {
        MemoryEntry {
            id: id.to_string(),
            query: query.to_string(),
            response: response.to_string(),
            embedding,
            category: MemoryCategory::General,
            importance: Importance::Medium,
            tags: BTreeSet::new(),
            metadata: None,
            created_at: Utc::now(),
        }
    }

    fn aged(mut entry: MemoryEntry, days_ago: i64) -> MemoryEntry {
        entry.created_at = Utc::now() - Duration::days(days_ago);
        entry
    }

    #[tokio::test]
    async fn insert_and_count() {
        let store = setup_store(100).await;
        store
            .insert(&make_entry("e1", "hello", "world", vec![0.1; DIM]))
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn insert_rejects_wrong_dimension() {
        let store = setup_store(100).await;
        let bad = make_entry("e1", "q", "r", vec![0.1; DIM + 1]);
        assert!(store.insert(&bad).await.is_err());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn insert_roundtrips_all_fields() {
        let store = setup_store(100).await;
        let mut entry = make_entry("e1", "favorite color?", "It is teal.", vec![0.5; DIM]);
        entry.category = MemoryCategory::Preference;
        entry.importance = Importance::High;
        entry.tags = BTreeSet::from(["color".to_string(), "style".to_string()]);
        entry.metadata = Some(serde_json::json!({"channel": "cli"}));
        store.insert(&entry).await.unwrap();

        let results = store.vector_search(&[0.5; DIM], 1, 0.9).await.unwrap();
        assert_eq!(results.len(), 1);
        let found = &results[0].entry;
        assert_eq!(found.id, "e1");
        assert_eq!(found.query, "favorite color?");
        assert_eq!(found.response, "It is teal.");
        assert_eq!(found.category, MemoryCategory::Preference);
        assert_eq!(found.importance, Importance::High);
        assert!(found.tags.contains("color"));
        assert_eq!(
            found.metadata.as_ref().unwrap()["channel"],
            serde_json::json!("cli")
        );
        assert_eq!(found.embedding.len(), DIM);
    }

    #[tokio::test]
    async fn batch_insert_is_atomic() {
        let store = setup_store(100).await;
        let batch = vec![
            make_entry("e1", "a", "b", vec![0.1; DIM]),
            make_entry("e2", "c", "d", vec![0.2; DIM]),
            // Duplicate primary key forces the transaction to fail.
            make_entry("e1", "e", "f", vec![0.3; DIM]),
        ];
        assert!(store.batch_insert(&batch).await.is_err());
        assert_eq!(store.count().await.unwrap(), 0);

        let good = vec![
            make_entry("e1", "a", "b", vec![0.1; DIM]),
            make_entry("e2", "c", "d", vec![0.2; DIM]),
        ];
        store.batch_insert(&good).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn batch_insert_empty_is_noop() {
        let store = setup_store(100).await;
        store.batch_insert(&[]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn vector_search_orders_by_similarity() {
        let store = setup_store(100).await;
        store
            .insert(&make_entry("far", "q1", "r1", vec![0.0, 1.0, 0.0, 0.0]))
            .await
            .unwrap();
        store
            .insert(&make_entry("near", "q2", "r2", vec![1.0, 0.0, 0.0, 0.0]))
            .await
            .unwrap();
        store
            .insert(&make_entry("mid", "q3", "r3", vec![1.0, 1.0, 0.0, 0.0]))
            .await
            .unwrap();

        let results = store
            .vector_search(&[1.0, 0.0, 0.0, 0.0], 10, -1.0)
            .await
            .unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.entry.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn vector_search_respects_threshold_and_limit() {
        let store = setup_store(100).await;
        store
            .insert(&make_entry("a", "q", "r", vec![1.0, 0.0, 0.0, 0.0]))
            .await
            .unwrap();
        store
            .insert(&make_entry("b", "q", "r", vec![0.0, 1.0, 0.0, 0.0]))
            .await
            .unwrap();

        let results = store
            .vector_search(&[1.0, 0.0, 0.0, 0.0], 10, 0.5)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entry.id, "a");

        let capped = store
            .vector_search(&[1.0, 0.0, 0.0, 0.0], 1, -1.0)
            .await
            .unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn vector_search_scans_recent_window_only() {
        let store = setup_store(2).await;
        // Oldest entry matches the query exactly but falls outside the
        // two-row scan window.
        store
            .insert(&make_entry("oldest", "q", "r", vec![1.0, 0.0, 0.0, 0.0]))
            .await
            .unwrap();
        store
            .insert(&make_entry("mid", "q", "r", vec![0.0, 1.0, 0.0, 0.0]))
            .await
            .unwrap();
        store
            .insert(&make_entry("newest", "q", "r", vec![0.0, 0.0, 1.0, 0.0]))
            .await
            .unwrap();

        let results = store
            .vector_search(&[1.0, 0.0, 0.0, 0.0], 10, -1.0)
            .await
            .unwrap();
        assert!(results.iter().all(|r| r.entry.id != "oldest"));
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn lexical_search_finds_stemmed_terms() {
        let store = setup_store(100).await;
        store
            .insert(&make_entry(
                "e1",
                "Do you like running?",
                "I run every morning.",
                vec![0.1; DIM],
            ))
            .await
            .unwrap();

        // Porter stemming folds "runs" / "running" / "run" together.
        let results = store.lexical_search("runs", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entry.id, "e1");
    }

    #[tokio::test]
    async fn lexical_search_pseudo_similarity_in_unit_range() {
        let store = setup_store(100).await;
        store
            .insert(&make_entry(
                "e1",
                "golden retriever",
                "A friendly dog breed.",
                vec![0.1; DIM],
            ))
            .await
            .unwrap();

        let results = store.lexical_search("golden retriever", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        let similarity = results[0].similarity;
        assert!(similarity > 0.0 && similarity <= 1.0, "got {similarity}");
    }

    #[tokio::test]
    async fn lexical_search_no_match_returns_empty() {
        let store = setup_store(100).await;
        store
            .insert(&make_entry("e1", "pizza", "yum", vec![0.1; DIM]))
            .await
            .unwrap();
        let results = store.lexical_search("quantum physics", 10).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn lexical_search_blank_query_returns_empty() {
        let store = setup_store(100).await;
        let results = store.lexical_search("   ", 10).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn lexical_search_survives_fts_operators() {
        let store = setup_store(100).await;
        store
            .insert(&make_entry("e1", "notes", "nothing", vec![0.1; DIM]))
            .await
            .unwrap();
        // Raw FTS5 syntax in user input must not produce a query error.
        for hostile in ["AND OR NOT", "\"unbalanced", "col:value", "a NEAR(b)"] {
            let _ = store.lexical_search(hostile, 10).await.unwrap();
        }
    }

    #[tokio::test]
    async fn prune_removes_old_low_importance_entries() {
        let store = setup_store(100).await;
        let mut old_low = aged(make_entry("old-low", "q", "r", vec![0.1; DIM]), 60);
        old_low.importance = Importance::Low;
        let mut old_high = aged(make_entry("old-high", "q", "r", vec![0.1; DIM]), 60);
        old_high.importance = Importance::High;
        let mut fresh_low = make_entry("fresh-low", "q", "r", vec![0.1; DIM]);
        fresh_low.importance = Importance::Low;

        store
            .batch_insert(&[old_low, old_high, fresh_low])
            .await
            .unwrap();

        let cutoff = Utc::now() - Duration::days(30);
        let removed = store.prune(cutoff, Importance::High, None).await.unwrap();
        // Only old-low is both older than the cutoff and below High.
        assert_eq!(removed, 1);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn prune_with_category_filter() {
        let store = setup_store(100).await;
        let mut summary = aged(make_entry("s", "q", "r", vec![0.1; DIM]), 60);
        summary.category = MemoryCategory::Summary;
        summary.importance = Importance::Low;
        let mut fact = aged(make_entry("f", "q", "r", vec![0.1; DIM]), 60);
        fact.category = MemoryCategory::Fact;
        fact.importance = Importance::Low;
        store.batch_insert(&[summary, fact]).await.unwrap();

        let cutoff = Utc::now() - Duration::days(30);
        let removed = store
            .prune(cutoff, Importance::High, Some(MemoryCategory::Summary))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn prune_at_low_threshold_removes_nothing() {
        let store = setup_store(100).await;
        let mut entry = aged(make_entry("e", "q", "r", vec![0.1; DIM]), 365);
        entry.importance = Importance::Low;
        store.insert(&entry).await.unwrap();

        let removed = store
            .prune(Utc::now(), Importance::Low, None)
            .await
            .unwrap();
        assert_eq!(removed, 0);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn optimize_is_safe_to_run() {
        let store = setup_store(100).await;
        store
            .insert(&make_entry("e1", "q", "r", vec![0.1; DIM]))
            .await
            .unwrap();
        store.optimize().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[test]
    fn fts_match_expr_quotes_and_joins() {
        assert_eq!(
            fts_match_expr("golden retriever"),
            Some("\"golden\" OR \"retriever\"".to_string())
        );
        assert_eq!(fts_match_expr("a\"b"), Some("\"ab\"".to_string()));
        assert_eq!(fts_match_expr("  "), None);
        assert_eq!(fts_match_expr("\" \""), None);
    }
}
