// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relevance scoring: a weighted combination of similarity, recency, and
//! importance used to rank retrieved entries.

use chrono::{DateTime, Utc};

use recall_core::{MemoryCategory, MemoryEntry, MemoryResult};

/// Weight of the (merged) similarity component.
pub const SIMILARITY_WEIGHT: f32 = 0.6;
/// Weight of the recency component.
pub const RECENCY_WEIGHT: f32 = 0.2;
/// Weight of the importance component.
pub const IMPORTANCE_WEIGHT: f32 = 0.1;
/// Flat bonus for entries in the `important` category.
pub const IMPORTANT_CATEGORY_BONUS: f32 = 0.1;
/// Exponential recency decay constant, in days.
pub const RECENCY_DECAY_DAYS: f32 = 30.0;

const SECONDS_PER_DAY: f32 = 86_400.0;

/// Score one entry against its similarity at the given instant.
///
/// `relevance = similarity*0.6 + recency*0.2 + importance_weight*0.1`,
/// with `recency = exp(-days_since_created/30)`, plus a flat 0.1 for
/// important-category entries; the result is capped at 1.0.
pub fn relevance_score(entry: &MemoryEntry, similarity: f32, now: DateTime<Utc>) -> f32 {
    let days_since_created =
        (now - entry.created_at).num_seconds().max(0) as f32 / SECONDS_PER_DAY;
    let recency = (-days_since_created / RECENCY_DECAY_DAYS).exp();
    let mut score = similarity * SIMILARITY_WEIGHT
        + recency * RECENCY_WEIGHT
        + entry.importance.weight() * IMPORTANCE_WEIGHT;
    if entry.category == MemoryCategory::Important {
        score += IMPORTANT_CATEGORY_BONUS;
    }
    score.min(1.0)
}

/// Fill in `relevance_score` for every result and sort descending.
pub fn score_and_rank(results: &mut [MemoryResult], now: DateTime<Utc>) {
    for result in results.iter_mut() {
        result.relevance_score = relevance_score(&result.entry, result.similarity, now);
    }
    results.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
