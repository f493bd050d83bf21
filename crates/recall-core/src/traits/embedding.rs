// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding provider trait for text vectorization.

use async_trait::async_trait;

use crate::error::RecallError;

/// Converts text into fixed-length vectors for semantic search.
///
/// Implementations must be deterministic for a given text and model
/// version: the engine caches vectors by exact input text and treats a
/// cached vector as interchangeable with a fresh one.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text into a vector of [`dimension`](Self::dimension)
    /// elements. A failing call must surface an error, never a partial or
    /// empty vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RecallError>;

    /// The fixed output dimension of this provider.
    fn dimension(&self) -> usize;
}
