// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Recall memory engine.

use thiserror::Error;

/// The primary error type used across all Recall crates.
#[derive(Debug, Error)]
pub enum RecallError {
    /// Configuration errors (invalid TOML, out-of-range limits, dimension
    /// mismatches). Raised at construction, before any operation is accepted.
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage errors (database open, statement prepare/execute, corruption).
    /// Fatal for the triggering call; never silently retried.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Embedding provider errors. The in-flight store/retrieve/search fails
    /// entirely; nothing partial is persisted or cached.
    #[error("embedding error: {message}")]
    Embedding {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Summarizer collaborator errors.
    #[error("summarizer error: {message}")]
    Summarizer {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RecallError {
    /// Wrap an arbitrary error as a storage error.
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        RecallError::Storage {
            source: Box::new(source),
        }
    }

    /// Build an embedding error from a plain message.
    pub fn embedding(message: impl Into<String>) -> Self {
        RecallError::Embedding {
            message: message.into(),
            source: None,
        }
    }
}
