// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Recall memory engine.
//!
//! This crate provides the domain types, error taxonomy, and collaborator
//! trait definitions shared across the Recall workspace. The storage,
//! context, and orchestration crates all build on what is defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::RecallError;
pub use traits::{EmbeddingProvider, Summarizer};
pub use types::{
    ContextInteraction, ContextMessage, ConversationContext, ConversationSummary, Importance,
    MemoryCategory, MemoryEntry, MemoryResult, MemoryServiceStatistics,
};
