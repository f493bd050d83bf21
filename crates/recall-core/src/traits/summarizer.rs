// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Summarizer trait for conversation compression.

use async_trait::async_trait;

use crate::error::RecallError;
use crate::types::{ContextInteraction, ConversationSummary};

/// Compresses a sequence of interactions into a short summary.
///
/// Used only by `summarize_conversation`; the engine stores the result as
/// a summary-category entry and never feeds it back into the recent
/// context window.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `interactions` into at most roughly `max_tokens` tokens.
    async fn summarize(
        &self,
        interactions: &[ContextInteraction],
        max_tokens: usize,
    ) -> Result<ConversationSummary, RecallError>;
}
