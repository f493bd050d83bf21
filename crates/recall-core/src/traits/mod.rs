// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits implemented outside the memory engine.

pub mod embedding;
pub mod summarizer;

pub use embedding::EmbeddingProvider;
pub use summarizer::Summarizer;
