// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Orchestration layer of the Recall memory engine.
//!
//! Ties the durable store, the recent-context window, and the external
//! collaborators together behind one public API.
//!
//! ## Architecture
//!
//! - **MemoryService**: public API; embeds, writes, retrieves, assembles
//!   context, schedules maintenance
//! - **LruCache**: fixed-capacity cache backing the embedding and
//!   query-result caches
//! - **scoring**: relevance formula (similarity + recency + importance)
//! - **maintenance**: cancellable background optimization and pruning

pub mod cache;
pub mod maintenance;
pub mod scoring;
pub mod service;

pub use cache::LruCache;
pub use scoring::{relevance_score, score_and_rank};
pub use service::{EntryAttributes, MemoryService, SearchFilters};
