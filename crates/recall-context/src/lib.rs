// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recent-context window for the Recall memory engine.
//!
//! Holds a bounded, serialized, append-only log of the session's recent
//! interactions and answers budgeted and unbudgeted context queries. The
//! window is populated in parallel with the durable store on every write
//! and is intentionally lost on restart.

pub mod manager;

pub use manager::{ContextManager, ContextStatistics};
