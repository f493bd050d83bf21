// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background maintenance: store optimization and stale-summary pruning.
//!
//! Runs on a fixed wall-clock period plus a one-shot cycle scheduled every
//! Nth store. Cycles never block foreground calls, every error is logged
//! and swallowed (the next cycle retries), and the periodic loop carries a
//! [`CancellationToken`] so orchestrator shutdown leaves no task behind.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use recall_core::{Importance, MemoryCategory};
use recall_storage::EntryStore;

use crate::service::StatsInner;

/// Handle to the periodic maintenance loop.
pub(crate) struct MaintenanceTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl MaintenanceTask {
    /// Spawn the periodic loop. Must be called within a tokio runtime.
    pub(crate) fn spawn(
        store: EntryStore,
        prune_older_than_days: i64,
        prune_min_importance: Importance,
        period: Duration,
        stats: Arc<Mutex<StatsInner>>,
    ) -> Self {
        let token = CancellationToken::new();
        let loop_token = token.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => {
                        debug!("maintenance loop stopped");
                        break;
                    }
                    _ = tokio::time::sleep(period) => {
                        run_cycle(&store, prune_older_than_days, prune_min_importance, &stats)
                            .await;
                    }
                }
            }
        });
        Self { token, handle }
    }

    /// Cancel the loop and wait for it to exit.
    pub(crate) async fn stop(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}

/// One maintenance cycle: optimize the store, then prune stale
/// summary-category entries. Errors are logged and swallowed; this path
/// must never fail a foreground caller or crash the process.
pub(crate) async fn run_cycle(
    store: &EntryStore,
    prune_older_than_days: i64,
    prune_min_importance: Importance,
    stats: &Arc<Mutex<StatsInner>>,
) {
    if let Err(error) = store.optimize().await {
        warn!(%error, "store optimization failed");
    }

    let cutoff = Utc::now() - chrono::Duration::days(prune_older_than_days);
    match store
        .prune(cutoff, prune_min_importance, Some(MemoryCategory::Summary))
        .await
    {
        Ok(removed) => {
            if removed > 0 {
                debug!(removed, "pruned stale summaries");
            }
        }
        Err(error) => warn!(%error, "stale-summary prune failed"),
    }

    stats.lock().await.last_optimization = Some(Utc::now());
}
