//! Background removal of idle conversation records.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::manager::BudgetManager;

/// Periodically calls [`BudgetManager::sweep_idle`] until cancelled.
pub struct BudgetSweeper {
    manager: Arc<BudgetManager>,
    interval: Duration,
}

impl BudgetSweeper {
    pub fn new(manager: Arc<BudgetManager>, interval: Duration) -> Self {
        Self {
            manager,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Spawn the sweep loop. The first sweep runs immediately; the returned
    /// handle resolves once `cancel` fires.
    pub fn start(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(
                interval_secs = self.interval.as_secs(),
                "Budget sweeper started"
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Budget sweeper shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let removed = self.manager.sweep_idle(chrono::Utc::now());
                        if removed > 0 {
                            tracing::debug!(
                                removed,
                                remaining = self.manager.len(),
                                "Swept idle conversation budgets"
                            );
                        }
                    }
                }
            }
        })
    }
}
