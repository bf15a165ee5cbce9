//! Concurrent per-conversation budget tracking and history truncation.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use helix_config::BudgetConfig;
use helix_core::message::{Message, Role};
use helix_core::ConversationId;

use crate::BudgetError;
use crate::estimate::SizeEstimator;
use crate::model::*;

/// Tracks cumulative estimated size per conversation.
///
/// Backed by a sharded concurrent map so that updates to different
/// conversations never contend. Each `update` runs under the entry's shard
/// lock, so concurrent updates to the same conversation never lose writes.
pub struct BudgetManager {
    estimator: SizeEstimator,
    thresholds: BudgetThresholds,
    /// Records idle for at least this long are removed by `sweep_idle`.
    idle_ttl: chrono::Duration,
    records: DashMap<ConversationId, ConversationBudget>,
}

impl BudgetManager {
    pub fn new(thresholds: BudgetThresholds, estimator: SizeEstimator) -> Result<Self, BudgetError> {
        thresholds.validate()?;
        Ok(Self {
            estimator,
            thresholds,
            idle_ttl: chrono::Duration::hours(24),
            records: DashMap::new(),
        })
    }

    pub fn from_config(config: &BudgetConfig) -> Result<Self, BudgetError> {
        // Capped at roughly a century to stay inside chrono's range.
        let idle_hours = config.idle_ttl_hours.min(876_000) as i64;
        Ok(Self::new(
            BudgetThresholds::from(config),
            SizeEstimator::new(config.word_weight, config.char_weight),
        )?
        .with_idle_ttl(chrono::Duration::hours(idle_hours)))
    }

    pub fn with_idle_ttl(mut self, idle_ttl: chrono::Duration) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    pub fn thresholds(&self) -> &BudgetThresholds {
        &self.thresholds
    }

    pub fn estimator(&self) -> &SizeEstimator {
        &self.estimator
    }

    // ── Accounting ────────────────────────────────────────────────────

    pub fn estimate_size(&self, text: &str) -> u64 {
        self.estimator.estimate(text)
    }

    /// Record one exchange (input + output) against a conversation,
    /// creating the record on first use.
    pub fn update(&self, conversation_id: &ConversationId, input: &str, output: &str) -> UsageUpdate {
        let added = self.estimator.estimate(input) + self.estimator.estimate(output);

        let mut record = self
            .records
            .entry(conversation_id.clone())
            .or_insert_with(|| ConversationBudget::new(conversation_id.clone()));

        let before = self.thresholds.band_for(record.cumulative_estimated_size);
        record.cumulative_estimated_size = record.cumulative_estimated_size.saturating_add(added);
        record.message_count += 2;
        record.last_updated = Utc::now();
        let after = self.thresholds.band_for(record.cumulative_estimated_size);

        let update = UsageUpdate {
            conversation_id: conversation_id.clone(),
            added,
            cumulative: record.cumulative_estimated_size,
            message_count: record.message_count,
            status: after,
        };
        drop(record);

        if after != before {
            match after {
                BudgetBand::Ok => {}
                BudgetBand::Warning => tracing::info!(
                    conversation = %conversation_id,
                    used = update.cumulative,
                    ceiling = self.thresholds.ceiling,
                    "Conversation entered warning band"
                ),
                BudgetBand::Critical | BudgetBand::Exceeded => tracing::warn!(
                    conversation = %conversation_id,
                    band = %after,
                    used = update.cumulative,
                    ceiling = self.thresholds.ceiling,
                    "Conversation budget running out"
                ),
            }
        }

        update
    }

    /// Limit report for a conversation. Unknown conversations report zero
    /// usage.
    pub fn check_limits(&self, conversation_id: &ConversationId) -> LimitStatus {
        let used = self
            .records
            .get(conversation_id)
            .map(|r| r.cumulative_estimated_size)
            .unwrap_or(0);
        self.thresholds.status(used)
    }

    // ── Truncation ────────────────────────────────────────────────────

    /// Sliding-window truncation.
    ///
    /// Keeps a leading system message (if any) plus the longest suffix of
    /// the remaining messages whose estimated size fits in `target`. Order
    /// is preserved. A history that already fits is returned unchanged, so
    /// applying this twice with the same target is the same as once.
    pub fn truncate(&self, history: &[Message], target: u64) -> Vec<Message> {
        if self.estimator.estimate_messages(history) <= target {
            return history.to_vec();
        }

        let (system, rest) = match history.split_first() {
            Some((first, rest)) if first.role == Role::System => (Some(first), rest),
            _ => (None, history),
        };

        let mut remaining = target;
        if let Some(system) = system {
            remaining = remaining.saturating_sub(self.estimator.estimate_message(system));
        }

        let mut keep_from = rest.len();
        for (idx, message) in rest.iter().enumerate().rev() {
            let cost = self.estimator.estimate_message(message);
            if cost > remaining {
                break;
            }
            remaining -= cost;
            keep_from = idx;
        }

        system
            .into_iter()
            .chain(rest[keep_from..].iter())
            .cloned()
            .collect()
    }

    /// Target size for history when a conversation is over budget, or
    /// `None` when no truncation is needed.
    ///
    /// The target is the smaller of the optimal band and a fraction of the
    /// history's own size: half in the critical band, a quarter once the
    /// ceiling is exceeded.
    pub fn truncation_target(&self, status: &LimitStatus, history: &[Message]) -> Option<u64> {
        if !status.should_truncate {
            return None;
        }
        let history_size = self.estimator.estimate_messages(history);
        let fraction_target = match status.status {
            BudgetBand::Exceeded => history_size / 4,
            _ => history_size / 2,
        };
        Some(self.thresholds.optimal_size().min(fraction_target))
    }

    /// Check a conversation's limits and, if required, shrink `history`.
    ///
    /// Returns the history to send and the number of messages dropped.
    pub fn prepare_history(
        &self,
        conversation_id: &ConversationId,
        history: &[Message],
    ) -> (Vec<Message>, usize) {
        let status = self.check_limits(conversation_id);
        let Some(target) = self.truncation_target(&status, history) else {
            return (history.to_vec(), 0);
        };

        let truncated = self.truncate(history, target);
        let dropped = history.len() - truncated.len();
        if dropped > 0 {
            tracing::info!(
                conversation = %conversation_id,
                band = %status.status,
                target,
                dropped,
                kept = truncated.len(),
                "Truncated conversation history"
            );
        }
        (truncated, dropped)
    }

    // ── Record management ─────────────────────────────────────────────

    pub fn get(&self, conversation_id: &ConversationId) -> Option<ConversationBudget> {
        self.records.get(conversation_id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn remove(&self, conversation_id: &ConversationId) -> bool {
        self.records.remove(conversation_id).is_some()
    }

    /// Drop records that have not been updated for at least the idle TTL.
    /// Returns how many were removed.
    pub fn sweep_idle(&self, now: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records
            .retain(|_, record| now.signed_duration_since(record.last_updated) < self.idle_ttl);
        before.saturating_sub(self.records.len())
    }
}

impl Default for BudgetManager {
    fn default() -> Self {
        Self {
            estimator: SizeEstimator::default(),
            thresholds: BudgetThresholds::default(),
            idle_ttl: chrono::Duration::hours(24),
            records: DashMap::new(),
        }
    }
}
