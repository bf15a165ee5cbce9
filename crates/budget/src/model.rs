//! Data model for conversation budgets, budget bands and limit reports.

use chrono::{DateTime, Utc};
use helix_config::BudgetConfig;
use helix_core::ConversationId;
use serde::{Deserialize, Serialize};

use crate::BudgetError;

// ── Bands ─────────────────────────────────────────────────────────────────

/// How close a conversation is to the budget ceiling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum BudgetBand {
    /// Below the warning threshold.
    Ok,
    /// At or above the warning threshold.
    Warning,
    /// At or above the critical threshold.
    Critical,
    /// At or above the ceiling.
    Exceeded,
}

impl std::fmt::Display for BudgetBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
            Self::Exceeded => write!(f, "exceeded"),
        }
    }
}

// ── Thresholds ────────────────────────────────────────────────────────────

/// Budget ceiling and band boundaries, as fractions of the ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetThresholds {
    pub ceiling: u64,
    pub warning_ratio: f64,
    pub critical_ratio: f64,
    pub optimal_ratio: f64,
}

impl Default for BudgetThresholds {
    fn default() -> Self {
        Self {
            ceiling: 128_000,
            warning_ratio: 0.30,
            critical_ratio: 0.75,
            optimal_ratio: 0.30,
        }
    }
}

impl From<&BudgetConfig> for BudgetThresholds {
    fn from(config: &BudgetConfig) -> Self {
        Self {
            ceiling: config.ceiling,
            warning_ratio: config.warning_ratio,
            critical_ratio: config.critical_ratio,
            optimal_ratio: config.optimal_ratio,
        }
    }
}

impl BudgetThresholds {
    pub fn validate(&self) -> Result<(), BudgetError> {
        if self.ceiling == 0 {
            return Err(BudgetError::InvalidThresholds("ceiling must be > 0".into()));
        }
        if !(0.0 < self.warning_ratio
            && self.warning_ratio < self.critical_ratio
            && self.critical_ratio < 1.0)
        {
            return Err(BudgetError::InvalidThresholds(format!(
                "expected 0 < warning ({}) < critical ({}) < 1",
                self.warning_ratio, self.critical_ratio
            )));
        }
        if self.optimal_ratio <= 0.0 {
            return Err(BudgetError::InvalidThresholds(
                "optimal_ratio must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Size of the "optimal" band in units.
    pub fn optimal_size(&self) -> u64 {
        (self.ceiling as f64 * self.optimal_ratio) as u64
    }

    pub fn band_for(&self, used: u64) -> BudgetBand {
        let fraction = used as f64 / self.ceiling as f64;
        if used >= self.ceiling {
            BudgetBand::Exceeded
        } else if fraction >= self.critical_ratio {
            BudgetBand::Critical
        } else if fraction >= self.warning_ratio {
            BudgetBand::Warning
        } else {
            BudgetBand::Ok
        }
    }

    /// Full limit report for a usage figure.
    ///
    /// Truncation always applies once the ceiling is reached. In the
    /// critical band it applies once usage passes twice the optimal band.
    pub fn status(&self, used: u64) -> LimitStatus {
        let status = self.band_for(used);
        let should_truncate = match status {
            BudgetBand::Exceeded => true,
            BudgetBand::Critical => used as f64 >= 2.0 * self.optimal_ratio * self.ceiling as f64,
            BudgetBand::Ok | BudgetBand::Warning => false,
        };
        LimitStatus {
            status,
            used,
            remaining: self.ceiling.saturating_sub(used),
            percent_used: used as f64 * 100.0 / self.ceiling as f64,
            should_truncate,
            should_warn: status != BudgetBand::Ok,
        }
    }
}

// ── Reports ───────────────────────────────────────────────────────────────

/// Result of `check_limits`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitStatus {
    pub status: BudgetBand,
    pub used: u64,
    pub remaining: u64,
    pub percent_used: f64,
    pub should_truncate: bool,
    pub should_warn: bool,
}

/// Lifetime usage record for one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationBudget {
    pub conversation_id: ConversationId,
    /// Only ever grows; truncation never lowers it.
    pub cumulative_estimated_size: u64,
    pub message_count: u64,
    pub last_updated: DateTime<Utc>,
}

impl ConversationBudget {
    pub fn new(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id,
            cumulative_estimated_size: 0,
            message_count: 0,
            last_updated: Utc::now(),
        }
    }
}

/// Result of `update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageUpdate {
    pub conversation_id: ConversationId,
    /// Size added by this exchange.
    pub added: u64,
    pub cumulative: u64,
    pub message_count: u64,
    pub status: BudgetBand,
}
