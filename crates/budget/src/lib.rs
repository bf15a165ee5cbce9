//! Conversation size budgeting for Helix.
//!
//! Estimates the size of every exchange, accumulates it per conversation,
//! classifies usage into bands against a ceiling, and shrinks history with
//! a sliding window once a conversation runs hot. Idle records are swept
//! in the background.

pub mod estimate;
pub mod manager;
pub mod model;
pub mod sweeper;

pub use estimate::SizeEstimator;
pub use manager::BudgetManager;
pub use model::{
    BudgetBand, BudgetThresholds, ConversationBudget, LimitStatus, UsageUpdate,
};
pub use sweeper::BudgetSweeper;

/// Errors from the budget subsystem.
#[derive(Debug, thiserror::Error)]
pub enum BudgetError {
    #[error("invalid budget thresholds: {0}")]
    InvalidThresholds(String),
}
