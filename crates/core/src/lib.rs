//! # Helix Core
//!
//! Domain types, traits, and error definitions for the Helix query
//! orchestration engine. This crate has **zero framework dependencies**: it
//! defines the domain model that the other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every backend is reached through the [`Provider`] trait defined here.
//! Adapters live in `helix-providers`; the orchestration logic lives in
//! `helix-orchestrator`. This enables:
//! - Swapping backends via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod backend;
pub mod error;
pub mod message;
pub mod provider;
pub mod tier;

// Re-export key types at crate root for ergonomics
pub use backend::{Backend, BackendDescriptor, BackendTable};
pub use error::{Error, FailureKind, ProviderError, Result};
pub use message::{ConversationId, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use tier::Tier;
