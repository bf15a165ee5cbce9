//! Backend adapters for Helix.
//!
//! All adapters implement the `helix_core::Provider` trait and report
//! failures as classified `ProviderError`s. The router builds the
//! priority-ordered backend table from configuration.

pub mod anthropic;
pub mod openai_compat;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;
