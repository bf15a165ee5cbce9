//! Fault-tolerant multi-backend query orchestration for Helix.
//!
//! - **Access policy**: which backends a tier may use
//! - **Retry executor**: bounded retries with exponential backoff per backend
//! - **Response cache**: fingerprint-keyed, TTL + capacity bounded
//! - **Knowledge bank**: offline answers when every backend fails
//! - **Orchestrator**: composes all of the above with the budget manager

pub mod cache;
mod keyword;
pub mod knowledge;
pub mod orchestrator;
pub mod policy;
pub mod retry;
pub mod search;

pub use cache::{CachedAnswer, ResponseCache, fingerprint};
pub use knowledge::{KeywordClassifier, KnowledgeBank, Topic, TopicClassifier};
pub use orchestrator::{
    CACHE_SOURCE, NO_SOURCE, Orchestrator, QueryError, QueryOutcome, QueryRequest, QueryResponse,
    SOLUTION_BANK_SOURCE,
};
pub use policy::{AccessPolicy, TierPolicy};
pub use retry::{RetryError, RetryExecutor};
pub use search::{SearchAdvisor, SearchHeuristic};
