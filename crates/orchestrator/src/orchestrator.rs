//! The orchestrator answers one query by walking the caller's permitted
//! backends in priority order.
//!
//! Flow: validate → cache → access policy → budget-aware history →
//! backends (each through the retry executor) → knowledge bank.
//! Backend-to-backend fallback and within-backend retry are separate:
//! a backend abandoned by the retry executor is never called again for the
//! same query.

use std::sync::Arc;
use std::time::Duration;

use helix_budget::{BudgetError, BudgetManager};
use helix_config::AppConfig;
use helix_core::backend::BackendTable;
use helix_core::message::{Message, Role};
use helix_core::provider::ProviderRequest;
use helix_core::{ConversationId, Tier};
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{ResponseCache, fingerprint};
use crate::knowledge::KnowledgeBank;
use crate::policy::{AccessPolicy, TierPolicy};
use crate::retry::{RetryError, RetryExecutor};
use crate::search::{SearchAdvisor, SearchHeuristic};

/// `source_backend` of an answer served from the response cache.
pub const CACHE_SOURCE: &str = "cache";
/// `source_backend` of an answer from the offline knowledge bank.
pub const SOLUTION_BANK_SOURCE: &str = "solution_bank";
/// `source_backend` reported for an access-denied outcome.
pub const NO_SOURCE: &str = "none";

/// One query from the surrounding application.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub query: String,
    /// Opaque structured context (uploaded file metadata, page state...).
    /// Part of the cache key.
    pub context: serde_json::Value,
    /// Prior messages, oldest first, not including `query`.
    pub history: Vec<Message>,
    pub tier: Option<Tier>,
    /// Enables budget tracking and history truncation when set.
    pub conversation_id: Option<ConversationId>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self
    }

    pub fn with_conversation(mut self, id: ConversationId) -> Self {
        self.conversation_id = Some(id);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub content: String,
    /// Backend name, [`CACHE_SOURCE`] or [`SOLUTION_BANK_SOURCE`].
    pub source_backend: String,
    /// True when the answer came from a secondary backend or the knowledge
    /// bank.
    pub used_fallback: bool,
    pub elapsed: Duration,
    /// The query looks like it wants recent information.
    pub search_suggested: bool,
    /// Messages dropped from history to stay within budget.
    pub history_truncated: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QueryOutcome {
    Answered(QueryResponse),
    /// The caller's tier grants no backends. An expected business outcome,
    /// not a fault.
    AccessDenied {
        tier: Option<Tier>,
        message: String,
        elapsed: Duration,
    },
}

impl QueryOutcome {
    pub fn content(&self) -> &str {
        match self {
            Self::Answered(r) => &r.content,
            Self::AccessDenied { message, .. } => message,
        }
    }

    pub fn source_backend(&self) -> &str {
        match self {
            Self::Answered(r) => &r.source_backend,
            Self::AccessDenied { .. } => NO_SOURCE,
        }
    }

    pub fn used_fallback(&self) -> bool {
        match self {
            Self::Answered(r) => r.used_fallback,
            Self::AccessDenied { .. } => true,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            Self::Answered(r) => r.elapsed,
            Self::AccessDenied { elapsed, .. } => *elapsed,
        }
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }

    pub fn response(&self) -> Option<&QueryResponse> {
        match self {
            Self::Answered(r) => Some(r),
            Self::AccessDenied { .. } => None,
        }
    }
}

/// The only failures surfaced to callers. Backend failures are absorbed.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("query cancelled")]
    Cancelled,
}

pub struct Orchestrator {
    backends: BackendTable,
    policy: Arc<dyn AccessPolicy>,
    retry: RetryExecutor,
    cache: Arc<ResponseCache>,
    knowledge: KnowledgeBank,
    search: Box<dyn SearchAdvisor>,
    budget: Option<Arc<BudgetManager>>,
    max_query_chars: usize,
    temperature: f32,
    system_prompt: Option<String>,
}

impl Orchestrator {
    pub fn new(
        backends: BackendTable,
        policy: Arc<dyn AccessPolicy>,
        cache: Arc<ResponseCache>,
    ) -> Self {
        Self {
            backends,
            policy,
            retry: RetryExecutor::default(),
            cache,
            knowledge: KnowledgeBank::default(),
            search: Box::new(SearchHeuristic::default()),
            budget: None,
            max_query_chars: 512,
            temperature: 0.7,
            system_prompt: None,
        }
    }

    /// Wire every component from configuration.
    pub fn from_config(config: &AppConfig, backends: BackendTable) -> Result<Self, BudgetError> {
        let budget = BudgetManager::from_config(&config.budget)?;
        Ok(Self::new(
            backends,
            Arc::new(TierPolicy::from_config(&config.access)),
            Arc::new(ResponseCache::new(config.cache.ttl(), config.cache.capacity)),
        )
        .with_retry(RetryExecutor::new(config.retry.backoff_base()))
        .with_budget(Arc::new(budget))
        .with_max_query_chars(config.cache.max_query_chars)
        .with_temperature(config.default_temperature))
    }

    pub fn with_retry(mut self, retry: RetryExecutor) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_knowledge_bank(mut self, knowledge: KnowledgeBank) -> Self {
        self.knowledge = knowledge;
        self
    }

    pub fn with_search_advisor(mut self, search: Box<dyn SearchAdvisor>) -> Self {
        self.search = search;
        self
    }

    pub fn with_budget(mut self, budget: Arc<BudgetManager>) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn with_max_query_chars(mut self, max_query_chars: usize) -> Self {
        self.max_query_chars = max_query_chars;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Prepended to outbound messages unless history already starts with a
    /// system message.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn backends(&self) -> &BackendTable {
        &self.backends
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn budget(&self) -> Option<&Arc<BudgetManager>> {
        self.budget.as_ref()
    }

    pub async fn process_query(&self, request: QueryRequest) -> Result<QueryOutcome, QueryError> {
        self.process_query_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Like [`process_query`](Self::process_query), but `cancel` aborts the
    /// in-flight backend call and skips the remaining backends and the
    /// knowledge bank.
    pub async fn process_query_with_cancel(
        &self,
        request: QueryRequest,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome, QueryError> {
        let started = Instant::now();
        let query = request.query.trim();
        if query.is_empty() {
            return Err(QueryError::InvalidInput("query must not be empty".into()));
        }
        let search_suggested = self.search.should_search(query);

        // Access policy
        let allowed = self.policy.allowed_backends(request.tier);
        if allowed.is_empty() {
            let tier = request
                .tier
                .map(|t| t.to_string())
                .unwrap_or_else(|| "unknown".into());
            info!(tier = %tier, "Access denied: tier grants no backends");
            return Ok(QueryOutcome::AccessDenied {
                tier: request.tier,
                message: format!("The {tier} tier does not include access to any assistant backend."),
                elapsed: started.elapsed(),
            });
        }

        // Cache, limited to answers from backends this caller may use
        let cache_key = fingerprint(query, &request.context, self.max_query_chars);
        let cached = cache_key
            .as_deref()
            .and_then(|key| self.cache.get(key))
            .filter(|answer| allowed.contains(&answer.source));
        if let Some(answer) = cached {
            info!(origin = %answer.source, "Cache hit");
            self.record_usage(&request, &answer.content);
            return Ok(QueryOutcome::Answered(QueryResponse {
                content: answer.content,
                source_backend: CACHE_SOURCE.into(),
                used_fallback: false,
                elapsed: started.elapsed(),
                search_suggested,
                history_truncated: 0,
            }));
        }
        debug!("Cache miss");

        let candidates = self.backends.select(&allowed);
        if candidates.is_empty() {
            warn!(allowed = ?allowed, "None of the permitted backends are configured");
        }

        // Outbound messages
        let (history, history_truncated) = match (&self.budget, &request.conversation_id) {
            (Some(budget), Some(id)) => budget.prepare_history(id, &request.history),
            _ => (request.history.clone(), 0),
        };
        let messages = self.build_messages(history, query);

        // Backends, strictly sequential in priority order
        for backend in candidates {
            let provider_request = ProviderRequest {
                model: backend.model.clone(),
                messages: messages.clone(),
                temperature: self.temperature,
                max_tokens: Some(backend.descriptor.max_response_size),
            };

            match self.retry.call(backend, provider_request, cancel).await {
                Ok(response) => {
                    let content = response.message.content;
                    if let Some(key) = &cache_key {
                        self.cache.put(key.clone(), backend.name(), content.clone());
                    }
                    let used_fallback = backend.descriptor.is_fallback();
                    info!(
                        backend = %backend.name(),
                        priority = backend.descriptor.priority,
                        used_fallback,
                        "Query answered"
                    );
                    self.record_usage(&request, &content);
                    return Ok(QueryOutcome::Answered(QueryResponse {
                        content,
                        source_backend: backend.name().to_string(),
                        used_fallback,
                        elapsed: started.elapsed(),
                        search_suggested,
                        history_truncated,
                    }));
                }
                Err(RetryError::Cancelled { .. }) => return Err(QueryError::Cancelled),
                Err(RetryError::InvalidRequest) => {
                    return Err(QueryError::InvalidInput("query has no prompt".into()));
                }
                Err(e) => {
                    warn!(backend = %backend.name(), error = %e, "Backend abandoned, trying next");
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }

        // Knowledge bank
        warn!("All backends failed, answering from knowledge bank");
        let content = self.knowledge.respond(query);
        self.record_usage(&request, &content);
        Ok(QueryOutcome::Answered(QueryResponse {
            content,
            source_backend: SOLUTION_BANK_SOURCE.into(),
            used_fallback: true,
            elapsed: started.elapsed(),
            search_suggested,
            history_truncated,
        }))
    }

    fn build_messages(&self, history: Vec<Message>, query: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        if let Some(prompt) = &self.system_prompt {
            let has_system = history.first().is_some_and(|m| m.role == Role::System);
            if !has_system {
                messages.push(Message::system(prompt.clone()));
            }
        }
        messages.extend(history);
        messages.push(Message::user(query));
        messages
    }

    fn record_usage(&self, request: &QueryRequest, content: &str) {
        if let (Some(budget), Some(id)) = (&self.budget, &request.conversation_id) {
            budget.update(id, &request.query, content);
        }
    }
}
