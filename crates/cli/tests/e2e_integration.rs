//! End-to-end integration tests for the Helix query pipeline.
//!
//! These tests wire the orchestrator from the default configuration with
//! mock backends in place of the HTTP adapters and drive whole queries
//! through cache, access policy, retries, budget and knowledge bank.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use helix_budget::BudgetBand;
use helix_config::AppConfig;
use helix_core::backend::{Backend, BackendTable};
use helix_core::error::ProviderError;
use helix_core::message::Message;
use helix_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use helix_core::{ConversationId, Tier};
use helix_orchestrator::{
    CACHE_SOURCE, Orchestrator, QueryOutcome, QueryRequest, SOLUTION_BANK_SOURCE,
};

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock backend that answers with fixed text or fails with a fixed error,
/// recording the size of every outbound message list.
struct MockBackend {
    name: String,
    result: Result<String, ProviderError>,
    sent_lengths: Mutex<Vec<usize>>,
}

impl MockBackend {
    fn healthy(name: &str, answer: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            result: Ok(answer.into()),
            sent_lengths: Mutex::new(Vec::new()),
        })
    }

    fn failing(name: &str, error: ProviderError) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            result: Err(error),
            sent_lengths: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.sent_lengths.lock().unwrap().len()
    }

    fn last_sent_len(&self) -> usize {
        *self.sent_lengths.lock().unwrap().last().unwrap()
    }
}

#[async_trait::async_trait]
impl Provider for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.sent_lengths.lock().unwrap().push(request.messages.len());
        self.result.clone().map(|text| ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock".into(),
        })
    }
}

// ── Wiring ───────────────────────────────────────────────────────────────

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.retry.backoff_base_ms = 1;
    config
}

/// Replace each configured backend's adapter with the given mock, keeping
/// the configured descriptor (priority, retries, limits).
fn table_with(config: &AppConfig, mocks: &[Arc<MockBackend>]) -> BackendTable {
    let backends = mocks
        .iter()
        .map(|mock| {
            let backend_config = &config.backends[&mock.name];
            Backend::new(
                helix_providers::router::descriptor_for(&mock.name, backend_config),
                backend_config.model.clone(),
                Arc::clone(mock) as Arc<dyn Provider>,
            )
        })
        .collect();
    BackendTable::new(backends).unwrap()
}

fn healthy_trio() -> Vec<Arc<MockBackend>> {
    vec![
        MockBackend::healthy("openai", "Answer from openai"),
        MockBackend::healthy("anthropic", "Answer from anthropic"),
        MockBackend::healthy("deepseek", "Answer from deepseek"),
    ]
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_free_tier_uses_primary_backend() {
    let config = test_config();
    let mocks = healthy_trio();
    let orchestrator = Orchestrator::from_config(&config, table_with(&config, &mocks)).unwrap();

    let outcome = orchestrator
        .process_query(QueryRequest::new("hello").with_tier(Tier::Free))
        .await
        .unwrap();

    assert_eq!(outcome.source_backend(), "openai");
    assert!(!outcome.used_fallback());
    assert_eq!(outcome.content(), "Answer from openai");
    assert_eq!(mocks[0].calls(), 1);
    assert_eq!(mocks[1].calls(), 0);
    assert_eq!(mocks[2].calls(), 0);
}

#[tokio::test]
async fn e2e_repeated_query_served_from_cache() {
    let config = test_config();
    let mocks = healthy_trio();
    let orchestrator = Orchestrator::from_config(&config, table_with(&config, &mocks)).unwrap();

    let first = orchestrator
        .process_query(QueryRequest::new("hello").with_tier(Tier::Free))
        .await
        .unwrap();
    let second = orchestrator
        .process_query(QueryRequest::new("hello").with_tier(Tier::Free))
        .await
        .unwrap();

    assert_eq!(first.source_backend(), "openai");
    assert_eq!(second.source_backend(), CACHE_SOURCE);
    assert_eq!(second.content(), first.content());
    assert_eq!(mocks[0].calls(), 1);
}

#[tokio::test]
async fn e2e_cached_answer_not_shared_with_narrower_tier() {
    let config = test_config();
    let mocks = vec![
        MockBackend::failing("openai", ProviderError::ContentRejected("refused".into())),
        MockBackend::healthy("anthropic", "Answer from anthropic"),
        MockBackend::healthy("deepseek", "Answer from deepseek"),
    ];
    let orchestrator = Orchestrator::from_config(&config, table_with(&config, &mocks)).unwrap();

    let premium = orchestrator
        .process_query(QueryRequest::new("hello").with_tier(Tier::Premium))
        .await
        .unwrap();
    assert_eq!(premium.source_backend(), "anthropic");

    // Free may only use openai, so the anthropic answer in the cache is off limits.
    let free = orchestrator
        .process_query(QueryRequest::new("hello").with_tier(Tier::Free))
        .await
        .unwrap();
    assert_eq!(free.source_backend(), SOLUTION_BANK_SOURCE);
    assert_ne!(free.content(), "Answer from anthropic");

    let enterprise = orchestrator
        .process_query(QueryRequest::new("hello").with_tier(Tier::Enterprise))
        .await
        .unwrap();
    assert_eq!(enterprise.source_backend(), CACHE_SOURCE);
    assert_eq!(mocks[1].calls(), 1);
}

#[tokio::test]
async fn e2e_all_backends_permanently_failing_uses_solution_bank() {
    let config = test_config();
    let mocks = vec![
        MockBackend::failing("openai", ProviderError::InvalidRequest("bad".into())),
        MockBackend::failing("anthropic", ProviderError::ContentRejected("refused".into())),
        MockBackend::failing("deepseek", ProviderError::AuthenticationFailed("no key".into())),
    ];
    let orchestrator = Orchestrator::from_config(&config, table_with(&config, &mocks)).unwrap();

    let outcome = orchestrator
        .process_query(QueryRequest::new("What is the GC content of my DNA?").with_tier(Tier::Enterprise))
        .await
        .unwrap();

    assert_eq!(outcome.source_backend(), SOLUTION_BANK_SOURCE);
    assert!(outcome.used_fallback());
    assert!(!outcome.content().is_empty());
    // Permanent failures are never retried.
    for mock in &mocks {
        assert_eq!(mock.calls(), 1, "{} retried", mock.name);
    }
}

#[tokio::test]
async fn e2e_transient_failure_falls_through_to_secondary() {
    let config = test_config();
    let mocks = vec![
        MockBackend::failing(
            "openai",
            ProviderError::ApiError {
                status_code: 502,
                message: "bad gateway".into(),
            },
        ),
        MockBackend::healthy("anthropic", "Answer from anthropic"),
    ];
    let orchestrator = Orchestrator::from_config(&config, table_with(&config, &mocks)).unwrap();

    let outcome = orchestrator
        .process_query(QueryRequest::new("explain codon usage").with_tier(Tier::Premium))
        .await
        .unwrap();

    assert_eq!(outcome.source_backend(), "anthropic");
    assert!(outcome.used_fallback());
    assert_eq!(mocks[0].calls(), config.backends["openai"].max_retries as usize);
}

#[tokio::test]
async fn e2e_empty_grant_is_access_denied() {
    let mut config = test_config();
    config.access.free.clear();
    let mocks = healthy_trio();
    let orchestrator = Orchestrator::from_config(&config, table_with(&config, &mocks)).unwrap();

    let outcome = orchestrator
        .process_query(QueryRequest::new("hello").with_tier(Tier::Free))
        .await
        .unwrap();

    assert!(matches!(outcome, QueryOutcome::AccessDenied { tier: Some(Tier::Free), .. }));
    assert!(outcome.used_fallback());
    assert!(mocks.iter().all(|m| m.calls() == 0));
}

#[tokio::test]
async fn e2e_critical_budget_shortens_outbound_history() {
    let mut config = test_config();
    config.budget.ceiling = 200;
    config.budget.word_weight = 1.0;
    config.budget.char_weight = 0.0;
    let mocks = vec![MockBackend::healthy(
        "openai",
        "one two three four five six seven eight nine ten",
    )];
    let orchestrator = Orchestrator::from_config(&config, table_with(&config, &mocks)).unwrap();
    let budget = Arc::clone(orchestrator.budget().unwrap());
    let conversation = ConversationId::from("e2e-budget");
    let filler = vec!["word"; 28].join(" ");

    let mut history: Vec<Message> = Vec::new();
    for turn in 0..20 {
        let query = format!("question {turn} {filler}");
        let outcome = orchestrator
            .process_query(
                QueryRequest::new(query.clone())
                    .with_tier(Tier::Free)
                    .with_history(history.clone())
                    .with_conversation(conversation.clone()),
            )
            .await
            .unwrap();
        // Below the critical band nothing is dropped.
        assert_eq!(mocks[0].last_sent_len(), history.len() + 1);
        history.push(Message::user(query));
        history.push(Message::assistant(outcome.content()));

        if budget.check_limits(&conversation).status == BudgetBand::Critical {
            break;
        }
    }

    let status = budget.check_limits(&conversation);
    assert_eq!(status.status, BudgetBand::Critical);
    assert!(status.should_truncate);
    let used_before = status.used;

    let outcome = orchestrator
        .process_query(
            QueryRequest::new("one more question about alignment")
                .with_tier(Tier::Free)
                .with_history(history.clone())
                .with_conversation(conversation.clone()),
        )
        .await
        .unwrap();

    let untruncated_len = history.len() + 1;
    assert!(mocks[0].last_sent_len() < untruncated_len);
    assert!(outcome.response().unwrap().history_truncated > 0);
    // Truncation never lowers lifetime usage.
    assert!(budget.check_limits(&conversation).used > used_before);
}

#[tokio::test]
async fn e2e_blank_query_rejected_before_any_backend() {
    let config = test_config();
    let mocks = healthy_trio();
    let orchestrator = Orchestrator::from_config(&config, table_with(&config, &mocks)).unwrap();

    let result = orchestrator.process_query(QueryRequest::new("  \n ")).await;
    assert!(result.is_err());
    assert!(mocks.iter().all(|m| m.calls() == 0));
}

#[tokio::test(start_paused = true)]
async fn e2e_cache_expires_after_freshness_window() {
    let config = test_config();
    let mocks = healthy_trio();
    let orchestrator = Orchestrator::from_config(&config, table_with(&config, &mocks)).unwrap();

    orchestrator.process_query(QueryRequest::new("hello")).await.unwrap();
    tokio::time::advance(Duration::from_secs(config.cache.ttl_secs + 1)).await;
    let again = orchestrator.process_query(QueryRequest::new("hello")).await.unwrap();

    assert_eq!(again.source_backend(), "openai");
    assert_eq!(mocks[0].calls(), 2);
}
