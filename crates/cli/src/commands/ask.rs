//! `helix ask`: One-shot question.

use helix_core::Tier;
use helix_orchestrator::QueryRequest;
use tokio_util::sync::CancellationToken;

pub async fn run(
    query: String,
    tier: Option<Tier>,
    context: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_config, orchestrator) = super::load_orchestrator()?;

    let context = match context {
        Some(raw) => serde_json::from_str(&raw).map_err(|e| format!("--context is not valid JSON: {e}"))?,
        None => serde_json::Value::Null,
    };

    let mut request = QueryRequest::new(query).with_context(context);
    if let Some(tier) = tier {
        request = request.with_tier(tier);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    eprint!("  Thinking...");
    let outcome = orchestrator.process_query_with_cancel(request, &cancel).await;
    eprint!("\r              \r");

    super::print_outcome(&outcome?, "");
    Ok(())
}
