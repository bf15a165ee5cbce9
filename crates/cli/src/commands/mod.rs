pub mod ask;
pub mod backends;
pub mod chat;
pub mod config_cmd;

use helix_config::AppConfig;
use helix_orchestrator::{Orchestrator, QueryOutcome};

/// Load configuration and wire the orchestrator from it.
pub fn load_orchestrator() -> Result<(AppConfig, Orchestrator), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let table = helix_providers::build_from_config(&config)?;
    let orchestrator = Orchestrator::from_config(&config, table)?;
    Ok((config, orchestrator))
}

/// Print an answer followed by a one-line provenance footer.
pub fn print_outcome(outcome: &QueryOutcome, prefix: &str) {
    for line in outcome.content().lines() {
        println!("{prefix}{line}");
    }
    println!();

    let fallback = if outcome.used_fallback() { "yes" } else { "no" };
    println!(
        "  [source: {} | fallback: {} | {:.2}s]",
        outcome.source_backend(),
        fallback,
        outcome.elapsed().as_secs_f64()
    );

    if let Some(response) = outcome.response() {
        if response.history_truncated > 0 {
            println!(
                "  [{} older messages dropped to stay within budget]",
                response.history_truncated
            );
        }
        if response.search_suggested {
            println!("  [this question may need up-to-date sources; consider a web search]");
        }
    }
}
