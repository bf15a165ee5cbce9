//! `helix backends`: Show the backend table and tier grants.

use helix_core::Tier;
use helix_orchestrator::{AccessPolicy, TierPolicy};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (config, orchestrator) = super::load_orchestrator()?;
    let table = orchestrator.backends();

    println!("🧬 Configured backends (tried in this order)");
    println!();
    println!(
        "  {:<4} {:<14} {:<28} {:>7} {:>9} {:>8}",
        "prio", "name", "model", "retries", "max size", "timeout"
    );
    for backend in table.iter() {
        let d = &backend.descriptor;
        println!(
            "  {:<4} {:<14} {:<28} {:>7} {:>9} {:>7}s",
            d.priority,
            d.name,
            backend.model,
            d.max_retries,
            d.max_response_size,
            d.timeout.as_secs()
        );
    }
    if table.is_empty() {
        println!("  (none enabled)");
    }

    println!();
    println!("  Tier access:");
    let policy = TierPolicy::from_config(&config.access);
    for tier in Tier::ALL {
        let allowed = policy.allowed_backends(Some(tier));
        let list = if allowed.is_empty() {
            "(access denied)".to_string()
        } else {
            allowed.join(", ")
        };
        println!("    {:<11} {list}", tier.to_string());
    }
    if let Some(tier) = policy.restrictive_tier() {
        println!("    (callers without a tier get the {tier} grant)");
    }

    Ok(())
}
