//! `helix chat`: Interactive conversation with budget tracking.

use std::io::Write;
use std::sync::Arc;

use helix_budget::BudgetSweeper;
use helix_core::message::Message;
use helix_core::{ConversationId, Tier};
use helix_orchestrator::{QueryError, QueryOutcome, QueryRequest};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

pub async fn run(tier: Option<Tier>) -> Result<(), Box<dyn std::error::Error>> {
    let (config, orchestrator) = super::load_orchestrator()?;
    let conversation_id = ConversationId::new();
    tracing::debug!(conversation = %conversation_id, "Chat session started");

    let shutdown = CancellationToken::new();
    let sweeper = orchestrator.budget().map(|budget| {
        BudgetSweeper::new(Arc::clone(budget), config.budget.sweep_interval()).start(shutdown.clone())
    });

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║           Helix Interactive Session          ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Backends:  {}", orchestrator.backends().names().join(", "));
    println!(
        "  Tier:      {}",
        tier.map(|t| t.to_string()).unwrap_or_else(|| "default".into())
    );
    println!("  Session:   {conversation_id}");
    println!();
    println!("  Type your question and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut history: Vec<Message> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if matches!(input, "exit" | "quit") {
            break;
        }
        if input.is_empty() {
            print!("  You > ");
            std::io::stdout().flush()?;
            continue;
        }

        let mut request = QueryRequest::new(input)
            .with_history(history.clone())
            .with_conversation(conversation_id.clone());
        if let Some(tier) = tier {
            request = request.with_tier(tier);
        }

        eprint!("  ...");
        let result = orchestrator.process_query(request).await;
        eprint!("\r     \r");

        match result {
            Ok(outcome) => {
                println!();
                super::print_outcome(&outcome, "  Assistant > ");
                if let QueryOutcome::Answered(response) = &outcome {
                    // Keep local history in step with what the backends see.
                    let dropped = response.history_truncated.min(history.len());
                    history.drain(..dropped);
                    history.push(Message::user(input));
                    history.push(Message::assistant(response.content.clone()));
                }
                if let Some(budget) = orchestrator.budget() {
                    let status = budget.check_limits(&conversation_id);
                    if status.should_warn {
                        println!(
                            "  [budget {}: {:.0}% used, {} units left]",
                            status.status, status.percent_used, status.remaining
                        );
                    }
                }
                println!();
            }
            Err(QueryError::InvalidInput(e)) => eprintln!("  [Invalid] {e}"),
            Err(e) => eprintln!("  [Error] {e}"),
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    shutdown.cancel();
    tracing::debug!(conversation = %conversation_id, turns = history.len() / 2, "Chat session ended");
    if let Some(handle) = sweeper {
        let _ = handle.await;
    }

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}
