//! `replyline run`: One customer message, reviewed in the terminal.

use replyline_config::AppConfig;
use replyline_core::customer::CustomerMessage;
use replyline_core::event::{DomainEvent, EventBus};
use replyline_core::run::{PipelineRun, RunStatus, StageRecord};
use replyline_pipeline::{Orchestrator, ReviewDecision, ReviewDesk, scenario};
use replyline_providers::ModelClient;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::error::RecvError;

use crate::RunArgs;

pub async fn run(config: AppConfig, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    let message = match (args.scenario, args.message) {
        (Some(index), _) => scenario(index)
            .ok_or_else(|| format!("No scenario {index}; see `replyline scenarios`"))?
            .message(),
        (None, Some(text)) => CustomerMessage::new(text),
        (None, None) => {
            prompt("  Customer > ")?;
            let text = stdin.next_line().await?.unwrap_or_default();
            if text.trim().is_empty() {
                return Err("No customer message given".into());
            }
            CustomerMessage::new(text.trim())
        }
    };
    let message = with_context(message, args.customer_id, args.order_id, args.urgency);

    let client = ModelClient::from_config(&config)?;
    let bus = Arc::new(EventBus::default());
    let orchestrator = Orchestrator::from_config(client, &config, bus.clone());
    let desk = Arc::new(ReviewDesk::from_config(&config.pipeline));

    println!();
    println!("  Customer: {}", message.text());
    println!();

    let mut events = bus.subscribe();
    let (run_id, handle) = orchestrator.spawn(message, desk.clone());

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        };
        if event.run_id() != run_id.as_str() {
            continue;
        }

        match event.as_ref() {
            DomainEvent::StageCompleted { record, .. } => print_stage(record),
            DomainEvent::ReviewRequested { token, .. } => {
                let decision = if args.auto_approve {
                    println!("  Review: auto-approved");
                    ReviewDecision::approve()
                } else {
                    review_in_terminal(&desk, &mut stdin).await?
                };
                if let Err(e) = desk.decide(token, decision).await {
                    eprintln!("  [Review] decision not applied: {e}");
                }
            }
            DomainEvent::RunFinished { .. } => break,
            _ => {}
        }
    }

    let run = handle.await?;
    print_summary(&run, orchestrator.budget_ms());

    if run.status() == RunStatus::Failed {
        return Err(run.halt_reason().unwrap_or("pipeline failed").into());
    }
    Ok(())
}

fn with_context(
    mut message: CustomerMessage,
    customer_id: Option<String>,
    order_id: Option<String>,
    urgency: Option<String>,
) -> CustomerMessage {
    if let Some(id) = customer_id {
        message = message.with_customer_id(id);
    }
    if let Some(id) = order_id {
        message = message.with_order_id(id);
    }
    if let Some(urgency) = urgency {
        message = message.with_urgency(urgency);
    }
    message
}

async fn review_in_terminal(
    desk: &ReviewDesk,
    stdin: &mut Lines<BufReader<Stdin>>,
) -> Result<ReviewDecision, Box<dyn std::error::Error>> {
    let draft = desk.pending().await.map(|t| t.draft).unwrap_or_default();

    println!();
    println!("  ── Draft for review ─────────────────────────────");
    for line in draft.lines() {
        println!("  │ {line}");
    }
    println!("  ─────────────────────────────────────────────────");
    println!("  Enter approves, typed text replaces the draft, /reject [notes] rejects.");
    prompt("  Review > ")?;

    let decision = match stdin.next_line().await? {
        Some(line) => parse_review_input(&line),
        None => ReviewDecision::reject().with_notes("no reviewer input"),
    };
    println!();
    Ok(decision)
}

/// Read one line of terminal review input.
fn parse_review_input(line: &str) -> ReviewDecision {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("/reject") {
        return ReviewDecision::reject().with_notes(rest.trim());
    }
    if line == "/approve" {
        return ReviewDecision::approve();
    }
    ReviewDecision::edit(line)
}

fn prompt(label: &str) -> std::io::Result<()> {
    print!("{label}");
    std::io::stdout().flush()
}

fn print_stage(record: &StageRecord) {
    let verdict = match record.passed {
        Some(true) => " ok",
        Some(false) => " FLAGGED",
        None => "",
    };
    let model = record
        .model
        .as_deref()
        .map(|m| format!(" [{m}]"))
        .unwrap_or_default();
    println!(
        "  ✓ {:<20}{:>8.1} ms{verdict}{model}",
        record.stage.as_str(),
        record.latency_ms
    );
}

fn print_summary(run: &PipelineRun, budget_ms: u64) {
    println!();
    println!("  Status: {}", run.status());
    if let Some(reason) = run.halt_reason() {
        println!("  Reason: {reason}");
    }
    if let Some(review) = run.review() {
        let edited = if review.edited { "edited" } else { "unedited" };
        println!("  Review: {edited}, {:.1}s", review.review_ms / 1000.0);
    }

    let ai_ms = run.ai_latency_ms();
    let over = if ai_ms > budget_ms as f64 {
        " (over budget)"
    } else {
        ""
    };
    println!("  AI time: {ai_ms:.1} ms of {budget_ms} ms budget{over}");

    if let Some(text) = run.final_response() {
        println!();
        println!("  Final response:");
        for line in text.lines() {
            println!("    {line}");
        }
    }
    println!();
}
