//! TableTalk binary: a terminal front end for the catalog agent.
//!
//! Reads questions from stdin one line at a time, runs each through the
//! dispatcher, and prints the answer with a short trailer showing what ran
//! behind it. A blank line or EOF exits.

use std::io::Write as _;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use tabletalk::agent_core::dispatcher::{Dispatcher, SYSTEM_PROMPT};
use tabletalk::agent_core::transcript::Transcript;
use tabletalk::config::AppConfig;
use tabletalk::inference::client::InferenceClient;
use tabletalk::store::executor::QueryExecutor;
use tabletalk::store::tickets::{TicketOrigin, TicketPriority, TicketSink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tabletalk::init_tracing();

    let config = AppConfig::load_or_default().context("failed to load configuration")?;

    let gateway = Arc::new(
        InferenceClient::from_config(config.model.clone())
            .context("failed to build the model gateway")?,
    );
    let executor = Arc::new(
        QueryExecutor::open(&config.store.db_path)
            .with_context(|| format!("failed to open catalog at {}", config.store.db_path))?,
    );
    let tickets = Arc::new(TicketSink::new(&config.tickets.csv_path));
    let dispatcher = Dispatcher::new(gateway, executor.clone(), tickets.clone());

    let mut transcript = Transcript::with_system_prompt(SYSTEM_PROMPT);
    tracing::info!(session_id = %transcript.session_id(), "session started");

    print_banner(&executor);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            break;
        }

        if let Some(summary) = ticket_command(input) {
            file_manual_ticket(&tickets, summary);
            continue;
        }

        match dispatcher.ask(&mut transcript, input).await {
            Ok(outcome) => {
                println!("\n{}\n", outcome.answer);
                if let Some(sql) = &outcome.executed_sql {
                    println!("[sql] {sql}");
                }
                if let Some(result) = &outcome.result {
                    let marker = if result.truncated { " (truncated)" } else { "" };
                    println!("[rows] {}{marker}", result.row_count());
                }
                if let Some(ticket) = &outcome.ticket {
                    println!(
                        "[ticket] {} (priority: {})",
                        ticket.ticket_id,
                        ticket.priority.as_str()
                    );
                }
                if outcome.executed_sql.is_some() || outcome.ticket.is_some() {
                    println!();
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "question failed");
                println!(
                    "\nSorry, I could not answer that ({e}).\n\
                     You can file a ticket for a human with `:ticket <summary>`.\n"
                );
            }
        }
    }

    tracing::info!(session_id = %transcript.session_id(), turns = transcript.len(), "session ended");
    println!("bye");
    Ok(())
}

/// Print what the catalog holds so the first question has some footing.
fn print_banner(executor: &QueryExecutor) {
    println!("TableTalk: ask the catalog questions in plain language.");
    println!("Blank line or EOF exits; `:ticket <summary>` files a support ticket.\n");

    match executor.summary() {
        Ok(summary) => {
            let latest = summary
                .latest_release_year
                .map(|y| y.to_string())
                .unwrap_or_else(|| "n/a".into());
            println!(
                "catalog: {} rows, {} unique titles, latest release year {}",
                summary.total_rows, summary.unique_titles, latest
            );
            for (kind, count) in &summary.titles_by_type {
                println!("  {kind}: {count}");
            }
            println!();
        }
        Err(e) => {
            tracing::warn!(error = %e, "dataset summary unavailable");
            println!("catalog summary unavailable ({e})\n");
        }
    }
}

/// The summary from a `:ticket` line, or None when the input is a question.
///
/// The prefix only counts at a word boundary: a bare `:ticket` and
/// `:ticket db is stale` match, `:ticketing` goes to the model.
fn ticket_command(input: &str) -> Option<&str> {
    let rest = input.strip_prefix(":ticket")?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// `:ticket <summary>` — file a ticket directly, no model involved.
fn file_manual_ticket(tickets: &TicketSink, summary: &str) {
    if summary.is_empty() {
        println!("usage: :ticket <summary>");
        return;
    }
    match tickets.create(summary, "", TicketPriority::Medium, TicketOrigin::Manual) {
        Ok(ticket) => println!(
            "[ticket] {} (priority: {})",
            ticket.ticket_id,
            ticket.priority.as_str()
        ),
        Err(e) => {
            tracing::error!(error = %e, "manual ticket failed");
            println!("could not file the ticket: {e}");
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
