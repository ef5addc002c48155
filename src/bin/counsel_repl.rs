//! Counsel REPL
//!
//! Interactive console over one conversation session.
//!
//! # Usage
//!
//! ```bash
//! # In-memory corpus, backend from AGENT_BACKEND
//! counsel_repl --corpus demos/corpus.yaml
//!
//! # Remote retrieval service and an explicit backend
//! counsel_repl --evidence-url http://localhost:8700 --backend openai
//! ```
//!
//! Commands: `/reset` starts a new session, `/state` prints the session
//! state as JSON, `/quit` exits.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use counsel_flow::evidence::{EvidenceStore, HttpEvidenceStore, MemoryEvidenceStore};
use counsel_flow::generation::{client_for, AgentBackend, LlmGenerationPort};
use counsel_flow::{ConversationRunner, FlowConfig, SessionError, TurnReport};

#[derive(Parser)]
#[command(name = "counsel_repl")]
#[command(version = "0.1.0")]
#[command(about = "Interactive console for the staged counseling dialogue")]
struct Cli {
    /// YAML corpus with `criteria:` and `treatment:` items
    #[arg(long, default_value = "demos/corpus.yaml")]
    corpus: PathBuf,

    /// Retrieval service base URL; overrides --corpus
    #[arg(long, env = "EVIDENCE_SERVICE_URL")]
    evidence_url: Option<String>,

    /// Flow configuration file
    #[arg(long, env = "COUNSEL_FLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Generation backend: anthropic, openai, gemini
    #[arg(long, env = "AGENT_BACKEND", default_value = "anthropic")]
    backend: AgentBackend,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("counsel_flow=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => FlowConfig::load(path)?,
        None => FlowConfig::from_env()?,
    };

    let evidence: Arc<dyn EvidenceStore> = match &cli.evidence_url {
        Some(url) => Arc::new(HttpEvidenceStore::new(url.as_str())),
        None => Arc::new(
            MemoryEvidenceStore::load(&cli.corpus)
                .with_context(|| format!("loading corpus {}", cli.corpus.display()))?,
        ),
    };
    let client = client_for(cli.backend)?;
    println!(
        "{} {} ({})",
        "backend:".dimmed(),
        client.provider_name(),
        client.model_name()
    );

    let runner = ConversationRunner::builder()
        .config(config)
        .evidence(evidence)
        .generator(Arc::new(LlmGenerationPort::new(client)))
        .build()?;

    let mut session = runner.start_session().await;
    print_report(&session);

    let mut editor = DefaultEditor::new()?;
    loop {
        let line = match editor.readline(&format!("{} ", "you>".green().bold())) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        editor.add_history_entry(line)?;

        match line {
            "/quit" | "/exit" => break,
            "/reset" => {
                session = match runner.reset(session.session_id).await {
                    Ok(report) => report,
                    Err(SessionError::NotFound(_)) => runner.start_session().await,
                    Err(e) => return Err(e.into()),
                };
                print_report(&session);
            }
            "/state" => match runner.snapshot(session.session_id).await {
                Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
                None => println!("{}", "no session".yellow()),
            },
            input => match runner.handle_turn(session.session_id, input).await {
                Ok(report) => {
                    print_report(&report);
                    if report.completed {
                        println!("{}", "session complete; /reset to start over".dimmed());
                    }
                    session = report;
                }
                Err(SessionError::Terminated(_)) => {
                    println!("{}", "session finished; /reset to start over".yellow());
                }
                Err(e @ SessionError::Aborted { .. }) => {
                    println!("{} {}", "aborted:".red().bold(), e);
                }
                Err(e) => return Err(e.into()),
            },
        }
    }
    Ok(())
}

fn print_report(report: &TurnReport) {
    for message in &report.messages {
        println!("{} {}\n", "counselor>".cyan().bold(), message);
    }
    for (from, to) in &report.transitions {
        println!("{}", format!("  [{} → {}]", from, to).dimmed());
    }
    if report.hop_limit_reached {
        println!("{}", "  [hop limit reached]".yellow());
    }
    println!("{}", format!("  stage: {}", report.stage).blue());
}
