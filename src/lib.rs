//! counsel-flow - Stage-gated clinical intake dialogue engine
//!
//! A conversation moves through five stages: Intake, Hypothesis,
//! Validation, Severity and Solution, ending in Terminal. Retrieval and
//! text generation are external collaborators reached through ports
//! ([`evidence::EvidenceStore`], [`generation::TextGenerationPort`]);
//! everything else (guards, question loops, backward branching on low
//! confidence, evidence merging) lives here.
//!
//! ## Call chain
//!
//! ```text
//! ConversationRunner ──► StageEngine ──► stage handler
//!        ▲                    │              │
//!        │                    │              ├─► EvidenceStore / HypothesisRanker
//!        │                    │              ├─► TextGenerationPort
//!        │                    │              └─► ResponseContractParser
//!        │                    ▼
//!        └──── trampoline ◄── StateChange deltas + guard evaluation
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use counsel_flow::config::FlowConfig;
//! use counsel_flow::evidence::MemoryEvidenceStore;
//! use counsel_flow::generation::{create_llm_client, LlmGenerationPort};
//! use counsel_flow::runner::ConversationRunner;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = FlowConfig::from_env()?;
//! let evidence = Arc::new(MemoryEvidenceStore::load("corpus.yaml")?);
//! let generator = Arc::new(LlmGenerationPort::new(create_llm_client()?));
//! let runner = ConversationRunner::builder()
//!     .config(config)
//!     .evidence(evidence)
//!     .generator(generator)
//!     .build()?;
//!
//! let opening = runner.start_session().await;
//! let report = runner
//!     .handle_turn(opening.session_id, "I can't sleep and feel low")
//!     .await?;
//! println!("[{}] {:?}", report.stage, report.messages);
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Configuration (YAML + environment)
pub mod config;

// Shared data model and per-session state
pub mod state;
pub mod types;

// Retrieval port, adapters and candidate ranking
pub mod classify;
pub mod evidence;
pub mod severity;

// Generation port and vendor clients
pub mod generation;

// Generation output contract and free-text answer parsing
pub mod answers;
pub mod contract;

// Stage state machine
pub mod engine;

// Session store and turn loop
pub mod runner;
pub mod session;

pub use config::FlowConfig;
pub use engine::StageEngine;
pub use error::{SessionError, StageError};
pub use runner::{ConversationRunner, TurnReport};
pub use session::SessionStore;
pub use state::SessionState;
pub use types::Stage;
