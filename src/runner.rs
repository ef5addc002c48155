//! Conversation Runner
//!
//! Accepts one external turn, then invokes the engine repeatedly while
//! the engine reports a transition or a follow-up, stopping when the
//! session is waiting for input, is terminal, or the per-turn hop cap is
//! reached. Turns on one session are serialized; a second turn arriving
//! while one is in flight is rejected with [`SessionError::Busy`].

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::config::FlowConfig;
use crate::engine::{prompts, StageEngine};
use crate::error::{ConfigError, SessionError, StageError};
use crate::evidence::EvidenceStore;
use crate::generation::TextGenerationPort;
use crate::session::{ArchiveReason, SessionStore};
use crate::state::SessionState;
use crate::types::{ChatMessage, Stage};

/// Everything produced by one external turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnReport {
    pub session_id: Uuid,
    /// Stage the session is in after the turn
    pub stage: Stage,
    /// Assistant messages, in emission order
    pub messages: Vec<String>,
    /// Engine invocations taken
    pub hops: usize,
    pub transitions: Vec<(Stage, Stage)>,
    pub completed: bool,
    pub hop_limit_reached: bool,
    /// Kinds of recoverable errors absorbed during the turn
    pub recovered: Vec<&'static str>,
}

pub struct ConversationRunner {
    engine: StageEngine,
    store: Arc<SessionStore>,
}

impl ConversationRunner {
    pub fn builder() -> RunnerBuilder {
        RunnerBuilder::default()
    }

    pub fn new(engine: StageEngine, store: Arc<SessionStore>) -> Self {
        Self { engine, store }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn config(&self) -> &FlowConfig {
        self.engine.config()
    }

    /// Create a session in Intake and greet the user
    pub async fn start_session(&self) -> TurnReport {
        let mut state = SessionState::new(self.engine.config());
        state.push_message(ChatMessage::assistant(prompts::GREETING, Stage::Intake));
        self.engine.refresh_blockers(&mut state);
        let session_id = self.store.insert(state).await;

        tracing::info!(session_id = %session_id, "session started");

        TurnReport {
            session_id,
            stage: Stage::Intake,
            messages: vec![prompts::GREETING.to_string()],
            hops: 0,
            transitions: Vec::new(),
            completed: false,
            hop_limit_reached: false,
            recovered: Vec::new(),
        }
    }

    /// Process one user message
    pub async fn handle_turn(&self, session_id: Uuid, input: &str) -> Result<TurnReport, SessionError> {
        let handle = match self.store.handle(session_id).await {
            Some(handle) => handle,
            None if self.store.is_archived(session_id).await => {
                return Err(SessionError::Terminated(session_id))
            }
            None => return Err(SessionError::NotFound(session_id)),
        };
        let mut state = handle
            .try_lock()
            .map_err(|_| SessionError::Busy(session_id))?;

        let input = input.trim();
        if !input.is_empty() {
            let stage = state.stage;
            state.push_message(ChatMessage::user(input, stage));
        }

        let mut report = TurnReport {
            session_id,
            stage: state.stage,
            messages: Vec::new(),
            hops: 0,
            transitions: Vec::new(),
            completed: false,
            hop_limit_reached: false,
            recovered: Vec::new(),
        };

        let max_hops = self.engine.config().max_hops_per_turn;
        let mut pending = Some(input).filter(|s| !s.is_empty());
        loop {
            if report.hops >= max_hops {
                tracing::warn!(session_id = %session_id, hops = report.hops, "hop limit reached");
                report.hop_limit_reached = true;
                break;
            }
            report.hops += 1;

            let outcome = match self.engine.step(&mut state, pending.take()).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    let stage = state.stage;
                    state.push_message(ChatMessage::assistant(prompts::SESSION_ABORTED, stage));
                    let snapshot = state.clone();
                    drop(state);
                    self.abort(session_id, snapshot, &err).await;
                    return Err(SessionError::Aborted {
                        session_id,
                        source: err,
                    });
                }
            };

            for message in &outcome.messages {
                state.push_message(ChatMessage::assistant(message.as_str(), outcome.stage));
            }
            report.messages.extend(outcome.messages.iter().cloned());
            if let Some(transition) = outcome.transition {
                report.transitions.push(transition);
            }
            if let Some(err) = &outcome.recovered {
                report.recovered.push(err.kind());
            }

            if state.is_terminal() || !outcome.should_chain() {
                break;
            }
        }

        report.stage = state.stage;
        if state.is_terminal() {
            report.completed = true;
            let snapshot = state.clone();
            drop(state);
            self.store
                .archive(session_id, snapshot, ArchiveReason::Completed)
                .await;
        }

        tracing::debug!(
            session_id = %session_id,
            stage = %report.stage,
            hops = report.hops,
            "turn complete"
        );
        Ok(report)
    }

    /// Archive the session and start a fresh one
    pub async fn reset(&self, session_id: Uuid) -> Result<TurnReport, SessionError> {
        let handle = self
            .store
            .handle(session_id)
            .await
            .ok_or(SessionError::NotFound(session_id))?;
        let snapshot = handle
            .try_lock()
            .map_err(|_| SessionError::Busy(session_id))?
            .clone();
        self.store
            .archive(session_id, snapshot, ArchiveReason::Reset)
            .await;
        Ok(self.start_session().await)
    }

    pub async fn snapshot(&self, session_id: Uuid) -> Option<SessionState> {
        self.store.snapshot(session_id).await
    }

    async fn abort(&self, session_id: Uuid, state: SessionState, err: &StageError) {
        tracing::error!(session_id = %session_id, error = %err, "session aborted");
        self.store
            .archive(
                session_id,
                state,
                ArchiveReason::Aborted {
                    error: err.to_string(),
                },
            )
            .await;
    }
}

/// Wires configuration and collaborators into a runner
#[derive(Default)]
pub struct RunnerBuilder {
    config: Option<FlowConfig>,
    evidence: Option<Arc<dyn EvidenceStore>>,
    generator: Option<Arc<dyn TextGenerationPort>>,
    store: Option<Arc<SessionStore>>,
}

impl RunnerBuilder {
    pub fn config(mut self, config: FlowConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn evidence(mut self, evidence: Arc<dyn EvidenceStore>) -> Self {
        self.evidence = Some(evidence);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn TextGenerationPort>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Share a store between runners; a fresh one is created otherwise
    pub fn store(mut self, store: Arc<SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<ConversationRunner, ConfigError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let evidence = self.evidence.ok_or(ConfigError::MissingComponent("evidence store"))?;
        let generator = self
            .generator
            .ok_or(ConfigError::MissingComponent("generation port"))?;
        let store = self.store.unwrap_or_default();

        let engine = StageEngine::new(Arc::new(config), evidence, generator);
        Ok(ConversationRunner::new(engine, store))
    }
}
