//! Session State
//!
//! `SessionState` is the single record threaded through every stage of
//! one conversation. Handlers never write to it directly: they return
//! [`StateChange`] deltas which the engine applies through
//! [`SessionState::apply`]. Stage transitions are deltas too, and their
//! entry effects (field locking, re-intake resets, severity targeting)
//! live in one place here.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::FlowConfig;
use crate::severity::SeverityScale;
use crate::types::{
    Candidate, ChatMessage, EvidenceItem, ProbabilityMap, Question, QuestionBatch,
    SeverityOutcome, Stage,
};

/// Mutable record for one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: Uuid,
    pub stage: Stage,
    /// Append-only conversation log
    pub messages: Vec<ChatMessage>,

    pub intake: IntakeState,
    pub hypothesis: HypothesisState,
    pub validation: ValidationState,
    pub severity: SeverityState,
    pub solution: SolutionState,

    /// History of stage transitions
    pub history: Vec<StageTransition>,
    /// Why the current stage cannot advance yet
    pub blockers: Vec<Blocker>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(config: &FlowConfig) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            stage: Stage::Intake,
            messages: Vec::new(),
            intake: IntakeState::new(&config.required_fields, &config.invariant_fields),
            hypothesis: HypothesisState::default(),
            validation: ValidationState::default(),
            severity: SeverityState::default(),
            solution: SolutionState::default(),
            history: Vec::new(),
            blockers: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// Apply one delta. Deltas are self-consistent: any prefix of a
    /// handler's change list leaves the state valid.
    pub fn apply(&mut self, change: StateChange) {
        match change {
            StateChange::IntakeTurn => self.intake.turn_count += 1,
            StateChange::IntakeFields(fields) => self.intake.record_fields(fields),
            StateChange::IntakeSummary(summary) => self.intake.summary = Some(summary),
            StateChange::SupplementaryQuestion => self.intake.supplementary_asked += 1,
            StateChange::Candidates {
                query,
                candidates,
                report,
            } => self.hypothesis.replace(query, candidates, report),
            StateChange::ValidationBatch(batch) => self.validation.questionnaire.start(batch),
            StateChange::ValidationAnswer(answer) => self.validation.questionnaire.record(answer),
            StateChange::ValidationScored {
                probabilities,
                verdict,
            } => {
                self.validation.probabilities = Some(probabilities);
                self.validation.verdict = verdict;
            }
            StateChange::SeverityBatch { scale, batch } => {
                self.severity.scale = Some(scale);
                self.severity.questionnaire.start(batch);
            }
            StateChange::SeverityAnswer(answer) => self.severity.questionnaire.record(answer),
            StateChange::SeverityResult(outcome) => self.severity.result = Some(outcome),
            StateChange::Solution { summary, evidence } => {
                self.solution.summary = Some(summary);
                self.solution.evidence = evidence;
            }
            StateChange::Blockers(blockers) => self.blockers = blockers,
            StateChange::Transition { to, reason } => self.transition_to(to, reason),
        }
        self.updated_at = Utc::now();
    }

    /// Record a stage transition and run the target stage's entry effects
    fn transition_to(&mut self, to: Stage, reason: String) {
        let from = std::mem::replace(&mut self.stage, to);

        match (from, to) {
            (Stage::Intake, Stage::Hypothesis) => {
                self.intake.lock_invariants();
                self.hypothesis.archive_round();
            }
            (Stage::Validation, Stage::Intake) => {
                self.validation.archive_pass();
                self.intake.reopen();
            }
            (Stage::Hypothesis, Stage::Intake) => self.intake.reopen(),
            (_, Stage::Severity) => {
                self.severity.target = self
                    .validation
                    .probabilities
                    .as_ref()
                    .and_then(|p| p.argmax())
                    .map(|(category, _)| category.to_string());
            }
            _ => {}
        }

        self.history.push(StageTransition {
            from,
            to,
            at: Utc::now(),
            reason,
        });
        self.blockers.clear(); // Re-evaluated after the next step
    }

    /// Symptom text used as the retrieval query
    pub fn symptom_text(&self) -> String {
        match &self.intake.summary {
            Some(summary) if !summary.trim().is_empty() => summary.clone(),
            _ => self
                .intake
                .collected
                .values()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}

/// Explicit state deltas produced by stage handlers
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    IntakeTurn,
    IntakeFields(BTreeMap<String, String>),
    IntakeSummary(String),
    SupplementaryQuestion,
    Candidates {
        query: String,
        candidates: Vec<Candidate>,
        report: String,
    },
    ValidationBatch(QuestionBatch),
    ValidationAnswer(u8),
    ValidationScored {
        probabilities: ProbabilityMap,
        verdict: Option<String>,
    },
    SeverityBatch {
        scale: SeverityScale,
        batch: QuestionBatch,
    },
    SeverityAnswer(u8),
    SeverityResult(SeverityOutcome),
    Solution {
        summary: String,
        evidence: Vec<EvidenceItem>,
    },
    Blockers(Vec<Blocker>),
    Transition {
        to: Stage,
        reason: String,
    },
}

// ─── Intake ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntakeState {
    pub collected: BTreeMap<String, String>,
    pub missing: BTreeSet<String>,
    /// Fields that may be locked once the first pass completes
    pub invariant_fields: Vec<String>,
    /// Fields frozen verbatim; later updates are ignored
    pub locked: BTreeSet<String>,
    /// User turns taken in the current pass
    pub turn_count: u32,
    /// Completion artifact of the current pass
    pub summary: Option<String>,
    pub previous_summaries: Vec<String>,
    /// 0 for the first pass, incremented on every re-intake
    pub pass: u32,
    /// Questions asked in the current re-intake pass
    pub supplementary_asked: u32,
}

impl IntakeState {
    pub fn new(required: &[String], invariant: &[String]) -> Self {
        Self {
            missing: required.iter().cloned().collect(),
            invariant_fields: invariant.to_vec(),
            ..Default::default()
        }
    }

    pub fn is_reintake(&self) -> bool {
        self.pass > 0
    }

    fn record_fields(&mut self, fields: BTreeMap<String, String>) {
        for (name, value) in fields {
            let value = value.trim().to_string();
            if value.is_empty() {
                continue;
            }
            if self.locked.contains(&name) {
                tracing::debug!(field = %name, "ignoring update to locked intake field");
                continue;
            }
            self.missing.remove(&name);
            self.collected.insert(name, value);
        }
    }

    fn lock_invariants(&mut self) {
        for field in &self.invariant_fields {
            if self.collected.contains_key(field) {
                self.locked.insert(field.clone());
            }
        }
    }

    fn reopen(&mut self) {
        if let Some(summary) = self.summary.take() {
            self.previous_summaries.push(summary);
        }
        self.turn_count = 0;
        self.supplementary_asked = 0;
        self.pass += 1;
    }
}

// ─── Hypothesis ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HypothesisState {
    pub query: Option<String>,
    pub candidates: Vec<Candidate>,
    pub report: Option<String>,
    /// Earlier rounds, oldest first
    pub rounds: Vec<HypothesisRound>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisRound {
    pub query: String,
    pub candidates: Vec<Candidate>,
    pub report: String,
}

impl HypothesisState {
    fn replace(&mut self, query: String, candidates: Vec<Candidate>, report: String) {
        self.archive_round();
        self.query = Some(query);
        self.candidates = candidates;
        self.report = Some(report);
    }

    /// Move the current round into `rounds` so a new visit starts empty
    fn archive_round(&mut self) {
        if let (Some(query), Some(report)) = (self.query.take(), self.report.take()) {
            self.rounds.push(HypothesisRound {
                query,
                candidates: std::mem::take(&mut self.candidates),
                report,
            });
        }
        self.candidates.clear();
    }

    pub fn has_run(&self) -> bool {
        self.report.is_some()
    }
}

// ─── Questionnaires ─────────────────────────────────────────────

/// Generate-once, consume-sequentially question loop
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Questionnaire {
    pub batch: Option<QuestionBatch>,
    pub answers: Vec<u8>,
    pub cursor: usize,
}

impl Questionnaire {
    fn start(&mut self, batch: QuestionBatch) {
        if self.batch.is_some() {
            tracing::warn!("question batch already present; keeping the existing batch");
            return;
        }
        self.batch = Some(batch);
        self.answers.clear();
        self.cursor = 0;
    }

    fn record(&mut self, answer: u8) {
        if self.awaiting_answer() {
            self.answers.push(answer);
            self.cursor += 1;
        }
    }

    fn clear(&mut self) {
        self.batch = None;
        self.answers.clear();
        self.cursor = 0;
    }

    pub fn is_started(&self) -> bool {
        self.batch.is_some()
    }

    pub fn len(&self) -> usize {
        self.batch.as_ref().map_or(0, QuestionBatch::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn awaiting_answer(&self) -> bool {
        self.is_started() && self.cursor < self.len()
    }

    pub fn is_complete(&self) -> bool {
        self.is_started() && self.cursor >= self.len()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.batch.as_ref()?.get(self.cursor)
    }

    /// Question/answer pairs answered so far
    pub fn answered(&self) -> Vec<(&Question, u8)> {
        match &self.batch {
            Some(batch) => batch.iter().zip(self.answers.iter().copied()).collect(),
            None => Vec::new(),
        }
    }
}

// ─── Validation ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationState {
    pub questionnaire: Questionnaire,
    /// Terminal artifact of the current pass
    pub probabilities: Option<ProbabilityMap>,
    pub verdict: Option<String>,
    /// Passes that ended in re-intake, oldest first
    pub history: Vec<ValidationRound>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRound {
    pub probabilities: ProbabilityMap,
    pub verdict: Option<String>,
    pub answers: Vec<u8>,
}

impl ValidationState {
    fn archive_pass(&mut self) {
        if let Some(probabilities) = self.probabilities.take() {
            self.history.push(ValidationRound {
                probabilities,
                verdict: self.verdict.take(),
                answers: std::mem::take(&mut self.questionnaire.answers),
            });
        }
        self.verdict = None;
        self.questionnaire.clear();
    }
}

// ─── Severity ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SeverityState {
    pub target: Option<String>,
    pub scale: Option<SeverityScale>,
    pub questionnaire: Questionnaire,
    pub result: Option<SeverityOutcome>,
}

// ─── Solution ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SolutionState {
    pub summary: Option<String>,
    pub evidence: Vec<EvidenceItem>,
}

// ─── Transitions & blockers ─────────────────────────────────────

/// Record of a stage transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTransition {
    pub from: Stage,
    pub to: Stage,
    pub at: DateTime<Utc>,
    pub reason: String,
}

/// A condition preventing the current stage from advancing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blocker {
    pub blocker_type: BlockerType,
    pub description: String,
}

impl Blocker {
    pub fn new(blocker_type: BlockerType, description: impl Into<String>) -> Self {
        Self {
            blocker_type,
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum BlockerType {
    MissingFields { fields: Vec<String> },
    TooFewTurns { have: u32, need: u32 },
    SupplementaryQuestions { have: u32, need: u32 },
    SummaryMissing,
    AwaitingAnswers { remaining: usize },
    QuestionsPending,
    ScoringPending,
    SeverityPending,
}
