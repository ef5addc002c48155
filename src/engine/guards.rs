//! Transition table and guards
//!
//! Every stage transition is one row of [`TRANSITIONS`]. After each
//! handler step the engine takes the first row whose `from` is the
//! current stage and whose guard passes. Guards only read state.

use crate::config::FlowConfig;
use crate::state::{Blocker, BlockerType, SessionState};
use crate::types::Stage;

/// One row of the stage transition table
#[derive(Debug)]
pub struct TransitionRule {
    pub from: Stage,
    pub to: Stage,
    pub name: &'static str,
    pub guard: fn(&SessionState, &FlowConfig) -> bool,
}

pub const TRANSITIONS: &[TransitionRule] = &[
    TransitionRule {
        from: Stage::Intake,
        to: Stage::Hypothesis,
        name: "intake_complete",
        guard: intake_complete,
    },
    TransitionRule {
        from: Stage::Hypothesis,
        to: Stage::Validation,
        name: "candidates_ready",
        guard: candidates_ready,
    },
    TransitionRule {
        from: Stage::Hypothesis,
        to: Stage::Intake,
        name: "no_candidates",
        guard: no_candidates,
    },
    TransitionRule {
        from: Stage::Validation,
        to: Stage::Severity,
        name: "confident",
        guard: validation_confident,
    },
    TransitionRule {
        from: Stage::Validation,
        to: Stage::Intake,
        name: "low_confidence",
        guard: validation_inconclusive,
    },
    TransitionRule {
        from: Stage::Severity,
        to: Stage::Solution,
        name: "severity_recorded",
        guard: severity_recorded,
    },
    TransitionRule {
        from: Stage::Solution,
        to: Stage::Terminal,
        name: "solution_delivered",
        guard: solution_delivered,
    },
];

/// First transition whose guard passes for the current stage
pub fn next_transition(state: &SessionState, config: &FlowConfig) -> Option<&'static TransitionRule> {
    TRANSITIONS
        .iter()
        .filter(|rule| rule.from == state.stage)
        .find(|rule| (rule.guard)(state, config))
}

// ─── Guards ─────────────────────────────────────────────────────

pub fn intake_complete(state: &SessionState, config: &FlowConfig) -> bool {
    let intake = &state.intake;
    intake.summary.is_some()
        && intake.missing.is_empty()
        && intake.turn_count >= config.min_intake_turns
        && (!intake.is_reintake() || intake.supplementary_asked >= config.min_supplementary_questions)
}

fn candidates_ready(state: &SessionState, _config: &FlowConfig) -> bool {
    state.hypothesis.has_run() && !state.hypothesis.candidates.is_empty()
}

fn no_candidates(state: &SessionState, _config: &FlowConfig) -> bool {
    state.hypothesis.has_run() && state.hypothesis.candidates.is_empty()
}

/// Strictly above the threshold; exactly the threshold is insufficient
pub fn validation_confident(state: &SessionState, config: &FlowConfig) -> bool {
    state
        .validation
        .probabilities
        .as_ref()
        .and_then(|p| p.max())
        .is_some_and(|max| max > config.confidence_threshold)
}

fn validation_inconclusive(state: &SessionState, config: &FlowConfig) -> bool {
    state.validation.probabilities.is_some() && !validation_confident(state, config)
}

fn severity_recorded(state: &SessionState, _config: &FlowConfig) -> bool {
    state.severity.result.is_some()
}

fn solution_delivered(state: &SessionState, _config: &FlowConfig) -> bool {
    state.solution.summary.is_some()
}

// ─── Blockers ───────────────────────────────────────────────────

/// What keeps the current stage from advancing, for diagnostics
pub fn blockers(state: &SessionState, config: &FlowConfig) -> Vec<Blocker> {
    let mut blockers = Vec::new();
    match state.stage {
        Stage::Intake => {
            let intake = &state.intake;
            if !intake.missing.is_empty() {
                let fields: Vec<String> = intake.missing.iter().cloned().collect();
                let description = format!("Missing intake fields: {}", fields.join(", "));
                blockers.push(Blocker::new(BlockerType::MissingFields { fields }, description));
            }
            if intake.turn_count < config.min_intake_turns {
                blockers.push(Blocker::new(
                    BlockerType::TooFewTurns {
                        have: intake.turn_count,
                        need: config.min_intake_turns,
                    },
                    "Not enough intake turns yet",
                ));
            }
            if intake.is_reintake() && intake.supplementary_asked < config.min_supplementary_questions {
                blockers.push(Blocker::new(
                    BlockerType::SupplementaryQuestions {
                        have: intake.supplementary_asked,
                        need: config.min_supplementary_questions,
                    },
                    "Re-intake needs more follow-up questions",
                ));
            }
            if intake.summary.is_none() {
                blockers.push(Blocker::new(BlockerType::SummaryMissing, "No intake summary yet"));
            }
        }
        Stage::Validation | Stage::Severity => {
            let questionnaire = if state.stage == Stage::Validation {
                &state.validation.questionnaire
            } else {
                &state.severity.questionnaire
            };
            if state.stage == Stage::Severity && state.severity.result.is_some() {
                return blockers;
            }
            if !questionnaire.is_started() {
                blockers.push(Blocker::new(BlockerType::QuestionsPending, "Questions not generated yet"));
            } else if questionnaire.awaiting_answer() {
                let remaining = questionnaire.len() - questionnaire.cursor;
                blockers.push(Blocker::new(
                    BlockerType::AwaitingAnswers { remaining },
                    format!("{} question(s) left", remaining),
                ));
            } else if state.stage == Stage::Validation {
                blockers.push(Blocker::new(BlockerType::ScoringPending, "Answers not scored yet"));
            } else {
                blockers.push(Blocker::new(BlockerType::SeverityPending, "Severity not scored yet"));
            }
        }
        Stage::Hypothesis | Stage::Solution | Stage::Terminal => {}
    }
    blockers
}
