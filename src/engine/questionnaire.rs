//! Shared generate-once, consume-sequentially loop for the Validation
//! and Severity stages

use super::{prompts, HandlerOutput};
use crate::answers::parse_answer;
use crate::config::FlowConfig;
use crate::error::StageError;
use crate::state::{Questionnaire, StateChange};
use crate::types::{Question, Stage};

/// Where a questionnaire stands for the current step
pub(super) enum LoopStep {
    /// No batch yet: generate one
    Generate,
    /// Waiting on the user and no input arrived
    Idle,
    /// Input for the current question
    Answer(String),
    /// Every question answered: score
    Score,
}

impl LoopStep {
    pub(super) fn of(questionnaire: &Questionnaire, input: Option<&str>) -> Self {
        if !questionnaire.is_started() {
            LoopStep::Generate
        } else if questionnaire.awaiting_answer() {
            match input {
                Some(text) => LoopStep::Answer(text.to_string()),
                None => LoopStep::Idle,
            }
        } else {
            LoopStep::Score
        }
    }
}

/// Validate one answer and produce the record change plus the next prompt.
///
/// An invalid answer leaves the cursor where it was.
pub(super) fn consume_answer(
    stage: Stage,
    questionnaire: &Questionnaire,
    text: &str,
    config: &FlowConfig,
    record: fn(u8) -> StateChange,
) -> Result<HandlerOutput, StageError> {
    let answer = parse_answer(text, config.answer_min, config.answer_max).ok_or_else(|| {
        StageError::input(
            stage,
            format!(
                "expected a number from {} to {}, got '{}'",
                config.answer_min, config.answer_max, text
            ),
        )
    })?;

    let mut output = HandlerOutput::none();
    output.change(record(answer));

    let next = questionnaire.cursor + 1;
    match questionnaire.batch.as_ref().and_then(|b| b.get(next)) {
        Some(question) => {
            output.say(format_question(next, questionnaire.len(), question));
        }
        // Last answer committed; score on a follow-up step
        None => output.follow_up = true,
    }
    Ok(output)
}

/// "(2/5) Text"
pub(super) fn format_question(index: usize, total: usize, question: &Question) -> String {
    format!("({}/{}) {}", index + 1, total, question.text)
}

/// Intro text, answer hint and the first question
pub(super) fn opening(intro: String, questions_total: usize, first: &Question, config: &FlowConfig) -> HandlerOutput {
    let mut output = HandlerOutput::none();
    output
        .say(intro)
        .say(prompts::answer_hint(config.answer_min, config.answer_max))
        .say(format_question(0, questions_total, first));
    output
}
