//! Validation stage: rating questions, then probability scoring

use serde_json::json;

use super::questionnaire::{consume_answer, opening, LoopStep};
use super::{prompts, HandlerOutput, StageEngine};
use crate::contract::Marker;
use crate::error::StageError;
use crate::generation::GenerationTask;
use crate::state::{SessionState, StateChange};
use crate::types::Stage;

impl StageEngine {
    pub(super) async fn run_validation(
        &self,
        state: &SessionState,
        input: Option<&str>,
    ) -> Result<HandlerOutput, StageError> {
        if state.hypothesis.candidates.is_empty() {
            return Err(StageError::invariant(
                Stage::Validation,
                "validation entered without candidates",
            ));
        }
        let validation = &state.validation;
        if validation.probabilities.is_some() {
            return Ok(HandlerOutput::none());
        }

        match LoopStep::of(&validation.questionnaire, input) {
            LoopStep::Generate => self.validation_questions(state).await,
            LoopStep::Idle => Ok(HandlerOutput::none()),
            LoopStep::Answer(text) => consume_answer(
                Stage::Validation,
                &validation.questionnaire,
                &text,
                &self.config,
                StateChange::ValidationAnswer,
            ),
            LoopStep::Score => self.validation_scoring(state).await,
        }
    }

    async fn validation_questions(&self, state: &SessionState) -> Result<HandlerOutput, StageError> {
        let context = json!({
            "intake_summary": state.intake.summary,
            "hypothesis_report": state.hypothesis.report,
            "candidates": state.hypothesis.candidates,
            "answer_min": self.config.answer_min,
            "answer_max": self.config.answer_max,
        });
        let reply = self
            .generate(state, GenerationTask::ValidationQuestions, prompts::VALIDATION_QUESTIONS, context)
            .await?;

        let batch = reply
            .machine
            .questions()
            .ok_or_else(|| StageError::contract(Stage::Validation, "no usable question batch"))?;
        let first = batch
            .get(0)
            .cloned()
            .ok_or_else(|| StageError::contract(Stage::Validation, "question batch is empty"))?;

        tracing::info!(session_id = %state.session_id, questions = batch.len(), "validation questions ready");

        let mut output = opening(reply.user, batch.len(), &first, &self.config);
        output.change(StateChange::ValidationBatch(batch));
        Ok(output)
    }

    async fn validation_scoring(&self, state: &SessionState) -> Result<HandlerOutput, StageError> {
        let answers: Vec<_> = state
            .validation
            .questionnaire
            .answered()
            .into_iter()
            .map(|(question, answer)| {
                json!({
                    "id": question.id,
                    "text": question.text,
                    "targetCategory": question.target_category,
                    "answer": answer,
                })
            })
            .collect();
        let categories: Vec<&str> = state
            .hypothesis
            .candidates
            .iter()
            .map(|c| c.category.as_str())
            .collect();
        let context = json!({
            "candidates": categories,
            "answers": answers,
            "answer_min": self.config.answer_min,
            "answer_max": self.config.answer_max,
        });
        let reply = self
            .generate(state, GenerationTask::ValidationScoring, prompts::VALIDATION_SCORING, context)
            .await?;

        let probabilities = reply
            .machine
            .probabilities()
            .ok_or_else(|| StageError::contract(Stage::Validation, "no usable probability map"))?;

        if let Some((category, score)) = probabilities.argmax() {
            tracing::info!(
                session_id = %state.session_id,
                category = %category,
                score,
                "validation scored"
            );
        }

        let mut output = HandlerOutput::none();
        output
            .change(StateChange::ValidationScored {
                probabilities,
                verdict: reply.machine.get(Marker::Validated).map(str::to_string),
            })
            .say(reply.user);
        Ok(output)
    }
}
