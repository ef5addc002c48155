//! Severity stage: standardized questionnaire for the confirmed category

use serde_json::json;

use super::questionnaire::{consume_answer, opening, LoopStep};
use super::{prompts, HandlerOutput, StageEngine};
use crate::contract::Marker;
use crate::error::StageError;
use crate::generation::GenerationTask;
use crate::state::{SessionState, StateChange};
use crate::types::{SeverityOutcome, Stage};

impl StageEngine {
    pub(super) async fn run_severity(
        &self,
        state: &SessionState,
        input: Option<&str>,
    ) -> Result<HandlerOutput, StageError> {
        let severity = &state.severity;
        let target = severity
            .target
            .as_deref()
            .ok_or_else(|| StageError::invariant(Stage::Severity, "severity entered without a target"))?;
        if severity.result.is_some() {
            return Ok(HandlerOutput::none());
        }

        let scale = match (&severity.scale, self.scales.lookup(target)) {
            (Some(scale), _) => scale.clone(),
            (None, Some(scale)) => scale.clone(),
            (None, None) => {
                let reason = prompts::severity_skipped(target);
                tracing::info!(session_id = %state.session_id, target = %target, "severity skipped");
                let mut output = HandlerOutput::none();
                output
                    .change(StateChange::SeverityResult(SeverityOutcome::Skipped {
                        reason: reason.clone(),
                    }))
                    .say(format!("{}.", reason));
                return Ok(output);
            }
        };

        match LoopStep::of(&severity.questionnaire, input) {
            LoopStep::Generate => {
                let context = json!({
                    "target": target,
                    "scale": scale,
                    "answer_min": self.config.answer_min,
                    "answer_max": self.config.answer_max,
                });
                let reply = self
                    .generate(state, GenerationTask::SeverityQuestions, prompts::SEVERITY_QUESTIONS, context)
                    .await?;
                let batch = reply
                    .machine
                    .questions()
                    .ok_or_else(|| StageError::contract(Stage::Severity, "no usable question batch"))?;
                let first = batch
                    .get(0)
                    .cloned()
                    .ok_or_else(|| StageError::contract(Stage::Severity, "question batch is empty"))?;
                if batch.len() != scale.item_count {
                    tracing::debug!(
                        scale = %scale.id,
                        expected = scale.item_count,
                        got = batch.len(),
                        "severity item count differs from scale"
                    );
                }

                let mut output = opening(reply.user, batch.len(), &first, &self.config);
                output.change(StateChange::SeverityBatch { scale, batch });
                Ok(output)
            }
            LoopStep::Idle => Ok(HandlerOutput::none()),
            LoopStep::Answer(text) => consume_answer(
                Stage::Severity,
                &severity.questionnaire,
                &text,
                &self.config,
                StateChange::SeverityAnswer,
            ),
            LoopStep::Score => {
                let answers: Vec<_> = severity
                    .questionnaire
                    .answered()
                    .into_iter()
                    .map(|(question, answer)| json!({ "id": question.id, "text": question.text, "answer": answer }))
                    .collect();
                let context = json!({
                    "target": target,
                    "scale": scale,
                    "answers": answers,
                });
                let reply = self
                    .generate(state, GenerationTask::SeverityScoring, prompts::SEVERITY_SCORING, context)
                    .await?;
                let result = reply
                    .machine
                    .get(Marker::Severity)
                    .ok_or_else(|| StageError::contract(Stage::Severity, "severity result missing"))?
                    .to_string();
                let (score, level) = reply.machine.severity_score();

                tracing::info!(session_id = %state.session_id, scale = %scale.id, ?score, "severity scored");

                let mut output = HandlerOutput::none();
                output
                    .change(StateChange::SeverityResult(SeverityOutcome::Assessed {
                        scale_id: scale.id,
                        result,
                        score,
                        level,
                    }))
                    .say(reply.user);
                Ok(output)
            }
        }
    }
}
