//! Intake stage: multi-turn elicitation of the required fields

use serde_json::json;

use super::{prompts, HandlerOutput, StageEngine};
use crate::contract::Marker;
use crate::error::StageError;
use crate::generation::GenerationTask;
use crate::state::{SessionState, StateChange};

impl StageEngine {
    pub(super) async fn run_intake(
        &self,
        state: &SessionState,
        input: Option<&str>,
    ) -> Result<HandlerOutput, StageError> {
        let intake = &state.intake;
        if input.is_none() {
            // Entering re-intake: open with a follow-up question
            if intake.is_reintake() && intake.supplementary_asked == 0 && intake.summary.is_none() {
                return self.open_reintake(state).await;
            }
            return Ok(HandlerOutput::none());
        }

        let reply = self
            .generate(state, GenerationTask::IntakeReply, prompts::INTAKE, self.intake_context(state))
            .await?;

        let mut output = HandlerOutput::none();
        output.change(StateChange::IntakeTurn);

        if let Some(fields) = reply.machine.intake_fields() {
            if !fields.is_empty() {
                output.change(StateChange::IntakeFields(fields));
            }
        } else if reply.machine.get(Marker::StructuredData).is_some() {
            tracing::debug!(session_id = %state.session_id, "intake fields payload not an object");
        }

        let summary_accepted = match reply.machine.get(Marker::Summary) {
            Some(summary)
                if !intake.is_reintake()
                    || intake.supplementary_asked >= self.config.min_supplementary_questions =>
            {
                output.change(StateChange::IntakeSummary(summary.to_string()));
                true
            }
            Some(_) => {
                tracing::warn!(
                    session_id = %state.session_id,
                    asked = intake.supplementary_asked,
                    "re-intake summary before enough follow-up questions; discarded"
                );
                false
            }
            None => false,
        };
        if intake.is_reintake() && !summary_accepted {
            output.change(StateChange::SupplementaryQuestion);
        }

        if reply.user.trim().is_empty() {
            output.say(prompts::INTAKE_COMPLETE);
        } else {
            output.say(reply.user);
        }
        Ok(output)
    }

    async fn open_reintake(&self, state: &SessionState) -> Result<HandlerOutput, StageError> {
        let reply = self
            .generate(
                state,
                GenerationTask::SupplementaryQuestion,
                prompts::SUPPLEMENTARY,
                self.intake_context(state),
            )
            .await?;
        if reply.user.trim().is_empty() {
            return Err(StageError::contract(state.stage, "follow-up question is empty"));
        }

        let mut output = HandlerOutput::none();
        output
            .change(StateChange::SupplementaryQuestion)
            .say(reply.user);
        Ok(output)
    }

    fn intake_context(&self, state: &SessionState) -> serde_json::Value {
        let intake = &state.intake;
        let candidates: Vec<&str> = state
            .hypothesis
            .candidates
            .iter()
            .map(|c| c.category.as_str())
            .collect();
        json!({
            "required_fields": self.config.required_fields,
            "collected": intake.collected,
            "missing_fields": intake.missing,
            "locked_fields": intake.locked,
            "pass": intake.pass,
            "supplementary_asked": intake.supplementary_asked,
            "previous_summaries": intake.previous_summaries,
            "candidates": candidates,
        })
    }
}
