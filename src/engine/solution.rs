//! Solution stage: treatment evidence and the closing summary

use serde_json::json;

use super::{prompts, HandlerOutput, StageEngine};
use crate::contract::Marker;
use crate::error::StageError;
use crate::evidence::prioritize_category;
use crate::generation::GenerationTask;
use crate::state::{SessionState, StateChange};
use crate::types::{Corpus, Stage};

impl StageEngine {
    pub(super) async fn run_solution(&self, state: &SessionState) -> Result<HandlerOutput, StageError> {
        let target = state
            .severity
            .target
            .clone()
            .or_else(|| {
                state
                    .validation
                    .probabilities
                    .as_ref()
                    .and_then(|p| p.argmax())
                    .map(|(category, _)| category.to_string())
            })
            .ok_or_else(|| StageError::invariant(Stage::Solution, "no confirmed category"))?;

        let symptom = state.symptom_text();
        let query = if symptom.trim().is_empty() {
            format!("{} treatment", target)
        } else {
            format!("{} {} treatment", target, symptom)
        };
        let items = self
            .evidence
            .search(Corpus::Treatment, &query, self.config.treatment_top_k, None)
            .await?;
        let evidence = prioritize_category(items, &target, self.config.treatment_keep);

        let context = json!({
            "target": target,
            "intake_summary": state.intake.summary,
            "hypothesis_report": state.hypothesis.report,
            "validation_verdict": state.validation.verdict,
            "severity": state.severity.result.as_ref().map(|r| r.summary()),
            "treatment_evidence": evidence,
        });
        let reply = self
            .generate(state, GenerationTask::FinalSummary, prompts::SOLUTION, context)
            .await?;

        let summary = match reply.machine.get(Marker::FinalResponse) {
            Some(text) => text.to_string(),
            None if !reply.user.trim().is_empty() => reply.user.clone(),
            None => return Err(StageError::contract(Stage::Solution, "final response is empty")),
        };

        tracing::info!(
            session_id = %state.session_id,
            target = %target,
            evidence = evidence.len(),
            "solution delivered"
        );

        let mut output = HandlerOutput::none();
        if reply.user.trim().is_empty() {
            output.say(summary.clone());
        } else {
            output.say(reply.user);
        }
        output.change(StateChange::Solution { summary, evidence });
        Ok(output)
    }
}
