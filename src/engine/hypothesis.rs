//! Hypothesis stage: retrieve, vote, and report candidate categories

use serde_json::json;

use super::{prompts, HandlerOutput, StageEngine};
use crate::contract::Marker;
use crate::error::StageError;
use crate::generation::GenerationTask;
use crate::state::{SessionState, StateChange};
use crate::types::{Candidate, Corpus};

impl StageEngine {
    pub(super) async fn run_hypothesis(&self, state: &SessionState) -> Result<HandlerOutput, StageError> {
        let query = state.symptom_text();
        let items = self
            .evidence
            .search(Corpus::Criteria, &query, self.config.retrieval_top_k, None)
            .await?;
        let candidates = self.ranker.rank(&items, self.evidence.as_ref()).await?;

        tracing::info!(
            session_id = %state.session_id,
            passages = items.len(),
            candidates = candidates.len(),
            "hypothesis ranking"
        );

        let mut output = HandlerOutput::none();
        if candidates.is_empty() {
            output
                .change(StateChange::Candidates {
                    query,
                    candidates,
                    report: String::new(),
                })
                .say(prompts::NO_CANDIDATES);
            return Ok(output);
        }

        let context = json!({
            "intake_summary": state.intake.summary,
            "collected": state.intake.collected,
            "candidates": candidates,
        });
        let reply = self
            .generate(state, GenerationTask::HypothesisReport, prompts::HYPOTHESIS, context)
            .await?;

        let report = match reply.machine.get(Marker::Hypothesis) {
            Some(report) => report.to_string(),
            None => {
                tracing::debug!(session_id = %state.session_id, "no hypothesis marker; using ranked list");
                fallback_report(&candidates)
            }
        };

        output
            .change(StateChange::Candidates {
                query,
                candidates,
                report,
            })
            .say(reply.user);
        Ok(output)
    }
}

/// "1. A; 2. B; 3. C"
fn fallback_report(candidates: &[Candidate]) -> String {
    candidates
        .iter()
        .map(|c| format!("{}. {}", c.rank, c.category))
        .collect::<Vec<_>>()
        .join("; ")
}
