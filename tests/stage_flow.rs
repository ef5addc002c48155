//! End-to-end stage flow through the conversation runner
//!
//! Covers the forward path to Terminal, both backward branches into
//! re-intake, the skipped-severity shortcut, and the question loop's
//! sequential consumption.

mod helpers;

use counsel_flow::engine::prompts;
use counsel_flow::generation::GenerationTask;
use counsel_flow::types::SeverityOutcome;
use counsel_flow::{FlowConfig, SessionError, Stage};
use helpers::*;

use std::sync::Arc;

fn script_validation(generator: &ScriptedGenerator, questions: &[&str]) {
    generator.push(
        GenerationTask::HypothesisReport,
        hypothesis_reply("Low mood and loss of interest fit a depressive presentation (p. 160)."),
    );
    generator.push(
        GenerationTask::ValidationQuestions,
        questions_reply("A few quick ratings.", questions),
    );
}

#[tokio::test]
async fn test_full_session_reaches_terminal() {
    let generator = ScriptedGenerator::new();
    script_first_intake(&generator, DEPRESSED_SUMMARY);
    script_validation(&generator, &["I feel down", "I sleep poorly", "I lost interest"]);
    generator.push(
        GenerationTask::ValidationScoring,
        scoring_reply(
            &[("Depressive Disorders", 0.82), ("Sleep-Wake Disorders", 0.18)],
            "Depressive presentation",
        ),
    );
    generator.push(
        GenerationTask::SeverityQuestions,
        questions_reply("Now a short questionnaire.", &["Little interest", "Feeling down"]),
    );
    generator.push(
        GenerationTask::SeverityScoring,
        severity_reply("Moderate depressive symptoms", 12.0, "moderate"),
    );
    generator.push(
        GenerationTask::FinalSummary,
        final_reply(
            "Here is what we covered.",
            "Moderate low mood; behavioural activation and professional support are recommended.",
        ),
    );

    let runner = runner(generator.clone());
    let id = runner.start_session().await.session_id;

    for turn in &FIRST_INTAKE_TURNS[..2] {
        let report = runner.handle_turn(id, turn).await.unwrap();
        assert_eq!(report.stage, Stage::Intake);
        assert!(report.transitions.is_empty());
    }

    // Third turn completes intake and chains through Hypothesis
    let report = runner.handle_turn(id, FIRST_INTAKE_TURNS[2]).await.unwrap();
    assert_eq!(
        report.transitions,
        vec![
            (Stage::Intake, Stage::Hypothesis),
            (Stage::Hypothesis, Stage::Validation)
        ]
    );
    assert_eq!(report.stage, Stage::Validation);
    assert_eq!(report.hops, 3);
    assert_eq!(report.messages.last().unwrap(), "(1/3) I feel down");

    let state = runner.snapshot(id).await.unwrap();
    let categories: Vec<&str> = state
        .hypothesis
        .candidates
        .iter()
        .map(|c| c.category.as_str())
        .collect();
    assert_eq!(categories, vec!["Depressive Disorders", "Sleep-Wake Disorders"]);
    let evidence = state.hypothesis.candidates[0].evidence.as_ref().unwrap();
    assert_eq!(evidence.locator.as_deref(), Some("p. 160"));
    assert!(state.intake.locked.contains("chief_complaint"));

    let report = runner.handle_turn(id, "4").await.unwrap();
    assert_eq!(report.messages, vec!["(2/3) I sleep poorly".to_string()]);
    let report = runner.handle_turn(id, "I'd say 5").await.unwrap();
    assert_eq!(report.messages, vec!["(3/3) I lost interest".to_string()]);

    // Last answer: scored, then Severity opens its own questionnaire
    let report = runner.handle_turn(id, "four").await.unwrap();
    assert_eq!(report.transitions, vec![(Stage::Validation, Stage::Severity)]);
    assert_eq!(report.messages.last().unwrap(), "(1/2) Little interest");

    let state = runner.snapshot(id).await.unwrap();
    assert_eq!(state.validation.questionnaire.answers, vec![4, 5, 4]);
    assert_eq!(state.severity.target.as_deref(), Some("Depressive Disorders"));
    assert_eq!(state.severity.scale.as_ref().unwrap().id, "phq-9");

    runner.handle_turn(id, "2").await.unwrap();
    let report = runner.handle_turn(id, "3").await.unwrap();
    assert_eq!(
        report.transitions,
        vec![
            (Stage::Severity, Stage::Solution),
            (Stage::Solution, Stage::Terminal)
        ]
    );
    assert!(report.completed);
    assert_eq!(report.messages.last().unwrap(), "Here is what we covered.");

    let state = runner.snapshot(id).await.unwrap();
    assert_eq!(state.stage, Stage::Terminal);
    assert_eq!(state.history.len(), 5);
    assert_eq!(state.severity.questionnaire.answers, vec![2, 3]);
    assert_eq!(
        state.severity.result,
        Some(SeverityOutcome::Assessed {
            scale_id: "phq-9".into(),
            result: "Moderate depressive symptoms".into(),
            score: Some(12.0),
            level: Some("moderate".into()),
        })
    );
    assert!(state.solution.summary.as_deref().unwrap().starts_with("Moderate low mood"));
    assert_eq!(state.solution.evidence[0].category, "Depressive Disorders");

    let final_request = generator
        .requests()
        .into_iter()
        .find(|r| r.task == GenerationTask::FinalSummary)
        .unwrap();
    assert_eq!(final_request.context["target"], "Depressive Disorders");
    assert_eq!(final_request.context["severity"], "Moderate depressive symptoms");

    let config = FlowConfig::default();
    for request in generator.requests() {
        assert!(request.history.len() <= config.history_window);
        assert!(request
            .history
            .iter()
            .all(|m| m.content.chars().count() <= config.history_message_chars));
    }
    assert_eq!(generator.pending(), 0);

    assert!(matches!(
        runner.handle_turn(id, "hello again").await,
        Err(SessionError::Terminated(_))
    ));
    assert!(runner.store().is_archived(id).await);
}

#[tokio::test]
async fn test_intake_waits_for_minimum_turns() {
    let generator = ScriptedGenerator::new();
    generator.push(
        GenerationTask::IntakeReply,
        intake_reply(
            "Thanks.",
            &[
                ("chief_complaint", "low mood"),
                ("onset", "spring"),
                ("duration", "all day"),
                ("frequency", "daily"),
                ("functional_impact", "missing work"),
            ],
            Some(DEPRESSED_SUMMARY),
        ),
    );
    let runner = runner(generator.clone());
    let id = runner.start_session().await.session_id;

    let report = runner
        .handle_turn(id, "Everything at once: low mood since spring, all day, daily, missing work")
        .await
        .unwrap();
    assert_eq!(report.stage, Stage::Intake);

    let state = runner.snapshot(id).await.unwrap();
    assert!(state.intake.missing.is_empty());
    assert_eq!(state.intake.summary.as_deref(), Some(DEPRESSED_SUMMARY));
    assert_eq!(state.intake.turn_count, 1);
    assert_eq!(generator.calls(GenerationTask::HypothesisReport), 0);
}

#[tokio::test]
async fn test_low_confidence_returns_to_intake() {
    let generator = ScriptedGenerator::new();
    script_first_intake(&generator, DEPRESSED_SUMMARY);
    script_validation(&generator, &["I feel down"]);
    generator.push(
        GenerationTask::ValidationScoring,
        scoring_reply(
            &[("Depressive Disorders", 0.4), ("Sleep-Wake Disorders", 0.35)],
            "Unclear",
        ),
    );
    generator.push(
        GenerationTask::SupplementaryQuestion,
        "Do you also find it hard to fall asleep?",
    );

    let runner = runner(generator.clone());
    let id = runner.start_session().await.session_id;
    for turn in FIRST_INTAKE_TURNS {
        runner.handle_turn(id, turn).await.unwrap();
    }

    let report = runner.handle_turn(id, "3").await.unwrap();
    assert_eq!(report.transitions, vec![(Stage::Validation, Stage::Intake)]);
    assert_eq!(report.stage, Stage::Intake);
    assert_eq!(
        report.messages.last().unwrap(),
        "Do you also find it hard to fall asleep?"
    );

    let state = runner.snapshot(id).await.unwrap();
    assert_eq!(state.intake.pass, 1);
    assert_eq!(state.intake.supplementary_asked, 1);
    assert_eq!(state.intake.previous_summaries, vec![DEPRESSED_SUMMARY.to_string()]);
    assert!(state.validation.probabilities.is_none());
    assert_eq!(state.validation.history.len(), 1);
    assert_eq!(state.validation.history[0].answers, vec![3]);

    // A summary before enough follow-up questions is discarded, and the
    // locked complaint ignores the new value
    generator.push(
        GenerationTask::IntakeReply,
        intake_reply(
            "Does anything help?",
            &[("chief_complaint", "trouble sleeping")],
            Some("too early"),
        ),
    );
    generator.push(
        GenerationTask::IntakeReply,
        intake_reply("What does a bad night look like?", &[], None),
    );
    generator.push(
        GenerationTask::IntakeReply,
        intake_reply("Thank you.", &[], Some(DEPRESSED_SUMMARY)),
    );
    script_validation(&generator, &["I wake up early"]);

    let report = runner.handle_turn(id, "Yes, I wake at 4am").await.unwrap();
    assert!(report.transitions.is_empty());
    let state = runner.snapshot(id).await.unwrap();
    assert!(state.intake.summary.is_none());
    assert_eq!(state.intake.supplementary_asked, 2);
    assert_eq!(state.intake.collected["chief_complaint"], "feeling low and empty");

    runner.handle_turn(id, "Nothing really helps").await.unwrap();
    let report = runner.handle_turn(id, "I lie awake for hours").await.unwrap();
    assert_eq!(
        report.transitions,
        vec![
            (Stage::Intake, Stage::Hypothesis),
            (Stage::Hypothesis, Stage::Validation)
        ]
    );

    let state = runner.snapshot(id).await.unwrap();
    assert_eq!(state.hypothesis.rounds.len(), 1);
    assert_eq!(state.validation.questionnaire.cursor, 0);
    assert_eq!(state.validation.questionnaire.len(), 1);
    assert_eq!(generator.pending(), 0);
}

#[tokio::test]
async fn test_no_candidates_reopens_intake() {
    let generator = ScriptedGenerator::new();
    script_first_intake(&generator, "xyzzy plugh");
    generator.push(
        GenerationTask::SupplementaryQuestion,
        "Could you describe a typical day?",
    );

    let runner = runner(generator.clone());
    let id = runner.start_session().await.session_id;
    runner.handle_turn(id, FIRST_INTAKE_TURNS[0]).await.unwrap();
    runner.handle_turn(id, FIRST_INTAKE_TURNS[1]).await.unwrap();
    let report = runner.handle_turn(id, FIRST_INTAKE_TURNS[2]).await.unwrap();

    assert_eq!(
        report.transitions,
        vec![
            (Stage::Intake, Stage::Hypothesis),
            (Stage::Hypothesis, Stage::Intake)
        ]
    );
    assert!(report.messages.contains(&prompts::NO_CANDIDATES.to_string()));
    assert_eq!(report.messages.last().unwrap(), "Could you describe a typical day?");
    assert_eq!(generator.calls(GenerationTask::HypothesisReport), 0);

    let state = runner.snapshot(id).await.unwrap();
    assert!(state.hypothesis.candidates.is_empty());
    assert_eq!(state.intake.pass, 1);
    assert_eq!(state.intake.supplementary_asked, 1);
}

#[tokio::test]
async fn test_unregistered_target_skips_severity() {
    let generator = ScriptedGenerator::new();
    script_first_intake(&generator, DEPRESSED_SUMMARY);
    script_validation(&generator, &["I sleep poorly"]);
    generator.push(
        GenerationTask::ValidationScoring,
        scoring_reply(
            &[("Depressive Disorders", 20.0), ("Sleep-Wake Disorders", 80.0)],
            "Sleep problems dominate",
        ),
    );
    generator.push(
        GenerationTask::FinalSummary,
        final_reply("", "Sleep difficulties; keep a fixed wake time."),
    );

    let runner = runner(generator.clone());
    let id = runner.start_session().await.session_id;
    for turn in FIRST_INTAKE_TURNS {
        runner.handle_turn(id, turn).await.unwrap();
    }

    let report = runner.handle_turn(id, "5").await.unwrap();
    assert_eq!(
        report.transitions,
        vec![
            (Stage::Validation, Stage::Severity),
            (Stage::Severity, Stage::Solution),
            (Stage::Solution, Stage::Terminal)
        ]
    );
    assert!(report.completed);
    assert_eq!(report.hops, 4);
    assert!(report
        .messages
        .contains(&"No severity scale is registered for Sleep-Wake Disorders.".to_string()));
    // No user segment: the summary itself is shown
    assert_eq!(
        report.messages.last().unwrap(),
        "Sleep difficulties; keep a fixed wake time."
    );

    let state = runner.snapshot(id).await.unwrap();
    assert!(state.severity.result.as_ref().unwrap().is_skipped());
    assert_eq!(state.validation.probabilities.as_ref().unwrap().get("Sleep-Wake Disorders"), Some(0.8));
    assert_eq!(generator.calls(GenerationTask::SeverityQuestions), 0);
    assert_eq!(state.solution.evidence[0].category, "Sleep-Wake Disorders");
}

#[tokio::test]
async fn test_invalid_answer_keeps_cursor() {
    let generator = ScriptedGenerator::new();
    script_first_intake(&generator, DEPRESSED_SUMMARY);
    script_validation(&generator, &["I feel down", "I sleep poorly"]);

    let runner = runner(generator.clone());
    let id = runner.start_session().await.session_id;
    for turn in FIRST_INTAKE_TURNS {
        runner.handle_turn(id, turn).await.unwrap();
    }

    for bad in ["banana", "9", "3.5"] {
        let report = runner.handle_turn(id, bad).await.unwrap();
        assert_eq!(report.recovered, vec!["input_validation_failure"]);
        assert_eq!(report.messages.len(), 1);
        assert!(report.messages[0].starts_with(&prompts::answer_hint(1, 5)));
        assert!(report.messages[0].ends_with("I feel down"));
    }

    let state = runner.snapshot(id).await.unwrap();
    assert_eq!(state.validation.questionnaire.cursor, 0);
    assert!(state.validation.questionnaire.answers.is_empty());

    let report = runner.handle_turn(id, "2").await.unwrap();
    assert_eq!(report.messages, vec!["(2/2) I sleep poorly".to_string()]);
    assert_eq!(generator.calls(GenerationTask::ValidationQuestions), 1);
}

#[tokio::test]
async fn test_scoring_contract_violation_keeps_answers() {
    let generator = ScriptedGenerator::new();
    script_first_intake(&generator, DEPRESSED_SUMMARY);
    script_validation(&generator, &["I feel down"]);
    generator.push(GenerationTask::ValidationScoring, "I think it is probably depression.");
    generator.push(
        GenerationTask::ValidationScoring,
        scoring_reply(&[("Depressive Disorders", 0.9)], "Depressive presentation"),
    );
    generator.push(
        GenerationTask::SeverityQuestions,
        questions_reply("A short questionnaire.", &["Little interest"]),
    );

    let runner = runner(generator.clone());
    let id = runner.start_session().await.session_id;
    for turn in FIRST_INTAKE_TURNS {
        runner.handle_turn(id, turn).await.unwrap();
    }

    let report = runner.handle_turn(id, "4").await.unwrap();
    assert_eq!(report.recovered, vec!["contract_violation"]);
    assert_eq!(report.messages, vec![prompts::SCORING_RETRY.to_string()]);
    assert_eq!(report.stage, Stage::Validation);

    let state = runner.snapshot(id).await.unwrap();
    assert_eq!(state.validation.questionnaire.answers, vec![4]);
    assert!(state.validation.probabilities.is_none());

    // Any message retries scoring with the stored answers
    let report = runner.handle_turn(id, "ok").await.unwrap();
    assert_eq!(report.transitions, vec![(Stage::Validation, Stage::Severity)]);
    assert_eq!(generator.calls(GenerationTask::ValidationQuestions), 1);
}

#[tokio::test]
async fn test_retrieval_outage_leaves_hypothesis_pending() {
    let generator = ScriptedGenerator::new();
    script_first_intake(&generator, DEPRESSED_SUMMARY);
    script_validation(&generator, &["I feel down"]);

    let evidence = FlakyEvidence::new(corpus());
    let runner = runner_with(FlowConfig::default(), evidence.clone(), generator.clone());
    let id = runner.start_session().await.session_id;
    runner.handle_turn(id, FIRST_INTAKE_TURNS[0]).await.unwrap();
    runner.handle_turn(id, FIRST_INTAKE_TURNS[1]).await.unwrap();

    evidence.set_offline(true);
    let report = runner.handle_turn(id, FIRST_INTAKE_TURNS[2]).await.unwrap();
    assert_eq!(report.transitions, vec![(Stage::Intake, Stage::Hypothesis)]);
    assert_eq!(report.recovered, vec!["retrieval_unavailable"]);
    assert_eq!(report.messages.last().unwrap(), prompts::RETRIEVAL_APOLOGY);

    let state = runner.snapshot(id).await.unwrap();
    assert_eq!(state.stage, Stage::Hypothesis);
    assert!(!state.hypothesis.has_run());

    evidence.set_offline(false);
    let report = runner.handle_turn(id, "are you there?").await.unwrap();
    assert_eq!(report.transitions, vec![(Stage::Hypothesis, Stage::Validation)]);
}

#[tokio::test]
async fn test_hop_cap_stops_chaining() {
    let generator = ScriptedGenerator::new();
    script_first_intake(&generator, DEPRESSED_SUMMARY);
    script_validation(&generator, &["I feel down"]);

    let config = FlowConfig {
        max_hops_per_turn: 2,
        ..FlowConfig::default()
    };
    let runner = runner_with(config, Arc::new(corpus()), generator.clone());
    let id = runner.start_session().await.session_id;
    runner.handle_turn(id, FIRST_INTAKE_TURNS[0]).await.unwrap();
    runner.handle_turn(id, FIRST_INTAKE_TURNS[1]).await.unwrap();

    let report = runner.handle_turn(id, FIRST_INTAKE_TURNS[2]).await.unwrap();
    assert!(report.hop_limit_reached);
    assert_eq!(report.hops, 2);
    assert_eq!(report.stage, Stage::Validation);
    assert_eq!(generator.calls(GenerationTask::ValidationQuestions), 0);

    // The next turn picks up where chaining stopped
    let report = runner.handle_turn(id, "hello?").await.unwrap();
    assert!(!report.hop_limit_reached);
    assert_eq!(report.messages.last().unwrap(), "(1/1) I feel down");
}
