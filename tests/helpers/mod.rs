//! Shared fixtures for integration tests
//!
//! `ScriptedGenerator` replays canned backend replies per generation
//! task and records every request it sees. The reply builders produce
//! text in the delimiter/marker format the response parser expects.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use counsel_flow::error::{GenerationError, RetrievalError};
use counsel_flow::evidence::{EvidenceStore, MemoryEvidenceStore};
use counsel_flow::generation::{GenerationRequest, GenerationTask, TextGenerationPort};
use counsel_flow::types::{Corpus, EvidenceItem};
use counsel_flow::{ConversationRunner, FlowConfig};

pub const DELIMITER: &str = "---INTERNAL_DATA---";

/// Summary whose words hit Depressive Disorders three times and
/// Sleep-Wake Disorders twice in [`CORPUS`]
pub const DEPRESSED_SUMMARY: &str =
    "Low mood and hopelessness for two months, losing interest in hobbies, poor sleep";

pub const CORPUS: &str = r#"
criteria:
  - category: Depressive Disorders
    section: narrative
    text: "persistent low mood, emptiness, hopelessness"
  - category: Depressive Disorders
    section: narrative
    text: "loss of interest, fatigue, guilt"
  - category: Depressive Disorders
    section: criteria
    locator: "p. 160"
    text: "five or more symptoms over two weeks including depressed mood"
  - category: Anxiety Disorders
    section: narrative
    text: "excessive worry, restlessness, muscle tension"
  - category: Anxiety Disorders
    section: criteria
    locator: "p. 222"
    text: "worry on most days across half a year"
  - category: Sleep-Wake Disorders
    section: narrative
    text: "difficulty falling asleep, early waking"
  - category: Sleep-Wake Disorders
    section: criteria
    locator: "p. 362"
    text: "sleep difficulty three nights weekly"
treatment:
  - category: General
    locator: "guide 1.0"
    text: "professional support for low mood"
  - category: Depressive Disorders
    locator: "guide 3.1"
    text: "behavioural activation lifts low mood"
  - category: Sleep-Wake Disorders
    locator: "guide 6.1"
    text: "fixed wake time improves sleep"
"#;

pub fn corpus() -> MemoryEvidenceStore {
    MemoryEvidenceStore::from_yaml_str(CORPUS).expect("fixture corpus parses")
}

// ─── Generation doubles ─────────────────────────────────────────

#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<HashMap<GenerationTask, VecDeque<Result<String, GenerationError>>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, task: GenerationTask, reply: impl Into<String>) {
        self.enqueue(task, Ok(reply.into()));
    }

    pub fn fail(&self, task: GenerationTask, error: GenerationError) {
        self.enqueue(task, Err(error));
    }

    fn enqueue(&self, task: GenerationTask, reply: Result<String, GenerationError>) {
        self.replies
            .lock()
            .unwrap()
            .entry(task)
            .or_default()
            .push_back(reply);
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self, task: GenerationTask) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.task == task)
            .count()
    }

    /// Replies queued but never consumed
    pub fn pending(&self) -> usize {
        self.replies.lock().unwrap().values().map(VecDeque::len).sum()
    }
}

#[async_trait]
impl TextGenerationPort for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .get_mut(&request.task)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(GenerationError::Backend(format!(
                    "no scripted reply for {:?}",
                    request.task
                )))
            })
    }
}

/// Blocks every call until released, signalling when a call has started
pub struct GatedGenerator {
    pub inner: Arc<ScriptedGenerator>,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedGenerator {
    pub fn new(inner: Arc<ScriptedGenerator>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            entered: Notify::new(),
            release: Notify::new(),
        })
    }
}

#[async_trait]
impl TextGenerationPort for GatedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.generate(request).await
    }
}

// ─── Retrieval doubles ──────────────────────────────────────────

/// Memory store that can be switched offline
pub struct FlakyEvidence {
    inner: MemoryEvidenceStore,
    offline: AtomicBool,
}

impl FlakyEvidence {
    pub fn new(inner: MemoryEvidenceStore) -> Arc<Self> {
        Arc::new(Self {
            inner,
            offline: AtomicBool::new(false),
        })
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RetrievalError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RetrievalError::Unavailable("index offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl EvidenceStore for FlakyEvidence {
    async fn search(
        &self,
        corpus: Corpus,
        query: &str,
        k: usize,
        category: Option<&str>,
    ) -> Result<Vec<EvidenceItem>, RetrievalError> {
        self.check()?;
        self.inner.search(corpus, query, k, category).await
    }

    async fn criteria_for(&self, category: &str) -> Result<Vec<EvidenceItem>, RetrievalError> {
        self.check()?;
        self.inner.criteria_for(category).await
    }
}

// ─── Runner wiring ──────────────────────────────────────────────

pub fn runner_with(
    config: FlowConfig,
    evidence: Arc<dyn EvidenceStore>,
    generator: Arc<dyn TextGenerationPort>,
) -> ConversationRunner {
    ConversationRunner::builder()
        .config(config)
        .evidence(evidence)
        .generator(generator)
        .build()
        .expect("runner builds")
}

pub fn runner(generator: Arc<ScriptedGenerator>) -> ConversationRunner {
    runner_with(FlowConfig::default(), Arc::new(corpus()), generator)
}

// ─── Reply builders ─────────────────────────────────────────────

/// User text, then the delimiter and the given marker lines
pub fn reply(user: &str, markers: &[String]) -> String {
    if markers.is_empty() {
        return user.to_string();
    }
    format!("{}\n{}\n{}", user, DELIMITER, markers.join("\n"))
}

pub fn intake_reply(user: &str, fields: &[(&str, &str)], summary: Option<&str>) -> String {
    let mut markers = Vec::new();
    if !fields.is_empty() {
        let object: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        markers.push(format!("Structured Data: {}", serde_json::Value::Object(object)));
    }
    if let Some(summary) = summary {
        markers.push(format!("Summary String: {}", summary));
    }
    reply(user, &markers)
}

pub fn hypothesis_reply(report: &str) -> String {
    reply("", &[format!("Hypothesis String: {}", report)])
}

pub fn questions_reply(intro: &str, texts: &[&str]) -> String {
    let questions: Vec<serde_json::Value> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| serde_json::json!({ "id": format!("q{}", i + 1), "text": text }))
        .collect();
    reply(
        intro,
        &[format!(
            "Structured Data: {}",
            serde_json::json!({ "questions": questions })
        )],
    )
}

pub fn scoring_reply(scores: &[(&str, f64)], verdict: &str) -> String {
    let object: serde_json::Map<String, serde_json::Value> = scores
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::json!(v)))
        .collect();
    reply(
        "Thank you for answering.",
        &[
            format!("Structured Data: {}", serde_json::Value::Object(object)),
            format!("Validated String: {}", verdict),
        ],
    )
}

pub fn severity_reply(result: &str, score: f64, level: &str) -> String {
    reply(
        "Thanks, I've scored the questionnaire.",
        &[
            format!("Severity String: {}", result),
            format!(
                "Structured Data: {}",
                serde_json::json!({ "score": score, "level": level })
            ),
        ],
    )
}

pub fn final_reply(user: &str, summary: &str) -> String {
    reply(user, &[format!("Final Response String: {}", summary)])
}

/// Script the three first-pass intake turns ending in `summary`
pub fn script_first_intake(generator: &ScriptedGenerator, summary: &str) {
    generator.push(
        GenerationTask::IntakeReply,
        intake_reply(
            "When did this start?",
            &[("chief_complaint", "feeling low and empty"), ("onset", "two months ago")],
            None,
        ),
    );
    generator.push(
        GenerationTask::IntakeReply,
        intake_reply(
            "How often does it happen?",
            &[("duration", "most of the day"), ("frequency", "nearly every day")],
            None,
        ),
    );
    generator.push(
        GenerationTask::IntakeReply,
        intake_reply(
            "Thank you for sharing all of that.",
            &[("functional_impact", "missing work")],
            Some(summary),
        ),
    );
}

pub const FIRST_INTAKE_TURNS: [&str; 3] = [
    "I feel low and empty all the time",
    "It started about two months ago and lasts most of the day",
    "I've been missing work because of it",
];
