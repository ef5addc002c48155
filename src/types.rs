//! Shared data model
//!
//! Stage enum, conversation messages, retrieved evidence, candidates,
//! question batches, probability maps and severity outcomes. These are
//! plain serde values; all mutation of a session goes through
//! [`crate::state::StateChange`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Stage ──────────────────────────────────────────────────────

/// Pipeline stage. Exactly one is current per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Intake,
    Hypothesis,
    Validation,
    Severity,
    Solution,
    Terminal,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Intake,
        Stage::Hypothesis,
        Stage::Validation,
        Stage::Severity,
        Stage::Solution,
        Stage::Terminal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Intake => "intake",
            Stage::Hypothesis => "hypothesis",
            Stage::Validation => "validation",
            Stage::Severity => "severity",
            Stage::Solution => "solution",
            Stage::Terminal => "terminal",
        }
    }

    /// Stages that wait for a user turn before doing their main work
    pub fn is_interactive(&self) -> bool {
        matches!(self, Stage::Intake | Stage::Validation | Stage::Severity)
    }

    /// Stages that run to completion as soon as they are entered
    pub fn is_automatic(&self) -> bool {
        matches!(self, Stage::Hypothesis | Stage::Solution)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Terminal)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ─── Messages ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the append-only conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Stage that was current when the message was logged
    pub stage: Stage,
    pub at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>, stage: Stage) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            stage,
            at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, stage: Stage) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            stage,
            at: Utc::now(),
        }
    }
}

// ─── Evidence ───────────────────────────────────────────────────

/// Which of the two reference corpora a search runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corpus {
    /// Diagnostic criteria and descriptive text per category
    Criteria,
    /// Treatment and management guidance
    Treatment,
}

/// Section kind of a retrieved passage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    #[default]
    #[serde(alias = "description")]
    Narrative,
    Criteria,
}

/// A retrieved passage. Immutable once retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub text: String,
    pub category: String,
    /// Where the passage came from (page number, document anchor)
    #[serde(default)]
    pub locator: Option<String>,
    #[serde(default)]
    pub section: SectionKind,
}

impl EvidenceItem {
    pub fn new(text: impl Into<String>, category: impl Into<String>, section: SectionKind) -> Self {
        Self {
            text: text.into(),
            category: category.into(),
            locator: None,
            section,
        }
    }

    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }

    /// Length in characters, not bytes
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A diagnostic category proposed by the Hypothesis stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub category: String,
    /// 1-based rank
    pub rank: usize,
    /// Representative criterion excerpt; `None` when the corpus has none
    pub evidence: Option<EvidenceItem>,
}

// ─── Questions ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    #[serde(rename = "targetCategory", alias = "target_category", default)]
    pub target_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// Ordered questions for one stage visit. Never regenerated mid-batch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuestionBatch {
    questions: Vec<Question>,
}

impl QuestionBatch {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }
}

// ─── Probabilities ──────────────────────────────────────────────

/// Category → probability in `[0, 1]`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProbabilityMap {
    scores: BTreeMap<String, f64>,
}

impl ProbabilityMap {
    /// Validate raw scores and normalise them onto `[0, 1]`.
    ///
    /// Maps where some value exceeds 1.0 and every value lies in
    /// `[0, 100]` are read as percentages.
    pub fn from_raw(raw: BTreeMap<String, f64>) -> Result<Self, String> {
        if raw.is_empty() {
            return Err("probability map is empty".to_string());
        }
        for (category, value) in &raw {
            if !value.is_finite() || *value < 0.0 || *value > 100.0 {
                return Err(format!("probability for '{}' out of range: {}", category, value));
            }
        }
        let percent = raw.values().any(|v| *v > 1.0);
        let scores = raw
            .into_iter()
            .map(|(k, v)| (k, if percent { v / 100.0 } else { v }))
            .collect();
        Ok(Self { scores })
    }

    pub fn get(&self, category: &str) -> Option<f64> {
        self.scores.get(category).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.scores.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Highest-scoring category; ties go to the first in key order
    pub fn argmax(&self) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for (category, score) in self.iter() {
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((category, score)),
            }
        }
        best
    }

    pub fn max(&self) -> Option<f64> {
        self.argmax().map(|(_, score)| score)
    }
}

// ─── Severity ───────────────────────────────────────────────────

/// Terminal artifact of the Severity stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SeverityOutcome {
    Assessed {
        scale_id: String,
        result: String,
        #[serde(default)]
        score: Option<f64>,
        #[serde(default)]
        level: Option<String>,
    },
    Skipped {
        reason: String,
    },
}

impl SeverityOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, SeverityOutcome::Skipped { .. })
    }

    /// Text handed to the Solution stage
    pub fn summary(&self) -> &str {
        match self {
            SeverityOutcome::Assessed { result, .. } => result,
            SeverityOutcome::Skipped { reason } => reason,
        }
    }
}
