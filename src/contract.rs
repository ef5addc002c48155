//! Response Contract Parser
//!
//! Generation output is split on a literal delimiter line into a segment
//! shown to the user and a machine segment carrying completion markers:
//!
//! ```text
//! Thanks, that helps. How long has this been going on?
//! ---INTERNAL_DATA---
//! Summary String: Two months of low mood and early waking.
//! Structured Data: {"onset": "two months ago"}
//! ```
//!
//! This is the one place where fragile backend text is absorbed. A
//! missing or malformed marker never errors here; it reads as `None`, and
//! the stage decides that means "not complete".

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::types::{ProbabilityMap, Question, QuestionBatch};

/// Literal line separating the user segment from the machine segment
pub const DELIMITER: &str = "---INTERNAL_DATA---";

/// Lines shaped like a marker label ("Something String:", "Other Data:")
static LABEL_LIKE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][A-Za-z]*(?: [A-Z][A-Za-z]*)* (?:String|Data):").unwrap()
});

/// Recognised machine-segment markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Marker {
    /// Intake completion artifact
    Summary,
    /// Hypothesis narrative
    Hypothesis,
    /// Validation verdict
    Validated,
    /// Severity result
    Severity,
    /// Final response of the Solution stage
    FinalResponse,
    /// JSON payload (fields, questions, probabilities or severity score)
    StructuredData,
}

impl Marker {
    pub const ALL: [Marker; 6] = [
        Marker::Summary,
        Marker::Hypothesis,
        Marker::Validated,
        Marker::Severity,
        Marker::FinalResponse,
        Marker::StructuredData,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Marker::Summary => "Summary String:",
            Marker::Hypothesis => "Hypothesis String:",
            Marker::Validated => "Validated String:",
            Marker::Severity => "Severity String:",
            Marker::FinalResponse => "Final Response String:",
            Marker::StructuredData => "Structured Data:",
        }
    }

    fn match_line(line: &str) -> Option<(Marker, &str)> {
        Marker::ALL
            .iter()
            .find_map(|m| line.strip_prefix(m.label()).map(|rest| (*m, rest)))
    }
}

/// Parsed generation output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    /// Text to show the user (whole input when no delimiter is present)
    pub user: String,
    pub machine: MachineSegment,
}

/// Marker values found in the machine segment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MachineSegment {
    values: BTreeMap<Marker, String>,
}

pub struct ResponseContractParser;

impl ResponseContractParser {
    pub fn parse(raw: &str) -> ParsedResponse {
        let Some(index) = raw.find(DELIMITER) else {
            return ParsedResponse {
                user: raw.trim().to_string(),
                machine: MachineSegment::default(),
            };
        };

        let user = raw[..index].trim().to_string();
        let machine = MachineSegment::scan(&raw[index + DELIMITER.len()..]);
        ParsedResponse { user, machine }
    }
}

impl MachineSegment {
    fn scan(text: &str) -> Self {
        fn flush(entry: Option<(Marker, String)>, values: &mut BTreeMap<Marker, String>) {
            if let Some((marker, value)) = entry {
                let value = value.trim();
                if !value.is_empty() {
                    // First occurrence of a label wins
                    values.entry(marker).or_insert_with(|| value.to_string());
                }
            }
        }

        let mut values = BTreeMap::new();
        let mut current: Option<(Marker, String)> = None;

        for line in text.lines() {
            let trimmed = line.trim_start();
            if let Some((marker, rest)) = Marker::match_line(trimmed) {
                flush(current.take(), &mut values);
                current = Some((marker, rest.trim().to_string()));
            } else if LABEL_LIKE_RE.is_match(trimmed) {
                // Unknown label: ends the previous marker, its content is ignored
                flush(current.take(), &mut values);
            } else if let Some((_, value)) = current.as_mut() {
                value.push('\n');
                value.push_str(line);
            }
        }
        flush(current.take(), &mut values);

        Self { values }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw text of a marker, trimmed; `None` when absent or empty
    pub fn get(&self, marker: Marker) -> Option<&str> {
        self.values.get(&marker).map(String::as_str)
    }

    /// Structured payload as JSON, tolerating a markdown code fence
    pub fn structured(&self) -> Option<serde_json::Value> {
        let raw = self.get(Marker::StructuredData)?;
        let body = raw
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();
        serde_json::from_str(body).ok()
    }

    /// Intake field updates: a flat object of field → scalar value
    pub fn intake_fields(&self) -> Option<BTreeMap<String, String>> {
        let object = match self.structured()? {
            serde_json::Value::Object(map) => map,
            _ => return None,
        };
        let mut fields = BTreeMap::new();
        for (name, value) in object {
            let text = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Null => continue,
                _ => return None,
            };
            fields.insert(name, text);
        }
        Some(fields)
    }

    /// Question batch: `{"questions": [...]}` or a bare array. Every
    /// question needs a non-empty id and text, and ids must be unique.
    pub fn questions(&self) -> Option<QuestionBatch> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Payload {
            Wrapped { questions: Vec<Question> },
            Bare(Vec<Question>),
        }

        let questions = match serde_json::from_value::<Payload>(self.structured()?).ok()? {
            Payload::Wrapped { questions } | Payload::Bare(questions) => questions,
        };
        if questions.is_empty() {
            return None;
        }
        let mut seen = std::collections::HashSet::new();
        for q in &questions {
            if q.id.trim().is_empty() || q.text.trim().is_empty() || !seen.insert(q.id.as_str()) {
                return None;
            }
        }
        Some(QuestionBatch::new(questions))
    }

    /// Category → probability, optionally wrapped as `{"probabilities": {...}}`
    pub fn probabilities(&self) -> Option<ProbabilityMap> {
        let mut value = self.structured()?;
        if let Some(inner) = value.get_mut("probabilities").map(serde_json::Value::take) {
            value = inner;
        }
        let raw: BTreeMap<String, f64> = serde_json::from_value(value).ok()?;
        match ProbabilityMap::from_raw(raw) {
            Ok(map) => Some(map),
            Err(reason) => {
                tracing::debug!(%reason, "probability payload rejected");
                None
            }
        }
    }

    /// Optional `{"score": n, "level": "..."}` attached to a severity result
    pub fn severity_score(&self) -> (Option<f64>, Option<String>) {
        let Some(value) = self.structured() else {
            return (None, None);
        };
        let score = value.get("score").and_then(serde_json::Value::as_f64);
        let level = value
            .get("level")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        (score, level)
    }
}

/// Contract description appended to every generation request's
/// instructions
pub fn protocol_instructions() -> String {
    format!(
        "RESPONSE FORMAT\n\
         Write your reply to the user first. Then, on its own line, write {delim} \
         and after it any of these markers, each starting a new line:\n\
         {summary} <intake summary, only once every required field is known>\n\
         {hypothesis} <hypothesis narrative>\n\
         {validated} <validation verdict>\n\
         {severity} <severity result>\n\
         {final_response} <final summary and recommendation>\n\
         {structured} <one JSON value: collected fields object, \
         {{\"questions\": [{{\"id\", \"text\", \"targetCategory\"}}]}}, \
         or a category -> probability object>\n\
         Only include markers the current task asks for. Never show the markers to the user.",
        delim = DELIMITER,
        summary = Marker::Summary.label(),
        hypothesis = Marker::Hypothesis.label(),
        validated = Marker::Validated.label(),
        severity = Marker::Severity.label(),
        final_response = Marker::FinalResponse.label(),
        structured = Marker::StructuredData.label(),
    )
}
