//! Engine configuration
//!
//! `FlowConfig` carries every tunable the stages use: required intake
//! fields, guard thresholds, retrieval sizes, timeouts and the severity
//! scale registry. It loads from YAML (all fields optional) and then
//! takes `COUNSEL_*` environment overrides.
//!
//! ```yaml
//! min_intake_turns: 3
//! confidence_threshold: 0.5
//! severity_scales:
//!   - id: phq-9
//!     name: Patient Health Questionnaire-9
//!     item_count: 9
//!     categories: ["Depressive Disorders"]
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::severity::SeverityScale;

/// Environment variable naming an optional YAML config file
pub const CONFIG_PATH_ENV: &str = "COUNSEL_FLOW_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Intake fields that must all be collected before Hypothesis
    pub required_fields: Vec<String>,
    /// Fields frozen after the first intake pass (never re-elicited)
    pub invariant_fields: Vec<String>,
    pub min_intake_turns: u32,
    /// Questions a re-intake pass must ask before accepting a new summary
    pub min_supplementary_questions: u32,

    /// Passages pulled for the plurality vote
    pub retrieval_top_k: usize,
    /// Maximum number of candidates (N)
    pub candidate_count: usize,
    pub treatment_top_k: usize,
    pub treatment_keep: usize,

    /// Validation passes only when max probability is strictly above this
    pub confidence_threshold: f64,
    pub answer_min: u8,
    pub answer_max: u8,

    /// Hard cap on stage handler invocations per external turn
    pub max_hops_per_turn: usize,
    pub history_window: usize,
    pub history_message_chars: usize,

    pub retrieval_timeout_ms: u64,
    pub generation_timeout_ms: u64,

    pub severity_scales: Vec<SeverityScale>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            required_fields: vec![
                "chief_complaint".into(),
                "onset".into(),
                "duration".into(),
                "frequency".into(),
                "functional_impact".into(),
            ],
            invariant_fields: vec!["chief_complaint".into()],
            min_intake_turns: 3,
            min_supplementary_questions: 3,
            retrieval_top_k: 12,
            candidate_count: 3,
            treatment_top_k: 15,
            treatment_keep: 5,
            confidence_threshold: 0.5,
            answer_min: 1,
            answer_max: 5,
            max_hops_per_turn: 8,
            history_window: 10,
            history_message_chars: 200,
            retrieval_timeout_ms: 10_000,
            generation_timeout_ms: 60_000,
            severity_scales: SeverityScale::defaults(),
        }
    }
}

impl FlowConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: FlowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Load `.env`, then the YAML file named by `COUNSEL_FLOW_CONFIG` (if
    /// any), then apply `COUNSEL_*` overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::load(path.trim())?,
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `COUNSEL_*` overrides from any key/value source
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_value(&lookup, "COUNSEL_MIN_INTAKE_TURNS", &mut self.min_intake_turns)?;
        override_value(
            &lookup,
            "COUNSEL_MIN_SUPPLEMENTARY_QUESTIONS",
            &mut self.min_supplementary_questions,
        )?;
        override_value(&lookup, "COUNSEL_RETRIEVAL_TOP_K", &mut self.retrieval_top_k)?;
        override_value(&lookup, "COUNSEL_CANDIDATE_COUNT", &mut self.candidate_count)?;
        override_value(
            &lookup,
            "COUNSEL_CONFIDENCE_THRESHOLD",
            &mut self.confidence_threshold,
        )?;
        override_value(&lookup, "COUNSEL_MAX_HOPS", &mut self.max_hops_per_turn)?;
        override_value(
            &lookup,
            "COUNSEL_RETRIEVAL_TIMEOUT_MS",
            &mut self.retrieval_timeout_ms,
        )?;
        override_value(
            &lookup,
            "COUNSEL_GENERATION_TIMEOUT_MS",
            &mut self.generation_timeout_ms,
        )?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.required_fields.is_empty() {
            return Err(ConfigError::Invalid("required_fields is empty".into()));
        }
        if let Some(field) = self
            .invariant_fields
            .iter()
            .find(|f| !self.required_fields.contains(f))
        {
            return Err(ConfigError::Invalid(format!(
                "invariant field '{}' is not a required field",
                field
            )));
        }
        if self.candidate_count == 0 || self.retrieval_top_k == 0 {
            return Err(ConfigError::Invalid(
                "candidate_count and retrieval_top_k must be positive".into(),
            ));
        }
        if self.answer_min > self.answer_max {
            return Err(ConfigError::Invalid(format!(
                "answer range {}..={} is empty",
                self.answer_min, self.answer_max
            )));
        }
        if !(0.0..1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "confidence_threshold {} must lie in [0, 1)",
                self.confidence_threshold
            )));
        }
        if self.max_hops_per_turn == 0 {
            return Err(ConfigError::Invalid("max_hops_per_turn must be positive".into()));
        }
        Ok(())
    }

    pub fn retrieval_timeout(&self) -> Duration {
        Duration::from_millis(self.retrieval_timeout_ms)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }
}

fn override_value<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        *slot = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            key: key.to_string(),
            value: raw.clone(),
        })?;
    }
    Ok(())
}
