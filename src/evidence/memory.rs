//! In-memory evidence store
//!
//! Scores passages by word overlap with the query. Used by tests, the
//! REPL and small fixed corpora; larger deployments point
//! [`super::HttpEvidenceStore`] at a real vector index.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use super::EvidenceStore;
use crate::error::{ConfigError, RetrievalError};
use crate::types::{Corpus, EvidenceItem, SectionKind};

#[derive(Debug, Clone, Default)]
pub struct MemoryEvidenceStore {
    criteria: Vec<EvidenceItem>,
    treatment: Vec<EvidenceItem>,
}

#[derive(Deserialize)]
struct CorpusFile {
    #[serde(default)]
    criteria: Vec<EvidenceItem>,
    #[serde(default)]
    treatment: Vec<EvidenceItem>,
}

impl MemoryEvidenceStore {
    pub fn new(criteria: Vec<EvidenceItem>, treatment: Vec<EvidenceItem>) -> Self {
        Self {
            criteria,
            treatment,
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let file: CorpusFile = serde_yaml::from_str(yaml)?;
        Ok(Self::new(file.criteria, file.treatment))
    }

    /// Load a corpus file with `criteria:` and `treatment:` item lists
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_yaml_str(&text)?;
        tracing::info!(
            path = %path.display(),
            criteria = store.criteria.len(),
            treatment = store.treatment.len(),
            "loaded evidence corpus"
        );
        Ok(store)
    }

    fn corpus(&self, corpus: Corpus) -> &[EvidenceItem] {
        match corpus {
            Corpus::Criteria => &self.criteria,
            Corpus::Treatment => &self.treatment,
        }
    }
}

fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl EvidenceStore for MemoryEvidenceStore {
    async fn search(
        &self,
        corpus: Corpus,
        query: &str,
        k: usize,
        category: Option<&str>,
    ) -> Result<Vec<EvidenceItem>, RetrievalError> {
        let query_tokens = tokens(query);
        let mut scored: Vec<(usize, &EvidenceItem)> = self
            .corpus(corpus)
            .iter()
            .filter(|item| category.map_or(true, |c| item.category.eq_ignore_ascii_case(c)))
            .filter_map(|item| {
                let item_tokens = tokens(&format!("{} {}", item.category, item.text));
                let overlap = query_tokens.intersection(&item_tokens).count();
                (overlap > 0).then_some((overlap, item))
            })
            .collect();

        // sort_by is stable: equal scores keep corpus order
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, item)| item.clone())
            .collect())
    }

    async fn criteria_for(&self, category: &str) -> Result<Vec<EvidenceItem>, RetrievalError> {
        Ok(self
            .criteria
            .iter()
            .filter(|item| item.section == SectionKind::Criteria)
            .filter(|item| item.category.eq_ignore_ascii_case(category))
            .cloned()
            .collect())
    }
}
