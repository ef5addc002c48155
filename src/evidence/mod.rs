//! Evidence retrieval
//!
//! Read-only semantic search over the criteria and treatment corpora.
//! The search backend is an external collaborator; this module defines
//! the port ([`EvidenceStore`]), an in-memory adapter used by tests and
//! the REPL, an HTTP adapter for a retrieval service, and the
//! [`HypothesisRanker`] that turns passages into candidates.

mod http;
mod memory;
mod ranker;

pub use http::HttpEvidenceStore;
pub use memory::MemoryEvidenceStore;
pub use ranker::HypothesisRanker;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RetrievalError;
use crate::types::{Corpus, EvidenceItem};

/// Retrieval port
///
/// Empty results are not errors. Implementations return `Err` only
/// when the backend itself is unavailable.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Up to `k` items ranked by closeness to `query`, ties in corpus order
    async fn search(
        &self,
        corpus: Corpus,
        query: &str,
        k: usize,
        category: Option<&str>,
    ) -> Result<Vec<EvidenceItem>, RetrievalError>;

    /// Criteria-section items for one category
    async fn criteria_for(&self, category: &str) -> Result<Vec<EvidenceItem>, RetrievalError>;
}

/// Wraps a store so every call carries a timeout
pub struct TimeoutEvidenceStore {
    inner: Arc<dyn EvidenceStore>,
    timeout: Duration,
}

impl TimeoutEvidenceStore {
    pub fn new(inner: Arc<dyn EvidenceStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl EvidenceStore for TimeoutEvidenceStore {
    async fn search(
        &self,
        corpus: Corpus,
        query: &str,
        k: usize,
        category: Option<&str>,
    ) -> Result<Vec<EvidenceItem>, RetrievalError> {
        tokio::time::timeout(self.timeout, self.inner.search(corpus, query, k, category))
            .await
            .map_err(|_| RetrievalError::Timeout(self.timeout))?
    }

    async fn criteria_for(&self, category: &str) -> Result<Vec<EvidenceItem>, RetrievalError> {
        tokio::time::timeout(self.timeout, self.inner.criteria_for(category))
            .await
            .map_err(|_| RetrievalError::Timeout(self.timeout))?
    }
}

/// Stable reorder putting items whose category mentions `category`
/// (case-insensitive substring) first, then truncate to `keep`
pub fn prioritize_category(
    items: Vec<EvidenceItem>,
    category: &str,
    keep: usize,
) -> Vec<EvidenceItem> {
    let needle = category.trim().to_lowercase();
    let (mut matched, rest): (Vec<_>, Vec<_>) = items
        .into_iter()
        .partition(|item| !needle.is_empty() && item.category.to_lowercase().contains(&needle));
    matched.extend(rest);
    matched.truncate(keep);
    matched
}
