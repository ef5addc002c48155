//! HTTP evidence store
//!
//! Client for a retrieval service exposing `POST /search` and
//! `POST /criteria`, both answering `{"items": [...]}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::EvidenceStore;
use crate::error::RetrievalError;
use crate::types::{Corpus, EvidenceItem};

/// Environment variable holding the retrieval service base URL
pub const EVIDENCE_URL_ENV: &str = "EVIDENCE_SERVICE_URL";

#[derive(Clone)]
pub struct HttpEvidenceStore {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    corpus: Corpus,
    query: &'a str,
    k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<&'a str>,
}

#[derive(Serialize)]
struct CriteriaRequest<'a> {
    category: &'a str,
}

#[derive(Deserialize)]
struct ItemsResponse {
    items: Vec<EvidenceItem>,
}

impl HttpEvidenceStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let url = std::env::var(EVIDENCE_URL_ENV)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", EVIDENCE_URL_ENV))?;
        Ok(Self::new(url))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Vec<EvidenceItem>, RetrievalError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Unavailable(format!(
                "retrieval service error {}: {}",
                status, body
            )));
        }

        let parsed: ItemsResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Decode(e.to_string()))?;
        Ok(parsed.items)
    }
}

#[async_trait]
impl EvidenceStore for HttpEvidenceStore {
    async fn search(
        &self,
        corpus: Corpus,
        query: &str,
        k: usize,
        category: Option<&str>,
    ) -> Result<Vec<EvidenceItem>, RetrievalError> {
        let request = SearchRequest {
            corpus,
            query,
            k,
            category,
        };
        self.post("search", &request).await
    }

    async fn criteria_for(&self, category: &str) -> Result<Vec<EvidenceItem>, RetrievalError> {
        self.post("criteria", &CriteriaRequest { category }).await
    }
}
