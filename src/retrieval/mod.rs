//! Retriever Router and retrieval providers
//!
//! One retriever per channel (deposit, installment savings, combined). The
//! router is a total mapping from category to channel; retrieval faults are
//! downgraded to an empty context.

use crate::error::AdvisorError;
use crate::models::{ProductCategory, RetrievedContext};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Passage search over one corpus
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Passages ordered by relevance, most relevant first. Empty is valid.
    async fn search(&self, query: &str, category: ProductCategory, top_k: usize)
        -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalChannel {
    DepositOnly,
    SavingsOnly,
    Combined,
}

/// Unspecified and Both go to the combined corpus
pub fn select_channel(category: ProductCategory) -> RetrievalChannel {
    match category {
        ProductCategory::Deposit => RetrievalChannel::DepositOnly,
        ProductCategory::InstallmentSavings => RetrievalChannel::SavingsOnly,
        _ => RetrievalChannel::Combined,
    }
}

/// The three channel handles
#[derive(Clone)]
pub struct RetrieverSet {
    deposit: Arc<dyn Retriever>,
    savings: Arc<dyn Retriever>,
    combined: Arc<dyn Retriever>,
}

impl RetrieverSet {
    pub fn new(
        deposit: Arc<dyn Retriever>,
        savings: Arc<dyn Retriever>,
        combined: Arc<dyn Retriever>,
    ) -> Self {
        Self {
            deposit,
            savings,
            combined,
        }
    }

    /// Same retriever behind every channel
    pub fn uniform(retriever: Arc<dyn Retriever>) -> Self {
        Self::new(retriever.clone(), retriever.clone(), retriever)
    }

    pub fn handle(&self, channel: RetrievalChannel) -> Arc<dyn Retriever> {
        match channel {
            RetrievalChannel::DepositOnly => self.deposit.clone(),
            RetrievalChannel::SavingsOnly => self.savings.clone(),
            RetrievalChannel::Combined => self.combined.clone(),
        }
    }

    pub fn select_retriever(&self, category: ProductCategory) -> Arc<dyn Retriever> {
        self.handle(select_channel(category))
    }
}

/// Visible text of an HTML passage; plain text passes through
pub fn passage_text(raw: &str) -> String {
    if !raw.contains('<') {
        return raw.trim().to_string();
    }

    let fragment = scraper::Html::parse_fragment(raw);
    fragment
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Route, search and clean. Any fault yields an empty context.
pub async fn retrieve_context(
    retrievers: &RetrieverSet,
    query: &str,
    category: ProductCategory,
    top_k: usize,
    timeout: Duration,
) -> RetrievedContext {
    let query = query.to_lowercase();
    let channel = select_channel(category);
    let retriever = retrievers.handle(channel);

    debug!(?channel, %category, top_k, "Retrieving documents");

    let passages = match tokio::time::timeout(timeout, retriever.search(&query, category, top_k)).await {
        Ok(Ok(passages)) => passages,
        Ok(Err(e)) => {
            warn!(error = %e, %category, "Retrieval failed, continuing without evidence");
            return RetrievedContext::empty();
        }
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), %category, "Retrieval timed out, continuing without evidence");
            return RetrievedContext::empty();
        }
    };

    if passages.is_empty() {
        info!(%category, "No documents retrieved");
        return RetrievedContext::empty();
    }

    let cleaned: Vec<String> = passages
        .iter()
        .map(|p| passage_text(p))
        .filter(|p| !p.is_empty())
        .collect();

    info!(passages = cleaned.len(), "Documents retrieved");
    RetrievedContext::from_passages(cleaned)
}

//
// ================= In-Memory Retriever =================
//

/// Keyword-overlap ranking over a fixed passage corpus
pub struct InMemoryRetriever {
    passages: Vec<String>,
}

impl InMemoryRetriever {
    pub fn new(passages: Vec<String>) -> Self {
        Self { passages }
    }

    /// Corpus file: a JSON array of passage strings
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let passages: Vec<String> = serde_json::from_str(&raw)?;
        Ok(Self::new(passages))
    }

    fn score(passage: &str, terms: &[&str]) -> usize {
        let lowered = passage.to_lowercase();
        terms.iter().filter(|t| lowered.contains(**t)).count()
    }
}

#[async_trait]
impl Retriever for InMemoryRetriever {
    async fn search(
        &self,
        query: &str,
        _category: ProductCategory,
        top_k: usize,
    ) -> Result<Vec<String>> {
        let lowered = query.to_lowercase();
        let terms: Vec<&str> = lowered.split_whitespace().collect();

        let mut scored: Vec<(usize, usize)> = self
            .passages
            .iter()
            .enumerate()
            .map(|(i, p)| (Self::score(p, &terms), i))
            .filter(|(score, _)| *score > 0)
            .collect();

        // Highest score first; ties keep corpus order
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(_, i)| self.passages[i].clone())
            .collect())
    }
}

//
// ================= HTTP Retriever =================
//

/// Vector-search service reached over HTTP
pub struct HttpRetriever {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    passages: Vec<String>,
}

impl HttpRetriever {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn search(
        &self,
        query: &str,
        category: ProductCategory,
        top_k: usize,
    ) -> Result<Vec<String>> {
        let url = format!("{}/search", self.base_url);
        let body = json!({ "query": query, "category": category, "top_k": top_k });

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdvisorError::Retrieval(format!("Search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdvisorError::Retrieval(format!(
                "Search service returned {}",
                status
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AdvisorError::Retrieval(format!("Invalid search response: {}", e)))?;

        Ok(parsed.passages)
    }
}
