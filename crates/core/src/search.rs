//! Web search collaborator trait.

use crate::error::SearchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One web search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Result title.
    #[serde(default)]
    pub title: String,

    /// Result URL, if the engine provided one.
    #[serde(default)]
    pub url: Option<String>,

    /// Short body text, if the engine provided one.
    #[serde(default)]
    pub snippet: Option<String>,
}

/// A web search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run a text search and return up to `limit` hits, best-ranked first.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError>;
}
