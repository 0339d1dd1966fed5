//! SearxNG search provider.
//!
//! Queries a SearxNG instance's JSON API (`/search?q=...&format=json`).
//! The instance must have the JSON format enabled in its settings.

use async_trait::async_trait;
use hearth_core::{SearchError, SearchHit, SearchProvider};
use serde::Deserialize;
use tracing::debug;

/// Client for a SearxNG instance.
pub struct SearxClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    results: Vec<ApiResult>,
}

#[derive(Deserialize)]
struct ApiResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

impl SearxClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl SearchProvider for SearxClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        let url = format!("{}/search", self.base_url);
        debug!(query, limit, "Running web search");

        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::ApiError {
                status_code: status,
                message: body,
            });
        }

        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Malformed(e.to_string()))?;

        Ok(body
            .results
            .into_iter()
            .take(limit)
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                snippet: r.content,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = SearxClient::new("http://localhost:8080/");
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn parse_results() {
        let body = r#"{
            "query": "rust",
            "results": [
                {"title": "Rust", "url": "https://rust-lang.org", "content": "A language"},
                {"title": "No body", "url": "https://example.com"}
            ]
        }"#;
        let parsed: ApiResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].content.as_deref(), Some("A language"));
        assert!(parsed.results[1].content.is_none());
    }

    #[test]
    fn parse_empty_response() {
        let parsed: ApiResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.results.is_empty());
    }
}
