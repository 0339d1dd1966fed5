//! Ollama provider implementation.
//!
//! Talks to the native `/api/generate` endpoint. Streaming responses are
//! newline-delimited JSON objects, each carrying optional `thinking` and
//! `response` text plus a `done` flag on the final line.

use async_trait::async_trait;
use futures::StreamExt;
use hearth_core::{GenerateRequest, Inference, InferenceError, StreamFragment};
use serde::Serialize;
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Client for an Ollama server.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
    /// Models that reject the `think` option; it is omitted for these.
    think_unsupported: HashSet<String>,
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            think_unsupported: HashSet::from(["dolphin-phi:2.7b".to_string()]),
        }
    }

    /// Mark additional models as not supporting the `think` option.
    pub fn without_thinking(mut self, models: impl IntoIterator<Item = String>) -> Self {
        self.think_unsupported.extend(models);
        self
    }

    fn build_request<'a>(&self, request: &'a GenerateRequest, stream: bool) -> ApiRequest<'a> {
        ApiRequest {
            model: &request.model,
            prompt: &request.prompt,
            stream,
            images: if request.images.is_empty() {
                None
            } else {
                Some(&request.images)
            },
            think: if self.think_unsupported.contains(&request.model) {
                None
            } else {
                Some(request.think)
            },
        }
    }

    async fn post(
        &self,
        request: &GenerateRequest,
        stream: bool,
    ) -> Result<reqwest::Response, InferenceError> {
        let url = format!("{}/api/generate", self.base_url);
        debug!(model = %request.model, stream, "Sending generate request");

        let response = self
            .client
            .post(&url)
            .json(&self.build_request(request, stream))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout(e.to_string())
                } else {
                    InferenceError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status == 404 {
            return Err(InferenceError::ModelNotFound(request.model.clone()));
        }
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "Ollama returned error");
            return Err(InferenceError::ApiError {
                status_code: status,
                message: body,
            });
        }
        Ok(response)
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl Inference for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<String, InferenceError> {
        let response = self.post(&request, false).await?;
        let body: serde_json::Value = response.json().await.map_err(|e| {
            InferenceError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            }
        })?;
        Ok(body["response"].as_str().unwrap_or_default().trim().to_string())
    }

    async fn stream(
        &self,
        request: GenerateRequest,
    ) -> Result<mpsc::Receiver<Result<StreamFragment, InferenceError>>, InferenceError> {
        let response = self.post(&request, true).await?;

        let (tx, rx) = mpsc::channel(64);

        // Read the NDJSON byte stream and parse one fragment per line.
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(InferenceError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim_end_matches('\r').to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    if line.is_empty() {
                        continue;
                    }

                    match serde_json::from_str::<StreamFragment>(&line) {
                        Ok(fragment) => {
                            let done = fragment.done;
                            if tx.send(Ok(fragment)).await.is_err() {
                                return; // receiver dropped
                            }
                            if done {
                                return;
                            }
                        }
                        Err(e) => {
                            trace!(line = %line, error = %e, "Ignoring unparseable stream line");
                        }
                    }
                }
            }

            // Stream ended without a done line.
            let _ = tx
                .send(Ok(StreamFragment {
                    done: true,
                    ..Default::default()
                }))
                .await;
        });

        Ok(rx)
    }
}
