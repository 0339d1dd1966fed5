//! ComfyUI image renderer.
//!
//! Submits a fixed text-to-image workflow to a local ComfyUI server, polls
//! its history endpoint until the job finishes, fetches the resulting PNG
//! and writes it to the requested path.

use async_trait::async_trait;
use hearth_core::{ImageRenderer, RenderError};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8188";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(520);
const NEGATIVE_PROMPT: &str = "bad hands, blurry, low quality";

// The SaveImage node id in the workflow graph; outputs are read from here.
const SAVE_NODE: &str = "9";

/// Checkpoint filenames the workflow loads, as known to the ComfyUI server.
#[derive(Debug, Clone)]
pub struct ComfyModels {
    pub diffusion: String,
    pub clip: String,
    pub vae: String,
}

impl Default for ComfyModels {
    fn default() -> Self {
        Self {
            diffusion: "z-image-turbo-fp8-e4m3fn.safetensors".into(),
            clip: "qwen_3_4b.safetensors".into(),
            vae: "ae.safetensors".into(),
        }
    }
}

/// Client for a ComfyUI server.
pub struct ComfyClient {
    base_url: String,
    client: reqwest::Client,
    models: ComfyModels,
    poll_interval: Duration,
    max_wait: Duration,
}

impl ComfyClient {
    pub fn new(base_url: impl Into<String>, models: ComfyModels) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            models,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }

    pub fn with_timing(mut self, poll_interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.max_wait = max_wait;
        self
    }

    /// The fixed text-to-image graph: UNET + CLIP + VAE loaders feeding a
    /// KSampler through an AuraFlow sampling shim, then decode and save.
    fn build_workflow(&self, prompt: &str, seed: u64) -> Value {
        json!({
            "1": {"class_type": "UNETLoader", "inputs": {"unet_name": self.models.diffusion, "weight_dtype": "fp8_e4m3fn"}},
            "2": {"class_type": "CLIPLoader", "inputs": {"clip_name": self.models.clip, "type": "lumina2", "device": "default"}},
            "3": {"class_type": "VAELoader", "inputs": {"vae_name": self.models.vae}},
            "4": {"class_type": "EmptyLatentImage", "inputs": {"batch_size": 1, "width": 512, "height": 512}},
            "5": {"class_type": "CLIPTextEncode", "inputs": {"clip": ["2", 0], "text": prompt}},
            "6": {"class_type": "CLIPTextEncode", "inputs": {"clip": ["2", 0], "text": NEGATIVE_PROMPT}},
            "7": {
                "class_type": "KSampler",
                "inputs": {
                    "model": ["10", 0], "positive": ["5", 0], "negative": ["6", 0], "latent_image": ["4", 0],
                    "seed": seed, "steps": 8, "cfg": 1, "sampler_name": "euler", "scheduler": "simple", "denoise": 1.0,
                },
            },
            "8": {"class_type": "VAEDecode", "inputs": {"samples": ["7", 0], "vae": ["3", 0]}},
            "9": {"class_type": "SaveImage", "inputs": {"filename_prefix": "hearth", "images": ["8", 0]}},
            "10": {"class_type": "ModelSamplingAuraFlow", "inputs": {"shift": 3, "model": ["1", 0]}},
        })
    }

    async fn check_reachable(&self) -> Result<(), RenderError> {
        let url = format!("{}/system_stats", self.base_url);
        let reachable = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false);
        if reachable {
            Ok(())
        } else {
            Err(RenderError::Unreachable(format!(
                "ComfyUI server is not running at {}",
                self.base_url
            )))
        }
    }

    async fn queue(&self, workflow: &Value) -> Result<String, RenderError> {
        let url = format!("{}/prompt", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "prompt": workflow }))
            .send()
            .await
            .map_err(|e| RenderError::Unreachable(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(RenderError::ApiError {
                status_code: status,
                message: body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RenderError::JobFailed(format!("Unparseable queue response: {e}")))?;
        if let Some(error) = body.get("error") {
            return Err(RenderError::JobFailed(error.to_string()));
        }
        body["prompt_id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RenderError::JobFailed("ComfyUI did not return a prompt_id".into()))
    }

    async fn history(&self, prompt_id: &str) -> Result<Option<Value>, RenderError> {
        let url = format!("{}/history/{prompt_id}", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| RenderError::Unreachable(e.to_string()))?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| RenderError::JobFailed(format!("Unparseable history: {e}")))?;
        Ok(body.get(prompt_id).cloned())
    }

    async fn fetch_image(&self, image: &Value) -> Result<Vec<u8>, RenderError> {
        let filename = image["filename"].as_str().unwrap_or_default();
        let type_dir = image["type"].as_str().unwrap_or("output");
        let subfolder = image["subfolder"].as_str().unwrap_or_default();

        let url = format!("{}/view", self.base_url);
        let mut query = vec![("filename", filename), ("type", type_dir)];
        if !subfolder.is_empty() {
            query.push(("subfolder", subfolder));
        }
        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| RenderError::Unreachable(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(RenderError::ApiError {
                status_code: status,
                message: format!("Failed to fetch {filename}"),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RenderError::JobFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// First output image of the save node, if the job has produced one.
fn output_image(history: &Value) -> Option<&Value> {
    history["outputs"][SAVE_NODE]["images"].get(0)
}

fn job_error(history: &Value) -> Option<String> {
    if history["status"]["status_str"].as_str() == Some("error")
        || history["status"].as_str() == Some("error")
    {
        let messages = &history["status_messages"];
        Some(if messages.is_null() {
            "ComfyUI reported an error".to_string()
        } else {
            messages.to_string()
        })
    } else {
        None
    }
}

#[async_trait]
impl ImageRenderer for ComfyClient {
    async fn render(&self, prompt: &str, output: &Path) -> Result<(), RenderError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(RenderError::JobFailed("Empty prompt".into()));
        }

        self.check_reachable().await?;

        let seed = chrono::Utc::now().timestamp_millis() as u64 % (1 << 32);
        let workflow = self.build_workflow(prompt, seed);
        let prompt_id = self.queue(&workflow).await?;
        debug!(prompt_id, seed, "Queued image generation");

        let deadline = tokio::time::Instant::now() + self.max_wait;
        while tokio::time::Instant::now() < deadline {
            tokio::time::sleep(self.poll_interval).await;
            let Some(history) = self.history(&prompt_id).await? else {
                continue;
            };
            if let Some(error) = job_error(&history) {
                return Err(RenderError::JobFailed(error));
            }
            if let Some(image) = output_image(&history) {
                let bytes = self.fetch_image(image).await?;
                tokio::fs::write(output, bytes).await?;
                info!(path = %output.display(), "Image written");
                return Ok(());
            }
        }
        Err(RenderError::Timeout(self.max_wait.as_secs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ComfyClient {
        ComfyClient::new(DEFAULT_BASE_URL, ComfyModels::default())
    }

    #[test]
    fn workflow_wires_prompt_and_seed() {
        let workflow = client().build_workflow("a watercolor fox", 42);
        assert_eq!(workflow["5"]["inputs"]["text"], "a watercolor fox");
        assert_eq!(workflow["6"]["inputs"]["text"], NEGATIVE_PROMPT);
        assert_eq!(workflow["7"]["inputs"]["seed"], 42);
        assert_eq!(workflow["7"]["inputs"]["steps"], 8);
        assert_eq!(workflow["4"]["inputs"]["width"], 512);
        assert_eq!(workflow["10"]["class_type"], "ModelSamplingAuraFlow");
    }

    #[test]
    fn workflow_uses_configured_models() {
        let models = ComfyModels {
            diffusion: "custom.safetensors".into(),
            clip: "clip.safetensors".into(),
            vae: "vae.safetensors".into(),
        };
        let workflow =
            ComfyClient::new(DEFAULT_BASE_URL, models).build_workflow("x", 0);
        assert_eq!(workflow["1"]["inputs"]["unet_name"], "custom.safetensors");
        assert_eq!(workflow["2"]["inputs"]["clip_name"], "clip.safetensors");
        assert_eq!(workflow["3"]["inputs"]["vae_name"], "vae.safetensors");
    }

    #[test]
    fn output_image_extraction() {
        let history = json!({
            "outputs": {
                "9": {"images": [{"filename": "hearth_00001_.png", "type": "output", "subfolder": ""}]}
            }
        });
        let image = output_image(&history).unwrap();
        assert_eq!(image["filename"], "hearth_00001_.png");

        let pending = json!({"outputs": {}});
        assert!(output_image(&pending).is_none());
    }

    #[test]
    fn job_error_extraction() {
        let failed = json!({
            "status": {"status_str": "error"},
            "status_messages": ["node 1 failed"]
        });
        assert!(job_error(&failed).unwrap().contains("node 1 failed"));

        let running = json!({"status": {"status_str": "running"}});
        assert!(job_error(&running).is_none());
    }
}
