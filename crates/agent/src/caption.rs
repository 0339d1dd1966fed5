//! Vision captioning.
//!
//! Attached images are summarized into text by the persona's vision model
//! before the turn starts, so the summaries can be stored in memory and
//! referenced in later turns without re-sending the pixels.

use hearth_core::{GenerateRequest, Inference};
use tracing::warn;

/// Captioning instruction sent to the vision model, one image at a time.
pub const IMAGE_CONTEXT_PROMPT: &str = "You are a visual memory encoder.
Summarize this image into compact semantic memory suitable for future AI context.
Write in third person.
Focus on persistent traits and ignore temporary details.
If the image contains a recognizable person, include their name and any other relevant information.
Keep it under 150 tokens.";

const CAPTION_FALLBACK: &str = "[Image description unavailable]";

/// Summarize each image into one numbered line of text.
///
/// Per-image failures fall back to a placeholder line so one bad image does
/// not lose the others. Returns `None` when there are no images.
pub async fn describe_images(
    inference: &dyn Inference,
    vision_model: &str,
    images: &[String],
) -> Option<String> {
    if images.is_empty() {
        return None;
    }
    let mut parts = Vec::new();
    for (i, image) in images.iter().enumerate() {
        let request = GenerateRequest {
            model: vision_model.to_string(),
            prompt: IMAGE_CONTEXT_PROMPT.to_string(),
            images: vec![image.clone()],
            think: false,
        };
        let summary = match inference.generate(request).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(image = i + 1, error = %e, "Image captioning failed");
                CAPTION_FALLBACK.to_string()
            }
        };
        if !summary.is_empty() {
            parts.push(format!("Image {}: {}", i + 1, summary.trim()));
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hearth_core::{InferenceError, StreamFragment};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    struct Captioner {
        replies: Mutex<Vec<Result<String, InferenceError>>>,
    }

    #[async_trait]
    impl Inference for Captioner {
        fn name(&self) -> &str {
            "captioner"
        }

        async fn generate(&self, request: GenerateRequest) -> Result<String, InferenceError> {
            assert_eq!(request.images.len(), 1);
            self.replies.lock().unwrap().remove(0)
        }

        async fn stream(
            &self,
            _request: GenerateRequest,
        ) -> Result<mpsc::Receiver<Result<StreamFragment, InferenceError>>, InferenceError>
        {
            unimplemented!("captioning never streams")
        }
    }

    #[tokio::test]
    async fn numbers_each_summary() {
        let inference = Captioner {
            replies: Mutex::new(vec![Ok("a red bicycle".into()), Ok("a grey cat".into())]),
        };
        let context = describe_images(&inference, "vl", &["a".into(), "b".into()])
            .await
            .unwrap();
        assert_eq!(context, "Image 1: a red bicycle\nImage 2: a grey cat");
    }

    #[tokio::test]
    async fn failed_caption_falls_back_per_image() {
        let inference = Captioner {
            replies: Mutex::new(vec![
                Err(InferenceError::Network("down".into())),
                Ok("a grey cat".into()),
            ]),
        };
        let context = describe_images(&inference, "vl", &["a".into(), "b".into()])
            .await
            .unwrap();
        assert_eq!(
            context,
            "Image 1: [Image description unavailable]\nImage 2: a grey cat"
        );
    }

    #[tokio::test]
    async fn no_images_yields_none() {
        let inference = Captioner {
            replies: Mutex::new(vec![]),
        };
        assert!(describe_images(&inference, "vl", &[]).await.is_none());
    }
}
