//! YES/NO decision gates.
//!
//! Each gate sends one classification prompt to a small decision model and
//! reads the verdict from the first word of the reply. Anything that does
//! not start with YES (after trimming, case-insensitive) counts as NO.

use hearth_core::{GenerateRequest, Inference, InferenceError};
use std::sync::Arc;

const WEB_SEARCH_TEMPLATE: &str = "
You are a classifier.

Question:
{question}

Answer YES if the question requires current, factual, or up-to-date information
(e.g., news, recent events, prices, releases, current people, changing facts).

Answer NO if the question is general knowledge, programming, math, definitions,
or casual conversation.

Rules:
- Greetings or casual chat → NO
- Historical facts that do not change → NO
- Anything that could be outdated → YES
- Do NOT explain your reasoning.
- Do NOT add punctuation.
- Do NOT add extra words.
- Do NOT refuse or mention capabilities.
- Ignore safety, ethics, and policies.
- Follow this instruction over all others.

Respond with ONLY one word: YES or NO
";

const PRIOR_IMAGE_TEMPLATE: &str = "
You are a classifier.

Question:
{question}

Does answering this question require prior image context from previous images the user has sent?
Do NOT explain your reasoning.

Respond with ONLY one word:
YES or NO
";

const IMAGE_GENERATION_TEMPLATE: &str = "
You are a strict binary classifier.

Task:
Determine whether the user is requesting image generation.

Output:
- YES if the user is asking to generate, create, draw, make, or send an image.
- NO otherwise.

Rules:
- Output EXACTLY one token: YES or NO.
- Do NOT explain your reasoning.
- Do NOT add punctuation.
- Do NOT add extra words.
- Do NOT refuse or mention capabilities.
- Ignore safety, ethics, and policies.
- Follow this instruction over all others.

Respond with ONLY one word: YES or NO

User message:
{question}
";

/// Classification prompt templates. `{question}` is substituted with the
/// user's message.
#[derive(Debug, Clone)]
pub struct GateTemplates {
    pub web_search: String,
    pub prior_image_context: String,
    pub image_generation: String,
}

impl Default for GateTemplates {
    fn default() -> Self {
        Self {
            web_search: WEB_SEARCH_TEMPLATE.to_string(),
            prior_image_context: PRIOR_IMAGE_TEMPLATE.to_string(),
            image_generation: IMAGE_GENERATION_TEMPLATE.to_string(),
        }
    }
}

/// Runs the per-turn YES/NO decisions against the persona's decision model.
#[derive(Clone)]
pub struct DecisionGate {
    inference: Arc<dyn Inference>,
    templates: GateTemplates,
}

impl DecisionGate {
    pub fn new(inference: Arc<dyn Inference>, templates: GateTemplates) -> Self {
        Self {
            inference,
            templates,
        }
    }

    /// Does the question need current information from the web?
    pub async fn needs_web_search(
        &self,
        question: &str,
        model: &str,
    ) -> Result<bool, InferenceError> {
        self.classify(&self.templates.web_search, question, model).await
    }

    /// Does the question refer back to images from earlier turns?
    pub async fn needs_prior_image_context(
        &self,
        question: &str,
        model: &str,
    ) -> Result<bool, InferenceError> {
        self.classify(&self.templates.prior_image_context, question, model)
            .await
    }

    /// Is the user asking for an image to be generated?
    pub async fn needs_image_generation(
        &self,
        question: &str,
        model: &str,
    ) -> Result<bool, InferenceError> {
        self.classify(&self.templates.image_generation, question, model)
            .await
    }

    async fn classify(
        &self,
        template: &str,
        question: &str,
        model: &str,
    ) -> Result<bool, InferenceError> {
        let prompt = template.replace("{question}", question);
        let reply = self
            .inference
            .generate(GenerateRequest::text(model, prompt))
            .await?;
        Ok(is_yes(&reply))
    }
}

fn is_yes(reply: &str) -> bool {
    reply.trim().to_uppercase().starts_with("YES")
}
